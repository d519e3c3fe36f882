//! Cross-run consensus map: linked features, their identifications and the
//! protein identification runs they originate from.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identification::{PeptideIdentification, ProteinIdentification};
use crate::meta::MetaInfo;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsensusFeature {
    #[serde(default)]
    pub rt: f64,
    #[serde(default)]
    pub mz: f64,
    #[serde(default)]
    pub intensity: f64,
    #[serde(default)]
    pub charge: i32,
    #[serde(default)]
    pub peptide_identifications: Vec<PeptideIdentification>,
    #[serde(default, skip_serializing_if = "MetaInfo::is_empty")]
    pub meta: MetaInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsensusMap {
    #[serde(default)]
    pub features: Vec<ConsensusFeature>,
    #[serde(default)]
    pub unassigned_peptide_identifications: Vec<PeptideIdentification>,
    #[serde(default)]
    pub protein_identifications: Vec<ProteinIdentification>,
    #[serde(default, skip_serializing_if = "MetaInfo::is_empty")]
    pub meta: MetaInfo,
}

/// Which identification list of a [`ConsensusMap`] a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdGroup {
    Feature(usize),
    Unassigned,
}

impl IdGroup {
    /// Value stamped into the source-group annotation.
    pub fn stamp(&self) -> i64 {
        match self {
            Self::Feature(index) => *index as i64,
            Self::Unassigned => crate::UNASSIGNED_GROUP,
        }
    }
}

impl fmt::Display for IdGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Feature(index) => write!(f, "feature {}", index),
            Self::Unassigned => f.write_str("unassigned"),
        }
    }
}

impl ConsensusMap {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Every group in iteration order: features first, then the unassigned list.
    pub fn groups(&self) -> impl Iterator<Item = IdGroup> {
        (0..self.features.len())
            .map(IdGroup::Feature)
            .chain(std::iter::once(IdGroup::Unassigned))
    }

    pub fn peptide_identifications(&self, group: IdGroup) -> Option<&Vec<PeptideIdentification>> {
        match group {
            IdGroup::Feature(index) => self.features.get(index).map(|f| &f.peptide_identifications),
            IdGroup::Unassigned => Some(&self.unassigned_peptide_identifications),
        }
    }

    pub fn peptide_identifications_mut(
        &mut self,
        group: IdGroup,
    ) -> Option<&mut Vec<PeptideIdentification>> {
        match group {
            IdGroup::Feature(index) => self
                .features
                .get_mut(index)
                .map(|f| &mut f.peptide_identifications),
            IdGroup::Unassigned => Some(&mut self.unassigned_peptide_identifications),
        }
    }

    pub fn peptide_identification_mut(
        &mut self,
        group: IdGroup,
        slot: usize,
    ) -> Option<&mut PeptideIdentification> {
        self.peptide_identifications_mut(group)
            .and_then(|ids| ids.get_mut(slot))
    }

    pub fn peptide_identification_count(&self) -> usize {
        self.features
            .iter()
            .map(|f| f.peptide_identifications.len())
            .sum::<usize>()
            + self.unassigned_peptide_identifications.len()
    }

    /// Keeps only the best-scoring identification per consensus feature so each
    /// feature maps to a single peptide in the report. Unassigned
    /// identifications are left alone.
    pub fn resolve_id_conflicts(&mut self) -> usize {
        let mut dropped = 0;
        for feature in self.features.iter_mut() {
            if feature.peptide_identifications.len() < 2 {
                continue;
            }
            let ids = std::mem::take(&mut feature.peptide_identifications);
            let total = ids.len();
            let mut best: Option<PeptideIdentification> = None;
            for id in ids {
                let replace = match &best {
                    None => true,
                    Some(current) => id.beats(current),
                };
                if replace {
                    best = Some(id);
                }
            }
            if let Some(best) = best {
                feature.peptide_identifications.push(best);
            }
            dropped += total - feature.peptide_identifications.len();
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identification::PeptideHit;

    fn pep(seq: &str, score: f64) -> PeptideIdentification {
        PeptideIdentification {
            hits: vec![PeptideHit {
                sequence: seq.into(),
                score,
                ..PeptideHit::default()
            }],
            ..PeptideIdentification::default()
        }
    }

    #[test]
    fn groups_end_with_unassigned() {
        let map = ConsensusMap {
            features: vec![ConsensusFeature::default(), ConsensusFeature::default()],
            ..ConsensusMap::default()
        };
        let groups: Vec<_> = map.groups().collect();
        assert_eq!(
            groups,
            vec![IdGroup::Feature(0), IdGroup::Feature(1), IdGroup::Unassigned]
        );
        assert_eq!(IdGroup::Unassigned.stamp(), -1);
        assert_eq!(IdGroup::Feature(1).stamp(), 1);
    }

    #[test]
    fn resolve_keeps_best_per_feature_only() {
        let mut map = ConsensusMap {
            features: vec![
                ConsensusFeature {
                    peptide_identifications: vec![pep("AAK", 0.2), pep("CCK", 0.8), pep("DDK", 0.5)],
                    ..ConsensusFeature::default()
                },
                ConsensusFeature {
                    peptide_identifications: vec![pep("EEK", 0.1)],
                    ..ConsensusFeature::default()
                },
            ],
            unassigned_peptide_identifications: vec![pep("FFK", 0.3), pep("GGK", 0.4)],
            ..ConsensusMap::default()
        };
        let dropped = map.resolve_id_conflicts();
        assert_eq!(dropped, 2);
        assert_eq!(map.features[0].peptide_identifications.len(), 1);
        assert_eq!(
            map.features[0].peptide_identifications[0].hits[0].sequence,
            "CCK"
        );
        assert_eq!(map.features[1].peptide_identifications.len(), 1);
        assert_eq!(map.unassigned_peptide_identifications.len(), 2);
    }

    #[test]
    fn slot_access_reaches_unassigned_and_features() {
        let mut map = ConsensusMap {
            features: vec![ConsensusFeature {
                peptide_identifications: vec![pep("AAK", 1.0)],
                ..ConsensusFeature::default()
            }],
            unassigned_peptide_identifications: vec![pep("BBK", 1.0)],
            ..ConsensusMap::default()
        };
        assert!(map.peptide_identification_mut(IdGroup::Feature(0), 0).is_some());
        assert!(map.peptide_identification_mut(IdGroup::Feature(0), 1).is_none());
        assert!(map.peptide_identification_mut(IdGroup::Feature(3), 0).is_none());
        let un = map
            .peptide_identification_mut(IdGroup::Unassigned, 0)
            .expect("unassigned slot");
        assert_eq!(un.hits[0].sequence, "BBK");
        assert_eq!(map.peptide_identification_count(), 2);
    }
}
