use serde::{Deserialize, Serialize};

use crate::identification::{PeptideIdentification, ProteinIdentification, SearchParameters};
use crate::meta::MetaInfo;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
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

/// Per-run feature list after FDR filtering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureMap {
    #[serde(default)]
    pub primary_ms_run_path: Vec<String>,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub unassigned_peptide_identifications: Vec<PeptideIdentification>,
    #[serde(default)]
    pub protein_identifications: Vec<ProteinIdentification>,
    #[serde(default, skip_serializing_if = "MetaInfo::is_empty")]
    pub meta: MetaInfo,
}

impl FeatureMap {
    /// Assigned identifications (feature order) followed by unassigned ones.
    pub fn peptide_identifications(&self) -> impl Iterator<Item = &PeptideIdentification> {
        self.features
            .iter()
            .flat_map(|f| f.peptide_identifications.iter())
            .chain(self.unassigned_peptide_identifications.iter())
    }

    pub fn peptide_identifications_mut(
        &mut self,
    ) -> impl Iterator<Item = &mut PeptideIdentification> {
        self.features
            .iter_mut()
            .flat_map(|f| f.peptide_identifications.iter_mut())
            .chain(self.unassigned_peptide_identifications.iter_mut())
    }

    pub fn search_parameters(&self) -> Option<&SearchParameters> {
        self.protein_identifications
            .first()
            .map(|p| &p.search_parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn iterates_assigned_before_unassigned() {
        let map: FeatureMap = serde_json::from_value(json!({
            "primary_ms_run_path": ["A.raw"],
            "features": [
                {"peptide_identifications": [{"meta": {"UID": "f0"}}]},
                {"peptide_identifications": [{"meta": {"UID": "f1"}}, {"meta": {"UID": "f1b"}}]}
            ],
            "unassigned_peptide_identifications": [{"meta": {"UID": "u0"}}]
        }))
        .expect("feature map");
        let uids: Vec<_> = map.peptide_identifications().filter_map(|p| p.uid()).collect();
        assert_eq!(uids, vec!["f0", "f1", "f1b", "u0"]);
        assert!(map.search_parameters().is_none());
    }

    #[test]
    fn mutable_iteration_touches_every_identification() {
        let mut map = FeatureMap {
            features: vec![Feature {
                peptide_identifications: vec![PeptideIdentification::default()],
                ..Feature::default()
            }],
            unassigned_peptide_identifications: vec![PeptideIdentification::default()],
            ..FeatureMap::default()
        };
        for id in map.peptide_identifications_mut() {
            id.meta.set("seen", 1_i64);
        }
        assert!(map.peptide_identifications().all(|p| p.meta.exists("seen")));
    }
}
