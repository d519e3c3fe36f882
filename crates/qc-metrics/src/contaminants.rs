use anyhow::Result;
use qc_core::PeptideIdentification;
use std::collections::HashSet;
use tracing::debug;

use crate::residues::{tryptic_peptides, unmodified};
use crate::{QcMetric, Requirement, RunInput, Status};

const MAX_MISSED_CLEAVAGES: usize = 2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContaminantsSummary {
    /// Fraction of identified peptides that are contaminants.
    pub assigned_contaminants_ratio: f64,
    /// Contaminant share of the summed feature intensity.
    pub assigned_contaminants_intensity_ratio: f64,
}

/// Flags top hits whose sequence is a tryptic peptide of a contaminant protein.
#[derive(Debug, Default)]
pub struct Contaminants {
    digest: Option<HashSet<String>>,
    results: Vec<ContaminantsSummary>,
}

impl Contaminants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> &[ContaminantsSummary] {
        &self.results
    }
}

impl QcMetric for Contaminants {
    fn name(&self) -> &'static str {
        "Contaminants"
    }

    fn requires(&self) -> Status {
        Requirement::PostFdrFeat | Requirement::Contaminants
    }

    fn compute(&mut self, run: &mut RunInput<'_>) -> Result<Vec<PeptideIdentification>> {
        let contaminants = run.contaminants;
        let digest = self.digest.get_or_insert_with(|| {
            contaminants
                .iter()
                .flat_map(|entry| {
                    tryptic_peptides(&entry.sequence.to_ascii_uppercase(), MAX_MISSED_CLEAVAGES)
                })
                .collect()
        });

        let mut total = 0usize;
        let mut hits = 0usize;
        let mut total_intensity = 0.0;
        let mut contaminant_intensity = 0.0;
        for feature in run.features.features.iter_mut() {
            total_intensity += feature.intensity;
            let mut is_contaminant_feature = false;
            for id in feature.peptide_identifications.iter_mut() {
                if let Some(flag) = flag_top_hit(id, digest) {
                    total += 1;
                    if flag {
                        hits += 1;
                        is_contaminant_feature = true;
                    }
                }
            }
            if is_contaminant_feature {
                contaminant_intensity += feature.intensity;
            }
        }
        for id in run.features.unassigned_peptide_identifications.iter_mut() {
            if let Some(flag) = flag_top_hit(id, digest) {
                total += 1;
                if flag {
                    hits += 1;
                }
            }
        }

        let summary = ContaminantsSummary {
            assigned_contaminants_ratio: ratio(hits as f64, total as f64),
            assigned_contaminants_intensity_ratio: ratio(contaminant_intensity, total_intensity),
        };
        debug!(
            run = run.run_index,
            ratio = summary.assigned_contaminants_ratio,
            "contaminants computed"
        );
        self.results.push(summary);
        Ok(Vec::new())
    }
}

fn flag_top_hit(id: &mut PeptideIdentification, digest: &HashSet<String>) -> Option<bool> {
    let hit = id.top_hit_mut()?;
    let flag = digest.contains(&unmodified(&hit.sequence).to_ascii_uppercase());
    hit.meta.set("is_contaminant", i64::from(flag));
    Some(flag)
}

fn ratio(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_core::{FastaEntry, FeatureMap, MetaValue, MsExperiment, SpectraMap, TransformationDescription};
    use serde_json::json;

    #[test]
    fn flags_contaminant_sequences() {
        let mut fmap: FeatureMap = serde_json::from_value(json!({
            "features": [
                {"intensity": 300.0, "peptide_identifications": [{"hits": [{"sequence": "SAEIDNAK"}]}]},
                {"intensity": 100.0, "peptide_identifications": [{"hits": [{"sequence": "PEPTIDER"}]}]}
            ],
            "unassigned_peptide_identifications": [{"hits": [{"sequence": "LLEGEESR"}]}, {"hits": []}]
        }))
        .expect("fmap");
        let db = vec![FastaEntry {
            identifier: "CONT_KRT".into(),
            description: String::new(),
            sequence: "SAEIDNAKLLEGEESRM".into(),
        }];
        let exp = MsExperiment::default();
        let spectra_map = SpectraMap::default();
        let trafo = TransformationDescription::default();
        let mut metric = Contaminants::new();
        let mut run = RunInput {
            run_index: 0,
            features: &mut fmap,
            spectra: &exp,
            spectra_map: &spectra_map,
            transformation: &trafo,
            contaminants: &db,
        };
        let created = metric.compute(&mut run).expect("compute");
        assert!(created.is_empty());
        let flag = |f: usize| {
            fmap.features[f].peptide_identifications[0].hits[0]
                .meta
                .get("is_contaminant")
                .cloned()
        };
        assert_eq!(flag(0), Some(MetaValue::Int(1)));
        assert_eq!(flag(1), Some(MetaValue::Int(0)));
        assert_eq!(
            fmap.unassigned_peptide_identifications[0].hits[0].meta.get("is_contaminant"),
            Some(&MetaValue::Int(1))
        );
        let summary = &metric.results()[0];
        assert!((summary.assigned_contaminants_ratio - 2.0 / 3.0).abs() < 1e-12);
        assert!((summary.assigned_contaminants_intensity_ratio - 0.75).abs() < 1e-12);
    }

    #[test]
    fn lowercase_database_sequences_match_uppercase_hits() {
        let mut fmap: FeatureMap = serde_json::from_value(json!({
            "unassigned_peptide_identifications": [
                {"hits": [{"sequence": "LLEGEESR"}]},
                {"hits": [{"sequence": "LLEGEESRM"}]}
            ]
        }))
        .expect("fmap");
        let db = vec![FastaEntry {
            identifier: "CONT_KRT".into(),
            description: String::new(),
            sequence: "saeidnakllegeesrm".into(),
        }];
        let exp = MsExperiment::default();
        let spectra_map = SpectraMap::default();
        let trafo = TransformationDescription::default();
        let mut run = RunInput {
            run_index: 0,
            features: &mut fmap,
            spectra: &exp,
            spectra_map: &spectra_map,
            transformation: &trafo,
            contaminants: &db,
        };
        Contaminants::new().compute(&mut run).expect("compute");
        let flag = |i: usize| {
            fmap.unassigned_peptide_identifications[i].hits[0]
                .meta
                .get("is_contaminant")
                .cloned()
        };
        assert_eq!(flag(0), Some(MetaValue::Int(1)));
        assert_eq!(flag(1), Some(MetaValue::Int(1)));
    }
}
