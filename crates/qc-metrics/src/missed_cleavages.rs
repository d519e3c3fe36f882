use anyhow::Result;
use qc_core::PeptideIdentification;
use std::collections::BTreeMap;

use crate::residues::missed_cleavages;
use crate::{QcMetric, Requirement, RunInput, Status};

/// Counts tryptic missed cleavages on each top hit.
#[derive(Debug, Default)]
pub struct MissedCleavages {
    results: Vec<BTreeMap<usize, usize>>,
}

impl MissedCleavages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per run: number of missed cleavages -> number of top hits.
    pub fn results(&self) -> &[BTreeMap<usize, usize>] {
        &self.results
    }
}

impl QcMetric for MissedCleavages {
    fn name(&self) -> &'static str {
        "MissedCleavages"
    }

    fn requires(&self) -> Status {
        Requirement::PostFdrFeat.into()
    }

    fn compute(&mut self, run: &mut RunInput<'_>) -> Result<Vec<PeptideIdentification>> {
        let mut histogram = BTreeMap::new();
        for id in run.features.peptide_identifications_mut() {
            if let Some(hit) = id.top_hit_mut() {
                let count = missed_cleavages(&hit.sequence);
                hit.meta.set("missed_cleavages", count);
                *histogram.entry(count).or_insert(0) += 1;
            }
        }
        self.results.push(histogram);
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_core::{FeatureMap, MetaValue, MsExperiment, SpectraMap, TransformationDescription};
    use serde_json::json;

    #[test]
    fn annotates_top_hit_only() {
        let mut fmap: FeatureMap = serde_json::from_value(json!({
            "features": [{"peptide_identifications": [
                {"hits": [{"sequence": "PEKTIDER"}, {"sequence": "AKAKAK"}]}
            ]}],
            "unassigned_peptide_identifications": [{"hits": [{"sequence": "PEPTIDEK"}]}, {}]
        }))
        .expect("fmap");
        let exp = MsExperiment::default();
        let spectra_map = SpectraMap::default();
        let trafo = TransformationDescription::default();
        let mut metric = MissedCleavages::new();
        let mut run = RunInput {
            run_index: 0,
            features: &mut fmap,
            spectra: &exp,
            spectra_map: &spectra_map,
            transformation: &trafo,
            contaminants: &[],
        };
        metric.compute(&mut run).expect("compute");

        let hits = &fmap.features[0].peptide_identifications[0].hits;
        assert_eq!(hits[0].meta.get("missed_cleavages"), Some(&MetaValue::Int(1)));
        assert!(hits[1].meta.is_empty());
        assert_eq!(
            fmap.unassigned_peptide_identifications[0].hits[0].meta.get("missed_cleavages"),
            Some(&MetaValue::Int(0))
        );
        let histogram = &metric.results()[0];
        assert_eq!(histogram.get(&0), Some(&1));
        assert_eq!(histogram.get(&1), Some(&1));
    }
}
