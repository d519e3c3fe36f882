use anyhow::Result;
use qc_core::PeptideIdentification;

use crate::{QcMetric, Requirement, RunInput, Status};

/// Records each identification's retention time before (`rt_raw`) and after
/// (`rt_align`) applying the run's alignment transformation.
#[derive(Debug, Default)]
pub struct RtAlignment;

impl RtAlignment {
    pub fn new() -> Self {
        Self
    }
}

impl QcMetric for RtAlignment {
    fn name(&self) -> &'static str {
        "RTAlignment"
    }

    fn requires(&self) -> Status {
        Requirement::PostFdrFeat | Requirement::TrafoAlign
    }

    fn compute(&mut self, run: &mut RunInput<'_>) -> Result<Vec<PeptideIdentification>> {
        let trafo = run.transformation;
        for id in run.features.peptide_identifications_mut() {
            id.meta.set("rt_raw", id.rt);
            id.meta.set("rt_align", trafo.apply(id.rt));
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_core::{FeatureMap, MetaValue, MsExperiment, SpectraMap, TransformationDescription};
    use serde_json::json;

    #[test]
    fn writes_raw_and_aligned_rt() {
        let mut fmap: FeatureMap = serde_json::from_value(json!({
            "features": [{"peptide_identifications": [{"rt": 10.0}]}],
            "unassigned_peptide_identifications": [{"rt": 20.0}]
        }))
        .expect("fmap");
        let exp = MsExperiment::default();
        let spectra_map = SpectraMap::default();
        let trafo = TransformationDescription::Linear {
            slope: 1.0,
            intercept: 5.0,
        };
        let mut run = RunInput {
            run_index: 0,
            features: &mut fmap,
            spectra: &exp,
            spectra_map: &spectra_map,
            transformation: &trafo,
            contaminants: &[],
        };
        RtAlignment::new().compute(&mut run).expect("compute");
        let assigned = &fmap.features[0].peptide_identifications[0].meta;
        assert_eq!(assigned.get("rt_raw"), Some(&MetaValue::Float(10.0)));
        assert_eq!(assigned.get("rt_align"), Some(&MetaValue::Float(15.0)));
        assert_eq!(
            fmap.unassigned_peptide_identifications[0].meta.get("rt_align"),
            Some(&MetaValue::Float(25.0))
        );
    }
}
