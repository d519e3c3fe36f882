use anyhow::Result;
use qc_core::PeptideIdentification;

use crate::residues;
use crate::{QcMetric, Requirement, RunInput, Status};

/// Precursor m/z error of each identification before and after calibration.
///
/// The calibrated value is the identification's own m/z; the uncalibrated
/// one is the precursor m/z of the referenced raw spectrum, which is only
/// available when raw spectra were supplied.
#[derive(Debug, Default)]
pub struct MzCalibration;

impl MzCalibration {
    pub fn new() -> Self {
        Self
    }
}

fn ppm_error(observed: f64, reference: f64) -> f64 {
    (observed - reference) / reference * 1e6
}

impl QcMetric for MzCalibration {
    fn name(&self) -> &'static str {
        "MzCalibration"
    }

    fn requires(&self) -> Status {
        Requirement::PostFdrFeat.into()
    }

    fn compute(&mut self, run: &mut RunInput<'_>) -> Result<Vec<PeptideIdentification>> {
        let spectra = run.spectra;
        let spectra_map = run.spectra_map;
        for id in run.features.peptide_identifications_mut() {
            let mz_ref = match id
                .top_hit()
                .and_then(|hit| residues::mz(&hit.sequence, hit.charge))
            {
                Some(v) => v,
                None => continue,
            };
            let mz_raw = id
                .spectrum_reference
                .as_deref()
                .and_then(|r| spectra_map.index_of(r))
                .and_then(|i| spectra.spectra[i].precursor.as_ref())
                .map(|p| p.mz);
            id.meta.set("mz_ref", mz_ref);
            id.meta.set("calibrated_mz_error_ppm", ppm_error(id.mz, mz_ref));
            if let Some(raw) = mz_raw {
                id.meta.set("mz_raw", raw);
                id.meta.set("uncalibrated_mz_error_ppm", ppm_error(raw, mz_ref));
            }
        }
        Ok(Vec::new())
    }
}
