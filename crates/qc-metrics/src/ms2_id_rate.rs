use anyhow::{anyhow, Result};
use qc_core::{PeptideIdentification, QcError};
use tracing::debug;

use crate::{QcMetric, Requirement, RunInput, Status, SummarySeries, SummaryValue};

const TARGET_DECOY_KEY: &str = "target_decoy";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentificationRateData {
    pub num_peptide_identification: usize,
    pub num_ms2_spectra: usize,
    pub identification_rate: f64,
}

/// Fraction of MS2 spectra that led to an accepted identification.
#[derive(Debug, Default)]
pub struct Ms2IdentificationRate {
    force_no_fdr: bool,
    results: Vec<IdentificationRateData>,
}

impl Ms2IdentificationRate {
    pub fn new(force_no_fdr: bool) -> Self {
        Self {
            force_no_fdr,
            results: Vec::new(),
        }
    }

    pub fn results(&self) -> &[IdentificationRateData] {
        &self.results
    }

    fn is_accepted(&self, id: &PeptideIdentification) -> Result<bool> {
        let hit = match id.top_hit() {
            Some(h) => h,
            None => return Ok(false),
        };
        if self.force_no_fdr {
            return Ok(true);
        }
        match hit.meta.get(TARGET_DECOY_KEY) {
            Some(value) => Ok(value.as_str() == Some("target")),
            None => Err(anyhow!(QcError::MissingInformation(
                "no target/decoy annotation found; run FDR first or set force_no_fdr".to_string()
            ))),
        }
    }
}

impl QcMetric for Ms2IdentificationRate {
    fn name(&self) -> &'static str {
        "Ms2IdentificationRate"
    }

    fn requires(&self) -> Status {
        Requirement::RawMzml | Requirement::PostFdrFeat
    }

    fn compute(&mut self, run: &mut RunInput<'_>) -> Result<Vec<PeptideIdentification>> {
        let num_ms2_spectra = run.spectra.ms2_count();
        if num_ms2_spectra == 0 {
            return Err(anyhow!(QcError::MissingInformation(format!(
                "run {}: no MS2 spectra found",
                run.run_index + 1
            ))));
        }
        let mut num_peptide_identification = 0usize;
        for id in run.features.peptide_identifications() {
            if self.is_accepted(id)? {
                num_peptide_identification += 1;
            }
        }
        if num_peptide_identification > num_ms2_spectra {
            return Err(anyhow!(
                "run {}: more accepted identifications ({}) than MS2 spectra ({}), check input",
                run.run_index + 1,
                num_peptide_identification,
                num_ms2_spectra
            ));
        }
        let identification_rate = num_peptide_identification as f64 / num_ms2_spectra as f64;
        debug!(run = run.run_index, identification_rate, "ms2 identification rate computed");
        self.results.push(IdentificationRateData {
            num_peptide_identification,
            num_ms2_spectra,
            identification_rate,
        });
        Ok(Vec::new())
    }

    fn summary(&self) -> Option<SummarySeries> {
        Some(SummarySeries {
            kind: "MS2_ID_Rate",
            cv_label: "MS2 identification rate",
            accession: "null",
            values: self
                .results
                .iter()
                .map(|r| SummaryValue::Rate(r.identification_rate))
                .collect(),
        })
    }
}
