use anyhow::Result;
use qc_core::PeptideIdentification;

use crate::{QcMetric, Requirement, RunInput, Status, SummarySeries, SummaryValue};

/// Total ion current chromatogram over the MS1 spectra of each run.
#[derive(Debug, Default)]
pub struct Tic {
    results: Vec<Vec<(f64, f64)>>,
}

impl Tic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> &[Vec<(f64, f64)>] {
        &self.results
    }
}

impl QcMetric for Tic {
    fn name(&self) -> &'static str {
        "TIC"
    }

    fn requires(&self) -> Status {
        Requirement::RawMzml.into()
    }

    fn compute(&mut self, run: &mut RunInput<'_>) -> Result<Vec<PeptideIdentification>> {
        let chromatogram = run
            .spectra
            .spectra
            .iter()
            .filter(|s| s.ms_level == 1)
            .map(|s| (s.rt, s.total_ion_current()))
            .collect();
        self.results.push(chromatogram);
        Ok(Vec::new())
    }

    fn summary(&self) -> Option<SummarySeries> {
        Some(SummarySeries {
            kind: "TIC",
            cv_label: "total ion current",
            accession: "MS:1000285",
            values: self
                .results
                .iter()
                .map(|c| SummaryValue::Curve(c.clone()))
                .collect(),
        })
    }
}
