use anyhow::Result;
use qc_core::PeptideIdentification;
use std::collections::HashSet;

use crate::{QcMetric, Requirement, RunInput, Status};

/// Position of every MS2 scan within its duty cycle, for identified and
/// unidentified spectra alike.
///
/// Identifications get `ScanEventNumber` and `identified = "+"`. Every MS2
/// spectrum without an identification yields a new hitless identification with
/// `identified = "-"`; those are returned for the caller to attach.
#[derive(Debug, Default)]
pub struct TopNoverRt;

impl TopNoverRt {
    pub fn new() -> Self {
        Self
    }
}

/// Scan event number per spectrum index: 0 for MS1, 1.. for the MS2 scans
/// that follow an MS1 scan.
fn scan_event_numbers(levels: impl Iterator<Item = u8>) -> Vec<i64> {
    let mut counter = 0i64;
    levels
        .map(|level| {
            if level == 1 {
                counter = 0;
                0
            } else {
                counter += 1;
                counter
            }
        })
        .collect()
}

impl QcMetric for TopNoverRt {
    fn name(&self) -> &'static str {
        "TopNoverRT"
    }

    fn requires(&self) -> Status {
        Requirement::RawMzml | Requirement::PostFdrFeat
    }

    fn compute(&mut self, run: &mut RunInput<'_>) -> Result<Vec<PeptideIdentification>> {
        let exp = run.spectra;
        let spectra = &exp.spectra;
        let events = scan_event_numbers(spectra.iter().map(|s| s.ms_level));
        let spectra_map = run.spectra_map;

        let mut identified: HashSet<usize> = HashSet::new();
        for id in run.features.peptide_identifications_mut() {
            let index = match id
                .spectrum_reference
                .as_deref()
                .and_then(|r| spectra_map.index_of(r))
            {
                Some(i) => i,
                None => continue,
            };
            id.meta.set("ScanEventNumber", events[index]);
            id.meta.set("identified", "+");
            identified.insert(index);
        }

        let created = spectra
            .iter()
            .enumerate()
            .filter(|(i, s)| s.ms_level == 2 && !identified.contains(i))
            .map(|(i, s)| {
                let mut id = PeptideIdentification {
                    rt: s.rt,
                    mz: s.precursor.as_ref().map(|p| p.mz).unwrap_or(0.0),
                    spectrum_reference: Some(s.native_id.clone()),
                    ..PeptideIdentification::default()
                };
                id.meta.set("ScanEventNumber", events[i]);
                id.meta.set("identified", "-");
                id
            })
            .collect();
        Ok(created)
    }
}
