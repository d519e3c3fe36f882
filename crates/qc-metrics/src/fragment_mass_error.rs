use anyhow::Result;
use qc_core::{PeptideIdentification, Spectrum};
use tracing::{debug, warn};

use crate::residues::fragment_ions;
use crate::{QcMetric, Requirement, RunInput, Status, ToleranceUnit};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FmeStatistics {
    pub average_ppm: f64,
    pub variance_ppm: f64,
    pub matched_peaks: usize,
}

/// Mass error of annotated fragment peaks for each identification's top hit.
#[derive(Debug)]
pub struct FragmentMassError {
    unit: ToleranceUnit,
    tolerance: f64,
    results: Vec<FmeStatistics>,
}

impl FragmentMassError {
    pub fn new(unit: ToleranceUnit, tolerance: f64) -> Self {
        Self {
            unit,
            tolerance,
            results: Vec::new(),
        }
    }

    pub fn results(&self) -> &[FmeStatistics] {
        &self.results
    }

    /// Resolves `auto` against the search settings recorded in the feature map.
    fn effective_tolerance(&self, run: &RunInput<'_>) -> (f64, bool) {
        match self.unit {
            ToleranceUnit::Ppm => (self.tolerance, true),
            ToleranceUnit::Da => (self.tolerance, false),
            ToleranceUnit::Auto => match run.features.search_parameters() {
                Some(p) if p.fragment_mass_tolerance > 0.0 => {
                    (p.fragment_mass_tolerance, p.fragment_mass_tolerance_ppm)
                }
                _ => {
                    warn!(
                        run = run.run_index,
                        tolerance = self.tolerance,
                        "no fragment tolerance in search parameters, falling back to ppm"
                    );
                    (self.tolerance, true)
                }
            },
        }
    }
}

impl QcMetric for FragmentMassError {
    fn name(&self) -> &'static str {
        "FragmentMassError"
    }

    fn requires(&self) -> Status {
        Requirement::RawMzml | Requirement::PostFdrFeat
    }

    fn compute(&mut self, run: &mut RunInput<'_>) -> Result<Vec<PeptideIdentification>> {
        let (tolerance, is_ppm) = self.effective_tolerance(run);
        let spectra = run.spectra;
        let spectra_map = run.spectra_map;
        let mut all_ppm: Vec<f64> = Vec::new();
        for id in run.features.peptide_identifications_mut() {
            let spectrum = match id
                .spectrum_reference
                .as_deref()
                .and_then(|r| spectra_map.index_of(r))
                .map(|i| &spectra.spectra[i])
            {
                Some(s) if s.ms_level == 2 => s,
                _ => continue,
            };
            let hit = match id.top_hit_mut() {
                Some(h) => h,
                None => continue,
            };
            let (ppm, da) = match_fragments(&fragment_ions(&hit.sequence), spectrum, tolerance, is_ppm);
            all_ppm.extend(ppm.iter().copied());
            hit.meta.set("fragment_mass_error_ppm", ppm);
            hit.meta.set("fragment_mass_error_da", da);
        }

        let stats = statistics(&all_ppm);
        debug!(
            run = run.run_index,
            matched = stats.matched_peaks,
            average_ppm = stats.average_ppm,
            "fragment mass error computed"
        );
        self.results.push(stats);
        Ok(Vec::new())
    }
}

/// Matches every theoretical ion to the closest observed peak inside the
/// window; returns signed errors in ppm and Da.
fn match_fragments(
    theoretical: &[f64],
    spectrum: &Spectrum,
    tolerance: f64,
    is_ppm: bool,
) -> (Vec<f64>, Vec<f64>) {
    let mut ppm = Vec::new();
    let mut da = Vec::new();
    for &theo in theoretical {
        let window = if is_ppm { theo * tolerance * 1e-6 } else { tolerance };
        let closest = spectrum
            .mz
            .iter()
            .copied()
            .filter(|obs| (obs - theo).abs() <= window)
            .min_by(|a, b| (a - theo).abs().total_cmp(&(b - theo).abs()));
        if let Some(obs) = closest {
            ppm.push((obs - theo) / theo * 1e6);
            da.push(obs - theo);
        }
    }
    (ppm, da)
}

fn statistics(values: &[f64]) -> FmeStatistics {
    if values.is_empty() {
        return FmeStatistics::default();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    FmeStatistics {
        average_ppm: mean,
        variance_ppm: variance,
        matched_peaks: values.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::residues::PROTON;
    use qc_core::{FeatureMap, MetaValue, MsExperiment, SpectraMap, TransformationDescription};
    use serde_json::json;

    fn run_metric(metric: &mut FragmentMassError, fmap: &mut FeatureMap, exp: &MsExperiment) {
        let spectra_map = SpectraMap::calculate(exp);
        let trafo = TransformationDescription::default();
        let mut run = RunInput {
            run_index: 0,
            features: fmap,
            spectra: exp,
            spectra_map: &spectra_map,
            transformation: &trafo,
            contaminants: &[],
        };
        metric.compute(&mut run).expect("compute");
    }

    #[test]
    fn annotates_matched_fragment_errors() {
        // GAK b1 and y1 with a +0.001 Da shift
        let b1 = 57.021_464 + PROTON;
        let y1 = 128.094_963 + 18.010_564_684 + PROTON;
        let exp: MsExperiment = serde_json::from_value(json!({
            "spectra": [{"native_id": "scan=5", "ms_level": 2, "rt": 10.0,
                         "mz": [b1 + 0.001, y1 + 0.001, 900.0], "intensity": [10.0, 20.0, 5.0]}]
        }))
        .expect("exp");
        let mut fmap: FeatureMap = serde_json::from_value(json!({
            "unassigned_peptide_identifications": [
                {"spectrum_reference": "scan=5", "hits": [{"sequence": "GAK", "charge": 1}]},
                {"spectrum_reference": "scan=404", "hits": [{"sequence": "GAK", "charge": 1}]}
            ]
        }))
        .expect("fmap");
        let mut metric = FragmentMassError::new(ToleranceUnit::Da, 0.01);
        run_metric(&mut metric, &mut fmap, &exp);

        let hit = &fmap.unassigned_peptide_identifications[0].hits[0];
        match hit.meta.get("fragment_mass_error_da") {
            Some(MetaValue::FloatList(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors.iter().all(|e| (e - 0.001).abs() < 1e-9));
            }
            other => panic!("unexpected annotation: {:?}", other),
        }
        assert!(fmap.unassigned_peptide_identifications[1].hits[0].meta.is_empty());
        assert_eq!(metric.results()[0].matched_peaks, 2);
    }

    #[test]
    fn auto_unit_reads_search_parameters() {
        let exp = MsExperiment::default();
        let mut fmap: FeatureMap = serde_json::from_value(json!({
            "protein_identifications": [{"identifier": "run",
                "search_parameters": {"fragment_mass_tolerance": 0.5, "fragment_mass_tolerance_ppm": false}}]
        }))
        .expect("fmap");
        let metric = FragmentMassError::new(ToleranceUnit::Auto, 20.0);
        let spectra_map = SpectraMap::default();
        let trafo = TransformationDescription::default();
        let run = RunInput {
            run_index: 0,
            features: &mut fmap,
            spectra: &exp,
            spectra_map: &spectra_map,
            transformation: &trafo,
            contaminants: &[],
        };
        assert_eq!(metric.effective_tolerance(&run), (0.5, false));
    }

    #[test]
    fn statistics_of_empty_run_are_zero() {
        assert_eq!(statistics(&[]), FmeStatistics::default());
        let s = statistics(&[1.0, 3.0]);
        assert_eq!(s.average_ppm, 2.0);
        assert_eq!(s.variance_ppm, 1.0);
    }
}
