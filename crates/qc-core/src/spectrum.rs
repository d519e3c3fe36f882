use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Precursor {
    pub mz: f64,
    #[serde(default)]
    pub charge: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    pub native_id: String,
    #[serde(default = "default_ms_level")]
    pub ms_level: u8,
    #[serde(default)]
    pub rt: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precursor: Option<Precursor>,
    #[serde(default)]
    pub mz: Vec<f64>,
    #[serde(default)]
    pub intensity: Vec<f64>,
}

fn default_ms_level() -> u8 {
    1
}

impl Spectrum {
    pub fn total_ion_current(&self) -> f64 {
        self.intensity.iter().sum()
    }
}

/// Raw spectra of one run, in acquisition order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MsExperiment {
    #[serde(default)]
    pub spectra: Vec<Spectrum>,
}

impl MsExperiment {
    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    pub fn ms2_count(&self) -> usize {
        self.spectra.iter().filter(|s| s.ms_level == 2).count()
    }
}

/// Lookup from native spectrum id to its index in an [`MsExperiment`].
#[derive(Debug, Clone, Default)]
pub struct SpectraMap {
    by_native_id: HashMap<String, usize>,
}

impl SpectraMap {
    pub fn calculate(exp: &MsExperiment) -> Self {
        let by_native_id = exp
            .spectra
            .iter()
            .enumerate()
            .map(|(i, s)| (s.native_id.clone(), i))
            .collect();
        Self { by_native_id }
    }

    pub fn index_of(&self, native_id: &str) -> Option<usize> {
        self.by_native_id.get(native_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.by_native_id.is_empty()
    }
}
