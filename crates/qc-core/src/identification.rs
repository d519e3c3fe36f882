use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::meta::{MetaInfo, MetaValue};
use crate::UID_KEY;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeptideHit {
    pub sequence: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub charge: i32,
    #[serde(default)]
    pub protein_accessions: Vec<String>,
    #[serde(default, skip_serializing_if = "MetaInfo::is_empty")]
    pub meta: MetaInfo,
}

/// One spectrum-level identification with its ranked hits (best first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeptideIdentification {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub rt: f64,
    #[serde(default)]
    pub mz: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectrum_reference: Option<String>,
    #[serde(default = "default_higher_score_better")]
    pub higher_score_better: bool,
    #[serde(default)]
    pub hits: Vec<PeptideHit>,
    #[serde(default, skip_serializing_if = "MetaInfo::is_empty")]
    pub meta: MetaInfo,
}

fn default_higher_score_better() -> bool {
    true
}

impl Default for PeptideIdentification {
    fn default() -> Self {
        Self {
            identifier: String::new(),
            rt: 0.0,
            mz: 0.0,
            spectrum_reference: None,
            higher_score_better: true,
            hits: Vec::new(),
            meta: MetaInfo::default(),
        }
    }
}

impl PeptideIdentification {
    /// The `UID` annotation; integer keys are accepted and rendered as text.
    pub fn uid(&self) -> Option<Cow<'_, str>> {
        match self.meta.get(UID_KEY)? {
            MetaValue::Text(s) => Some(Cow::Borrowed(s.as_str())),
            MetaValue::Int(v) => Some(Cow::Owned(v.to_string())),
            _ => None,
        }
    }

    pub fn top_hit(&self) -> Option<&PeptideHit> {
        self.hits.first()
    }

    pub fn top_hit_mut(&mut self) -> Option<&mut PeptideHit> {
        self.hits.first_mut()
    }

    /// True when `self`'s top hit scores better than `other`'s. An identification
    /// without hits never wins.
    pub fn beats(&self, other: &PeptideIdentification) -> bool {
        match (self.top_hit(), other.top_hit()) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(a), Some(b)) => {
                if self.higher_score_better {
                    a.score > b.score
                } else {
                    a.score < b.score
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParameters {
    #[serde(default)]
    pub fragment_mass_tolerance: f64,
    #[serde(default)]
    pub fragment_mass_tolerance_ppm: bool,
    #[serde(default)]
    pub precursor_mass_tolerance: f64,
    #[serde(default)]
    pub precursor_mass_tolerance_ppm: bool,
    #[serde(default)]
    pub digestion_enzyme: Option<String>,
}

/// Search run description; links identifications (via `identifier`) to the runs they came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProteinIdentification {
    pub identifier: String,
    #[serde(default)]
    pub search_engine: String,
    #[serde(default)]
    pub primary_ms_run_path: Vec<String>,
    #[serde(default)]
    pub search_parameters: SearchParameters,
    #[serde(default, skip_serializing_if = "MetaInfo::is_empty")]
    pub meta: MetaInfo,
}
