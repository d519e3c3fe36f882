//! QC analysis units and the input requirements that gate them.
//!
//! Every unit implements [`QcMetric`]: it declares the [`Status`] of inputs it
//! needs and is invoked once per run with a [`RunInput`]. Units annotate the
//! run's identifications in place and may synthesize new identifications,
//! which the caller stages and attaches later.

use anyhow::{anyhow, Result};
use qc_core::{
    FastaEntry, FeatureMap, MsExperiment, PeptideIdentification, QcError, SpectraMap,
    TransformationDescription,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

pub mod contaminants;
pub mod fragment_mass_error;
pub mod missed_cleavages;
pub mod ms2_id_rate;
pub mod mz_calibration;
pub mod residues;
pub mod rt_alignment;
pub mod tic;
pub mod top_n_over_rt;

pub use contaminants::Contaminants;
pub use fragment_mass_error::FragmentMassError;
pub use missed_cleavages::MissedCleavages;
pub use ms2_id_rate::Ms2IdentificationRate;
pub use mz_calibration::MzCalibration;
pub use rt_alignment::RtAlignment;
pub use tic::Tic;
pub use top_n_over_rt::TopNoverRt;

/// One category of optional input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    RawMzml,
    PostFdrFeat,
    TrafoAlign,
    Contaminants,
}

impl Requirement {
    pub const ALL: [Requirement; 4] = [
        Requirement::RawMzml,
        Requirement::PostFdrFeat,
        Requirement::TrafoAlign,
        Requirement::Contaminants,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::RawMzml => "raw spectra",
            Self::PostFdrFeat => "post-filter features",
            Self::TrafoAlign => "alignment transform",
            Self::Contaminants => "contaminant database",
        }
    }

    /// Command-line input that satisfies this requirement.
    pub fn input_param(&self) -> &'static str {
        match self {
            Self::RawMzml => "in_raw",
            Self::PostFdrFeat => "in_post_fdr",
            Self::TrafoAlign => "in_trafo",
            Self::Contaminants => "in_contaminants",
        }
    }

    fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of satisfied [`Requirement`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Status(u8);

impl Status {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn contains(&self, req: Requirement) -> bool {
        self.0 & req.bit() != 0
    }

    pub fn insert(&mut self, req: Requirement) {
        self.0 |= req.bit();
    }

    /// Adds `req` only when `present`; absence is never an error.
    pub fn note_availability(&mut self, req: Requirement, present: bool) {
        if present {
            self.insert(req);
        }
    }

    pub fn union(self, other: Status) -> Status {
        Status(self.0 | other.0)
    }

    pub fn is_superset_of(&self, other: Status) -> bool {
        self.0 & other.0 == other.0
    }

    /// Members of `self` that `other` lacks, in declaration order.
    pub fn difference(&self, other: Status) -> Vec<Requirement> {
        self.iter().filter(|r| !other.contains(*r)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Requirement> + '_ {
        Requirement::ALL.into_iter().filter(move |r| self.contains(*r))
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl Serialize for Status {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl From<Requirement> for Status {
    fn from(req: Requirement) -> Self {
        Status(req.bit())
    }
}

impl BitOr for Requirement {
    type Output = Status;

    fn bitor(self, rhs: Requirement) -> Status {
        Status::from(self).union(rhs.into())
    }
}

impl BitOr<Requirement> for Status {
    type Output = Status;

    fn bitor(self, rhs: Requirement) -> Status {
        self.union(rhs.into())
    }
}

impl BitOrAssign<Requirement> for Status {
    fn bitor_assign(&mut self, rhs: Requirement) {
        self.insert(rhs);
    }
}

impl FromIterator<Requirement> for Status {
    fn from_iter<I: IntoIterator<Item = Requirement>>(iter: I) -> Self {
        let mut status = Status::empty();
        for req in iter {
            status.insert(req);
        }
        status
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|r| r.name()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// Everything one run offers to an analysis unit. Inputs that were not
/// supplied are present but empty.
pub struct RunInput<'a> {
    pub run_index: usize,
    pub features: &'a mut FeatureMap,
    pub spectra: &'a MsExperiment,
    pub spectra_map: &'a SpectraMap,
    pub transformation: &'a TransformationDescription,
    pub contaminants: &'a [FastaEntry],
}

/// One per-run summary value a unit reports into the QC report metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryValue {
    /// `(x, y)` points, e.g. retention time vs. intensity.
    Curve(Vec<(f64, f64)>),
    /// Fraction in `[0, 1]`.
    Rate(f64),
}

/// Per-run summary results of one unit, in run order.
#[derive(Debug, Clone, PartialEq)]
pub struct SummarySeries {
    pub kind: &'static str,
    pub cv_label: &'static str,
    pub accession: &'static str,
    pub values: Vec<SummaryValue>,
}

/// A pluggable QC analysis unit.
pub trait QcMetric {
    fn name(&self) -> &'static str;

    fn requires(&self) -> Status;

    /// Annotates `run` in place and returns newly synthesized identifications.
    fn compute(&mut self, run: &mut RunInput<'_>) -> Result<Vec<PeptideIdentification>>;

    fn summary(&self) -> Option<SummarySeries> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToleranceUnit {
    /// Taken from the feature map's search parameters.
    #[default]
    Auto,
    Ppm,
    Da,
}

impl ToleranceUnit {
    pub const NAMES: [&'static str; 3] = ["auto", "ppm", "da"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Ppm => "ppm",
            Self::Da => "da",
        }
    }
}

impl FromStr for ToleranceUnit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "ppm" => Ok(Self::Ppm),
            "da" => Ok(Self::Da),
            _ => Err(anyhow!(QcError::illegal(
                "fragment_mass_error.unit",
                format!(
                    "'{}' is not one of {}",
                    s,
                    Self::NAMES.join(", ")
                )
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentMassErrorParams {
    pub unit: ToleranceUnit,
    pub tolerance: f64,
}

impl Default for FragmentMassErrorParams {
    fn default() -> Self {
        Self {
            unit: ToleranceUnit::Auto,
            tolerance: 20.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ms2IdRateParams {
    /// Count every identification as a target hit when no FDR step ran.
    pub force_no_fdr: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricParams {
    pub fragment_mass_error: FragmentMassErrorParams,
    pub ms2_id_rate: Ms2IdRateParams,
}

/// All units in invocation order. The order is fixed: when two units write
/// the same annotation key, the later one wins during merge-back.
pub fn standard_metrics(params: &MetricParams) -> Vec<Box<dyn QcMetric>> {
    vec![
        Box::new(Contaminants::new()),
        Box::new(FragmentMassError::new(
            params.fragment_mass_error.unit,
            params.fragment_mass_error.tolerance,
        )),
        Box::new(MissedCleavages::new()),
        Box::new(Ms2IdentificationRate::new(params.ms2_id_rate.force_no_fdr)),
        Box::new(MzCalibration::new()),
        Box::new(RtAlignment::new()),
        Box::new(Tic::new()),
        Box::new(TopNoverRt::new()),
    ]
}
