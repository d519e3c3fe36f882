use serde::{Deserialize, Serialize};

/// Retention-time mapping from a run onto the aligned reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model_type", rename_all = "snake_case")]
pub enum TransformationDescription {
    #[default]
    Identity,
    Linear { slope: f64, intercept: f64 },
    /// Piecewise linear through `(rt_in, rt_out)` pairs, extrapolated with the
    /// outermost segments.
    Interpolated { data_points: Vec<(f64, f64)> },
}

impl TransformationDescription {
    pub fn apply(&self, rt: f64) -> f64 {
        match self {
            Self::Identity => rt,
            Self::Linear { slope, intercept } => slope * rt + intercept,
            Self::Interpolated { data_points } => interpolate(data_points, rt),
        }
    }
}

fn interpolate(points: &[(f64, f64)], x: f64) -> f64 {
    let mut sorted: Vec<(f64, f64)> = points.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
    match sorted.len() {
        0 => x,
        1 => x + (sorted[0].1 - sorted[0].0),
        n => {
            let seg = if x <= sorted[0].0 {
                0
            } else {
                match sorted.iter().position(|p| p.0 >= x) {
                    Some(i) => i - 1,
                    None => n - 2,
                }
            };
            let (x0, y0) = sorted[seg];
            let (x1, y1) = sorted[seg + 1];
            if x1 == x0 {
                return y0;
            }
            y0 + (x - x0) * (y1 - y0) / (x1 - x0)
        }
    }
}
