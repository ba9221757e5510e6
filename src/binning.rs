//! Ordered interval specifications for mapping numbers to labels.
//!
//! Every edge states whether it includes its boundary value, so a boundary
//! value belongs to exactly one bin no matter the order bins are checked in.
//! [`BinningSpec::new`] rejects gaps and overlaps between neighbours.
//!
//! ```
//! use survey_insight::binning::BinningSpec;
//!
//! let groups = BinningSpec::age_groups();
//! assert_eq!(groups.assign(29.0), "<30");
//! assert_eq!(groups.assign(30.0), "30–45");
//! assert_eq!(groups.assign(45.0), "30–45");
//! assert_eq!(groups.assign(46.0), "46–60");
//! assert_eq!(groups.assign(61.0), ">60");
//! ```

use crate::error::{Result, SurveyError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Label for values outside every interval.
pub const DEFAULT_LABEL: &str = "Unknown";

/// One side of an interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Edge {
    /// No bound on this side.
    Unbounded,
    /// Bound that contains its value.
    Inclusive(f64),
    /// Bound that excludes its value.
    Exclusive(f64),
}

impl Edge {
    fn value(self) -> Option<f64> {
        match self {
            Self::Unbounded => None,
            Self::Inclusive(v) | Self::Exclusive(v) => Some(v),
        }
    }

    fn is_inclusive(self) -> bool {
        matches!(self, Self::Inclusive(_))
    }
}

/// A labelled interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub label: String,
    pub lower: Edge,
    pub upper: Edge,
}

impl Bin {
    /// Creates a bin without validation; [`BinningSpec::new`] checks neighbours.
    pub fn new(label: impl Into<String>, lower: Edge, upper: Edge) -> Self {
        Self {
            label: label.into(),
            lower,
            upper,
        }
    }

    /// Returns `true` if `value` lies inside this interval.
    pub fn contains(&self, value: f64) -> bool {
        let above = match self.lower {
            Edge::Unbounded => true,
            Edge::Inclusive(lo) => value >= lo,
            Edge::Exclusive(lo) => value > lo,
        };
        let below = match self.upper {
            Edge::Unbounded => true,
            Edge::Inclusive(hi) => value <= hi,
            Edge::Exclusive(hi) => value < hi,
        };
        above && below
    }
}

/// Validated, ordered list of contiguous bins plus a default label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBinningSpec", into = "RawBinningSpec")]
pub struct BinningSpec {
    bins: Vec<Bin>,
    default_label: String,
}

#[derive(Serialize, Deserialize)]
struct RawBinningSpec {
    bins: Vec<Bin>,
    #[serde(default = "default_label")]
    default_label: String,
}

fn default_label() -> String {
    DEFAULT_LABEL.to_string()
}

impl TryFrom<RawBinningSpec> for BinningSpec {
    type Error = SurveyError;

    fn try_from(raw: RawBinningSpec) -> Result<Self> {
        Self::new(raw.bins, raw.default_label)
    }
}

impl From<BinningSpec> for RawBinningSpec {
    fn from(spec: BinningSpec) -> Self {
        Self {
            bins: spec.bins,
            default_label: spec.default_label,
        }
    }
}

impl BinningSpec {
    /// Validates and builds a spec.
    ///
    /// Requirements: at least one bin; distinct labels; each bin non-empty;
    /// only the first bin may be unbounded below and only the last unbounded
    /// above; neighbouring bins share their boundary value with exactly one
    /// of the two sides inclusive.
    pub fn new(bins: Vec<Bin>, default_label: impl Into<String>) -> Result<Self> {
        let default_label = default_label.into();
        if bins.is_empty() {
            return Err(SurveyError::InvalidBinning("no bins".into()));
        }

        let mut seen = HashSet::new();
        for bin in &bins {
            if !seen.insert(bin.label.as_str()) {
                return Err(SurveyError::InvalidBinning(format!(
                    "label '{}' used twice",
                    bin.label
                )));
            }
            if let (Some(lo), Some(hi)) = (bin.lower.value(), bin.upper.value()) {
                if lo.is_nan() || hi.is_nan() || lo >= hi {
                    return Err(SurveyError::InvalidBinning(format!(
                        "bin '{}' is empty ({lo} to {hi})",
                        bin.label
                    )));
                }
            }
        }
        if seen.contains(default_label.as_str()) {
            return Err(SurveyError::InvalidBinning(format!(
                "default label '{default_label}' collides with a bin label"
            )));
        }

        let last = bins.len() - 1;
        for (i, bin) in bins.iter().enumerate() {
            if i > 0 && bin.lower == Edge::Unbounded {
                return Err(SurveyError::InvalidBinning(format!(
                    "bin '{}' is unbounded below but is not first",
                    bin.label
                )));
            }
            if i < last && bin.upper == Edge::Unbounded {
                return Err(SurveyError::InvalidBinning(format!(
                    "bin '{}' is unbounded above but is not last",
                    bin.label
                )));
            }
        }

        for pair in bins.windows(2) {
            let (left, right) = (&pair[0], &pair[1]);
            if left.upper.value() != right.lower.value() {
                return Err(SurveyError::InvalidBinning(format!(
                    "gap between '{}' and '{}'",
                    left.label, right.label
                )));
            }
            match (left.upper.is_inclusive(), right.lower.is_inclusive()) {
                (true, true) => {
                    return Err(SurveyError::InvalidBinning(format!(
                        "'{}' and '{}' both include their shared edge",
                        left.label, right.label
                    )))
                }
                (false, false) => {
                    return Err(SurveyError::InvalidBinning(format!(
                        "shared edge of '{}' and '{}' belongs to neither",
                        left.label, right.label
                    )))
                }
                _ => {}
            }
        }

        Ok(Self {
            bins,
            default_label,
        })
    }

    /// Builds bins from sorted `edges` with the generic policy: lower edge
    /// inclusive, upper edge exclusive, except the last bin which also
    /// includes its upper edge.
    ///
    /// ```
    /// use survey_insight::binning::BinningSpec;
    ///
    /// let spec = BinningSpec::half_open(&[0.0, 10.0, 20.0], &["low", "high"], "Unknown").unwrap();
    /// assert_eq!(spec.assign(10.0), "high");
    /// assert_eq!(spec.assign(20.0), "high");
    /// assert_eq!(spec.assign(20.5), "Unknown");
    /// ```
    pub fn half_open<S: AsRef<str>>(
        edges: &[f64],
        labels: &[S],
        default_label: impl Into<String>,
    ) -> Result<Self> {
        if edges.len() < 2 || labels.len() != edges.len() - 1 {
            return Err(SurveyError::InvalidBinning(format!(
                "{} edges need {} labels, got {}",
                edges.len(),
                edges.len().saturating_sub(1),
                labels.len()
            )));
        }
        let last = labels.len() - 1;
        let bins = labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let upper = if i == last {
                    Edge::Inclusive(edges[i + 1])
                } else {
                    Edge::Exclusive(edges[i + 1])
                };
                Bin::new(label.as_ref(), Edge::Inclusive(edges[i]), upper)
            })
            .collect();
        Self::new(bins, default_label)
    }

    /// Age groups `<30`, `30–45`, `46–60`, `>60`.
    ///
    /// 30 and 45 fall in `30–45`; 60 falls in `46–60`.
    pub fn age_groups() -> Self {
        Self {
            bins: vec![
                Bin::new("<30", Edge::Unbounded, Edge::Exclusive(30.0)),
                Bin::new("30–45", Edge::Inclusive(30.0), Edge::Inclusive(45.0)),
                Bin::new("46–60", Edge::Exclusive(45.0), Edge::Inclusive(60.0)),
                Bin::new(">60", Edge::Exclusive(60.0), Edge::Unbounded),
            ],
            default_label: DEFAULT_LABEL.to_string(),
        }
    }

    /// Performance categories over an averaged 0–100 score:
    /// `Poor` [0,40), `Average` [40,60), `Good` [60,75), `Excellent` [75,100].
    pub fn performance_categories() -> Self {
        let edges = [0.0, 40.0, 60.0, 75.0, 100.0];
        let bins = ["Poor", "Average", "Good", "Excellent"]
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let upper = if i == 3 {
                    Edge::Inclusive(edges[i + 1])
                } else {
                    Edge::Exclusive(edges[i + 1])
                };
                Bin::new(*label, Edge::Inclusive(edges[i]), upper)
            })
            .collect();
        Self {
            bins,
            default_label: DEFAULT_LABEL.to_string(),
        }
    }

    /// Label for `value`, or the default label if no bin contains it.
    pub fn assign(&self, value: f64) -> &str {
        self.bins
            .iter()
            .find(|b| b.contains(value))
            .map_or(self.default_label.as_str(), |b| b.label.as_str())
    }

    /// Bin labels in declared order.
    pub fn labels(&self) -> Vec<&str> {
        self.bins.iter().map(|b| b.label.as_str()).collect()
    }

    /// Bins in declared order.
    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    /// Label for values outside every bin.
    pub fn default_label(&self) -> &str {
        &self.default_label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_group_boundaries() {
        let spec = BinningSpec::age_groups();
        assert_eq!(spec.assign(29.0), "<30");
        assert_eq!(spec.assign(29.999), "<30");
        assert_eq!(spec.assign(30.0), "30–45");
        assert_eq!(spec.assign(45.0), "30–45");
        assert_eq!(spec.assign(45.5), "46–60");
        assert_eq!(spec.assign(46.0), "46–60");
        assert_eq!(spec.assign(60.0), "46–60");
        assert_eq!(spec.assign(61.0), ">60");
        assert_eq!(spec.assign(f64::NAN), DEFAULT_LABEL);
    }

    #[test]
    fn presets_pass_validation() {
        for spec in [BinningSpec::age_groups(), BinningSpec::performance_categories()] {
            let rebuilt = BinningSpec::new(spec.bins().to_vec(), spec.default_label()).unwrap();
            assert_eq!(rebuilt, spec);
        }
    }

    #[test]
    fn each_boundary_in_exactly_one_bin() {
        let spec = BinningSpec::performance_categories();
        for edge in [0.0, 40.0, 60.0, 75.0, 100.0] {
            let hits = spec.bins().iter().filter(|b| b.contains(edge)).count();
            assert_eq!(hits, 1, "edge {edge}");
        }
        assert_eq!(spec.assign(40.0), "Average");
        assert_eq!(spec.assign(100.0), "Excellent");
        assert_eq!(spec.assign(-0.5), DEFAULT_LABEL);
        assert_eq!(spec.assign(100.5), DEFAULT_LABEL);
    }

    #[test]
    fn rejects_gap() {
        let bins = vec![
            Bin::new("a", Edge::Inclusive(0.0), Edge::Exclusive(10.0)),
            Bin::new("b", Edge::Inclusive(11.0), Edge::Inclusive(20.0)),
        ];
        assert!(matches!(
            BinningSpec::new(bins, DEFAULT_LABEL),
            Err(SurveyError::InvalidBinning(_))
        ));
    }

    #[test]
    fn rejects_shared_edge_owned_twice_or_never() {
        let both = vec![
            Bin::new("a", Edge::Inclusive(0.0), Edge::Inclusive(10.0)),
            Bin::new("b", Edge::Inclusive(10.0), Edge::Inclusive(20.0)),
        ];
        assert!(BinningSpec::new(both, DEFAULT_LABEL).is_err());

        let neither = vec![
            Bin::new("a", Edge::Inclusive(0.0), Edge::Exclusive(10.0)),
            Bin::new("b", Edge::Exclusive(10.0), Edge::Inclusive(20.0)),
        ];
        assert!(BinningSpec::new(neither, DEFAULT_LABEL).is_err());
    }

    #[test]
    fn rejects_misplaced_unbounded_and_bad_labels() {
        let bins = vec![
            Bin::new("a", Edge::Inclusive(0.0), Edge::Unbounded),
            Bin::new("b", Edge::Inclusive(10.0), Edge::Inclusive(20.0)),
        ];
        assert!(BinningSpec::new(bins, DEFAULT_LABEL).is_err());

        let dup = vec![
            Bin::new("a", Edge::Inclusive(0.0), Edge::Exclusive(10.0)),
            Bin::new("a", Edge::Inclusive(10.0), Edge::Inclusive(20.0)),
        ];
        assert!(BinningSpec::new(dup, DEFAULT_LABEL).is_err());

        let clash = vec![Bin::new("Unknown", Edge::Inclusive(0.0), Edge::Inclusive(1.0))];
        assert!(BinningSpec::new(clash, DEFAULT_LABEL).is_err());

        assert!(BinningSpec::half_open(&[0.0, 1.0], &["a", "b"], DEFAULT_LABEL).is_err());
    }

    #[test]
    fn json_round_trip_validates() {
        let spec = BinningSpec::age_groups();
        let json = serde_json::to_string(&spec).unwrap();
        let back: BinningSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);

        let broken = r#"{"bins":[{"label":"a","lower":{"Inclusive":0.0},"upper":{"Inclusive":5.0}},
                                  {"label":"b","lower":{"Inclusive":5.0},"upper":"Unbounded"}]}"#;
        assert!(serde_json::from_str::<BinningSpec>(broken).is_err());
    }
}
