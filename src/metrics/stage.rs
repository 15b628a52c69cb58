//! DDLS stage and clinical status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Disc Damage Likelihood Scale stage, 1 (healthiest) to 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DdlsStage(u8);

impl DdlsStage {
    /// Stage for a rim-to-cup distance ratio.
    ///
    /// `+inf` (zero cup) is stage 1; NaN falls through to stage 6.
    pub fn from_ratio(distance_ratio: f64) -> Self {
        let stage = if distance_ratio >= 0.4 {
            1
        } else if distance_ratio >= 0.3 {
            2
        } else if distance_ratio >= 0.2 {
            3
        } else if distance_ratio >= 0.1 {
            4
        } else if distance_ratio > 0.0 {
            5
        } else {
            6
        };
        Self(stage)
    }

    /// Numeric stage.
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for DdlsStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Clinical status derived from a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClinicalStatus {
    /// Stages 1-4.
    AtRisk,
    /// Stages 5-7.
    GlaucomaDamage,
    /// Stages 8-10.
    GlaucomaDisability,
    /// Anything else.
    Unknown,
}

impl ClinicalStatus {
    /// Status for any stage number.
    ///
    /// Stages 7-10 are never produced by `DdlsStage::from_ratio`; the table
    /// keeps them for compatibility with the clinical classification.
    pub fn from_stage(stage: i32) -> Self {
        match stage {
            1..=4 => ClinicalStatus::AtRisk,
            5..=7 => ClinicalStatus::GlaucomaDamage,
            8..=10 => ClinicalStatus::GlaucomaDisability,
            _ => ClinicalStatus::Unknown,
        }
    }

    /// Numeric status code reported to callers.
    pub fn code(&self) -> i32 {
        match self {
            ClinicalStatus::Unknown => 0,
            ClinicalStatus::AtRisk => 1,
            ClinicalStatus::GlaucomaDamage => 2,
            ClinicalStatus::GlaucomaDisability => 3,
        }
    }

    /// Upper-case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClinicalStatus::AtRisk => "AT_RISK",
            ClinicalStatus::GlaucomaDamage => "GLAUCOMA_DAMAGE",
            ClinicalStatus::GlaucomaDisability => "GLAUCOMA_DISABILITY",
            ClinicalStatus::Unknown => "UNKNOWN",
        }
    }
}

impl From<DdlsStage> for ClinicalStatus {
    fn from(stage: DdlsStage) -> Self {
        ClinicalStatus::from_stage(i32::from(stage.value()))
    }
}

impl fmt::Display for ClinicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(ratio: f64) -> u8 {
        DdlsStage::from_ratio(ratio).value()
    }

    #[test]
    fn test_stage_boundaries() {
        assert_eq!(stage(0.4), 1);
        assert_eq!(stage(0.39999), 2);
        assert_eq!(stage(0.3), 2);
        assert_eq!(stage(0.29999), 3);
        assert_eq!(stage(0.2), 3);
        assert_eq!(stage(0.1), 4);
        assert_eq!(stage(0.09999), 5);
        assert_eq!(stage(0.0), 6);
        assert_eq!(stage(-1.0), 6);
    }

    #[test]
    fn test_stage_sentinels() {
        assert_eq!(stage(f64::INFINITY), 1);
        assert_eq!(stage(f64::NAN), 6);
        assert_eq!(stage(3.0), 1);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ClinicalStatus::from_stage(1), ClinicalStatus::AtRisk);
        assert_eq!(ClinicalStatus::from_stage(4), ClinicalStatus::AtRisk);
        assert_eq!(ClinicalStatus::from_stage(5), ClinicalStatus::GlaucomaDamage);
        assert_eq!(ClinicalStatus::from_stage(7), ClinicalStatus::GlaucomaDamage);
        assert_eq!(ClinicalStatus::from_stage(8), ClinicalStatus::GlaucomaDisability);
        assert_eq!(ClinicalStatus::from_stage(10), ClinicalStatus::GlaucomaDisability);

        let unknown = ClinicalStatus::from_stage(11);
        assert_eq!(unknown, ClinicalStatus::Unknown);
        assert_eq!(unknown.code(), 0);
        assert_eq!(ClinicalStatus::from_stage(0), ClinicalStatus::Unknown);
        assert_eq!(ClinicalStatus::from_stage(-3), ClinicalStatus::Unknown);
    }

    #[test]
    fn test_reachable_statuses() {
        assert_eq!(ClinicalStatus::from(DdlsStage::from_ratio(0.25)), ClinicalStatus::AtRisk);
        assert_eq!(
            ClinicalStatus::from(DdlsStage::from_ratio(-0.5)),
            ClinicalStatus::GlaucomaDamage
        );
    }

    #[test]
    fn test_status_serialization() {
        let text = serde_json::to_string(&ClinicalStatus::GlaucomaDamage).unwrap();
        assert_eq!(text, "\"GLAUCOMA_DAMAGE\"");
        assert_eq!(ClinicalStatus::AtRisk.to_string(), "AT_RISK");
    }
}
