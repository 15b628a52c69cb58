//! Diagnostic metrics derived from the inference response.
//!
//! - **Ratios**: rim over cup for distances, perimeters and areas, 3 decimals half-up
//! - **Stage**: DDLS stage 1-6 from the distance ratio
//! - **Status**: clinical status from the stage
//!
//! # Example
//!
//! ```rust,ignore
//! use fundus_screen::metrics::ScreeningMetrics;
//!
//! let metrics = ScreeningMetrics::compute(&server_result)?;
//! println!("ratio {:.3} -> stage {} ({})", metrics.ratios.distance_ratio, metrics.stage, metrics.status);
//! ```

mod ratio;
mod stage;

pub use ratio::{calculate_ratio, round_half_up, RatioSet, RATIO_SCALE};
pub use stage::{ClinicalStatus, DdlsStage};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScreeningError};
use crate::response::ServerResult;

/// Absolute rim and cup geometry, as returned by the service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Neuroretinal rim perimeter.
    pub rim_perimeter: f64,
    /// Excavation (cup) perimeter.
    pub cup_perimeter: f64,
    /// Neuroretinal rim area.
    pub rim_area: f64,
    /// Excavation (cup) area.
    pub cup_area: f64,
}

impl Geometry {
    /// Take positions 0 and 1 of the perimeter and area lists.
    pub fn from_result(result: &ServerResult) -> Result<Self> {
        let pair = |name: &str, values: &[f64]| match values {
            [rim, cup, ..] => Ok((*rim, *cup)),
            _ => Err(ScreeningError::MalformedServerResponse(format!(
                "{name}: expected at least 2 measurements, got {}",
                values.len()
            ))),
        };

        let (rim_perimeter, cup_perimeter) = pair("perimeters", &result.perimeters)?;
        let (rim_area, cup_area) = pair("areas", &result.areas)?;

        Ok(Self {
            rim_perimeter,
            cup_perimeter,
            rim_area,
            cup_area,
        })
    }
}

/// Everything the metrics engine derives from one response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreeningMetrics {
    /// Rounded ratios.
    pub ratios: RatioSet,
    /// Absolute geometry.
    pub geometry: Geometry,
    /// DDLS stage.
    pub stage: DdlsStage,
    /// Clinical status.
    pub status: ClinicalStatus,
}

impl ScreeningMetrics {
    /// Compute ratios, geometry, stage and status.
    pub fn compute(result: &ServerResult) -> Result<Self> {
        let ratios = RatioSet::from_result(result)?;
        let geometry = Geometry::from_result(result)?;
        let stage = DdlsStage::from_ratio(ratios.distance_ratio);
        let status = ClinicalStatus::from(stage);

        log::debug!(
            "Ratios d={} p={} a={} -> stage {} ({})",
            ratios.distance_ratio,
            ratios.perimeter_ratio,
            ratios.area_ratio,
            stage,
            status
        );

        Ok(Self {
            ratios,
            geometry,
            stage,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ServerImage;

    fn create_result(distances: Vec<f64>) -> ServerResult {
        ServerResult {
            image: ServerImage {
                bitmap: String::new(),
            },
            coordinates: vec![0.0, 0.0],
            distances,
            perimeters: vec![30.0, 60.0],
            areas: vec![70.0, 140.0],
        }
    }

    #[test]
    fn test_compute_metrics() {
        let metrics = ScreeningMetrics::compute(&create_result(vec![0.5, 2.0])).unwrap();

        assert_eq!(metrics.ratios.distance_ratio, 0.25);
        assert_eq!(metrics.ratios.perimeter_ratio, 0.5);
        assert_eq!(metrics.ratios.area_ratio, 0.5);
        assert_eq!(metrics.stage.value(), 3);
        assert_eq!(metrics.status, ClinicalStatus::AtRisk);

        assert_eq!(metrics.geometry.rim_perimeter, 30.0);
        assert_eq!(metrics.geometry.cup_perimeter, 60.0);
        assert_eq!(metrics.geometry.rim_area, 70.0);
        assert_eq!(metrics.geometry.cup_area, 140.0);
    }

    #[test]
    fn test_compute_damage() {
        let metrics = ScreeningMetrics::compute(&create_result(vec![0.1, 2.0])).unwrap();
        assert_eq!(metrics.ratios.distance_ratio, 0.05);
        assert_eq!(metrics.stage.value(), 5);
        assert_eq!(metrics.status, ClinicalStatus::GlaucomaDamage);
    }

    #[test]
    fn test_zero_cup_distance_is_stage_one() {
        let metrics = ScreeningMetrics::compute(&create_result(vec![0.3, 0.0])).unwrap();
        assert!(metrics.ratios.distance_ratio.is_infinite());
        assert_eq!(metrics.stage.value(), 1);
    }

    #[test]
    fn test_short_distances_fail() {
        assert!(matches!(
            ScreeningMetrics::compute(&create_result(vec![0.3])),
            Err(ScreeningError::MalformedServerResponse(_))
        ));
    }
}
