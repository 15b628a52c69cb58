//! Rim-to-cup ratios with decimal half-up rounding.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScreeningError};
use crate::response::ServerResult;

/// Number of decimal places ratios are rounded to.
pub const RATIO_SCALE: u32 = 3;

/// Round to `scale` decimal places, ties away from zero.
///
/// Rounding works on the shortest decimal representation of `value`, so
/// `0.0625` rounds to `0.063` and `0.3335` to `0.334` even though neither is
/// exactly representable in binary. Non-finite values are returned unchanged.
pub fn round_half_up(value: f64, scale: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }

    // f64 Display never uses exponent notation.
    let repr = value.abs().to_string();
    let Some((int_part, frac_part)) = repr.split_once('.') else {
        return value;
    };

    let scale_digits = scale as usize;
    if frac_part.len() <= scale_digits {
        return value;
    }

    let round_up = frac_part.as_bytes()[scale_digits] >= b'5';
    let mut scaled = int_part
        .bytes()
        .chain(frac_part.bytes().take(scale_digits))
        .fold(0u128, |acc, digit| acc * 10 + u128::from(digit - b'0'));
    if round_up {
        scaled += 1;
    }

    let rounded = scaled as f64 / 10f64.powi(scale as i32);
    if value.is_sign_negative() {
        -rounded
    } else {
        rounded
    }
}

/// Ratio of the rim measurement (index 0) to the cup measurement (index 1).
///
/// A zero cup measurement yields `f64::INFINITY`, whatever the rim value.
pub fn calculate_ratio(values: &[f64]) -> Result<f64> {
    let [rim, cup, ..] = values else {
        return Err(ScreeningError::MalformedServerResponse(format!(
            "expected at least 2 measurements, got {}",
            values.len()
        )));
    };

    if *cup == 0.0 {
        log::warn!("Cup measurement is zero (rim {rim}), ratio set to +inf");
        return Ok(f64::INFINITY);
    }

    Ok(round_half_up(rim / cup, RATIO_SCALE))
}

fn named_ratio(name: &str, values: &[f64]) -> Result<f64> {
    calculate_ratio(values).map_err(|e| match e {
        ScreeningError::MalformedServerResponse(msg) => {
            ScreeningError::MalformedServerResponse(format!("{name}: {msg}"))
        }
        other => other,
    })
}

/// Ratios derived from one inference response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioSet {
    /// Rim-to-cup distance ratio; drives the stage.
    pub distance_ratio: f64,
    /// Rim-to-cup perimeter ratio.
    pub perimeter_ratio: f64,
    /// Rim-to-cup area ratio.
    pub area_ratio: f64,
}

impl RatioSet {
    /// Compute all three ratios; every list needs at least two entries.
    pub fn from_result(result: &ServerResult) -> Result<Self> {
        Ok(Self {
            distance_ratio: named_ratio("distances", &result.distances)?,
            perimeter_ratio: named_ratio("perimeters", &result.perimeters)?,
            area_ratio: named_ratio("areas", &result.areas)?,
        })
    }
}
