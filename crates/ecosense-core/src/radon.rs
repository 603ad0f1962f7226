//! Radon unit conversion and alert classification.
//!
//! EcoSense reports radon concentration in Bq/m³. Readings are shown in
//! pCi/L by default, and every monitor carries two alert thresholds
//! (`level2`, `level3`) in the same raw unit as the reading.
//!
//! All functions here are pure. Missing or malformed inputs degrade to
//! `None` instead of an error so one bad field never takes down its
//! siblings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Divisor taking a Bq/m³ reading to pCi/L.
pub const RADON_UNIT_CONVERSION_SCALE: f64 = 37.0;

/// Round to one decimal place, ties to even on the exact binary value.
///
/// Scaling by ten first would round an inexact product, so `0.25` and
/// `26.95` (really `26.949999...`) would both round up. Formatting
/// rounds the stored value exactly.
fn round_one_decimal(value: f64) -> f64 {
    format!("{value:.1}").parse().unwrap_or(value)
}

/// Convert a raw Bq/m³ reading to pCi/L rounded to one decimal.
///
/// Returns `None` when the reading is missing or not a finite number.
///
/// ```rust
/// use ecosense_core::radon::convert_radon_level;
///
/// assert_eq!(convert_radon_level(Some(100.0)), Some(2.7));
/// assert_eq!(convert_radon_level(None), None);
/// ```
#[must_use]
pub fn convert_radon_level(raw: Option<f64>) -> Option<f64> {
    let raw = raw.filter(|v| v.is_finite())?;
    Some(round_one_decimal(raw / RADON_UNIT_CONVERSION_SCALE))
}

/// Three-tier alert classification of a radon reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum AlertLevel {
    /// Below `level2`.
    Green,
    /// At or above `level2`, below `level3`.
    Orange,
    /// At or above `level3`.
    Red,
}

impl AlertLevel {
    /// The display label, identical to the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Green => "Green",
            Self::Orange => "Orange",
            Self::Red => "Red",
        }
    }

    /// Material Design icon shown for this level.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Green => "mdi:shield-check-outline",
            Self::Orange => "mdi:shield-alert-outline",
            Self::Red => "mdi:shield-alert",
        }
    }

    /// CSS color name for this level.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Orange => "orange",
            Self::Red => "red",
        }
    }

    /// RGB triple for this level (#00c853, #ffab00, #d50000).
    #[must_use]
    pub const fn rgb(self) -> [u8; 3] {
        match self {
            Self::Green => [0, 200, 83],
            Self::Orange => [255, 171, 0],
            Self::Red => [213, 0, 0],
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Icon used when there is no alert level to show.
pub const UNKNOWN_ALERT_ICON: &str = "mdi:shield-off-outline";

/// Icon for an optional alert level, falling back to [`UNKNOWN_ALERT_ICON`].
#[must_use]
pub fn alert_icon(level: Option<AlertLevel>) -> &'static str {
    level.map_or(UNKNOWN_ALERT_ICON, AlertLevel::icon)
}

/// Color for an optional alert level. No level, no color.
#[must_use]
pub fn alert_color(level: Option<AlertLevel>) -> Option<&'static str> {
    level.map(AlertLevel::color)
}

/// Classify a raw reading against the device's two thresholds.
///
/// Comparisons happen in raw units. Equality with a threshold lands in
/// the more severe bucket. Thresholds are not assumed to be ordered:
/// the `level2` test runs first, so with `level2 > level3` anything
/// below `level2` is still Green.
///
/// Returns `None` when any input is missing or not finite.
#[must_use]
pub fn classify_alert(
    radon_level: Option<f64>,
    level2: Option<f64>,
    level3: Option<f64>,
) -> Option<AlertLevel> {
    let finite = |v: Option<f64>| v.filter(|v| v.is_finite());
    let radon_level = finite(radon_level)?;
    let level2 = finite(level2)?;
    let level3 = finite(level3)?;

    if radon_level < level2 {
        Some(AlertLevel::Green)
    } else if radon_level < level3 {
        Some(AlertLevel::Orange)
    } else {
        Some(AlertLevel::Red)
    }
}

/// Display unit for radon concentration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum RadonUnit {
    /// Picocuries per liter.
    #[default]
    #[serde(rename = "pCi/L", alias = "pcil")]
    PicocuriesPerLiter,
    /// Becquerels per cubic meter, the unit the API reports in.
    #[serde(rename = "Bq/m³", alias = "bqm3", alias = "Bq/m3")]
    BecquerelsPerCubicMeter,
}

impl RadonUnit {
    /// Unit symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::PicocuriesPerLiter => "pCi/L",
            Self::BecquerelsPerCubicMeter => "Bq/m³",
        }
    }

    /// Human-readable label used in selection lists.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PicocuriesPerLiter => "pCi/L (Picocuries per Liter)",
            Self::BecquerelsPerCubicMeter => "Bq/m³ (Becquerels per Cubic Meter)",
        }
    }

    /// Render a raw Bq/m³ reading in this unit, rounded to one decimal.
    #[must_use]
    pub fn render(self, raw: Option<f64>) -> Option<f64> {
        match self {
            Self::PicocuriesPerLiter => convert_radon_level(raw),
            Self::BecquerelsPerCubicMeter => raw.filter(|v| v.is_finite()).map(round_one_decimal),
        }
    }
}

impl fmt::Display for RadonUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Error returned when parsing an unknown unit name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown radon unit '{0}'. Expected 'pCi/L' or 'Bq/m³'.")]
pub struct UnknownUnit(pub String);

impl FromStr for RadonUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pCi/L" | "pcil" | "pci/l" => Ok(Self::PicocuriesPerLiter),
            "Bq/m³" | "Bq/m3" | "bqm3" | "bq/m3" => Ok(Self::BecquerelsPerCubicMeter),
            other => Err(UnknownUnit(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_radon_level() {
        assert_eq!(convert_radon_level(Some(100.0)), Some(2.7));
        assert_eq!(convert_radon_level(Some(148.0)), Some(4.0));
        assert_eq!(convert_radon_level(Some(0.0)), Some(0.0));
        assert_eq!(convert_radon_level(Some(37.0)), Some(1.0));
    }

    #[test]
    fn test_convert_radon_level_rounds_exact_value() {
        // 9.25 / 37 is exactly 0.25, a tie that goes to the even digit.
        assert_eq!(convert_radon_level(Some(9.25)), Some(0.2));
        // 997.15 / 37 is stored just below 26.95.
        assert_eq!(convert_radon_level(Some(997.15)), Some(26.9));
        assert_eq!(convert_radon_level(Some(12.95)), Some(0.3));
        assert_eq!(RadonUnit::BecquerelsPerCubicMeter.render(Some(0.25)), Some(0.2));
    }

    #[test]
    fn test_convert_radon_level_absent() {
        assert_eq!(convert_radon_level(None), None);
        assert_eq!(convert_radon_level(Some(f64::NAN)), None);
        assert_eq!(convert_radon_level(Some(f64::INFINITY)), None);
    }

    #[test]
    fn test_classify_alert_boundaries() {
        let classify = |v| classify_alert(Some(v), Some(2.7), Some(4.0));
        assert_eq!(classify(2.6), Some(AlertLevel::Green));
        assert_eq!(classify(2.7), Some(AlertLevel::Orange));
        assert_eq!(classify(3.9), Some(AlertLevel::Orange));
        assert_eq!(classify(4.0), Some(AlertLevel::Red));
        assert_eq!(classify(5.0), Some(AlertLevel::Red));
    }

    #[test]
    fn test_classify_alert_missing_threshold() {
        assert_eq!(classify_alert(Some(1.0), None, Some(4.0)), None);
        assert_eq!(classify_alert(Some(1.0), Some(2.7), None), None);
        assert_eq!(classify_alert(None, Some(2.7), Some(4.0)), None);
        assert_eq!(classify_alert(Some(f64::NAN), Some(2.7), Some(4.0)), None);
    }

    #[test]
    fn test_classify_alert_unordered_thresholds() {
        // level2 above level3: below level2 is Green, otherwise Red.
        assert_eq!(classify_alert(Some(50.0), Some(150.0), Some(100.0)), Some(AlertLevel::Green));
        assert_eq!(classify_alert(Some(120.0), Some(150.0), Some(100.0)), Some(AlertLevel::Green));
        assert_eq!(classify_alert(Some(150.0), Some(150.0), Some(100.0)), Some(AlertLevel::Red));
    }

    #[test]
    fn test_pure_functions_are_stable() {
        let first = (convert_radon_level(Some(148.0)), classify_alert(Some(148.0), Some(100.0), Some(150.0)));
        let second = (convert_radon_level(Some(148.0)), classify_alert(Some(148.0), Some(100.0), Some(150.0)));
        assert_eq!(first, second);
        assert_eq!(first, (Some(4.0), Some(AlertLevel::Orange)));
    }

    #[test]
    fn test_alert_presentation() {
        assert_eq!(alert_icon(Some(AlertLevel::Green)), "mdi:shield-check-outline");
        assert_eq!(alert_icon(Some(AlertLevel::Red)), "mdi:shield-alert");
        assert_eq!(alert_icon(None), UNKNOWN_ALERT_ICON);
        assert_eq!(alert_color(Some(AlertLevel::Orange)), Some("orange"));
        assert_eq!(alert_color(None), None);
        assert_eq!(AlertLevel::Red.rgb(), [213, 0, 0]);
        assert_eq!(AlertLevel::Orange.to_string(), "Orange");
    }

    #[test]
    fn test_unit_parsing_and_rendering() {
        assert_eq!("pcil".parse::<RadonUnit>(), Ok(RadonUnit::PicocuriesPerLiter));
        assert_eq!("Bq/m³".parse::<RadonUnit>(), Ok(RadonUnit::BecquerelsPerCubicMeter));
        assert!("ppm".parse::<RadonUnit>().is_err());
        assert_eq!(RadonUnit::default(), RadonUnit::PicocuriesPerLiter);

        assert_eq!(RadonUnit::PicocuriesPerLiter.render(Some(100.0)), Some(2.7));
        assert_eq!(RadonUnit::BecquerelsPerCubicMeter.render(Some(100.04)), Some(100.0));
        assert_eq!(RadonUnit::BecquerelsPerCubicMeter.render(None), None);
    }

    #[test]
    fn test_unit_serde_names() {
        let json = serde_json::to_string(&RadonUnit::BecquerelsPerCubicMeter).unwrap();
        assert_eq!(json, "\"Bq/m³\"");
        let unit: RadonUnit = serde_json::from_str("\"bqm3\"").unwrap();
        assert_eq!(unit, RadonUnit::BecquerelsPerCubicMeter);
    }
}
