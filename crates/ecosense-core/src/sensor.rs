//! Per-device, per-metric read accessors.
//!
//! Each device exposes two sensors, `radon_level` and `alert_level`, plus
//! passthrough metadata. Values are recomputed from the current snapshot
//! on every read, and a malformed field only blanks the sensor derived
//! from it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::radon::{alert_color, alert_icon, classify_alert, AlertLevel, RadonUnit};
use crate::types::DeviceRecord;

/// Manufacturer reported for every device.
pub const MANUFACTURER: &str = "Ecosense";

/// Name used when the API does not report one.
pub const DEFAULT_DEVICE_NAME: &str = "EcoSense Radon Monitor";

/// State class of numeric sensors.
pub const MEASUREMENT_STATE_CLASS: &str = "measurement";

/// The metrics exposed for each device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SensorKey {
    /// Radon concentration in the preferred unit.
    RadonLevel,
    /// Green/Orange/Red classification.
    AlertLevel,
}

impl SensorKey {
    /// Every sensor, in display order.
    pub const ALL: [Self; 2] = [Self::RadonLevel, Self::AlertLevel];

    /// Key used in identifiers and URLs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RadonLevel => "radon_level",
            Self::AlertLevel => "alert_level",
        }
    }

    /// Static description of this sensor.
    #[must_use]
    pub const fn description(self) -> SensorDescription {
        match self {
            Self::RadonLevel => SensorDescription {
                key: self,
                name: "Radon Level",
                measurement: true,
            },
            Self::AlertLevel => SensorDescription {
                key: self,
                name: "Alert Level",
                measurement: false,
            },
        }
    }
}

impl fmt::Display for SensorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "radon_level" => Ok(Self::RadonLevel),
            "alert_level" => Ok(Self::AlertLevel),
            other => Err(format!("unknown sensor '{other}'")),
        }
    }
}

/// Static metadata for a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorDescription {
    /// Which sensor.
    pub key: SensorKey,
    /// Display name.
    pub name: &'static str,
    /// Whether the value is a numeric measurement.
    pub measurement: bool,
}

/// Device metadata passed through from the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeviceInfo {
    /// Serial number, the device identifier.
    #[schema(example = "SN1")]
    pub serial_number: String,
    /// Device name, or [`DEFAULT_DEVICE_NAME`].
    #[schema(example = "Basement")]
    pub name: String,
    /// Always [`MANUFACTURER`].
    #[schema(example = "Ecosense")]
    pub manufacturer: String,
    /// Model as reported (the API uses the device name).
    pub model: Option<String>,
    /// Firmware version.
    #[schema(example = "2.1.4")]
    pub sw_version: Option<String>,
}

impl DeviceInfo {
    /// Metadata for a record.
    #[must_use]
    pub fn from_record(record: &DeviceRecord) -> Self {
        Self {
            serial_number: record.serial_number.clone(),
            name: record
                .device_name
                .clone()
                .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string()),
            manufacturer: MANUFACTURER.to_string(),
            model: record.device_name.clone(),
            sw_version: record.fw_version.clone(),
        }
    }
}

/// Value of one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum SensorValue {
    /// Radon level in the rendered unit.
    Number(f64),
    /// Alert classification.
    Alert(AlertLevel),
}

/// Everything a presentation layer needs to render one sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SensorState {
    /// `<serial>_<key>`.
    #[schema(example = "SN1_alert_level")]
    pub unique_id: String,
    /// Which sensor.
    pub key: SensorKey,
    /// Display name.
    #[schema(example = "Alert Level")]
    pub name: String,
    /// Current value, absent when it cannot be derived.
    pub value: Option<SensorValue>,
    /// Unit symbol for numeric sensors.
    pub unit: Option<String>,
    /// `measurement` for sensors whose values can be charted over time.
    #[schema(example = "measurement")]
    pub state_class: Option<String>,
    /// Icon name for the alert sensor.
    #[schema(example = "mdi:shield-alert-outline")]
    pub icon: Option<String>,
    /// Icon color for the alert sensor.
    pub icon_color: Option<String>,
    /// RGB color for the alert sensor.
    pub rgb_color: Option<Vec<u8>>,
    /// Whether the device is in the current snapshot.
    pub available: bool,
}

/// Read one sensor of a device.
///
/// `record` is the device's entry in the latest snapshot, or `None` if the
/// device has disappeared, which makes the sensor unavailable.
#[must_use]
pub fn read_sensor(
    serial_number: &str,
    key: SensorKey,
    record: Option<&DeviceRecord>,
    unit: RadonUnit,
) -> SensorState {
    let description = key.description();
    let mut state = SensorState {
        unique_id: format!("{serial_number}_{key}"),
        key,
        name: description.name.to_string(),
        value: None,
        unit: None,
        state_class: description
            .measurement
            .then(|| MEASUREMENT_STATE_CLASS.to_string()),
        icon: None,
        icon_color: None,
        rgb_color: None,
        available: record.is_some(),
    };

    match key {
        SensorKey::RadonLevel => {
            state.unit = Some(unit.symbol().to_string());
            state.value = record
                .and_then(|r| unit.render(r.radon_level()))
                .map(SensorValue::Number);
        }
        SensorKey::AlertLevel => {
            let level = record.and_then(alert_level);
            state.icon = Some(alert_icon(level).to_string());
            state.icon_color = alert_color(level).map(str::to_string);
            state.rgb_color = level.map(|l| l.rgb().to_vec());
            state.value = level.map(SensorValue::Alert);
        }
    }

    state
}

/// Alert level of a record from its own thresholds.
#[must_use]
pub fn alert_level(record: &DeviceRecord) -> Option<AlertLevel> {
    classify_alert(record.radon_level(), record.level2(), record.level3())
}

/// Full view of one device: metadata plus every sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeviceView {
    /// Metadata.
    pub info: DeviceInfo,
    /// Sensor states in [`SensorKey::ALL`] order.
    pub sensors: Vec<SensorState>,
}

impl DeviceView {
    /// Build the view of a record in the given unit.
    #[must_use]
    pub fn from_record(record: &DeviceRecord, unit: RadonUnit) -> Self {
        Self {
            info: DeviceInfo::from_record(record),
            sensors: SensorKey::ALL
                .iter()
                .map(|&key| read_sensor(&record.serial_number, key, Some(record), unit))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> DeviceRecord {
        DeviceRecord::from_value(value).unwrap()
    }

    #[test]
    fn test_scenario_orange_device() {
        let device = record(json!({
            "serial_number": "SN1",
            "radon_level": "148",
            "config": {"level2": "100", "level3": "150"}
        }));

        let radon = read_sensor("SN1", SensorKey::RadonLevel, Some(&device), RadonUnit::PicocuriesPerLiter);
        assert_eq!(radon.value, Some(SensorValue::Number(4.0)));
        assert_eq!(radon.unit.as_deref(), Some("pCi/L"));
        assert_eq!(radon.unique_id, "SN1_radon_level");
        assert_eq!(radon.state_class.as_deref(), Some("measurement"));

        let alert = read_sensor("SN1", SensorKey::AlertLevel, Some(&device), RadonUnit::PicocuriesPerLiter);
        assert_eq!(alert.value, Some(SensorValue::Alert(AlertLevel::Orange)));
        assert_eq!(alert.icon.as_deref(), Some("mdi:shield-alert-outline"));
        assert_eq!(alert.icon_color.as_deref(), Some("orange"));
        assert_eq!(alert.rgb_color, Some(vec![255, 171, 0]));
        assert_eq!(radon.icon, None);
        assert_eq!(alert.state_class, None);
        assert!(alert.available);
    }

    #[test]
    fn test_bad_threshold_only_blanks_alert() {
        let device = record(json!({
            "serial_number": "SN2",
            "radon_level": 100,
            "config": {"level2": "oops", "level3": 150}
        }));
        let view = DeviceView::from_record(&device, RadonUnit::PicocuriesPerLiter);

        assert_eq!(view.sensors[0].value, Some(SensorValue::Number(2.7)));
        assert_eq!(view.sensors[1].value, None);
        assert_eq!(view.sensors[1].icon.as_deref(), Some("mdi:shield-off-outline"));
        assert_eq!(view.sensors[1].rgb_color, None);
    }

    #[test]
    fn test_missing_device_is_unavailable() {
        let state = read_sensor("GONE", SensorKey::AlertLevel, None, RadonUnit::PicocuriesPerLiter);
        assert!(!state.available);
        assert_eq!(state.value, None);
        assert_eq!(state.unique_id, "GONE_alert_level");

        let state = read_sensor("GONE", SensorKey::RadonLevel, None, RadonUnit::PicocuriesPerLiter);
        assert!(!state.available);
        assert_eq!(state.state_class.as_deref(), Some("measurement"));
    }

    #[test]
    fn test_unit_preference_renders_raw() {
        let device = record(json!({"serial_number": "SN3", "radon_level": 148}));
        let state = read_sensor("SN3", SensorKey::RadonLevel, Some(&device), RadonUnit::BecquerelsPerCubicMeter);
        assert_eq!(state.value, Some(SensorValue::Number(148.0)));
        assert_eq!(state.unit.as_deref(), Some("Bq/m³"));
    }

    #[test]
    fn test_device_info_defaults() {
        let device = record(json!({"serial_number": "SN4", "fw_version": "1.0"}));
        let info = DeviceInfo::from_record(&device);
        assert_eq!(info.name, DEFAULT_DEVICE_NAME);
        assert_eq!(info.manufacturer, "Ecosense");
        assert_eq!(info.model, None);
        assert_eq!(info.sw_version.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_sensor_key_parsing() {
        assert_eq!("alert_level".parse::<SensorKey>(), Ok(SensorKey::AlertLevel));
        assert!("humidity".parse::<SensorKey>().is_err());
        assert_eq!(SensorKey::RadonLevel.description().name, "Radon Level");
    }

    #[test]
    fn test_sensor_value_serializes_flat() {
        assert_eq!(serde_json::to_value(SensorValue::Number(4.0)).unwrap(), json!(4.0));
        assert_eq!(
            serde_json::to_value(SensorValue::Alert(AlertLevel::Red)).unwrap(),
            json!("Red")
        );
    }
}
