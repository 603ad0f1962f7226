//! Device records returned by the EcoSense cloud API.
//!
//! The API is loose about numeric types: readings and thresholds show up
//! as JSON numbers or as numeric strings depending on firmware. Numeric
//! fields are therefore kept as raw JSON and coerced on read, so a
//! malformed field only affects the values derived from it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// One radon monitor as reported by the device-list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeviceRecord {
    /// Stable device identifier.
    #[schema(example = "SN1")]
    pub serial_number: String,

    /// User-assigned device name.
    #[serde(default)]
    #[schema(example = "Basement")]
    pub device_name: Option<String>,

    /// Firmware version string.
    #[serde(default)]
    #[schema(example = "2.1.4")]
    pub fw_version: Option<String>,

    /// Latest reading in Bq/m³, as sent by the API.
    #[serde(default)]
    #[schema(value_type = Option<Object>, example = "148")]
    pub radon_level: Option<Value>,

    /// Alert threshold configuration, as sent by the API.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub config: Option<Value>,
}

impl DeviceRecord {
    /// Parse a single record out of an untyped JSON value.
    ///
    /// Returns `None` for anything that is not an object with a
    /// `serial_number`. Numeric serials are accepted and stringified.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut map) = value else {
            return None;
        };

        let serial_number = match map.remove("serial_number")? {
            Value::String(s) if !s.trim().is_empty() => s,
            Value::Number(n) => n.to_string(),
            _ => return None,
        };

        let text = |v: Option<Value>| match v {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Some(Self {
            serial_number,
            device_name: text(map.remove("device_name")),
            fw_version: text(map.remove("fw_version")),
            radon_level: map.remove("radon_level").filter(|v| !v.is_null()),
            config: map.remove("config").filter(|v| !v.is_null()),
        })
    }

    /// The reading coerced to a number, if it is one.
    #[must_use]
    pub fn radon_level(&self) -> Option<f64> {
        self.radon_level.as_ref().and_then(coerce_number)
    }

    /// The Orange threshold coerced to a number, if present.
    #[must_use]
    pub fn level2(&self) -> Option<f64> {
        self.threshold("level2")
    }

    /// The Red threshold coerced to a number, if present.
    #[must_use]
    pub fn level3(&self) -> Option<f64> {
        self.threshold("level3")
    }

    fn threshold(&self, key: &str) -> Option<f64> {
        self.config.as_ref()?.as_object()?.get(key).and_then(coerce_number)
    }
}

/// Coerce a JSON value to a finite `f64`.
///
/// Numbers pass through, strings are trimmed and parsed. Everything else
/// (null, bool, arrays, objects, NaN/infinite strings) yields `None`.
#[must_use]
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_string_numbers() {
        let record = DeviceRecord::from_value(json!({
            "serial_number": "SN1",
            "radon_level": "148",
            "config": {"level2": "100", "level3": "150"}
        }))
        .unwrap();

        assert_eq!(record.serial_number, "SN1");
        assert_eq!(record.radon_level(), Some(148.0));
        assert_eq!(record.level2(), Some(100.0));
        assert_eq!(record.level3(), Some(150.0));
        assert_eq!(record.device_name, None);
    }

    #[test]
    fn test_from_value_json_numbers_and_metadata() {
        let record = DeviceRecord::from_value(json!({
            "serial_number": 12345,
            "device_name": "Basement",
            "fw_version": "2.1.4",
            "radon_level": 92.5,
            "config": {"level2": 100, "level3": 148}
        }))
        .unwrap();

        assert_eq!(record.serial_number, "12345");
        assert_eq!(record.device_name.as_deref(), Some("Basement"));
        assert_eq!(record.fw_version.as_deref(), Some("2.1.4"));
        assert_eq!(record.radon_level(), Some(92.5));
        assert_eq!(record.level3(), Some(148.0));
    }

    #[test]
    fn test_from_value_rejects_missing_serial() {
        assert!(DeviceRecord::from_value(json!({"radon_level": 10})).is_none());
        assert!(DeviceRecord::from_value(json!({"serial_number": ""})).is_none());
        assert!(DeviceRecord::from_value(json!({"serial_number": null})).is_none());
        assert!(DeviceRecord::from_value(json!("SN1")).is_none());
    }

    #[test]
    fn test_malformed_fields_are_isolated() {
        let record = DeviceRecord::from_value(json!({
            "serial_number": "SN2",
            "radon_level": "n/a",
            "config": "broken"
        }))
        .unwrap();

        assert_eq!(record.radon_level(), None);
        assert_eq!(record.level2(), None);
        assert_eq!(record.serial_number, "SN2");
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number(&json!(" 42.5 ")), Some(42.5));
        assert_eq!(coerce_number(&json!(7)), Some(7.0));
        assert_eq!(coerce_number(&json!("NaN")), None);
        assert_eq!(coerce_number(&json!("inf")), None);
        assert_eq!(coerce_number(&json!(true)), None);
        assert_eq!(coerce_number(&json!(null)), None);
        assert_eq!(coerce_number(&json!([1])), None);
    }
}
