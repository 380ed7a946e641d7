use crate::models::{mistyped_fields, DeviceStatus};
use serde_json::{Map, Value};

/// Raisons de rejet d'un payload du topic de statut
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,
    #[error("not a JSON object (starts with {0:?})")]
    NotAnObject(char),
    #[error("invalid status JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Décode un message brut en snapshot.
///
/// Le topic de statut transporte aussi des balises texte ("ESP32 ONLINE"):
/// tout ce qui ne commence pas par `{` est rejeté sans tentative de parse.
/// Un champ mal typé est ignoré (avec un avertissement), pas le message.
pub fn decode(raw: &str) -> Result<DeviceStatus, DecodeError> {
    let trimmed = raw.trim_start();
    let first = trimmed.chars().next().ok_or(DecodeError::Empty)?;
    if first != '{' {
        return Err(DecodeError::NotAnObject(first));
    }
    let object: Map<String, Value> = serde_json::from_str(trimmed)?;
    for field in mistyped_fields(&object) {
        if let Some(value) = object.get(field) {
            tracing::warn!(field, %value, "status field has an unexpected type, ignored");
        }
    }
    Ok(serde_json::from_value(Value::Object(object))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert!(matches!(decode(""), Err(DecodeError::Empty)));
        assert!(matches!(decode("  \n\t"), Err(DecodeError::Empty)));
    }

    #[test]
    fn test_rejects_liveness_beacon() {
        assert!(matches!(decode("ESP32 ONLINE"), Err(DecodeError::NotAnObject('E'))));
        assert!(matches!(decode("[1,2]"), Err(DecodeError::NotAnObject('['))));
        assert!(matches!(decode("42"), Err(DecodeError::NotAnObject('4'))));
    }

    #[test]
    fn test_rejects_broken_json() {
        assert!(matches!(decode("{\"water\": 12,"), Err(DecodeError::Json(_))));
        assert!(matches!(decode("{not json}"), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_leading_whitespace_is_tolerated() {
        let status = decode("   {\"gas\": 7}").unwrap();
        assert_eq!(status.gas, Some(7.0));
    }

    #[test]
    fn test_decode_is_pure() {
        let raw = r#"{"water":12,"flame_sensor_enabled":false,"rtc_string":"12:00"}"#;
        let a = decode(raw).unwrap();
        let b = decode(raw).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.flame_sensor_enabled, Some(false));
        assert_eq!(a.water_sensor_enabled, None);
    }

    #[test]
    fn test_mistyped_field_keeps_the_rest() {
        let status = decode(r#"{"water":"12","gas_leak":true,"valve_gas_closed":"open","temp":21.5}"#).unwrap();
        assert_eq!(status.water, None);
        assert_eq!(status.valve_gas_closed, None);
        assert_eq!(status.gas_leak, Some(true));
        assert_eq!(status.temp, Some(21.5));
    }

    #[test]
    fn test_missing_fields_stay_absent() {
        let status = decode("{}").unwrap();
        assert_eq!(status, DeviceStatus::default());
    }
}
