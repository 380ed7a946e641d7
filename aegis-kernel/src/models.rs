use crate::clock;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// Snapshot décodé d'un message `home/status`.
///
/// Tous les champs sont optionnels: un champ absent (ou `null`) signifie
/// "inconnu", jamais `false`/`0`. Un champ d'un type inattendu est lu comme
/// absent, les autres champs du message restent valables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    #[serde(default, deserialize_with = "loose_number", skip_serializing_if = "Option::is_none")]
    pub water: Option<f64>,
    #[serde(default, deserialize_with = "loose_number", skip_serializing_if = "Option::is_none")]
    pub flame: Option<f64>,
    #[serde(default, deserialize_with = "loose_number", skip_serializing_if = "Option::is_none")]
    pub gas: Option<f64>,
    #[serde(default, deserialize_with = "loose_number", skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
    #[serde(default, deserialize_with = "loose_bool", skip_serializing_if = "Option::is_none")]
    pub fan: Option<bool>,
    #[serde(default, deserialize_with = "loose_bool", skip_serializing_if = "Option::is_none")]
    pub water_leak: Option<bool>,
    #[serde(default, deserialize_with = "loose_bool", skip_serializing_if = "Option::is_none")]
    pub flame_leak: Option<bool>,
    #[serde(default, deserialize_with = "loose_bool", skip_serializing_if = "Option::is_none")]
    pub gas_leak: Option<bool>,
    /// 0 = rien, 1 = mouvement détecté
    #[serde(default, deserialize_with = "loose_number", skip_serializing_if = "Option::is_none")]
    pub motion: Option<f64>,
    #[serde(default, deserialize_with = "loose_bool", skip_serializing_if = "Option::is_none")]
    pub pir_armed: Option<bool>,
    #[serde(default, deserialize_with = "loose_bool", skip_serializing_if = "Option::is_none")]
    pub valve_water_closed: Option<bool>,
    #[serde(default, deserialize_with = "loose_bool", skip_serializing_if = "Option::is_none")]
    pub valve_gas_closed: Option<bool>,
    #[serde(default, deserialize_with = "loose_bool", skip_serializing_if = "Option::is_none")]
    pub water_sensor_enabled: Option<bool>,
    #[serde(default, deserialize_with = "loose_bool", skip_serializing_if = "Option::is_none")]
    pub flame_sensor_enabled: Option<bool>,
    #[serde(default, deserialize_with = "loose_bool", skip_serializing_if = "Option::is_none")]
    pub gas_sensor_enabled: Option<bool>,
    #[serde(default, deserialize_with = "loose_bool", skip_serializing_if = "Option::is_none")]
    pub seen: Option<bool>,
    // champs horloge RTC du contrôleur
    #[serde(default, deserialize_with = "loose_text", skip_serializing_if = "Option::is_none")]
    pub rtc_string: Option<String>,
    #[serde(default, deserialize_with = "loose_text", skip_serializing_if = "Option::is_none")]
    pub rtc: Option<String>,
    #[serde(default, deserialize_with = "loose_text", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "loose_text", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "loose_text", skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl DeviceStatus {
    pub fn motion_detected(&self) -> bool {
        self.motion == Some(1.0)
    }

    pub fn is_armed(&self) -> bool {
        self.pir_armed == Some(true)
    }

    /// Valeur rapportée pour un champ à bascule, si présente
    pub fn reported(&self, field: ToggleField) -> Option<bool> {
        match field {
            ToggleField::WaterSensorEnabled => self.water_sensor_enabled,
            ToggleField::FlameSensorEnabled => self.flame_sensor_enabled,
            ToggleField::GasSensorEnabled => self.gas_sensor_enabled,
            ToggleField::WaterValveClosed => self.valve_water_closed,
            ToggleField::GasValveClosed => self.valve_gas_closed,
            ToggleField::Seen => self.seen,
            ToggleField::PirArmed => self.pir_armed,
        }
    }
}

/// Champs booléens du contrôleur qu'une commande opérateur peut faire basculer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleField {
    WaterSensorEnabled,
    FlameSensorEnabled,
    GasSensorEnabled,
    WaterValveClosed,
    GasValveClosed,
    Seen,
    PirArmed,
}

/// Flags tri-état: `None` = jamais observé
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFlags {
    pub water_sensor_enabled: Option<bool>,
    pub flame_sensor_enabled: Option<bool>,
    pub gas_sensor_enabled: Option<bool>,
    pub water_valve_closed: Option<bool>,
    pub gas_valve_closed: Option<bool>,
}

/// Point d'historique, un par statut traité. Immuable une fois ajouté.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub time: String,
    pub date: String,
    pub water: Option<f64>,
    pub flame: Option<f64>,
    pub gas: Option<f64>,
    pub temperature: Option<f64>,
    pub motion: Option<f64>,
    pub water_leak: Option<bool>,
    pub flame_leak: Option<bool>,
    pub gas_leak: Option<bool>,
    pub pir_armed: Option<bool>,
    pub fan: Option<bool>,
    pub valve_water_closed: Option<bool>,
    pub valve_gas_closed: Option<bool>,
}

impl DataPoint {
    /// Capture un statut à l'instant `at` (heure locale du kernel)
    pub fn capture(status: &DeviceStatus, at: OffsetDateTime) -> Self {
        Self {
            timestamp: at,
            time: clock::time_label(&at),
            date: clock::date_key(&at),
            water: status.water,
            flame: status.flame,
            gas: status.gas,
            temperature: status.temp,
            motion: status.motion,
            water_leak: status.water_leak,
            flame_leak: status.flame_leak,
            gas_leak: status.gas_leak,
            pir_armed: status.pir_armed,
            fan: status.fan,
            valve_water_closed: status.valve_water_closed,
            valve_gas_closed: status.valve_gas_closed,
        }
    }

    pub fn motion_detected(&self) -> bool {
        self.motion == Some(1.0)
    }

    pub fn intrusion(&self) -> bool {
        self.motion_detected() && self.pir_armed == Some(true)
    }
}

// Le firmware n'est pas constant sur les types: booléens parfois en 0/1,
// horodatages parfois numériques.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Number,
    Flag,
    Text,
}

const FIELD_KINDS: [(&str, FieldKind); 21] = [
    ("water", FieldKind::Number),
    ("flame", FieldKind::Number),
    ("gas", FieldKind::Number),
    ("temp", FieldKind::Number),
    ("fan", FieldKind::Flag),
    ("water_leak", FieldKind::Flag),
    ("flame_leak", FieldKind::Flag),
    ("gas_leak", FieldKind::Flag),
    ("motion", FieldKind::Number),
    ("pir_armed", FieldKind::Flag),
    ("valve_water_closed", FieldKind::Flag),
    ("valve_gas_closed", FieldKind::Flag),
    ("water_sensor_enabled", FieldKind::Flag),
    ("flame_sensor_enabled", FieldKind::Flag),
    ("gas_sensor_enabled", FieldKind::Flag),
    ("seen", FieldKind::Flag),
    ("rtc_string", FieldKind::Text),
    ("rtc", FieldKind::Text),
    ("timestamp", FieldKind::Text),
    ("date", FieldKind::Text),
    ("time", FieldKind::Text),
];

impl FieldKind {
    fn accepts(self, value: &Value) -> bool {
        value.is_null()
            || match self {
                FieldKind::Number => as_number(value).is_some(),
                FieldKind::Flag => as_flag(value).is_some(),
                FieldKind::Text => as_text(value).is_some(),
            }
    }
}

/// Champs connus dont la valeur n'a pas un type utilisable
pub fn mistyped_fields(object: &Map<String, Value>) -> Vec<&'static str> {
    FIELD_KINDS
        .iter()
        .filter(|(name, kind)| object.get(*name).is_some_and(|v| !kind.accepts(v)))
        .map(|(name, _)| *name)
        .collect()
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(true) => Some(1.0),
        Value::Bool(false) => Some(0.0),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn loose_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(as_flag(&Value::deserialize(deserializer)?))
}

fn loose_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(as_number(&Value::deserialize(deserializer)?))
}

fn loose_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(as_text(&Value::deserialize(deserializer)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_loose_fields_accept_numbers_and_null() {
        let status: DeviceStatus = serde_json::from_str(
            r#"{"fan":1,"water_leak":0,"motion":true,"seen":null,"rtc":1712345678}"#,
        )
        .unwrap();
        assert_eq!(status.fan, Some(true));
        assert_eq!(status.water_leak, Some(false));
        assert_eq!(status.motion, Some(1.0));
        assert_eq!(status.seen, None);
        assert_eq!(status.rtc.as_deref(), Some("1712345678"));
        assert_eq!(status.gas, None);
    }

    #[test]
    fn test_wrong_type_field_reads_as_absent() {
        let raw = r#"{"water":"high","gas_leak":true,"seen":"yes","rtc":[1],"flame":3}"#;
        let status: DeviceStatus = serde_json::from_str(raw).unwrap();
        assert_eq!(status.water, None);
        assert_eq!(status.seen, None);
        assert_eq!(status.rtc, None);
        assert_eq!(status.gas_leak, Some(true));
        assert_eq!(status.flame, Some(3.0));

        let object: Map<String, Value> = serde_json::from_str(raw).unwrap();
        assert_eq!(mistyped_fields(&object), vec!["water", "seen", "rtc"]);
    }

    #[test]
    fn test_null_and_unknown_fields_are_not_mistyped() {
        let object: Map<String, Value> =
            serde_json::from_str(r#"{"water":null,"uptime":"3d","fan":0,"rtc_string":"12:00"}"#).unwrap();
        assert!(mistyped_fields(&object).is_empty());
    }

    #[test]
    fn test_capture_copies_channels() {
        let status = DeviceStatus {
            water: Some(12.0),
            temp: Some(24.5),
            motion: Some(1.0),
            pir_armed: Some(true),
            ..Default::default()
        };
        let point = DataPoint::capture(&status, datetime!(2026-10-19 09:05:00 +01:00));
        assert_eq!(point.date, "2026-10-19");
        assert_eq!(point.time, "09:05:00");
        assert_eq!(point.temperature, Some(24.5));
        assert_eq!(point.flame, None);
        assert!(point.intrusion());
    }

    #[test]
    fn test_data_point_roundtrips_through_json() {
        let point = DataPoint::capture(
            &DeviceStatus { gas: Some(5.0), ..Default::default() },
            datetime!(2026-10-19 21:00:00 +02:00),
        );
        let json = serde_json::to_string(&point).unwrap();
        assert!(json.contains("2026-10-19T21:00:00+02:00"));
        let back: DataPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, point);
    }
}
