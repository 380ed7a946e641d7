/*!
Constructeur de messages de statut `home/status`

Produit des payloads JSON dans la forme publiée par le contrôleur:
valeurs capteurs, alarmes, vannes, et champs optionnels d'activation.
Les champs optionnels ne sont émis que s'ils ont été renseignés.
*/

use serde_json::{Map, Value};

/// Builder fluide pour un message de statut
#[derive(Debug, Clone)]
pub struct StatusMessageBuilder {
    fields: Map<String, Value>,
}

impl StatusMessageBuilder {
    /// Statut "calme": tout à zéro, pas d'alarme, vannes ouvertes, PIR désarmé
    pub fn quiet() -> Self {
        let mut fields = Map::new();
        fields.insert("water".into(), Value::from(0));
        fields.insert("flame".into(), Value::from(0));
        fields.insert("gas".into(), Value::from(0));
        fields.insert("temp".into(), Value::from(22));
        fields.insert("fan".into(), Value::from(false));
        fields.insert("water_leak".into(), Value::from(false));
        fields.insert("flame_leak".into(), Value::from(false));
        fields.insert("gas_leak".into(), Value::from(false));
        fields.insert("motion".into(), Value::from(0));
        fields.insert("pir_armed".into(), Value::from(false));
        fields.insert("valve_water_closed".into(), Value::from(false));
        fields.insert("valve_gas_closed".into(), Value::from(false));
        Self { fields }
    }

    /// Message vide (aucun champ), utile pour les tests "absence = inconnu"
    pub fn empty() -> Self {
        Self { fields: Map::new() }
    }

    pub fn set<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn water_leak(self, on: bool) -> Self {
        self.set("water_leak", on)
    }

    pub fn flame_leak(self, on: bool) -> Self {
        self.set("flame_leak", on)
    }

    pub fn gas_leak(self, on: bool) -> Self {
        self.set("gas_leak", on)
    }

    pub fn motion(self, detected: bool, armed: bool) -> Self {
        self.set("motion", if detected { 1 } else { 0 })
            .set("pir_armed", armed)
    }

    pub fn build(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Payload prêt à être injecté comme message MQTT brut
    pub fn to_payload(&self) -> String {
        self.build().to_string()
    }
}
