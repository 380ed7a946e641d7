/*!
# AegisCore DevKit - Stubs et utilitaires de développement

Bibliothèque facilitant les tests du kernel AegisCore sans broker:
- Client MQTT simulé (publications enregistrées, réceptions simulées)
- Constructeur de messages `home/status` conformes au firmware
*/

pub mod mqtt_stub;
pub mod status_builder;

pub use mqtt_stub::{MockMessage, MockMqttClient};
pub use status_builder::StatusMessageBuilder;
