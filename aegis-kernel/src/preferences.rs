//! Préférences opérateur persistées dans le port clé/valeur.

use crate::ports::{KeyValuePort, PortError};
use std::sync::Arc;

pub const NOTIFICATIONS_KEY: &str = "notificationsEnabled";

pub struct Preferences {
    port: Arc<dyn KeyValuePort>,
    notifications_enabled: bool,
}

impl Preferences {
    /// Valeur absente ou illisible => notifications désactivées
    pub fn load(port: Arc<dyn KeyValuePort>) -> Self {
        let notifications_enabled = match port.read(NOTIFICATIONS_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<bool>(raw.trim()).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "stored notification preference is invalid");
                false
            }),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read notification preference");
                false
            }
        };
        Self { port, notifications_enabled }
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled
    }

    /// La valeur en mémoire change même si l'écriture échoue
    pub fn set_notifications_enabled(&mut self, enabled: bool) -> Result<(), PortError> {
        self.notifications_enabled = enabled;
        self.port.write(NOTIFICATIONS_KEY, &serde_json::to_string(&enabled)?)
    }
}
