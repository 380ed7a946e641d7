/**
 * DATA PORTS - Interface de persistance clé/valeur du kernel
 *
 * RÔLE :
 * Contrat logique de stockage utilisé par l'historique et les préférences:
 * clé `"history"` -> historique sérialisé, clé `"notificationsEnabled"` ->
 * booléen. Le kernel ne suppose rien sur la manière dont les octets sont
 * stockés.
 *
 * IMPLÉMENTATIONS :
 * - JsonFilePort : un fichier JSON par clé dans le dossier de données
 * - MemoryPort   : en mémoire (tests, repli si le dossier est inutilisable)
 */

pub mod json_file;

pub use json_file::JsonFilePort;

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

/// Erreurs possibles lors des opérations sur un port
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Informations descriptives d'un port, exposées par l'API de santé
#[derive(Debug, Clone, Serialize)]
pub struct PortInfo {
    pub name: String,
    pub location: String,
}

pub trait KeyValuePort: Send + Sync {
    /// `Ok(None)` si la clé n'a jamais été écrite
    fn read(&self, key: &str) -> Result<Option<String>, PortError>;

    fn write(&self, key: &str, value: &str) -> Result<(), PortError>;

    fn info(&self) -> PortInfo;
}

/// Port volatile
#[derive(Default)]
pub struct MemoryPort {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPort {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValuePort for MemoryPort {
    fn read(&self, key: &str) -> Result<Option<String>, PortError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PortError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn info(&self) -> PortInfo {
        PortInfo { name: "memory".into(), location: "in-process".into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_port_roundtrip() {
        let port = MemoryPort::new();
        assert!(port.read("history").unwrap().is_none());
        port.write("history", "{}").unwrap();
        assert_eq!(port.read("history").unwrap().as_deref(), Some("{}"));
        port.write("history", "[]").unwrap();
        assert_eq!(port.read("history").unwrap().as_deref(), Some("[]"));
    }
}
