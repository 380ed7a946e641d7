/**
 * PORT JSON FILE - Stockage clé/valeur sur disque
 *
 * FONCTIONNEMENT :
 * - Une clé = un fichier `<data_dir>/<clé>.json`
 * - Écriture via fichier temporaire + rename (pas de fichier à moitié écrit)
 * - Lecture d'une clé absente => `None`, jamais une erreur
 */

use super::{KeyValuePort, PortError, PortInfo};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct JsonFilePort {
    data_dir: PathBuf,
}

impl JsonFilePort {
    /// Crée le port et son dossier si besoin
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Result<Self, PortError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        tracing::debug!(dir = %data_dir.display(), "json file port initialized");
        Ok(Self { data_dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PortError> {
        let valid = !key.is_empty()
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(PortError::InvalidKey(key.to_string()));
        }
        Ok(self.data_dir.join(format!("{key}.json")))
    }
}

impl KeyValuePort for JsonFilePort {
    fn read(&self, key: &str) -> Result<Option<String>, PortError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PortError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn info(&self) -> PortInfo {
        PortInfo { name: "json-file".into(), location: self.data_dir.display().to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let port = JsonFilePort::new(dir.path()).unwrap();
        port.write("notificationsEnabled", "true").unwrap();

        let reopened = JsonFilePort::new(dir.path()).unwrap();
        assert_eq!(reopened.read("notificationsEnabled").unwrap().as_deref(), Some("true"));
        assert!(!dir.path().join("notificationsEnabled.json.tmp").exists());
    }

    #[test]
    fn test_missing_key_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let port = JsonFilePort::new(dir.path().join("nested")).unwrap();
        assert!(port.read("history").unwrap().is_none());
        assert_eq!(port.info().location, dir.path().join("nested").display().to_string());
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let port = JsonFilePort::new(dir.path()).unwrap();
        assert!(matches!(port.write("../escape", "x"), Err(PortError::InvalidKey(_))));
        assert!(matches!(port.read(""), Err(PortError::InvalidKey(_))));
    }
}
