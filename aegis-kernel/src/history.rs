/**
 * HISTORY STORE - Historique journalier borné des points capteurs
 *
 * FONCTIONNEMENT :
 * - Map `YYYY-MM-DD` (heure locale) -> points dans l'ordre d'arrivée
 * - Chaque jour est borné à `cap` points; au-delà, les plus anciens sortent
 * - Chargé une fois au démarrage, persisté après chaque mutation
 * - Chargement impossible (absent, corrompu) => historique vide
 * - Pas de purge entre jours: la croissance inter-jours est acceptée
 */

use crate::models::DataPoint;
use crate::ports::{KeyValuePort, PortError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const HISTORY_KEY: &str = "history";
pub const DEFAULT_HISTORY_CAP: usize = 500;

#[derive(Debug, Deserialize)]
struct Persisted {
    daily: BTreeMap<String, Vec<DataPoint>>,
}

pub struct HistoryStore {
    daily: BTreeMap<String, Vec<DataPoint>>,
    cap: usize,
    port: Arc<dyn KeyValuePort>,
}

impl HistoryStore {
    /// Charge l'historique depuis le port; toute erreur donne un store vide
    pub fn load(port: Arc<dyn KeyValuePort>, cap: usize) -> Self {
        let cap = cap.max(1);
        let daily = match port.read(HISTORY_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Persisted>(&raw) {
                Ok(persisted) => persisted.daily,
                Err(e) => {
                    tracing::warn!(error = %e, "stored history is corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stored history, starting empty");
                BTreeMap::new()
            }
        };

        let mut store = Self { daily, cap, port };
        // un fichier écrit avec un plafond plus large est ramené au plafond courant
        for bucket in store.daily.values_mut() {
            truncate_front(bucket, cap);
        }
        tracing::info!(
            days = store.daily.len(),
            points = store.daily.values().map(Vec::len).sum::<usize>(),
            "history loaded"
        );
        store
    }

    /// Ajoute un point dans le seau de son jour (`point.date`, date locale
    /// de capture) puis persiste tout l'historique. Un échec de sauvegarde
    /// est journalisé; le point reste en mémoire.
    pub fn append(&mut self, point: DataPoint) {
        let bucket = self.daily.entry(point.date.clone()).or_default();
        bucket.push(point);
        truncate_front(bucket, self.cap);

        if let Err(e) = self.persist() {
            tracing::warn!(error = %e, "failed to persist history, keeping in memory");
        }
    }

    /// Points d'un jour dans l'ordre d'arrivée (vide si inconnu)
    pub fn get(&self, date: &str) -> &[DataPoint] {
        self.daily.get(date).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Jours connus, triés
    pub fn dates(&self) -> Vec<String> {
        self.daily.keys().cloned().collect()
    }

    pub fn days(&self) -> usize {
        self.daily.len()
    }

    /// Vide tous les jours et persiste l'état vide
    pub fn reset(&mut self) -> Result<(), PortError> {
        self.daily.clear();
        self.persist()
    }

    pub fn persist(&self) -> Result<(), PortError> {
        #[derive(Serialize)]
        struct PersistedRef<'a> {
            daily: &'a BTreeMap<String, Vec<DataPoint>>,
        }
        let json = serde_json::to_string(&PersistedRef { daily: &self.daily })?;
        self.port.write(HISTORY_KEY, &json)
    }
}

fn truncate_front(bucket: &mut Vec<DataPoint>, cap: usize) {
    if bucket.len() > cap {
        let excess = bucket.len() - cap;
        bucket.drain(..excess);
    }
}
