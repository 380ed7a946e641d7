/**
 * RECONCILER - Vue cohérente de l'état du contrôleur
 *
 * RÔLE :
 * Seul écrivain des `DeviceFlags`, de l'état de connexion et des bascules
 * en attente. Chaque snapshot décodé met à jour les flags présents et
 * produit la liste des surfaces UI à rafraîchir (aucune I/O ici).
 *
 * BASCULES OPTIMISTES :
 * Une commande envoyée enregistre une attente (champ, valeur espérée).
 * Le prochain statut portant ce champ la confirme ou l'annule. Les flags
 * autoritaires ne sont jamais modifiés par une commande.
 */

use crate::clock;
use crate::interlock::Command;
use crate::models::{DeviceFlags, DeviceStatus, ToggleField};
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Water,
    Flame,
    Gas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Valve {
    Water,
    Gas,
}

/// Surface UI à rafraîchir, avec les données à afficher
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    Sensor { sensor: SensorKind, value: Option<f64>, alarm: bool },
    Temperature { value: Option<f64>, fan: bool },
    Security { armed: bool, motion: bool },
    Valve { valve: Valve, closed: bool },
    SensorToggle { sensor: SensorKind, enabled: bool },
    Seen { enabled: bool },
    Clock { text: String },
    Connectivity { connected: bool, commands_enabled: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingToggle {
    pub command: Command,
    pub field: ToggleField,
    pub expected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PendingOutcome {
    Confirmed { command: Command },
    RolledBack { command: Command, reported: bool },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationResult {
    pub changes: Vec<ChangeEvent>,
    pub pending: Vec<PendingOutcome>,
}

/// Vue lecture seule pour l'API
#[derive(Debug, Clone, Serialize)]
pub struct ReconcilerSnapshot {
    pub connected: bool,
    pub flags: DeviceFlags,
    pub seen: Option<bool>,
    pub seen_effective: bool,
    pub pir_armed: Option<bool>,
    pub pending: Vec<PendingToggle>,
}

#[derive(Debug, Default)]
pub struct Reconciler {
    flags: DeviceFlags,
    connected: bool,
    seen: Option<bool>,
    pir_armed: Option<bool>,
    pending: Vec<PendingToggle>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(&self) -> DeviceFlags {
        self.flags
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// État SEEN affiché: l'attente optimiste prime sur la dernière valeur confirmée
    pub fn effective_seen(&self) -> bool {
        self.pending
            .iter()
            .rev()
            .find(|p| p.field == ToggleField::Seen)
            .map(|p| p.expected)
            .or(self.seen)
            .unwrap_or(false)
    }

    pub fn pending(&self) -> &[PendingToggle] {
        &self.pending
    }

    pub fn apply(&mut self, status: &DeviceStatus) -> ReconciliationResult {
        self.apply_at(status, clock::local_now())
    }

    /// `now` ne sert qu'au texte d'horloge de repli
    pub fn apply_at(&mut self, status: &DeviceStatus, now: OffsetDateTime) -> ReconciliationResult {
        let mut changes = Vec::new();

        for (sensor, value, alarm) in [
            (SensorKind::Water, status.water, status.water_leak),
            (SensorKind::Flame, status.flame, status.flame_leak),
            (SensorKind::Gas, status.gas, status.gas_leak),
        ] {
            if value.is_some() || alarm.is_some() {
                changes.push(ChangeEvent::Sensor { sensor, value, alarm: alarm == Some(true) });
            }
        }

        if status.temp.is_some() || status.fan.is_some() {
            changes.push(ChangeEvent::Temperature { value: status.temp, fan: status.fan == Some(true) });
        }

        if status.pir_armed.is_some() || status.motion.is_some() {
            changes.push(ChangeEvent::Security {
                armed: status.is_armed(),
                motion: status.motion_detected(),
            });
        }
        if let Some(armed) = status.pir_armed {
            self.pir_armed = Some(armed);
        }

        if let Some(closed) = status.valve_water_closed {
            self.flags.water_valve_closed = Some(closed);
            changes.push(ChangeEvent::Valve { valve: Valve::Water, closed });
        }
        if let Some(closed) = status.valve_gas_closed {
            self.flags.gas_valve_closed = Some(closed);
            changes.push(ChangeEvent::Valve { valve: Valve::Gas, closed });
        }

        if let Some(enabled) = status.water_sensor_enabled {
            self.flags.water_sensor_enabled = Some(enabled);
            changes.push(ChangeEvent::SensorToggle { sensor: SensorKind::Water, enabled });
        }
        if let Some(enabled) = status.flame_sensor_enabled {
            self.flags.flame_sensor_enabled = Some(enabled);
            changes.push(ChangeEvent::SensorToggle { sensor: SensorKind::Flame, enabled });
        }
        if let Some(enabled) = status.gas_sensor_enabled {
            self.flags.gas_sensor_enabled = Some(enabled);
            changes.push(ChangeEvent::SensorToggle { sensor: SensorKind::Gas, enabled });
        }

        if let Some(seen) = status.seen {
            self.seen = Some(seen);
            changes.push(ChangeEvent::Seen { enabled: seen });
        }

        changes.push(ChangeEvent::Clock { text: clock_text(status, now) });

        let pending = self.settle_pending(status);
        ReconciliationResult { changes, pending }
    }

    /// Transitions de connexion du transport. `None` si rien ne change.
    pub fn set_connected(&mut self, connected: bool) -> Option<ChangeEvent> {
        if self.connected == connected {
            return None;
        }
        self.connected = connected;
        Some(ChangeEvent::Connectivity { connected, commands_enabled: connected })
    }

    /// Enregistre l'effet attendu d'une commande publiée.
    /// Une nouvelle attente sur le même champ remplace l'ancienne.
    pub fn record_pending(&mut self, command: Command) {
        if let Some((field, expected)) = command.expected_effect() {
            self.pending.retain(|p| p.field != field);
            self.pending.push(PendingToggle { command, field, expected });
        }
    }

    fn settle_pending(&mut self, status: &DeviceStatus) -> Vec<PendingOutcome> {
        let mut outcomes = Vec::new();
        self.pending.retain(|p| match status.reported(p.field) {
            Some(reported) if reported == p.expected => {
                outcomes.push(PendingOutcome::Confirmed { command: p.command });
                false
            }
            Some(reported) => {
                outcomes.push(PendingOutcome::RolledBack { command: p.command, reported });
                false
            }
            None => true,
        });
        outcomes
    }

    pub fn snapshot(&self) -> ReconcilerSnapshot {
        ReconcilerSnapshot {
            connected: self.connected,
            flags: self.flags,
            seen: self.seen,
            seen_effective: self.effective_seen(),
            pir_armed: self.pir_armed,
            pending: self.pending.clone(),
        }
    }
}

/// Texte de l'horloge RTC, par ordre de préférence des champs du contrôleur
pub fn clock_text(status: &DeviceStatus, now: OffsetDateTime) -> String {
    if let Some(s) = status.rtc_string.as_deref().filter(|s| !s.is_empty()) {
        return s.to_string();
    }
    if let Some(s) = status.rtc.as_deref().filter(|s| !s.is_empty()) {
        return s.to_string();
    }
    if let Some(ts) = status.timestamp.as_deref().filter(|s| !s.is_empty()) {
        return format!("Timestamp: {ts}");
    }
    let date = status.date.as_deref().filter(|s| !s.is_empty());
    let time = status.time.as_deref().filter(|s| !s.is_empty());
    if date.is_some() || time.is_some() {
        return format!("Date: {} | Time: {}", date.unwrap_or("-"), time.unwrap_or("-"));
    }
    format!("Last update: {} {}", clock::date_key(&now), clock::time_label(&now))
}
