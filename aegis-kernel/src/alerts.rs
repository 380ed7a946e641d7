//! Évaluation des alertes fuite / feu / gaz / intrusion.
//!
//! Mode `Level` (défaut): chaque statut qualifiant produit une alerte, même
//! si la condition persiste. Mode `Edge`: une alerte par épisode, émise
//! quand la condition passe d'inactive à active. Un statut qui ne rapporte
//! pas une condition ne clôt pas son épisode.

use crate::models::DeviceStatus;
use crate::notify::{Notification, Severity, ALERT_TITLE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    WaterLeak,
    FlameDetected,
    GasLeak,
    IntruderAlert,
}

impl AlertKind {
    const ALL: [AlertKind; 4] = [
        AlertKind::WaterLeak,
        AlertKind::FlameDetected,
        AlertKind::GasLeak,
        AlertKind::IntruderAlert,
    ];

    pub fn severity(&self) -> Severity {
        match self {
            AlertKind::GasLeak => Severity::Warning,
            _ => Severity::Critical,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AlertKind::WaterLeak => "WATER LEAK DETECTED!",
            AlertKind::FlameDetected => "FLAME DETECTED!",
            AlertKind::GasLeak => "GAS LEAK DETECTED!",
            AlertKind::IntruderAlert => "INTRUDER ALERT! Motion detected while system is armed.",
        }
    }

    fn is_active(&self, status: &DeviceStatus) -> bool {
        match self {
            AlertKind::WaterLeak => status.water_leak == Some(true),
            AlertKind::FlameDetected => status.flame_leak == Some(true),
            AlertKind::GasLeak => status.gas_leak == Some(true),
            AlertKind::IntruderAlert => status.motion_detected() && status.is_armed(),
        }
    }

    /// État rapporté par ce statut; `None` si les champs sont absents
    fn observed(&self, status: &DeviceStatus) -> Option<bool> {
        match self {
            AlertKind::WaterLeak => status.water_leak,
            AlertKind::FlameDetected => status.flame_leak,
            AlertKind::GasLeak => status.gas_leak,
            AlertKind::IntruderAlert => None,
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: &'static str,
}

impl AlertEvent {
    pub fn from_kind(kind: AlertKind) -> Self {
        Self { kind, severity: kind.severity(), message: kind.message() }
    }

    pub fn to_notification(&self) -> Notification {
        Notification::new(ALERT_TITLE, self.message, self.severity)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertMode {
    #[default]
    Level,
    Edge,
}

/// Conditions actives dans un statut, dans l'ordre eau, flamme, gaz, intrusion
pub fn detect(status: &DeviceStatus) -> Vec<AlertKind> {
    AlertKind::ALL.into_iter().filter(|k| k.is_active(status)).collect()
}

#[derive(Debug, Default)]
pub struct AlertEvaluator {
    mode: AlertMode,
    active: [bool; 4],
    // derniers `motion` / `pir_armed` connus, pour l'intrusion en mode Edge
    last_motion: Option<f64>,
    last_armed: Option<bool>,
}

impl AlertEvaluator {
    pub fn new(mode: AlertMode) -> Self {
        Self { mode, ..Self::default() }
    }

    pub fn mode(&self) -> AlertMode {
        self.mode
    }

    pub fn evaluate(&mut self, status: &DeviceStatus) -> Vec<AlertEvent> {
        match self.mode {
            AlertMode::Level => detect(status).into_iter().map(AlertEvent::from_kind).collect(),
            AlertMode::Edge => self.rising_edges(status),
        }
    }

    fn rising_edges(&mut self, status: &DeviceStatus) -> Vec<AlertEvent> {
        let intrusion_reported = status.motion.is_some() || status.pir_armed.is_some();
        self.last_motion = status.motion.or(self.last_motion);
        self.last_armed = status.pir_armed.or(self.last_armed);

        let mut events = Vec::new();
        for kind in AlertKind::ALL {
            let observed = match kind {
                AlertKind::IntruderAlert if intrusion_reported => {
                    Some(self.last_motion == Some(1.0) && self.last_armed == Some(true))
                }
                _ => kind.observed(status),
            };
            let Some(now_active) = observed else {
                continue;
            };
            let was_active = std::mem::replace(&mut self.active[kind.index()], now_active);
            if now_active && !was_active {
                events.push(AlertEvent::from_kind(kind));
            }
        }
        events
    }
}
