/**
 * DASHBOARD ENGINE - Pipeline des statuts et des commandes opérateur
 *
 * FLUX ENTRANT (un message à la fois) :
 *   payload brut -> decode -> reconcile -> alertes -> historique
 *   Un payload rejeté est journalisé et ne change rien.
 *
 * FLUX SORTANT :
 *   commande -> interlock -> transport (best-effort) -> attente optimiste
 *   Un refus part en toast d'avertissement, sans aucune I/O transport.
 *
 * Les alertes vont toujours au fil de toasts; le relais push ne les reçoit
 * que si la préférence `notificationsEnabled` est active.
 */

use crate::alerts::{AlertEvaluator, AlertEvent, AlertMode};
use crate::analytics::{self, DailySummary, DataFilter, Resolution, Series, TableRow};
use crate::clock;
use crate::decoder::{self, DecodeError};
use crate::health::HealthTracker;
use crate::history::HistoryStore;
use crate::interlock::{self, Command, DenialReason};
use crate::models::{DataPoint, DeviceStatus};
use crate::notify::{Notification, NotificationSink, Severity, ToastFeed, ALERT_TITLE};
use crate::ports::{KeyValuePort, PortError};
use crate::preferences::Preferences;
use crate::reconciler::{ChangeEvent, PendingOutcome, ReconcilerSnapshot, ReconciliationResult, Reconciler};
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;

/// Envoi d'une commande sur le topic de commande, sans accusé de réception
pub trait CommandTransport: Send + Sync {
    fn send(&self, command: Command) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageOutcome {
    pub changes: Vec<ChangeEvent>,
    pub pending: Vec<PendingOutcome>,
    pub alerts: Vec<AlertEvent>,
    pub point: DataPoint,
}

/// Vue complète renvoyée par `GET /status`
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    #[serde(flatten)]
    pub state: ReconcilerSnapshot,
    pub status: Option<DeviceStatus>,
    pub clock: Option<String>,
    pub notifications_enabled: bool,
    pub alert_mode: AlertMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayAnalytics {
    pub date: String,
    pub resolution: Resolution,
    pub series: Series,
    pub summary: DailySummary,
    pub rows: Vec<TableRow>,
}

pub struct DashboardOptions {
    pub history_cap: usize,
    pub alert_mode: AlertMode,
    pub toast_capacity: usize,
}

pub struct Dashboard {
    reconciler: Reconciler,
    alerts: AlertEvaluator,
    history: HistoryStore,
    preferences: Preferences,
    toasts: Arc<ToastFeed>,
    push: Option<Arc<dyn NotificationSink>>,
    health: HealthTracker,
    last_status: Option<DeviceStatus>,
    last_clock: Option<String>,
}

impl Dashboard {
    pub fn new(port: Arc<dyn KeyValuePort>, options: DashboardOptions, health: HealthTracker) -> Self {
        Self {
            reconciler: Reconciler::new(),
            alerts: AlertEvaluator::new(options.alert_mode),
            history: HistoryStore::load(port.clone(), options.history_cap),
            preferences: Preferences::load(port),
            toasts: Arc::new(ToastFeed::new(options.toast_capacity)),
            push: None,
            health,
            last_status: None,
            last_clock: None,
        }
    }

    pub fn with_push(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.push = Some(sink);
        self
    }

    pub fn toasts(&self) -> Arc<ToastFeed> {
        self.toasts.clone()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn is_connected(&self) -> bool {
        self.reconciler.is_connected()
    }

    pub fn handle_message(&mut self, raw: &str) -> Result<MessageOutcome, DecodeError> {
        self.handle_message_at(raw, clock::local_now())
    }

    /// `now` date le point d'historique et sert de repli pour l'horloge
    pub fn handle_message_at(&mut self, raw: &str, now: OffsetDateTime) -> Result<MessageOutcome, DecodeError> {
        let status = match decoder::decode(raw) {
            Ok(status) => status,
            Err(e) => {
                self.health.record_rejected();
                tracing::warn!(error = %e, "status payload rejected");
                return Err(e);
            }
        };
        self.health.record_processed();

        let ReconciliationResult { changes, pending } = self.reconciler.apply_at(&status, now);
        for outcome in &pending {
            if let PendingOutcome::RolledBack { command, reported } = outcome {
                tracing::info!(%command, reported, "controller did not apply command");
            }
        }
        self.last_clock = changes.iter().rev().find_map(|c| match c {
            ChangeEvent::Clock { text } => Some(text.clone()),
            _ => None,
        });

        let alerts = self.alerts.evaluate(&status);
        self.dispatch_alerts(&alerts);

        let point = DataPoint::capture(&status, now);
        self.history.append(point.clone());
        self.last_status = Some(status);

        Ok(MessageOutcome { changes, pending, alerts, point })
    }

    fn dispatch_alerts(&self, alerts: &[AlertEvent]) {
        if alerts.is_empty() {
            return;
        }
        self.health.record_alerts(alerts.len());
        for alert in alerts {
            tracing::warn!(kind = ?alert.kind, "{}", alert.message);
            self.toasts.deliver(&alert.to_notification());
        }

        if self.preferences.notifications_enabled() {
            if let Some(push) = &self.push {
                // une seule notification système par statut
                let body = alerts.iter().map(|a| a.message).collect::<Vec<_>>().join(" | ");
                let severity = alerts.iter().map(|a| a.severity).max_by_key(|s| *s as u8).unwrap_or(Severity::Critical);
                push.deliver(&Notification::new(ALERT_TITLE, body, severity));
            }
        }
    }

    /// Transitions du transport (connect / reconnect / error / close)
    pub fn set_connected(&mut self, connected: bool) -> Option<ChangeEvent> {
        let change = self.reconciler.set_connected(connected);
        if change.is_some() {
            if connected {
                self.health.mark_mqtt_connected();
            } else {
                self.health.mark_mqtt_disconnected();
            }
        }
        change
    }

    pub fn authorize(&self, command: Command) -> Result<(), DenialReason> {
        interlock::can_execute(command, &self.reconciler.flags(), self.reconciler.is_connected())
    }

    /// Vérifie puis publie. Un échec d'envoi est journalisé mais traité
    /// comme un succès: la livraison n'est jamais garantie.
    pub fn submit_command(&mut self, command: Command, transport: &dyn CommandTransport) -> Result<(), DenialReason> {
        if let Err(reason) = self.authorize(command) {
            tracing::info!(%command, %reason, "command denied");
            self.toasts.deliver(&Notification::new(ALERT_TITLE, reason.to_string(), Severity::Warning));
            return Err(reason);
        }

        if let Err(e) = transport.send(command) {
            tracing::error!(%command, error = %e, "command publish failed");
        } else {
            tracing::info!(%command, "command sent");
        }
        self.reconciler.record_pending(command);
        Ok(())
    }

    /// Bascule "vu" selon l'état effectif. La commande tentée est rendue
    /// dans les deux cas.
    pub fn toggle_seen(&mut self, transport: &dyn CommandTransport) -> Result<Command, (Command, DenialReason)> {
        let command = if self.reconciler.effective_seen() { Command::SeenOff } else { Command::SeenOn };
        match self.submit_command(command, transport) {
            Ok(()) => Ok(command),
            Err(reason) => Err((command, reason)),
        }
    }

    pub fn notifications_enabled(&self) -> bool {
        self.preferences.notifications_enabled()
    }

    pub fn set_notifications_enabled(&mut self, enabled: bool) -> Result<(), PortError> {
        tracing::info!(enabled, "notification preference changed");
        self.preferences.set_notifications_enabled(enabled)
    }

    pub fn history_for(&self, date: &str) -> Vec<DataPoint> {
        self.history.get(date).to_vec()
    }

    pub fn reset_history(&mut self) -> Result<(), PortError> {
        tracing::info!("history reset requested");
        self.history.reset()
    }

    pub fn analytics(&self, date: &str, resolution: Resolution, filter: DataFilter) -> DayAnalytics {
        let points = self.history.get(date);
        DayAnalytics {
            date: date.to_string(),
            resolution,
            series: analytics::aggregate(points, resolution),
            summary: analytics::summarize(points),
            rows: analytics::table_rows(points, filter),
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            state: self.reconciler.snapshot(),
            status: self.last_status.clone(),
            clock: self.last_clock.clone(),
            notifications_enabled: self.preferences.notifications_enabled(),
            alert_mode: self.alerts.mode(),
        }
    }
}
