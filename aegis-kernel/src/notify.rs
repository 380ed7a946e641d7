/**
 * NOTIFICATIONS - Puits de notifications du kernel
 *
 * RÔLE :
 * Contrat `{title, body, severity}` consommé par les collaborateurs
 * d'affichage: fil de toasts in-app (lu par l'API) et relais push.
 * Un puits ne renvoie rien et ne doit jamais bloquer le traitement
 * des messages.
 */

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use time::OffsetDateTime;

pub const ALERT_TITLE: &str = "AegisCore Alert";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub severity: Severity,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>, severity: Severity) -> Self {
        Self { title: title.into(), body: body.into(), severity }
    }
}

pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: &Notification);
}

#[derive(Debug, Clone, Serialize)]
pub struct Toast {
    pub id: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    #[serde(flatten)]
    pub notification: Notification,
}

/// Fil borné des derniers toasts; les ids sont strictement croissants
pub struct ToastFeed {
    capacity: usize,
    inner: Mutex<FeedInner>,
}

struct FeedInner {
    next_id: u64,
    entries: VecDeque<Toast>,
}

impl ToastFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(FeedInner { next_id: 1, entries: VecDeque::new() }),
        }
    }

    pub fn push(&self, notification: Notification) -> u64 {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push_back(Toast { id, at: crate::clock::local_now(), notification });
        while inner.entries.len() > self.capacity {
            inner.entries.pop_front();
        }
        id
    }

    /// Toasts d'id strictement supérieur à `since` (tous si `None`)
    pub fn since(&self, since: Option<u64>) -> Vec<Toast> {
        let floor = since.unwrap_or(0);
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|t| t.id > floor)
            .cloned()
            .collect()
    }
}

impl NotificationSink for ToastFeed {
    fn deliver(&self, notification: &Notification) {
        self.push(notification.clone());
    }
}
