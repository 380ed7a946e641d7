/**
 * PUSH RELAY - Relais Web Push des alertes vers les navigateurs abonnés
 *
 * FONCTIONNEMENT :
 * - `POST /subscribe` enregistre un abonnement navigateur (dédoublonné
 *   par égalité structurelle)
 * - `GET /vapidPublicKey` expose la clé publique VAPID au frontend
 * - Chaque notification `{title, body}` est chiffrée (aes128gcm) pour
 *   les clés `p256dh`/`auth` de l'abonné et signée VAPID, en tâche de
 *   fond, sans jamais bloquer le traitement MQTT
 * - Service push répondant 404 ou 410 => abonnement expiré, retiré
 *
 * LIMITES :
 * - Sans clé privée VAPID configurée, rien n'est envoyé
 * - Registre en mémoire, perdu au redémarrage
 */

use crate::notify::{Notification, NotificationSink};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use web_push::{
    ContentEncoding, IsahcWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient, WebPushError,
    WebPushMessage, WebPushMessageBuilder,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    #[serde(rename = "expirationTime", default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<SubscriptionKeys>,
}

/// Identité VAPID du serveur
#[derive(Debug, Clone, Default)]
pub struct VapidKeys {
    /// clé publique base64url, telle que la page la passe à `pushManager.subscribe`
    pub public_key: Option<String>,
    /// clé privée P-256 au format PEM
    pub private_pem: Option<String>,
    /// claim `sub`, en général `mailto:...`
    pub subject: String,
}

#[derive(Debug, Serialize)]
struct PushPayload<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, thiserror::Error)]
enum SendError {
    #[error("subscription has no encryption keys")]
    MissingKeys,
    #[error("no VAPID private key configured")]
    NoVapidKey,
    #[error(transparent)]
    Push(#[from] WebPushError),
}

/// Le service push signale un abonnement mort par 404 ou 410
fn is_expired(error: &WebPushError) -> bool {
    matches!(error, WebPushError::EndpointNotFound | WebPushError::EndpointNotValid)
}

#[derive(Clone)]
pub struct PushRelay {
    client: Option<Arc<IsahcWebPushClient>>,
    vapid: Arc<VapidKeys>,
    subscriptions: Arc<Mutex<Vec<PushSubscription>>>,
}

impl PushRelay {
    pub fn new(vapid: VapidKeys) -> Self {
        if vapid.private_pem.is_none() {
            tracing::warn!("no VAPID private key, push notifications disabled");
        }
        let client = match IsahcWebPushClient::new() {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::error!(error = %e, "web push client unavailable");
                None
            }
        };
        Self { client, vapid: Arc::new(vapid), subscriptions: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn public_key(&self) -> Option<&str> {
        self.vapid.public_key.as_deref()
    }

    /// `false` si un abonnement identique existe déjà
    pub fn register(&self, subscription: PushSubscription) -> bool {
        let mut subs = self.subscriptions.lock();
        if subs.contains(&subscription) {
            return false;
        }
        subs.push(subscription);
        tracing::info!(total = subs.len(), "push subscription stored");
        true
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    fn build_message(&self, sub: &PushSubscription, content: &[u8]) -> Result<WebPushMessage, SendError> {
        let keys = sub.keys.as_ref().ok_or(SendError::MissingKeys)?;
        let pem = self.vapid.private_pem.as_deref().ok_or(SendError::NoVapidKey)?;
        let info = SubscriptionInfo::new(sub.endpoint.as_str(), keys.p256dh.as_str(), keys.auth.as_str());

        let mut signature = VapidSignatureBuilder::from_pem(pem.as_bytes(), &info)?;
        signature.add_claim("sub", self.vapid.subject.as_str());

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_payload(ContentEncoding::Aes128Gcm, content);
        builder.set_vapid_signature(signature.build()?);
        Ok(builder.build()?)
    }

    /// Envoie à tous les abonnés et retourne le nombre d'envois réussis
    pub async fn send_all(&self, notification: &Notification) -> usize {
        let Some(client) = self.client.clone() else {
            return 0;
        };
        if self.vapid.private_pem.is_none() {
            tracing::debug!("push skipped, no VAPID key");
            return 0;
        }
        let content = match serde_json::to_vec(&PushPayload { title: &notification.title, body: &notification.body }) {
            Ok(content) => content,
            Err(e) => {
                tracing::error!(error = %e, "push payload not serializable");
                return 0;
            }
        };

        let targets = self.subscriptions.lock().clone();
        tracing::debug!(subscribers = targets.len(), "sending push notification");

        let mut delivered = 0;
        let mut expired = Vec::new();
        for sub in targets {
            let message = match self.build_message(&sub, &content) {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(endpoint = %sub.endpoint, error = %e, "push message not built");
                    continue;
                }
            };
            match client.send(message).await {
                Ok(()) => delivered += 1,
                Err(e) if is_expired(&e) => {
                    tracing::info!(endpoint = %sub.endpoint, "push subscription expired, removing");
                    expired.push(sub);
                }
                Err(e) => {
                    tracing::warn!(endpoint = %sub.endpoint, error = %e, "push delivery failed");
                }
            }
        }

        if !expired.is_empty() {
            self.subscriptions.lock().retain(|s| !expired.contains(s));
        }
        delivered
    }
}

impl Default for PushRelay {
    fn default() -> Self {
        Self::new(VapidKeys::default())
    }
}

impl NotificationSink for PushRelay {
    fn deliver(&self, notification: &Notification) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime, push notification dropped");
            return;
        };
        let relay = self.clone();
        let notification = notification.clone();
        handle.spawn(async move {
            relay.send_all(&notification).await;
        });
    }
}
