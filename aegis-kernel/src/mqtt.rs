use crate::config::MqttConf;
use crate::engine::{CommandTransport, Dashboard};
use crate::health::HealthTracker;
use crate::interlock::Command;
use crate::state::Shared;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, Incoming, MqttOptions, QoS, Transport};
use std::time::Duration;
use tokio::task;

/// Identifiant client unique par processus, ex. `aegiscore_web_3f9a1c2e`
pub fn client_id(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}{}", &suffix[..8])
}

/// Adresse passée à rumqttc: l'hôte seul en TCP, l'URL complète en websocket
pub fn broker_address(cfg: &MqttConf) -> String {
    match &cfg.websocket_path {
        Some(path) => {
            let scheme = if cfg.tls { "wss" } else { "ws" };
            format!("{scheme}://{}:{}{path}", cfg.host, cfg.port)
        }
        None => cfg.host.clone(),
    }
}

pub fn mqtt_options(cfg: &MqttConf) -> MqttOptions {
    let mut opts = MqttOptions::new(client_id(&cfg.client_id_prefix), broker_address(cfg), cfg.port);
    opts.set_keep_alive(Duration::from_secs(cfg.keep_alive_secs.max(5)));
    opts.set_clean_session(true);
    if let Some(user) = &cfg.username {
        opts.set_credentials(user, cfg.password.clone().unwrap_or_default());
    }
    if cfg.websocket_path.is_some() {
        opts.set_transport(if cfg.tls { Transport::wss_with_default_config() } else { Transport::Ws });
    } else if cfg.tls {
        opts.set_transport(Transport::tls_with_default_config());
    }
    opts
}

pub fn create_mqtt_client(cfg: &MqttConf) -> (AsyncClient, EventLoop) {
    AsyncClient::new(mqtt_options(cfg), 10)
}

/// Publication fire-and-forget sur le topic de commande
#[derive(Clone)]
pub struct MqttCommandPublisher {
    client: AsyncClient,
    topic: String,
}

impl MqttCommandPublisher {
    pub fn new(client: AsyncClient, topic: impl Into<String>) -> Self {
        Self { client, topic: topic.into() }
    }
}

impl CommandTransport for MqttCommandPublisher {
    fn send(&self, command: Command) -> anyhow::Result<()> {
        self.client.try_publish(self.topic.as_str(), QoS::AtMostOnce, false, command.as_str())?;
        Ok(())
    }
}

/// Évènement de la boucle MQTT, réduit à ce que le tableau de bord consomme
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Connected,
    Message { topic: String, payload: Vec<u8> },
    Disconnected,
    Failed(String),
    Other,
}

impl LinkEvent {
    pub fn from_poll(polled: Result<Event, ConnectionError>) -> Self {
        match polled {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => LinkEvent::Connected,
            Ok(Event::Incoming(Incoming::Publish(p))) => LinkEvent::Message { topic: p.topic, payload: p.payload.to_vec() },
            Ok(Event::Incoming(Incoming::Disconnect)) => LinkEvent::Disconnected,
            Ok(_) => LinkEvent::Other,
            Err(e) => LinkEvent::Failed(e.to_string()),
        }
    }
}

/// Suite à donner par la boucle après un évènement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    Continue,
    Subscribe,
    Backoff,
}

pub fn handle_link_event(
    dashboard: &Shared<Dashboard>,
    health: &HealthTracker,
    status_topic: &str,
    event: LinkEvent,
) -> LinkAction {
    match event {
        LinkEvent::Connected => {
            dashboard.lock().set_connected(true);
            // session propre: on se réabonne à chaque connexion
            LinkAction::Subscribe
        }
        LinkEvent::Message { topic, payload } => {
            if topic != status_topic {
                tracing::debug!(%topic, "message on foreign topic ignored");
                return LinkAction::Continue;
            }
            match std::str::from_utf8(&payload) {
                Ok(txt) => {
                    // rejet déjà journalisé par le moteur
                    let _ = dashboard.lock().handle_message(txt);
                }
                Err(_) => {
                    health.record_rejected();
                    tracing::warn!(bytes = payload.len(), "non UTF-8 status payload ignored");
                }
            }
            LinkAction::Continue
        }
        LinkEvent::Disconnected => {
            dashboard.lock().set_connected(false);
            LinkAction::Continue
        }
        LinkEvent::Failed(error) => {
            tracing::error!(%error, "MQTT connection error");
            dashboard.lock().set_connected(false);
            health.increment_reconnects();
            LinkAction::Backoff
        }
        LinkEvent::Other => LinkAction::Continue,
    }
}

pub fn spawn_mqtt_listener(
    dashboard: Shared<Dashboard>,
    client: AsyncClient,
    mut eventloop: EventLoop,
    cfg: MqttConf,
    health: HealthTracker,
) {
    task::spawn(async move {
        let retry = Duration::from_secs(cfg.reconnect_secs.max(1));
        loop {
            let event = LinkEvent::from_poll(eventloop.poll().await);
            match handle_link_event(&dashboard, &health, &cfg.status_topic, event) {
                LinkAction::Subscribe => {
                    tracing::info!(host = %cfg.host, port = cfg.port, "MQTT connected");
                    if let Err(e) = client.try_subscribe(cfg.status_topic.as_str(), QoS::AtMostOnce) {
                        tracing::error!(topic = %cfg.status_topic, error = %e, "MQTT subscribe failed");
                    }
                }
                LinkAction::Backoff => tokio::time::sleep(retry).await,
                LinkAction::Continue => {}
            }
        }
    });
}
