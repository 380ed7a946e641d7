/**
 * AEGISCORE KERNEL - Point d'entrée du tableau de bord sécurité
 *
 * RÔLE : Orchestration des modules : config, MQTT, moteur de réconciliation,
 * historique, notifications et API HTTP.
 *
 * ARCHITECTURE : statuts MQTT `home/status` -> moteur (un message à la fois)
 * -> toasts / push / historique ; commandes HTTP -> interlock -> `home/command`.
 */

mod alerts;
mod analytics;
mod clock;
mod config;
mod decoder;
mod engine;
mod health;
mod history;
mod http;
mod interlock;
mod models;
mod mqtt;
mod notify;
mod ports;
mod preferences;
mod push;
mod reconciler;
mod state;
#[cfg(test)]
mod test_support;

use crate::config::load_config;
use crate::engine::{Dashboard, DashboardOptions};
use crate::health::HealthTracker;
use crate::http::AppState;
use crate::mqtt::MqttCommandPublisher;
use crate::ports::{JsonFilePort, KeyValuePort, MemoryPort};
use crate::push::PushRelay;
use crate::state::new_state;

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = load_config().await;

    // data port
    let port: Arc<dyn KeyValuePort> = match JsonFilePort::new(&cfg.storage.data_dir) {
        Ok(port) => Arc::new(port),
        Err(e) => {
            tracing::error!(dir = %cfg.storage.data_dir.display(), error = %e, "data dir unusable, history will not survive restart");
            Arc::new(MemoryPort::new())
        }
    };
    tracing::info!(port = %port.info().name, location = %port.info().location, "data port ready");

    let health_tracker = HealthTracker::new();
    let push = PushRelay::new(cfg.push.vapid_keys().await);

    let dashboard = Dashboard::new(
        port,
        DashboardOptions {
            history_cap: cfg.storage.history_cap,
            alert_mode: cfg.alerts.mode,
            toast_capacity: cfg.alerts.toast_capacity,
        },
        health_tracker.clone(),
    )
    .with_push(Arc::new(push.clone()));
    let dashboard = new_state(dashboard);

    // MQTT : écoute des statuts + publication des commandes
    let (client, eventloop) = mqtt::create_mqtt_client(&cfg.mqtt);
    let commands = Arc::new(MqttCommandPublisher::new(client.clone(), cfg.mqtt.command_topic.clone()));
    mqtt::spawn_mqtt_listener(dashboard.clone(), client, eventloop, cfg.mqtt.clone(), health_tracker.clone());

    let api_key = std::env::var("AEGIS_API_KEY").ok().filter(|k| !k.is_empty());
    if api_key.is_none() {
        tracing::warn!("AEGIS_API_KEY not set, only /health will answer");
    }

    // fabrique l'état unique pour Axum
    let app_state = AppState {
        dashboard,
        commands,
        health_tracker,
        push,
        api_key: api_key.map(Arc::from),
    };

    // HTTP
    let app = http::build_router(app_state);

    let addr: SocketAddr = cfg.http.bind.parse().with_context(|| format!("invalid http.bind: {}", cfg.http.bind))?;
    let listener = TcpListener::bind(addr).await.with_context(|| format!("cannot bind {addr}"))?;
    tracing::info!("listening on http://{addr}");
    axum::serve(listener, app).await.context("http server stopped")?;
    Ok(())
}
