/**
 * API REST AEGISCORE - Surface HTTP du tableau de bord
 *
 * RÔLE :
 * Expose l'état réconcilié, l'historique, l'analytique et les commandes
 * opérateur au frontend. Le rendu (cartes, graphes, toasts) reste côté
 * client; cette API ne fournit que les données.
 *
 * ROUTES :
 * - GET    /health                      liveness, sans authentification
 * - GET    /system/health               compteurs et état MQTT
 * - GET    /status                      flags, attentes optimistes, dernier statut
 * - GET    /history/{date}              points bruts (`today` accepté)
 * - DELETE /history                     remise à zéro de l'historique
 * - GET    /analytics/{date}            séries + résumé + lignes (?resolution=&filter=)
 * - POST   /commands/{command}          commande opérateur après interlock
 * - POST   /commands/seen/toggle        bascule SEEN selon l'état effectif
 * - GET    /notifications?since=        fil de toasts
 * - GET|PUT /notifications/enabled      préférence de notifications système
 * - POST   /subscribe                   abonnement push
 * - GET    /vapidPublicKey              clé publique VAPID, sans authentification
 *
 * CODES :
 * - 404 commande inconnue, 409 refus d'interlock, 503 non connecté,
 *   400 paramètre invalide, 401 clé API absente ou fausse
 *
 * SÉCURITÉ :
 * - Header x-api-key obligatoire sur toutes routes sauf /health et
 *   /vapidPublicKey (donnée publique lue avant l'abonnement)
 * - Sans clé configurée, l'API protégée est fermée
 */

use crate::analytics::{DataFilter, Resolution};
use crate::clock;
use crate::engine::{CommandTransport, Dashboard, DashboardSnapshot, DayAnalytics};
use crate::health::{HealthTracker, KernelHealth};
use crate::interlock::{Command, DenialReason};
use crate::models::DataPoint;
use crate::notify::Toast;
use crate::push::{PushRelay, PushSubscription};
use crate::state::Shared;
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub dashboard: Shared<Dashboard>,
    pub commands: Arc<dyn CommandTransport>,
    pub health_tracker: HealthTracker,
    pub push: PushRelay,
    pub api_key: Option<Arc<str>>,
}

async fn require_api_key(State(app): State<AppState>, req: Request, next: Next) -> Result<Response, StatusCode> {
    // Health check et clé publique toujours accessibles
    if matches!(req.uri().path(), "/health" | "/vapidPublicKey") {
        return Ok(next.run(req).await);
    }

    let Some(expected) = app.api_key.as_deref().filter(|k| !k.is_empty()) else {
        tracing::warn!("SECURITY: AEGIS_API_KEY not set - API access denied");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let ok = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !ok {
        tracing::warn!(path = %req.uri().path(), "rejected request with bad api key");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/status", get(get_status))
        .route("/history", axum::routing::delete(reset_history))
        .route("/history/{date}", get(get_history))
        .route("/analytics/{date}", get(get_analytics))
        .route("/commands/seen/toggle", post(toggle_seen))
        .route("/commands/{command}", post(send_command))
        .route("/notifications", get(get_notifications))
        .route("/notifications/enabled", get(get_notifications_enabled).put(put_notifications_enabled))
        .route("/subscribe", post(subscribe))
        .route("/vapidPublicKey", get(get_vapid_public_key))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_api_key))
        .with_state(app_state)
}

fn resolve_date(date: &str) -> String {
    if date.eq_ignore_ascii_case("today") {
        clock::today()
    } else {
        date.to_string()
    }
}

fn denial_response(command: Command, reason: DenialReason) -> (StatusCode, Json<Value>) {
    let code = match reason {
        DenialReason::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::CONFLICT,
    };
    (
        code,
        Json(json!({ "ok": false, "command": command, "reason": reason, "message": reason.to_string() })),
    )
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    let days = app.dashboard.lock().history().days();
    Json(app.health_tracker.get_health(days, app.push.subscription_count()))
}

// GET /status
async fn get_status(State(app): State<AppState>) -> Json<DashboardSnapshot> {
    Json(app.dashboard.lock().snapshot())
}

// GET /history/{date}
async fn get_history(State(app): State<AppState>, Path(date): Path<String>) -> Json<Vec<DataPoint>> {
    let date = resolve_date(&date);
    Json(app.dashboard.lock().history_for(&date))
}

// DELETE /history
async fn reset_history(State(app): State<AppState>) -> (StatusCode, Json<Value>) {
    match app.dashboard.lock().reset_history() {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))),
        Err(e) => {
            tracing::warn!(error = %e, "history reset not persisted");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "ok": false, "msg": e.to_string() })))
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnalyticsParams {
    resolution: Option<String>,
    filter: Option<String>,
}

// GET /analytics/{date}?resolution=minute&filter=alerts
async fn get_analytics(
    State(app): State<AppState>,
    Path(date): Path<String>,
    Query(params): Query<AnalyticsParams>,
) -> Result<Json<DayAnalytics>, (StatusCode, String)> {
    let resolution = match params.resolution.as_deref() {
        Some(r) => r.parse::<Resolution>().map_err(|e| (StatusCode::BAD_REQUEST, e))?,
        None => Resolution::Raw,
    };
    let filter = match params.filter.as_deref() {
        Some(f) => f.parse::<DataFilter>().map_err(|e| (StatusCode::BAD_REQUEST, e))?,
        None => DataFilter::All,
    };
    let date = resolve_date(&date);
    Ok(Json(app.dashboard.lock().analytics(&date, resolution, filter)))
}

// POST /commands/{command}
async fn send_command(State(app): State<AppState>, Path(raw): Path<String>) -> (StatusCode, Json<Value>) {
    let command = match raw.parse::<Command>() {
        Ok(command) => command,
        Err(e) => return (StatusCode::NOT_FOUND, Json(json!({ "ok": false, "message": e.to_string() }))),
    };
    match app.dashboard.lock().submit_command(command, app.commands.as_ref()) {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true, "command": command }))),
        Err(reason) => denial_response(command, reason),
    }
}

// POST /commands/seen/toggle
async fn toggle_seen(State(app): State<AppState>) -> (StatusCode, Json<Value>) {
    match app.dashboard.lock().toggle_seen(app.commands.as_ref()) {
        Ok(command) => (StatusCode::OK, Json(json!({ "ok": true, "command": command }))),
        Err((attempted, reason)) => denial_response(attempted, reason),
    }
}

#[derive(Debug, Deserialize)]
struct SinceParams {
    since: Option<u64>,
}

// GET /notifications?since=12
async fn get_notifications(State(app): State<AppState>, Query(params): Query<SinceParams>) -> Json<Vec<Toast>> {
    let feed = app.dashboard.lock().toasts();
    Json(feed.since(params.since))
}

#[derive(Debug, Deserialize)]
struct EnabledBody {
    enabled: bool,
}

// GET /notifications/enabled
async fn get_notifications_enabled(State(app): State<AppState>) -> Json<Value> {
    Json(json!({ "enabled": app.dashboard.lock().notifications_enabled() }))
}

// PUT /notifications/enabled
async fn put_notifications_enabled(
    State(app): State<AppState>,
    Json(body): Json<EnabledBody>,
) -> (StatusCode, Json<Value>) {
    match app.dashboard.lock().set_notifications_enabled(body.enabled) {
        Ok(()) => (StatusCode::OK, Json(json!({ "enabled": body.enabled }))),
        Err(e) => {
            tracing::warn!(error = %e, "notification preference not persisted");
            (StatusCode::OK, Json(json!({ "enabled": body.enabled, "persisted": false })))
        }
    }
}

// POST /subscribe
async fn subscribe(State(app): State<AppState>, Json(sub): Json<PushSubscription>) -> (StatusCode, Json<Value>) {
    app.push.register(sub);
    (StatusCode::CREATED, Json(json!({ "message": "Subscription stored" })))
}

// GET /vapidPublicKey
async fn get_vapid_public_key(State(app): State<AppState>) -> Json<Value> {
    Json(json!({ "publicKey": app.push.public_key() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertMode;
    use crate::engine::DashboardOptions;
    use crate::ports::MemoryPort;
    use crate::push::VapidKeys;
    use crate::state::new_state;
    use crate::test_support::MockTransport;
    use aegis_devkit::StatusMessageBuilder;
    use tokio::net::TcpListener;

    const KEY: &str = "test-key";

    struct TestApi {
        base: String,
        http: reqwest::Client,
        dashboard: Shared<Dashboard>,
        transport: Arc<MockTransport>,
    }

    impl TestApi {
        fn get(&self, path: &str) -> reqwest::RequestBuilder {
            self.http.get(format!("{}{path}", self.base)).header("x-api-key", KEY)
        }

        fn post(&self, path: &str) -> reqwest::RequestBuilder {
            self.http.post(format!("{}{path}", self.base)).header("x-api-key", KEY)
        }
    }

    async fn spawn_api() -> TestApi {
        let health = HealthTracker::new();
        let dashboard = new_state(Dashboard::new(
            Arc::new(MemoryPort::new()),
            DashboardOptions { history_cap: 500, alert_mode: AlertMode::Level, toast_capacity: 50 },
            health.clone(),
        ));
        let transport = Arc::new(MockTransport::new());
        let state = AppState {
            dashboard: dashboard.clone(),
            commands: transport.clone(),
            health_tracker: health,
            push: PushRelay::new(VapidKeys {
                public_key: Some("BPubKey".into()),
                private_pem: None,
                subject: "mailto:ops@aegiscore.local".into(),
            }),
            api_key: Some(Arc::from(KEY)),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestApi { base: format!("http://{addr}"), http: reqwest::Client::new(), dashboard, transport }
    }

    #[tokio::test]
    async fn test_api_key_guard() {
        let api = spawn_api().await;
        let open = api.http.get(format!("{}/health", api.base)).send().await.unwrap();
        assert_eq!(open.status(), StatusCode::OK);

        let denied = api.http.get(format!("{}/status", api.base)).send().await.unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = api.get("/status").send().await.unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);

        let key = api.http.get(format!("{}/vapidPublicKey", api.base)).send().await.unwrap();
        assert_eq!(key.status(), StatusCode::OK);
        let body: Value = key.json().await.unwrap();
        assert_eq!(body["publicKey"], "BPubKey");
    }

    #[tokio::test]
    async fn test_command_status_codes() {
        let api = spawn_api().await;

        let offline = api.post("/commands/ARM_PIR").send().await.unwrap();
        assert_eq!(offline.status(), StatusCode::SERVICE_UNAVAILABLE);

        let unknown = api.post("/commands/SELF_DESTRUCT").send().await.unwrap();
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        {
            let mut d = api.dashboard.lock();
            d.set_connected(true);
            let status = StatusMessageBuilder::empty().set("water_sensor_enabled", false).to_payload();
            d.handle_message(&status).unwrap();
        }

        let denied = api.post("/commands/open_water_valve").send().await.unwrap();
        assert_eq!(denied.status(), StatusCode::CONFLICT);
        let body: Value = denied.json().await.unwrap();
        assert_eq!(body["reason"], "water_sensor_disabled");
        assert_eq!(body["message"], "Cannot OPEN water valve while Water Sensor is DISABLED.");

        let ok = api.post("/commands/CLOSE_WATER_VALVE").send().await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        let toggled = api.post("/commands/seen/toggle").send().await.unwrap();
        let body: Value = toggled.json().await.unwrap();
        assert_eq!(body["command"], "SEEN_ON");
        assert_eq!(api.transport.sent(), vec!["CLOSE_WATER_VALVE", "SEEN_ON"]);
    }

    #[tokio::test]
    async fn test_seen_toggle_while_disconnected() {
        let api = spawn_api().await;
        let denied = api.post("/commands/seen/toggle").send().await.unwrap();
        assert_eq!(denied.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = denied.json().await.unwrap();
        assert_eq!(body["ok"], false);
        assert_eq!(body["command"], "SEEN_ON");
        assert_eq!(body["reason"], "not_connected");
        assert!(api.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_history_and_analytics_routes() {
        let api = spawn_api().await;
        {
            let mut d = api.dashboard.lock();
            d.handle_message(&StatusMessageBuilder::quiet().gas_leak(true).to_payload()).unwrap();
        }

        let points: Vec<Value> = api.get("/history/today").send().await.unwrap().json().await.unwrap();
        assert_eq!(points.len(), 1);

        let view: Value = api
            .get("/analytics/today?resolution=day&filter=alerts")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view["series"]["labels"][0], "Day average");
        assert_eq!(view["summary"]["gas_alerts"], 1);
        assert_eq!(view["rows"].as_array().unwrap().len(), 1);

        let bad = api.get("/analytics/today?resolution=week").send().await.unwrap();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let reset = api.http.delete(format!("{}/history", api.base)).header("x-api-key", KEY).send().await.unwrap();
        assert_eq!(reset.status(), StatusCode::OK);
        let points: Vec<Value> = api.get("/history/today").send().await.unwrap().json().await.unwrap();
        assert!(points.is_empty());
    }

    #[tokio::test]
    async fn test_notifications_routes() {
        let api = spawn_api().await;
        {
            let mut d = api.dashboard.lock();
            d.handle_message(&StatusMessageBuilder::quiet().flame_leak(true).to_payload()).unwrap();
        }

        let toasts: Vec<Value> = api.get("/notifications").send().await.unwrap().json().await.unwrap();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0]["body"], "FLAME DETECTED!");
        let last = toasts[0]["id"].as_u64().unwrap();
        let fresh: Vec<Value> =
            api.get(&format!("/notifications?since={last}")).send().await.unwrap().json().await.unwrap();
        assert!(fresh.is_empty());

        let put = api
            .http
            .put(format!("{}/notifications/enabled", api.base))
            .header("x-api-key", KEY)
            .json(&json!({ "enabled": true }))
            .send()
            .await
            .unwrap();
        assert_eq!(put.status(), StatusCode::OK);
        let state: Value = api.get("/notifications/enabled").send().await.unwrap().json().await.unwrap();
        assert_eq!(state["enabled"], true);

        let sub = json!({ "endpoint": "https://push.example/abc", "expirationTime": null, "keys": { "p256dh": "k", "auth": "a" } });
        let created = api.post("/subscribe").json(&sub).send().await.unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        api.post("/subscribe").json(&sub).send().await.unwrap();
        let health: Value = api.get("/system/health").send().await.unwrap().json().await.unwrap();
        assert_eq!(health["push_subscribers"], 1);
        assert_eq!(health["messages_processed"], 1);
    }
}
