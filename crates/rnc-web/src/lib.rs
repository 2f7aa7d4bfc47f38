//! Axum JSON API for the taxpayer registry: lookups, ingestion status and the
//! key-protected admin trigger.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rnc_core::{
    is_valid_taxpayer_id, normalize_taxpayer_id, IngestionRun, RunStatus, TaxpayerRecord,
};
use rnc_sync::{
    maybe_build_scheduler, IngestionPipeline, IngestionService, IngestionTrigger, PgCatalog,
    StoreError, SyncConfig, TaxpayerQueries,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

pub const CRATE_NAME: &str = "rnc-web";
pub const API_NAME: &str = "DGII Contribuyentes API";
pub const API_KEY_HEADER: &str = "x-api-key";

const DEFAULT_RUN_LIMIT: i64 = 20;
const MAX_RUN_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct AppState {
    pub queries: Arc<dyn TaxpayerQueries>,
    pub trigger: Arc<dyn IngestionTrigger>,
    /// Admin routes refuse every request while this is `None`.
    pub admin_api_key: Option<String>,
    pub config: Option<SyncConfig>,
    started_at: Instant,
}

impl AppState {
    pub fn new(queries: Arc<dyn TaxpayerQueries>, trigger: Arc<dyn IngestionTrigger>) -> Self {
        Self {
            queries,
            trigger,
            admin_api_key: None,
            config: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_admin_api_key(mut self, key: impl Into<String>) -> Self {
        self.admin_api_key = Some(key.into());
        self
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = Some(config);
        self
    }
}

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    pub admin_api_key: Option<String>,
}

impl WebConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5001),
            admin_api_key: std::env::var("RNC_ADMIN_API_KEY")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        }
    }
}

/// Registry-facing shape of a taxpayer, keyed the way DGII publishes it.
#[derive(Debug, Clone, Serialize)]
pub struct ContribuyenteView {
    pub rnc: String,
    pub nombre: String,
    pub nombre_comercial: Option<String>,
    pub categoria: Option<String>,
    pub regimen_pagos: Option<String>,
    pub estado: Option<String>,
    pub actividad_economica: Option<String>,
    pub fecha_actualizacion: DateTime<Utc>,
}

impl From<TaxpayerRecord> for ContribuyenteView {
    fn from(record: TaxpayerRecord) -> Self {
        let profile = record.profile;
        Self {
            rnc: record.taxpayer_id,
            nombre: profile.name,
            nombre_comercial: profile.trade_name,
            categoria: profile.category,
            regimen_pagos: profile.payment_regime,
            estado: profile.status,
            actividad_economica: profile.economic_activity,
            fecha_actualizacion: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActualizacionView {
    pub id: i64,
    pub fecha: DateTime<Utc>,
    pub registros_procesados: u64,
    pub registros_nuevos: u64,
    pub registros_actualizados: u64,
    pub estado: RunStatus,
    pub mensaje: String,
}

impl From<IngestionRun> for ActualizacionView {
    fn from(run: IngestionRun) -> Self {
        Self {
            id: run.id,
            fecha: run.recorded_at,
            registros_procesados: run.counters.records_processed,
            registros_nuevos: run.counters.records_created,
            registros_actualizados: run.counters.records_updated,
            estado: run.status,
            mensaje: run.message,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RunsQuery {
    limit: Option<i64>,
}

pub fn app(state: AppState) -> Router {
    let state = Arc::new(state);

    let admin = Router::new()
        .route("/actualizar-db", post(admin_update_handler))
        .route("/actualizaciones", get(admin_runs_handler))
        .route("/estadisticas-sistema", get(admin_stats_handler))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_api_key,
        ));

    Router::new()
        .route("/", get(index_handler))
        .route("/api/contribuyente/{rnc}", get(taxpayer_handler))
        .route("/api/validar/{rnc}", get(validate_handler))
        .route("/api/status", get(status_handler))
        .route("/api/estadisticas", get(stats_handler))
        .nest("/admin", admin)
        .fallback(not_found_handler)
        .with_state(state)
}

/// Connects to Postgres, applies migrations, starts the optional daily job
/// and serves until the listener fails.
pub async fn serve_from_env() -> anyhow::Result<()> {
    let config = SyncConfig::from_env();
    let web = WebConfig::from_env();

    let catalog = PgCatalog::connect(&config.database_url)
        .await
        .context("connecting to DATABASE_URL")?;
    catalog.migrate().await.context("applying migrations")?;

    let pipeline = IngestionPipeline::from_config(&config)?;
    let trigger: Arc<dyn IngestionTrigger> =
        Arc::new(IngestionService::new(pipeline, catalog.clone()));
    let scheduler = maybe_build_scheduler(&config, Arc::clone(&trigger)).await?;
    if let Some(sched) = &scheduler {
        sched.start().await.context("starting scheduler")?;
    }

    let mut state = AppState::new(Arc::new(catalog), trigger).with_config(config);
    match web.admin_api_key {
        Some(key) => state = state.with_admin_api_key(key),
        None => warn!("RNC_ADMIN_API_KEY is not set; admin routes are disabled"),
    }

    let listener = TcpListener::bind((web.host.as_str(), web.port))
        .await
        .with_context(|| format!("binding {}:{}", web.host, web.port))?;
    info!(host = %web.host, port = web.port, "api listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.admin_api_key.as_deref() else {
        warn!(path = %req.uri().path(), "admin request refused: no admin key configured");
        return api_error(StatusCode::FORBIDDEN, "Acceso administrativo no configurado");
    };

    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);
    if provided != Some(expected) {
        warn!(path = %req.uri().path(), "admin request refused: bad api key");
        return api_error(StatusCode::UNAUTHORIZED, "Clave de API inválida o ausente");
    }

    next.run(req).await
}

async fn index_handler() -> Json<serde_json::Value> {
    Json(json!({
        "api": API_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/api/contribuyente/{rnc}",
            "/api/validar/{rnc}",
            "/api/status",
            "/api/estadisticas",
        ],
    }))
}

async fn taxpayer_handler(
    State(state): State<Arc<AppState>>,
    Path(rnc): Path<String>,
) -> Response {
    let rnc = normalize_taxpayer_id(&rnc);
    if !is_valid_taxpayer_id(&rnc) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "El RNC debe tener 9 u 11 dígitos",
                "rnc": rnc,
                "status": "error",
            })),
        )
            .into_response();
    }

    match state.queries.taxpayer_by_key(&rnc).await {
        Ok(Some(record)) => Json(json!({
            "contribuyente": ContribuyenteView::from(record),
            "status": "success",
        }))
        .into_response(),
        Ok(None) => {
            info!(%rnc, "taxpayer not found");
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Contribuyente no encontrado", "rnc": rnc })),
            )
                .into_response()
        }
        Err(err) => store_error(err),
    }
}

async fn validate_handler(
    State(state): State<Arc<AppState>>,
    Path(rnc): Path<String>,
) -> Response {
    let rnc = normalize_taxpayer_id(&rnc);
    if !is_valid_taxpayer_id(&rnc) {
        return Json(json!({
            "valido": false,
            "registrado": false,
            "error": "El RNC debe tener 9 u 11 dígitos",
            "rnc": rnc,
            "status": "error",
        }))
        .into_response();
    }

    match state.queries.taxpayer_by_key(&rnc).await {
        Ok(Some(record)) => Json(json!({
            "valido": true,
            "registrado": true,
            "contribuyente": ContribuyenteView::from(record),
            "status": "success",
        }))
        .into_response(),
        Ok(None) => Json(json!({
            "valido": true,
            "registrado": false,
            "rnc": rnc,
            "status": "warning",
        }))
        .into_response(),
        Err(err) => store_error(err),
    }
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Response {
    let latest = match state.queries.recent_runs(1).await {
        Ok(runs) => runs.into_iter().next(),
        Err(err) => return store_error(err),
    };
    let total = match state.queries.taxpayer_count().await {
        Ok(total) => total,
        Err(err) => return store_error(err),
    };

    match latest {
        Some(run) => Json(json!({
            "ultima_actualizacion": ActualizacionView::from(run),
            "total_contribuyentes": total,
            "status": "success",
        }))
        .into_response(),
        None => Json(json!({
            "mensaje": "No se ha realizado ninguna actualización",
            "total_contribuyentes": total,
            "status": "warning",
        }))
        .into_response(),
    }
}

async fn stats_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.queries.taxpayer_stats().await {
        Ok(stats) => {
            let top: Vec<_> = stats
                .top_activities
                .into_iter()
                .map(|a| json!({ "actividad_economica": a.activity, "total": a.total }))
                .collect();
            Json(json!({
                "estadisticas": {
                    "por_estado": stats.by_status,
                    "por_regimen": stats.by_payment_regime,
                    "top_actividades": top,
                },
                "total_contribuyentes": stats.total,
                "status": "success",
            }))
            .into_response()
        }
        Err(err) => store_error(err),
    }
}

async fn admin_update_handler(State(state): State<Arc<AppState>>) -> Response {
    info!("manual ingestion run requested");
    match state.trigger.trigger().await {
        Ok(outcome) => {
            let code = if outcome.is_success() {
                StatusCode::OK
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (code, Json(outcome)).into_response()
        }
        Err(err) => {
            error!(error = %err, "manual ingestion run not recorded");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": err.to_string() })),
            )
                .into_response()
        }
    }
}

async fn admin_runs_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RunsQuery>,
) -> Response {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RUN_LIMIT)
        .clamp(1, MAX_RUN_LIMIT);
    match state.queries.recent_runs(limit).await {
        Ok(runs) => Json(json!({
            "actualizaciones": runs.into_iter().map(ActualizacionView::from).collect::<Vec<_>>(),
            "limit": limit,
            "status": "success",
        }))
        .into_response(),
        Err(err) => store_error(err),
    }
}

async fn admin_stats_handler(State(state): State<Arc<AppState>>) -> Response {
    let latest = match state.queries.recent_runs(1).await {
        Ok(runs) => runs.into_iter().next().map(ActualizacionView::from),
        Err(err) => return store_error(err),
    };
    let total = match state.queries.taxpayer_count().await {
        Ok(total) => total,
        Err(err) => return store_error(err),
    };

    Json(json!({
        "estado": "activo",
        "version_api": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "ultima_actualizacion": latest,
        "total_contribuyentes": total,
        "configuracion": state.config,
    }))
    .into_response()
}

async fn not_found_handler(req: Request) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Endpoint no encontrado",
            "path": req.uri().path(),
            "status": "error",
        })),
    )
        .into_response()
}

fn api_error(code: StatusCode, message: &str) -> Response {
    (code, Json(json!({ "error": message, "status": "error" }))).into_response()
}

fn store_error(err: StoreError) -> Response {
    error!(error = %err, "store query failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Error interno del servidor")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use chrono::TimeZone;
    use http_body_util::BodyExt;
    use rnc_core::{RunCounters, TaxpayerProfile};
    use rnc_sync::{record_run, LedgerError, MemoryStore, SessionSource};
    use tower::ServiceExt;
    use uuid::Uuid;

    /// Records a fixed outcome in the shared store instead of downloading.
    struct StubTrigger {
        store: MemoryStore,
        status: RunStatus,
    }

    #[async_trait]
    impl IngestionTrigger for StubTrigger {
        async fn trigger(&self) -> Result<rnc_core::RunOutcome, LedgerError> {
            let counters = RunCounters {
                records_processed: 3,
                records_created: 2,
                records_updated: 1,
            };
            let message = match self.status {
                RunStatus::Success => rnc_sync::SUCCESS_MESSAGE.to_string(),
                RunStatus::Error => "error downloading archive: timed out".to_string(),
            };
            let mut session = self.store.session();
            record_run(&mut session, Uuid::new_v4(), counters, self.status, message).await
        }
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.seed(
            "131123456",
            TaxpayerProfile {
                name: "ACME SRL".into(),
                trade_name: Some("ACME".into()),
                status: Some("ACTIVO".into()),
                payment_regime: Some("NORMAL".into()),
                ..TaxpayerProfile::default()
            },
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().expect("valid timestamp"),
        );
        store
    }

    fn test_app(store: &MemoryStore, status: RunStatus, key: Option<&str>) -> Router {
        let trigger = StubTrigger {
            store: store.session(),
            status,
        };
        let mut state = AppState::new(Arc::new(store.session()), Arc::new(trigger));
        if let Some(key) = key {
            state = state.with_admin_api_key(key);
        }
        app(state)
    }

    async fn send(app: Router, req: HttpRequest<Body>) -> (StatusCode, serde_json::Value) {
        let resp = app.oneshot(req).await.expect("response");
        let status = resp.status();
        let body = resp.into_body().collect().await.expect("body").to_bytes();
        (status, serde_json::from_slice(&body).expect("json body"))
    }

    fn get(uri: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    fn admin(method: &str, uri: &str, key: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder.body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn index_lists_public_endpoints() {
        let store = MemoryStore::new();
        let (status, body) = send(test_app(&store, RunStatus::Success, None), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["api"], API_NAME);
        assert!(body["endpoints"].as_array().expect("endpoint list").len() >= 3);
    }

    #[tokio::test]
    async fn lookup_normalizes_hyphenated_ids() {
        let store = seeded_store();
        let (status, body) = send(
            test_app(&store, RunStatus::Success, None),
            get("/api/contribuyente/131-12345-6"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["contribuyente"]["rnc"], "131123456");
        assert_eq!(body["contribuyente"]["nombre"], "ACME SRL");
        assert_eq!(body["contribuyente"]["nombre_comercial"], "ACME");
        assert_eq!(body["contribuyente"]["categoria"], serde_json::Value::Null);
        assert_eq!(body["contribuyente"]["regimen_pagos"], "NORMAL");
    }

    #[tokio::test]
    async fn lookup_reports_missing_and_malformed_ids() {
        let store = seeded_store();
        let app = test_app(&store, RunStatus::Success, None);

        let (status, body) = send(app.clone(), get("/api/contribuyente/401000002")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["rnc"], "401000002");

        let (status, _) = send(app, get("/api/contribuyente/12AB")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn validate_distinguishes_registered_ids() {
        let store = seeded_store();
        let app = test_app(&store, RunStatus::Success, None);

        let (_, known) = send(app.clone(), get("/api/validar/131123456")).await;
        assert_eq!(known["valido"], true);
        assert_eq!(known["registrado"], true);

        let (_, unknown) = send(app.clone(), get("/api/validar/00112345678")).await;
        assert_eq!(unknown["valido"], true);
        assert_eq!(unknown["registrado"], false);

        let (_, bad) = send(app, get("/api/validar/1234")).await;
        assert_eq!(bad["valido"], false);
    }

    #[tokio::test]
    async fn status_warns_until_a_run_is_recorded() {
        let store = seeded_store();
        let (_, body) = send(test_app(&store, RunStatus::Success, None), get("/api/status")).await;
        assert_eq!(body["status"], "warning");
        assert_eq!(body["total_contribuyentes"], 1);

        let (status, _) = send(
            test_app(&store, RunStatus::Success, Some("secret")),
            admin("POST", "/admin/actualizar-db", Some("secret")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(test_app(&store, RunStatus::Success, None), get("/api/status")).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["ultima_actualizacion"]["registros_nuevos"], 2);
        assert_eq!(body["ultima_actualizacion"]["estado"], "success");
    }

    #[tokio::test]
    async fn admin_routes_require_the_configured_key() {
        let store = MemoryStore::new();

        let (status, _) = send(
            test_app(&store, RunStatus::Success, None),
            admin("POST", "/admin/actualizar-db", Some("anything")),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            test_app(&store, RunStatus::Success, Some("secret")),
            admin("POST", "/admin/actualizar-db", None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            test_app(&store, RunStatus::Success, Some("secret")),
            admin("GET", "/admin/actualizaciones", Some("wrong")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(store.runs().is_empty());
    }

    #[tokio::test]
    async fn manual_trigger_returns_the_ledger_outcome() {
        let store = MemoryStore::new();
        let (status, body) = send(
            test_app(&store, RunStatus::Success, Some("secret")),
            admin("POST", "/admin/actualizar-db", Some("secret")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["records_processed"], 3);
        assert_eq!(body["records_created"], 2);
        assert_eq!(body["records_updated"], 1);
        assert!(body["run_id"].is_string());
        assert_eq!(store.runs().len(), 1);
    }

    #[tokio::test]
    async fn failed_trigger_answers_500_with_the_same_shape() {
        let store = MemoryStore::new();
        let (status, body) = send(
            test_app(&store, RunStatus::Error, Some("secret")),
            admin("POST", "/admin/actualizar-db", Some("secret")),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().expect("message").contains("downloading"));
        assert_eq!(store.runs()[0].status, RunStatus::Error);
    }

    #[tokio::test]
    async fn unrecorded_trigger_is_a_500() {
        let store = MemoryStore::new();
        store.fail_ledger_appends(true);
        let (status, body) = send(
            test_app(&store, RunStatus::Success, Some("secret")),
            admin("POST", "/admin/actualizar-db", Some("secret")),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn ledger_listing_is_newest_first_and_clamped() {
        let store = MemoryStore::new();
        let app = test_app(&store, RunStatus::Success, Some("secret"));
        for _ in 0..3 {
            send(app.clone(), admin("POST", "/admin/actualizar-db", Some("secret"))).await;
        }

        let (status, body) = send(
            app.clone(),
            admin("GET", "/admin/actualizaciones?limit=2", Some("secret")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let rows = body["actualizaciones"].as_array().expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], 3);
        assert_eq!(rows[1]["id"], 2);

        let (_, body) = send(
            app,
            admin("GET", "/admin/actualizaciones?limit=500", Some("secret")),
        )
        .await;
        assert_eq!(body["limit"], MAX_RUN_LIMIT);
        assert_eq!(body["actualizaciones"].as_array().expect("rows").len(), 3);
    }

    #[tokio::test]
    async fn system_stats_report_latest_run_and_totals() {
        let store = seeded_store();
        let (_, body) = send(
            test_app(&store, RunStatus::Success, Some("secret")),
            admin("GET", "/admin/estadisticas-sistema", Some("secret")),
        )
        .await;
        assert_eq!(body["estado"], "activo");
        assert_eq!(body["total_contribuyentes"], 1);
        assert_eq!(body["ultima_actualizacion"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn dataset_stats_group_status_regime_and_activity() {
        let store = seeded_store();
        let at = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).single().expect("valid timestamp");
        for (id, status, regime, activity) in [
            ("401000002", "ACTIVO", "NORMAL", "COMERCIO"),
            ("401000003", "SUSPENDIDO", "PST", "COMERCIO"),
            ("401000004", "ACTIVO", "", "TRANSPORTE"),
        ] {
            store.seed(
                id,
                TaxpayerProfile {
                    name: format!("TAXPAYER {id}"),
                    status: Some(status.into()),
                    payment_regime: Some(regime.into()),
                    economic_activity: Some(activity.into()),
                    ..TaxpayerProfile::default()
                },
                at,
            );
        }

        let (status, body) =
            send(test_app(&store, RunStatus::Success, None), get("/api/estadisticas")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["total_contribuyentes"], 4);

        let stats = &body["estadisticas"];
        assert_eq!(stats["por_estado"]["ACTIVO"], 3);
        assert_eq!(stats["por_estado"]["SUSPENDIDO"], 1);
        assert_eq!(stats["por_regimen"]["NORMAL"], 2);
        assert_eq!(stats["por_regimen"]["PST"], 1);
        assert_eq!(stats["por_regimen"].as_object().expect("regimes").len(), 2);

        let top = stats["top_actividades"].as_array().expect("activities");
        assert_eq!(top.len(), 2);
        assert_eq!(top[0]["actividad_economica"], "COMERCIO");
        assert_eq!(top[0]["total"], 2);
        assert_eq!(top[1]["actividad_economica"], "TRANSPORTE");
    }

    #[tokio::test]
    async fn unknown_routes_answer_json_404() {
        let store = MemoryStore::new();
        let (status, body) =
            send(test_app(&store, RunStatus::Success, None), get("/api/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["path"], "/api/nope");
    }
}
