use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use climate_common::{DashboardConfig, Device, Gateway, Notice, ServiceAccount, TimeDisplay};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::{
    backend::{demo_store, Backend},
    control::ControlView,
    firebase::FirebaseStore,
    history::HistoryView,
    settings::{self, is_truthy},
};

const DEMO_LOG_ENTRIES: usize = 40;

struct Dashboard {
    history: Arc<HistoryView<Backend>>,
    control: ControlView<Backend>,
}

#[derive(Clone)]
enum Setup {
    Ready(Arc<Dashboard>),
    /// Credentials were missing or malformed; every API call reports this.
    Failed(Arc<str>),
}

#[derive(Clone)]
struct AppState {
    setup: Setup,
    settings: SettingsView,
}

#[derive(Debug, Clone, Serialize)]
struct SettingsView {
    configured: bool,
    error: Option<String>,
    backend: &'static str,
    live: bool,
    #[serde(rename = "refreshIntervalMs")]
    refresh_interval_ms: u64,
    #[serde(rename = "historyLimit")]
    history_limit: usize,
    /// Startup outcome shown once by the page.
    notices: Vec<Notice>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = settings::config_path();
    let mut config = settings::load_config(&config_path)
        .await
        .unwrap_or_else(|err| {
            warn!("failed to load dashboard config: {err:#}");
            DashboardConfig::default()
        });
    settings::apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.sanitize();

    let app_state = match connect_backend(&config) {
        Ok(backend) => AppState::ready(backend, &config),
        Err(err) => {
            error!("dashboard halted, store is not configured: {err:#}");
            AppState::failed(format!("{err:#}"), &config)
        }
    };

    if let Setup::Ready(dashboard) = &app_state.setup {
        if dashboard.history.spawn_refresh_loop().is_some() {
            info!(
                "history refresh loop running every {} ms",
                config.history.refresh.interval_ms
            );
        }
    }

    let web_root = format!("{}/web", env!("CARGO_MANIFEST_DIR"));
    let app = router(app_state).fallback_service(ServeDir::new(web_root));

    let port = config.server.http_port;
    let addr: SocketAddr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind dashboard server at {addr}"))?;

    info!("dashboard listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/settings", get(handle_get_settings))
        .route("/api/history", get(handle_get_history))
        .route("/api/control", get(handle_get_control))
        .route("/api/control/{device}", post(handle_post_toggle))
        .with_state(app_state)
}

fn connect_backend(config: &DashboardConfig) -> anyhow::Result<Backend> {
    if std::env::var("DASHBOARD_DEMO").is_ok_and(|value| is_truthy(&value)) {
        info!("running against the seeded demo store");
        return Ok(Backend::Demo(demo_store(DEMO_LOG_ENTRIES)));
    }

    let account = ServiceAccount::from_secrets(|key| std::env::var(key).ok())
        .context("Missing or malformed Firebase credentials")?;
    let database_url = config.database_url_for(&account.project_id);
    let store = FirebaseStore::connect(&database_url, account)
        .context("Failed to initialize Firebase")?;

    info!(
        "Firebase connected: {} as {}",
        store.base_url(),
        store.account().client_email
    );
    Ok(Backend::Firebase(store))
}

impl AppState {
    fn ready(backend: Backend, config: &DashboardConfig) -> Self {
        let (backend_name, connected) = match backend {
            Backend::Firebase(_) => ("firebase", Notice::success("Firebase connected successfully!")),
            Backend::Demo(_) => (
                "demo",
                Notice::info("Showing seeded demo data, no Firebase connection."),
            ),
        };
        let gateway = Arc::new(Gateway::new(backend));
        let dashboard = Dashboard {
            history: Arc::new(HistoryView::new(
                Arc::clone(&gateway),
                config.history.clone(),
                TimeDisplay::new(&config.display),
            )),
            control: ControlView::new(gateway, config.control.clone()),
        };

        Self {
            setup: Setup::Ready(Arc::new(dashboard)),
            settings: SettingsView::new(config, backend_name, None, vec![connected]),
        }
    }

    fn failed(message: String, config: &DashboardConfig) -> Self {
        Self {
            settings: SettingsView::new(config, "none", Some(message.clone()), Vec::new()),
            setup: Setup::Failed(Arc::from(message)),
        }
    }

    fn dashboard(&self) -> Result<Arc<Dashboard>, Response> {
        match &self.setup {
            Setup::Ready(dashboard) => Ok(Arc::clone(dashboard)),
            Setup::Failed(message) => Err(error_response(StatusCode::SERVICE_UNAVAILABLE, message)),
        }
    }
}

impl SettingsView {
    fn new(
        config: &DashboardConfig,
        backend: &'static str,
        error: Option<String>,
        notices: Vec<Notice>,
    ) -> Self {
        Self {
            configured: error.is_none(),
            error,
            backend,
            live: config.history.refresh.live,
            refresh_interval_ms: config.history.refresh.interval_ms,
            history_limit: config.history.limit,
            notices,
        }
    }
}

async fn handle_get_settings(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.settings)
}

async fn handle_get_history(State(state): State<AppState>) -> Response {
    match state.dashboard() {
        Ok(dashboard) => Json(dashboard.history.render().await).into_response(),
        Err(response) => response,
    }
}

async fn handle_get_control(State(state): State<AppState>) -> Response {
    match state.dashboard() {
        Ok(dashboard) => Json(dashboard.control.render().await).into_response(),
        Err(response) => response,
    }
}

async fn handle_post_toggle(
    State(state): State<AppState>,
    Path(device): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let dashboard = match state.dashboard() {
        Ok(dashboard) => dashboard,
        Err(response) => return response,
    };

    let Some(device) = Device::parse(&device) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Unknown device. Use 'light' or 'relay'",
        );
    };
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Some(requested) = parse_requested(value) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid value. Use 'true' or 'false'",
        );
    };

    Json(dashboard.control.toggle(device, requested).await).into_response()
}

fn parse_requested(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" => Some(true),
        "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
