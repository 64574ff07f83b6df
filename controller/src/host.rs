use std::{
    collections::HashMap,
    io::BufRead,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, OnceLock},
    thread,
    time::Instant,
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

use irgate_common::{config::parse_hex_code, GatewayConfig, RemoteEvent};

use crate::{
    device::{DeviceControl, HostDevice},
    gateway::{Disposition, Gateway, SystemClock},
    senders::{resolve_endpoint, TcpSender, UdpSender},
    store::{ConfigSource, ConfigStore},
};

#[derive(Clone)]
struct AppState {
    gateway: Arc<Mutex<Gateway>>,
    store: Arc<ConfigStore>,
    /// Configuration the senders were built from; its endpoints stay in use
    /// until restart.
    bound: Arc<GatewayConfig>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct EventResponse {
    result: &'static str,
    accepted: bool,
    sent: bool,
}

#[derive(Debug, Serialize)]
struct ConfigUpdateResponse {
    #[serde(rename = "restartRequired")]
    restart_required: bool,
    config: GatewayConfig,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("starting");

    let store = Arc::new(ConfigStore::from_env());
    let config = store.load().unwrap_or_else(|err| {
        warn!("failed to load config from {}: {err:#}", store.path().display());
        GatewayConfig::default()
    });
    if let Err(err) = config.validate() {
        warn!("config problem: {err}");
    }
    log_time_status(&config);

    let device: Arc<dyn DeviceControl> = Arc::new(HostDevice);
    let udp = UdpSender::new(resolve_endpoint(&config.gira_endpoint())?, device.clone());
    let tcp = TcpSender::new(resolve_endpoint(&config.marantz_endpoint())?, device);
    info!(
        "panel at {} (UDP), receiver at {} (TCP), volume target {}",
        udp.destination(),
        tcp.destination(),
        config.volume_target.as_str()
    );

    let source: Arc<dyn ConfigSource> = store.clone();
    let gateway = Arc::new(Mutex::new(Gateway::new(
        source,
        Box::new(SystemClock),
        udp,
        tcp,
    )));

    spawn_decode_reader(gateway.clone())?;

    let app_state = AppState {
        gateway,
        store,
        bound: Arc::new(config),
    };
    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/simulate", post(handle_simulate))
        .route("/api/ir", post(handle_ir))
        .route("/api/config", get(handle_get_config).put(handle_put_config))
        .with_state(app_state);

    let port = std::env::var("IRGATE_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind control interface at {addr}"))?;

    info!("control interface listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Decoded codes arrive one per line, hexadecimal, on stdin.
fn spawn_decode_reader(gateway: Arc<Mutex<Gateway>>) -> anyhow::Result<()> {
    thread::Builder::new()
        .name("ir-decode".into())
        .spawn(move || {
            info!("listening for decoded codes");
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        warn!("decoder input error: {err}");
                        break;
                    }
                };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_hex_code(trimmed) {
                    Ok(code) => {
                        lock_gateway(&gateway)
                            .handle_event(RemoteEvent::NumericCode(code), monotonic_ms());
                    }
                    Err(err) => warn!("ignoring decoder input: {err}"),
                }
            }
            info!("decoder input closed");
        })
        .context("failed to spawn decode thread")?;
    Ok(())
}

fn log_time_status(config: &GatewayConfig) {
    if !config.ntp_time_status {
        info!("time sync disabled, daily mute reset off");
        return;
    }

    match config.local_now(Utc::now()) {
        Some(local) => info!(
            "local time {} ({})",
            local.format("%Y-%m-%d %H:%M:%S"),
            config.timezone
        ),
        None => warn!(
            "timezone `{}` did not resolve, daily mute reset off",
            config.timezone
        ),
    }
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let gateway = state.gateway.clone();
    match run_blocking(move || lock_gateway(&gateway).status(monotonic_ms())).await {
        Ok(status) => Json(status).into_response(),
        Err(response) => response,
    }
}

async fn handle_simulate(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(key) = params.get("key").cloned() else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'key' parameter");
    };

    submit_event(&state, RemoteEvent::SymbolicKey(key)).await
}

async fn handle_ir(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("code") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'code' parameter");
    };
    let Ok(code) = parse_hex_code(value) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid hexadecimal code");
    };

    submit_event(&state, RemoteEvent::NumericCode(code)).await
}

async fn handle_get_config(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.clone();
    match run_blocking(move || store.current()).await {
        Ok(config) => Json(config).into_response(),
        Err(response) => response,
    }
}

async fn handle_put_config(
    State(state): State<AppState>,
    Json(mut update): Json<GatewayConfig>,
) -> impl IntoResponse {
    update.sanitize();
    if let Err(err) = update.validate() {
        return error_response(StatusCode::BAD_REQUEST, &err.to_string());
    }

    let store = state.store.clone();
    let bound = state.bound.clone();
    let result = run_blocking(move || {
        store.save(&update).map(|()| ConfigUpdateResponse {
            restart_required: bound.endpoints_changed(&update),
            config: update,
        })
    })
    .await;

    match result {
        Ok(Ok(payload)) => Json(payload).into_response(),
        Ok(Err(err)) => {
            warn!("failed to persist config update: {err:#}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to persist configuration",
            )
        }
        Err(response) => response,
    }
}

async fn submit_event(state: &AppState, event: RemoteEvent) -> axum::response::Response {
    let gateway = state.gateway.clone();
    let disposition =
        run_blocking(move || lock_gateway(&gateway).handle_event(event, monotonic_ms())).await;

    match disposition {
        Ok(disposition) => Json(EventResponse {
            result: disposition.as_str(),
            accepted: !matches!(
                disposition,
                Disposition::Unrecognized | Disposition::UnknownKey
            ),
            sent: disposition.sent(),
        })
        .into_response(),
        Err(response) => response,
    }
}

/// Sends block for up to their socket timeouts, so gateway work stays off the
/// async workers.
async fn run_blocking<T, F>(work: F) -> Result<T, axum::response::Response>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|err| {
        warn!("gateway task failed: {err}");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Gateway task failed")
    })
}

fn lock_gateway(gateway: &Mutex<Gateway>) -> MutexGuard<'_, Gateway> {
    gateway.lock().unwrap_or_else(|e| e.into_inner())
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::Value;

    use super::*;
    use crate::device::testing::RecordingDevice;

    fn app_state(name: &str) -> AppState {
        let dir = std::env::temp_dir().join(format!("irgate-host-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let store = Arc::new(ConfigStore::new(dir.join("config.json")));

        let bound = GatewayConfig {
            gira_ip: "10.0.0.5".to_string(),
            ..GatewayConfig::default()
        };
        let device: Arc<dyn DeviceControl> = Arc::new(RecordingDevice::default());
        let discard = SocketAddr::from(([127, 0, 0, 1], 9));
        let source: Arc<dyn ConfigSource> = store.clone();
        let gateway = Gateway::new(
            source,
            Box::new(SystemClock),
            UdpSender::new(discard, device.clone()),
            TcpSender::new(discard, device),
        );

        AppState {
            gateway: Arc::new(Mutex::new(gateway)),
            store,
            bound: Arc::new(bound),
        }
    }

    async fn put_config(state: &AppState, update: GatewayConfig) -> Value {
        let response = handle_put_config(State(state.clone()), Json(update))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn restart_stays_required_until_endpoints_match_startup() {
        let state = app_state("restart");
        let moved = GatewayConfig {
            gira_ip: "10.0.0.9".to_string(),
            ..GatewayConfig::default()
        };

        let first = put_config(&state, moved.clone()).await;
        assert_eq!(first["restartRequired"], true);

        let second = put_config(
            &state,
            GatewayConfig {
                volume_target: irgate_common::VolumeTarget::Marantz,
                ..moved
            },
        )
        .await;
        assert_eq!(second["restartRequired"], true);
        assert_eq!(second["config"]["VOLUME_TARGET"], "MARANTZ");

        let back = put_config(
            &state,
            GatewayConfig {
                gira_ip: "10.0.0.5".to_string(),
                ..GatewayConfig::default()
            },
        )
        .await;
        assert_eq!(back["restartRequired"], false);
    }

    #[tokio::test]
    async fn invalid_config_update_is_rejected() {
        let state = app_state("invalid");
        let update = GatewayConfig {
            timezone: "Mars/Olympus".to_string(),
            ..GatewayConfig::default()
        };

        let response = handle_put_config(State(state), Json(update))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
