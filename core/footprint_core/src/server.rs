use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::{
    engine::EngineHandle,
    message::{Message, Rejection, Reply},
    timer::BrowserSignal,
};

pub const DEFAULT_PORT: u16 = 17700;

#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
}

#[derive(Serialize)]
struct OkResponse<T: Serialize> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

#[derive(Serialize)]
struct ErrResponse {
    ok: bool,
    error: &'static str,
}

fn err(status: StatusCode, error: &'static str) -> Response {
    (status, Json(ErrResponse { ok: false, error })).into_response()
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/signal", post(post_signal).options(options_ok))
        .route("/message", post(post_message).options(options_ok))
        .with_state(state)
        .layer(cors)
}

fn listen_host(host: &str) -> Option<IpAddr> {
    match host {
        "localhost" => Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        _ => host.parse().ok(),
    }
}

/// Accepts `ip:port`, a bare ip or `localhost` (port 17700), or `localhost:port`.
pub fn parse_listen(input: &str) -> anyhow::Result<SocketAddr> {
    let input = input.trim();
    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Some(ip) = listen_host(input) {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    let (host, port) = input.rsplit_once(':').with_context(|| {
        format!("invalid --listen '{input}': expected ip[:port] or localhost[:port]")
    })?;
    let ip = listen_host(host)
        .with_context(|| format!("invalid --listen '{input}': unknown host '{host}'"))?;
    let port: u16 = port
        .parse()
        .with_context(|| format!("invalid --listen '{input}': bad port '{port}'"))?;
    Ok(SocketAddr::new(ip, port))
}

pub async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}

async fn options_ok() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Serialize)]
struct HealthInfo {
    service: &'static str,
    version: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(OkResponse {
        ok: true,
        data: Some(HealthInfo {
            service: "footprint_core",
            version: env!("CARGO_PKG_VERSION"),
        }),
    })
}

async fn post_signal(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Ok(Json(payload)) = payload else {
        return err(StatusCode::BAD_REQUEST, "invalid_json");
    };
    let signal: BrowserSignal = match serde_json::from_value(payload) {
        Ok(v) => v,
        Err(e) => {
            warn!("bad signal: {e}");
            return err(StatusCode::BAD_REQUEST, "invalid_signal");
        }
    };

    match state.engine.signal(signal).await {
        Ok(()) => Json(OkResponse::<()> { ok: true, data: None }).into_response(),
        Err(_) => err(StatusCode::SERVICE_UNAVAILABLE, "engine_unavailable"),
    }
}

async fn post_message(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Ok(Json(payload)) = payload else {
        return err(StatusCode::BAD_REQUEST, "invalid_json");
    };
    let is_settings = payload.get("type").and_then(Value::as_str) == Some("UPDATE_SETTINGS");
    let message: Message = match serde_json::from_value(payload) {
        Ok(v) => v,
        Err(e) => {
            warn!("bad message: {e}");
            let code = if is_settings {
                "invalid_settings"
            } else {
                "invalid_message"
            };
            return err(StatusCode::BAD_REQUEST, code);
        }
    };

    match state.engine.request(message).await {
        Ok(Ok(Reply::Accepted)) => Json(OkResponse::<()> { ok: true, data: None }).into_response(),
        Ok(Ok(reply)) => Json(OkResponse {
            ok: true,
            data: Some(reply),
        })
        .into_response(),
        Ok(Err(Rejection::Invalid(code))) => err(StatusCode::BAD_REQUEST, code),
        Ok(Err(Rejection::Internal(code))) => err(StatusCode::INTERNAL_SERVER_ERROR, code),
        Err(_) => err(StatusCode::SERVICE_UNAVAILABLE, "engine_unavailable"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_listen_forms() {
        assert_eq!(
            parse_listen("127.0.0.1:9000").unwrap(),
            "127.0.0.1:9000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(parse_listen("0.0.0.0").unwrap().port(), DEFAULT_PORT);
        assert_eq!(parse_listen("localhost:8123").unwrap().port(), 8123);
        assert_eq!(parse_listen("localhost").unwrap().port(), DEFAULT_PORT);
        assert!(parse_listen("localhost:http").is_err());
        assert!(parse_listen("nowhere").is_err());
        assert!(parse_listen("nowhere:80").is_err());
        assert_eq!(parse_listen("::1").unwrap().port(), DEFAULT_PORT);
        assert_eq!(
            parse_listen(" localhost:8123 ").unwrap(),
            "127.0.0.1:8123".parse::<SocketAddr>().unwrap()
        );
    }
}
