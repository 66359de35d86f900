//! HTTP gateway server

use chrono::{SecondsFormat, Utc};
use futures::{Stream, TryStreamExt};
use poke_relay::{MqttSessionFactory, RelayService};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use warp::http::StatusCode;
use warp::hyper::body::Buf;
use warp::reject::Reject;
use warp::{Filter, Rejection, Reply};

use crate::adapter::{error_response, normalize_send_body, INVALID_PARAMETERS_MESSAGE};
use crate::config::{GatewayConfig, RelayDefaults, ServerConfig};
use crate::error::{GatewayError, Result};

/// Shared by every request handler
#[derive(Debug, Clone)]
pub struct AppState {
    service: Arc<RelayService>,
    relay: RelayDefaults,
    listening_port: Arc<AtomicU16>,
}

impl AppState {
    pub fn new(service: RelayService, relay: RelayDefaults, port: u16) -> Self {
        Self {
            service: Arc::new(service),
            relay,
            listening_port: Arc::new(AtomicU16::new(port)),
        }
    }

    pub fn port(&self) -> u16 {
        self.listening_port.load(Ordering::Relaxed)
    }
}

/// All gateway routes with CORS and JSON rejection handling applied
pub fn routes(
    state: AppState,
    server: &ServerConfig,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let send = warp::path("send-message")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body(server.max_body_bytes))
        .and(with_state(state.clone()))
        .and_then(handle_send);

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state))
        .map(|state: AppState| warp::reply::json(&health_body(state.port())));

    send.or(health).recover(handle_rejection).with(cors(server))
}

/// CORS policy: the client origin only in production, any origin otherwise.
///
/// Production denies every origin when `client_origin` is unusable.
pub fn cors(server: &ServerConfig) -> warp::cors::Builder {
    let builder = warp::cors()
        .allow_methods(server.cors_methods.iter().map(String::as_str))
        .allow_headers(server.cors_headers.iter().map(String::as_str))
        .allow_credentials(server.cors_allow_credentials);

    if !server.is_production() {
        return builder.allow_any_origin();
    }

    match server.allowed_origin() {
        Ok(origin) => builder.allow_origin(origin.as_str()),
        Err(e) => {
            error!("Denying all cross-origin requests: {}", e);
            builder.allow_origins(Vec::<&str>::new())
        }
    }
}

#[derive(Debug)]
struct BodyTooLarge;

impl Reject for BodyTooLarge {}

#[derive(Debug)]
struct InvalidBody(String);

impl Reject for InvalidBody {}

/// JSON body of at most `limit` bytes, sized by Content-Length or chunked
fn json_body(limit: u64) -> impl Filter<Extract = (Value,), Error = Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and(warp::body::stream())
        .and_then(move |declared: Option<u64>, body| read_json(declared, body, limit))
}

async fn read_json<S, B>(
    declared: Option<u64>,
    body: S,
    limit: u64,
) -> std::result::Result<Value, Rejection>
where
    S: Stream<Item = std::result::Result<B, warp::Error>>,
    B: Buf,
{
    if declared.is_some_and(|length| length > limit) {
        return Err(warp::reject::custom(BodyTooLarge));
    }

    let mut body = std::pin::pin!(body);
    let mut bytes = Vec::new();
    while let Some(mut chunk) = body
        .try_next()
        .await
        .map_err(|e| warp::reject::custom(InvalidBody(e.to_string())))?
    {
        if (bytes.len() + chunk.remaining()) as u64 > limit {
            return Err(warp::reject::custom(BodyTooLarge));
        }
        while chunk.has_remaining() {
            let part = chunk.chunk();
            let read = part.len();
            bytes.extend_from_slice(part);
            chunk.advance(read);
        }
    }

    serde_json::from_slice(&bytes).map_err(|e| warp::reject::custom(InvalidBody(e.to_string())))
}

pub fn health_body(port: u16) -> Value {
    json!({
        "status": "ok",
        "port": port,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

async fn handle_send(body: Value, state: AppState) -> std::result::Result<impl Reply, Infallible> {
    let params = normalize_send_body(&body, state.relay.default_is_queue);

    match state.service.send_message(&params).await {
        Ok(outcome) => Ok(warp::reply::with_status(
            warp::reply::json(&outcome),
            StatusCode::OK,
        )),
        Err(e) => {
            error!("Error in /send-message endpoint: {}", e);
            let (status, body) = error_response(&e);
            Ok(warp::reply::with_status(warp::reply::json(&body), status))
        }
    }
}

async fn handle_rejection(err: Rejection) -> std::result::Result<impl Reply, Infallible> {
    let (status, body) = if err.is_not_found() {
        (
            StatusCode::NOT_FOUND,
            json!({"success": false, "message": "Not found"}),
        )
    } else if let Some(InvalidBody(reason)) = err.find::<InvalidBody>() {
        (StatusCode::BAD_REQUEST, invalid_parameters(reason))
    } else if err.find::<BodyTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            json!({"success": false, "message": "Request body too large"}),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            json!({"success": false, "message": "Method not allowed"}),
        )
    } else {
        warn!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"success": false, "message": "Internal server error"}),
        )
    };

    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}

fn invalid_parameters(err: impl std::fmt::Display) -> Value {
    json!({
        "success": false,
        "message": INVALID_PARAMETERS_MESSAGE,
        "error": err.to_string(),
    })
}

/// Gateway HTTP server
pub struct GatewayServer {
    config: GatewayConfig,
    service: RelayService,
}

impl GatewayServer {
    /// Server publishing over MQTT sessions
    pub fn new(config: GatewayConfig) -> Self {
        let factory = Arc::new(MqttSessionFactory::new(config.session.clone()));
        let service = RelayService::new(factory, config.session.clone());
        Self::with_service(config, service)
    }

    pub fn with_service(config: GatewayConfig, service: RelayService) -> Self {
        Self { config, service }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.config.server.bind_address, self.config.server.port)
            .parse::<SocketAddr>()
            .map_err(|e| GatewayError::configuration(format!("Invalid bind address: {}", e)))
    }

    /// Serve until `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let (addr, server) = self.bind(shutdown)?;
        info!("Gateway listening on {}", addr);
        server.await;
        info!("Gateway stopped");
        Ok(())
    }

    /// Bind the listener; the returned future serves until `shutdown` resolves
    pub fn bind(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(SocketAddr, impl Future<Output = ()>)> {
        let addr = self.socket_addr()?;
        let state = AppState::new(self.service, self.config.relay.clone(), addr.port());
        let port = state.listening_port.clone();

        if self.config.server.is_production() {
            let origin = self.config.server.allowed_origin()?;
            info!("CORS restricted to {}", origin);
        }

        let (bound, server) = warp::serve(routes(state, &self.config.server))
            .try_bind_with_graceful_shutdown(addr, shutdown)?;
        port.store(bound.port(), Ordering::Relaxed);

        Ok((bound, server))
    }
}
