//! HTTP server for the pickup-point order API.
//!
//! Builds the axum router over the order handlers, applies tracing, CORS,
//! timeout and body-size layers from configuration, and binds the listener,
//! trying the following ports when the configured one is taken.

use crate::apis::order;
use axum::{
	extract::{DefaultBodyLimit, State},
	http::{HeaderName, HeaderValue, Method},
	response::Json,
	routing::{get, post, put},
	Router,
};
use pvz_config::{ApiConfig, CorsConfig};
use pvz_core::PvzEngine;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
	cors::{AllowHeaders, AllowOrigin, Any, CorsLayer},
	timeout::TimeoutLayer,
	trace::TraceLayer,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Engine holding the order store and lifecycle service.
	pub engine: Arc<PvzEngine>,
}

/// Builds the application router.
pub fn router(state: AppState, api_config: &ApiConfig) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders", get(order::list_orders).post(order::create_order))
				.route("/orders/issue", post(order::issue_order))
				.route("/orders/cancel", post(order::cancel_order))
				.route(
					"/orders/{id}",
					get(order::get_order).delete(order::delete_order),
				)
				.route("/orders/{id}/status", put(order::set_order_status))
				.route("/orders/{id}/audit", get(order::get_order_audit))
				.route("/stats", get(order::get_stats)),
		)
		.route("/health", get(health))
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(cors_layer(api_config.cors.as_ref()))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(state)
}

/// Handles GET /health.
async fn health(State(state): State<AppState>) -> Json<Value> {
	Json(json!({
		"status": "ok",
		"service_id": state.engine.config().service.id,
		"orders": state.engine.store().len().await,
	}))
}

/// Builds the CORS layer; permissive when no CORS section is configured.
fn cors_layer(cors: Option<&CorsConfig>) -> CorsLayer {
	let Some(cors) = cors else {
		return CorsLayer::permissive();
	};

	let origins = if cors.allowed_origins.is_empty() || cors.allowed_origins.iter().any(|o| o == "*")
	{
		AllowOrigin::from(Any)
	} else {
		AllowOrigin::list(cors.allowed_origins.iter().filter_map(|origin| {
			HeaderValue::from_str(origin)
				.inspect_err(|_| tracing::warn!("Ignoring invalid CORS origin: {}", origin))
				.ok()
		}))
	};

	let methods: Vec<Method> = if cors.allowed_methods.is_empty() {
		vec![
			Method::GET,
			Method::POST,
			Method::PUT,
			Method::DELETE,
			Method::OPTIONS,
		]
	} else {
		cors.allowed_methods
			.iter()
			.filter_map(|method| {
				Method::from_bytes(method.to_uppercase().as_bytes())
					.inspect_err(|_| tracing::warn!("Ignoring invalid CORS method: {}", method))
					.ok()
			})
			.collect()
	};

	let headers = if cors.allowed_headers.is_empty() || cors.allowed_headers.iter().any(|h| h == "*")
	{
		AllowHeaders::from(Any)
	} else {
		AllowHeaders::list(cors.allowed_headers.iter().filter_map(|name| {
			HeaderName::from_bytes(name.as_bytes())
				.inspect_err(|_| tracing::warn!("Ignoring invalid CORS header: {}", name))
				.ok()
		}))
	};

	CorsLayer::new()
		.allow_origin(origins)
		.allow_methods(methods)
		.allow_headers(headers)
}

/// Binds the configured address, falling back to the next ports when busy.
///
/// Tries `port`, `port + 1`, ... up to `port_fallback_attempts` extra ports.
/// Errors other than "address in use" are returned immediately.
pub async fn bind_with_fallback(api_config: &ApiConfig) -> std::io::Result<TcpListener> {
	let mut last_error = None;

	for offset in 0..=api_config.port_fallback_attempts {
		let Some(port) = api_config.port.checked_add(offset) else {
			break;
		};
		let address = format!("{}:{}", api_config.host, port);

		match TcpListener::bind(&address).await {
			Ok(listener) => {
				if offset > 0 {
					tracing::warn!(
						configured = api_config.port,
						port,
						"Configured port is busy, using fallback port"
					);
				}
				return Ok(listener);
			},
			Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
				tracing::warn!(address = %address, "Address already in use");
				last_error = Some(e);
			},
			Err(e) => return Err(e),
		}
	}

	Err(last_error.unwrap_or_else(|| {
		std::io::Error::new(
			std::io::ErrorKind::AddrInUse,
			format!("No free port from {}", api_config.port),
		)
	}))
}

/// Starts the HTTP server and serves until `shutdown` resolves.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<PvzEngine>,
	shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(AppState { engine }, &api_config);
	let listener = bind_with_fallback(&api_config).await?;

	tracing::info!("PVZ order API server starting on {}", listener.local_addr()?);

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown)
		.await?;

	Ok(())
}
