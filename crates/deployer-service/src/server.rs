//! HTTP server for the deployer API.
//!
//! Exposes the trigger and the status view of the status machine under
//! `/api`.

use crate::apis::{
	deploy::{trigger_deploy, DeployResult},
	status::{get_status, StatusResponse},
};
use axum::{
	extract::State,
	http::{HeaderValue, Method},
	response::Json,
	routing::{get, post},
	Router,
};
use deployer_config::ApiConfig;
use deployer_core::TransactionStatusMachine;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
	cors::{AllowOrigin, Any, CorsLayer},
	timeout::TimeoutLayer,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
	pub machine: Arc<TransactionStatusMachine>,
}

/// Builds the API router for `machine`.
pub fn router(api_config: &ApiConfig, machine: Arc<TransactionStatusMachine>) -> Router {
	let state = AppState { machine };

	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/deploy", post(handle_deploy))
				.route("/status", get(handle_status)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(cors_layer(api_config))
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				))),
		)
		.with_state(state)
}

/// Starts the HTTP server and serves until the listener fails.
pub async fn start_server(
	api_config: ApiConfig,
	machine: Arc<TransactionStatusMachine>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
	let app = router(&api_config, machine);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = tokio::net::TcpListener::bind(&bind_address).await?;

	tracing::info!("Deployer API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Allows the configured origins, or any origin when none are configured.
fn cors_layer(api_config: &ApiConfig) -> CorsLayer {
	let Some(cors) = &api_config.cors else {
		return CorsLayer::permissive();
	};

	let origins: Vec<HeaderValue> = cors
		.allowed_origins
		.iter()
		.filter_map(|origin| match HeaderValue::from_str(origin) {
			Ok(value) => Some(value),
			Err(_) => {
				tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
				None
			},
		})
		.collect();

	CorsLayer::new()
		.allow_origin(AllowOrigin::list(origins))
		.allow_methods([Method::GET, Method::POST])
		.allow_headers(Any)
}

async fn handle_deploy(State(state): State<AppState>) -> DeployResult {
	trigger_deploy(&state.machine)
}

async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
	get_status(&state.machine)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{machine, Wallet};
	use axum::body::Body;
	use axum::http::{Request, StatusCode};
	use deployer_config::CorsConfig;
	use deployer_types::{LifecycleEvent, TransactionStatus};
	use tower::ServiceExt;

	fn api_config() -> ApiConfig {
		ApiConfig {
			enabled: true,
			host: "127.0.0.1".to_string(),
			port: 0,
			timeout_seconds: 30,
			cors: None,
		}
	}

	async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
		let response = app
			.clone()
			.oneshot(
				Request::builder()
					.method(method)
					.uri(uri)
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		(status, serde_json::from_slice(&bytes).unwrap())
	}

	#[tokio::test]
	async fn test_status_starts_idle() {
		let dir = tempfile::tempdir().unwrap();
		let app = router(&api_config(), Arc::new(machine(&dir, Wallet::Stalled).await));

		let (status, body) = call(&app, Method::GET, "/api/status").await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "idle");
		assert!(body["label"].is_null());
		assert!(body["transaction_id"].is_null());
		assert_eq!(body["can_deploy"], true);
	}

	#[tokio::test]
	async fn test_deploy_conflicts_while_pending() {
		let dir = tempfile::tempdir().unwrap();
		let app = router(&api_config(), Arc::new(machine(&dir, Wallet::Stalled).await));

		let (status, body) = call(&app, Method::POST, "/api/deploy").await;
		assert_eq!(status, StatusCode::ACCEPTED);
		assert_eq!(body["cycle"], 1);
		assert_eq!(body["status"], "pending");

		let (status, body) = call(&app, Method::POST, "/api/deploy").await;
		assert_eq!(status, StatusCode::CONFLICT);
		assert_eq!(body["error"], "DEPLOYMENT_PENDING");

		let (_, body) = call(&app, Method::GET, "/api/status").await;
		assert_eq!(body["label"], "pending");
		assert_eq!(body["can_deploy"], false);
	}

	#[tokio::test(start_paused = true)]
	async fn test_status_reports_success_with_identifier() {
		let dir = tempfile::tempdir().unwrap();
		let machine = Arc::new(machine(&dir, Wallet::Approving).await);
		let mut events = machine.subscribe();
		let app = router(&api_config(), Arc::clone(&machine));

		let (status, _) = call(&app, Method::POST, "/api/deploy").await;
		assert_eq!(status, StatusCode::ACCEPTED);
		loop {
			if let LifecycleEvent::StatusChanged { to, .. } = events.recv().await.unwrap() {
				if to == TransactionStatus::Success {
					break;
				}
			}
		}

		let (_, body) = call(&app, Method::GET, "/api/status").await;
		assert_eq!(body["status"], "success");
		assert_eq!(body["label"], "successful");
		assert_eq!(body["transaction_id"], "tx_service");
		assert_eq!(body["can_deploy"], true);
	}

	#[tokio::test]
	async fn test_deploy_after_shutdown_is_unavailable() {
		let dir = tempfile::tempdir().unwrap();
		let machine = Arc::new(machine(&dir, Wallet::Stalled).await);
		machine.shutdown();
		let app = router(&api_config(), machine);

		let (status, body) = call(&app, Method::POST, "/api/deploy").await;
		assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
		assert_eq!(body["error"], "SERVICE_UNAVAILABLE");
	}

	#[tokio::test]
	async fn test_configured_cors_origin_is_echoed() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = api_config();
		config.cors = Some(CorsConfig {
			allowed_origins: vec!["https://app.example.org".to_string()],
		});
		let app = router(&config, Arc::new(machine(&dir, Wallet::Stalled).await));

		let response = app
			.oneshot(
				Request::builder()
					.uri("/api/status")
					.header("origin", "https://app.example.org")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(
			response.headers()["access-control-allow-origin"],
			"https://app.example.org"
		);
	}
}
