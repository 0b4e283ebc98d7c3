//! HTTP Node Server
//!
//! One POST endpoint per protocol operation, plus read-only state and health.

use crate::methods::{
    handle_health, handle_prepare, handle_propose, handle_state, handle_submit, ErrorResponse,
    NodeContext, SubmitRequest,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use paxos_consensus::{AcceptorState, ConsensusError, PrepareRequest, Proposal, ProposeRequest};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub const SUBMIT_PATH: &str = "/proposer";
pub const PREPARE_PATH: &str = "/acceptor/handle-prepare-message";
pub const PROPOSE_PATH: &str = "/acceptor/handle-propose";
pub const STATE_PATH: &str = "/acceptor/state";
pub const HEALTH_PATH: &str = "/health";

/// HTTP server for one node
pub struct HttpNodeServer {
    context: Arc<NodeContext>,
}

impl HttpNodeServer {
    /// Create a new HTTP node server
    pub fn new(context: Arc<NodeContext>) -> Self {
        Self { context }
    }

    /// Create the Axum router
    pub fn router(self) -> Router {
        Router::new()
            .route(SUBMIT_PATH, post(submit))
            .route(PREPARE_PATH, post(prepare))
            .route(PROPOSE_PATH, post(propose))
            .route(STATE_PATH, get(state))
            .route(HEALTH_PATH, get(health))
            .layer(TraceLayer::new_for_http())
            .with_state(self.context)
    }

    /// Bind `addr` and run the server
    pub async fn run(self, addr: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Run the server on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        tracing::info!("HTTP node server listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router()).await
    }
}

/// Failure rendered as an HTTP error with an `ErrorResponse` body
pub enum ApiError {
    /// Rejected by the core
    Consensus(ConsensusError),
    /// Request body missing or not the expected JSON
    BadRequest(JsonRejection),
}

impl From<ConsensusError> for ApiError {
    fn from(e: ConsensusError) -> Self {
        ApiError::Consensus(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Consensus(e) => (status_code(&e), Json(ErrorResponse::from(&e))).into_response(),
            ApiError::BadRequest(rejection) => {
                let body = ErrorResponse {
                    message: rejection.body_text(),
                    error: None,
                };
                (rejection.status(), Json(body)).into_response()
            }
        }
    }
}

/// Map a consensus failure to its HTTP status
pub fn status_code(error: &ConsensusError) -> StatusCode {
    match error {
        ConsensusError::QuorumNotReached { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ConsensusError::StalePromise { .. }
        | ConsensusError::IdMismatch { .. }
        | ConsensusError::ValueAlreadyAccepted { .. } => StatusCode::CONFLICT,
        ConsensusError::TransportFailure { .. } => StatusCode::BAD_GATEWAY,
    }
}

async fn submit(
    State(context): State<Arc<NodeContext>>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = payload?;
    tracing::info!("[{}] submitting value {:?}", SUBMIT_PATH, request.value);
    match handle_submit(&context, request).await {
        Ok(decision) => {
            tracing::info!("[{}] value {:?} accepted", SUBMIT_PATH, decision.value);
            Ok(StatusCode::OK)
        }
        Err(e) => {
            tracing::warn!("[{}] attempt failed: {}", SUBMIT_PATH, e);
            Err(e.into())
        }
    }
}

async fn prepare(
    State(context): State<Arc<NodeContext>>,
    payload: Result<Json<PrepareRequest>, JsonRejection>,
) -> Result<Json<Proposal>, ApiError> {
    let Json(request) = payload?;
    tracing::debug!("[{}] with body: {:?}", PREPARE_PATH, request);
    let promise = handle_prepare(&context, request)?;
    Ok(Json(promise))
}

async fn propose(
    State(context): State<Arc<NodeContext>>,
    payload: Result<Json<ProposeRequest>, JsonRejection>,
) -> Result<Json<Proposal>, ApiError> {
    let Json(request) = payload?;
    tracing::debug!("[{}] with body: {:?}", PROPOSE_PATH, request);
    let accepted = handle_propose(&context, request)?;
    Ok(Json(accepted))
}

async fn state(State(context): State<Arc<NodeContext>>) -> Json<AcceptorState> {
    Json(handle_state(&context))
}

async fn health() -> &'static str {
    handle_health()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use paxos_consensus::{Acceptor, LocalTransport, ProposerConfig};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router() -> Router {
        let (transport, acceptors) = LocalTransport::cluster(3);
        let context = NodeContext::new(acceptors[0].clone(), transport, ProposerConfig::default());
        HttpNodeServer::new(Arc::new(context)).router()
    }

    fn lone_router() -> Router {
        let context = NodeContext::new(
            Acceptor::shared(),
            LocalTransport::cluster(0).0,
            ProposerConfig::default(),
        );
        HttpNodeServer::new(Arc::new(context)).router()
    }

    async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_submit_success_has_empty_body() {
        let router = router();
        let (status, body) = call(&router, Method::POST, SUBMIT_PATH, Some(json!({ "value": "x" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);

        let (_, state) = call(&router, Method::GET, STATE_PATH, None).await;
        assert_eq!(state, json!({ "maxSeenId": 1, "acceptedProposal": { "id": 1, "value": "x" } }));
    }

    #[tokio::test]
    async fn test_submit_losing_value_is_conflict() {
        let router = router();
        call(&router, Method::POST, SUBMIT_PATH, Some(json!({ "value": "y" }))).await;

        let (status, body) = call(&router, Method::POST, SUBMIT_PATH, Some(json!({ "value": "z" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["kind"], "value_already_accepted");
        assert_eq!(body["error"]["value"], "y");
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_prepare_and_propose_endpoints() {
        let router = lone_router();

        let (status, body) = call(&router, Method::POST, PREPARE_PATH, Some(json!({ "id": 5 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "id": 5, "value": null }));

        let (status, body) = call(&router, Method::POST, PREPARE_PATH, Some(json!({ "id": 3 }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["kind"], "stale_promise");

        let (status, body) = call(
            &router,
            Method::POST,
            PROPOSE_PATH,
            Some(json!({ "data": { "id": 4, "value": "v" } })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["kind"], "id_mismatch");

        let (status, body) = call(
            &router,
            Method::POST,
            PROPOSE_PATH,
            Some(json!({ "data": { "id": 5, "value": "v" } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "id": 5, "value": "v" }));
    }

    #[tokio::test]
    async fn test_malformed_body_rejected() {
        let router = lone_router();
        let (status, body) = call(&router, Method::POST, PREPARE_PATH, Some(json!({ "nope": true }))).await;
        assert!(status.is_client_error());
        let error: ErrorResponse = serde_json::from_value(body).unwrap();
        assert!(error.message.contains("missing field"));
        assert!(error.error.is_none());
    }

    #[tokio::test]
    async fn test_submit_without_value_has_error_body() {
        let router = lone_router();
        let (status, body) = call(&router, Method::POST, SUBMIT_PATH, Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let error: ErrorResponse = serde_json::from_value(body).unwrap();
        assert!(error.message.contains("value"));

        // Not JSON at all
        let request = Request::builder()
            .method(Method::POST)
            .uri(PROPOSE_PATH)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{ data"))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(error.error.is_none());
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&lone_router(), Method::GET, HEALTH_PATH, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("ok".to_string()));
    }

    #[test]
    fn test_status_codes() {
        let quorum = ConsensusError::QuorumNotReached {
            phase: paxos_consensus::Phase::Prepare,
            responses: 0,
            required: 2,
        };
        assert_eq!(status_code(&quorum), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_code(&ConsensusError::transport("http://a", "refused")),
            StatusCode::BAD_GATEWAY
        );
    }
}
