//! Node Methods - handlers behind each HTTP endpoint
//!
//! Each handler runs one role's operation against the node's own state and
//! hands back the core's result untouched.

use paxos_consensus::{
    AcceptorState, AcceptorTransport, ConsensusError, Decision, PrepareRequest, Proposal,
    ProposeRequest, Proposer, ProposerConfig, SharedAcceptor,
};
use serde::{Deserialize, Serialize};

/// State shared by all handlers of one node: the local acceptor and the
/// local proposer
pub struct NodeContext {
    pub acceptor: SharedAcceptor,
    pub proposer: Proposer<Box<dyn AcceptorTransport>>,
}

impl NodeContext {
    pub fn new(
        acceptor: SharedAcceptor,
        transport: impl AcceptorTransport + 'static,
        config: ProposerConfig,
    ) -> Self {
        let transport: Box<dyn AcceptorTransport> = Box::new(transport);
        Self {
            acceptor,
            proposer: Proposer::with_config(transport, config),
        }
    }
}

// ============ Request/Response Types ============

/// Client submission body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub value: String,
}

/// Body of every non-2xx response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    /// Tagged failure kind, absent when the failure did not come from the core
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ConsensusError>,
}

impl From<&ConsensusError> for ErrorResponse {
    fn from(e: &ConsensusError) -> Self {
        Self {
            message: e.to_string(),
            error: Some(e.clone()),
        }
    }
}

// ============ Handlers ============

/// Run a full proposer attempt for a client value
pub async fn handle_submit(
    ctx: &NodeContext,
    request: SubmitRequest,
) -> Result<Decision, ConsensusError> {
    ctx.proposer.prepare(request.value).await
}

/// Phase 1 on the local acceptor
pub fn handle_prepare(
    ctx: &NodeContext,
    request: PrepareRequest,
) -> Result<Proposal, ConsensusError> {
    ctx.acceptor.lock().prepare_handler(request.id)
}

/// Phase 2 on the local acceptor
pub fn handle_propose(
    ctx: &NodeContext,
    request: ProposeRequest,
) -> Result<Proposal, ConsensusError> {
    ctx.acceptor.lock().propose_handler(request.data)
}

/// Snapshot of the local acceptor
pub fn handle_state(ctx: &NodeContext) -> AcceptorState {
    ctx.acceptor.lock().state().clone()
}

pub fn handle_health() -> &'static str {
    "ok"
}
