//! Acceptor - votes on prepare and propose requests
//!
//! State is the pair `(max_seen_id, accepted_proposal)`. `max_seen_id` only
//! ever moves up, and `accepted_proposal` is only overwritten by a proposal
//! whose id equals the current `max_seen_id`.

use crate::error::{ConsensusError, Result};
use crate::types::{Proposal, ProposalNumber};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Acceptor shared between a node's request handlers
pub type SharedAcceptor = Arc<Mutex<Acceptor>>;

/// Snapshot of an acceptor's state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptorState {
    /// Highest prepare id ever observed
    pub max_seen_id: ProposalNumber,
    /// Most recently accepted proposal
    pub accepted_proposal: Option<Proposal>,
}

/// Single-decree Paxos acceptor
#[derive(Debug, Default)]
pub struct Acceptor {
    state: AcceptorState,
}

impl Acceptor {
    /// Create a fresh acceptor: nothing promised, nothing accepted
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh acceptor for sharing across handlers
    pub fn shared() -> SharedAcceptor {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Current state
    pub fn state(&self) -> &AcceptorState {
        &self.state
    }

    pub fn max_seen_id(&self) -> ProposalNumber {
        self.state.max_seen_id
    }

    pub fn accepted_proposal(&self) -> Option<&Proposal> {
        self.state.accepted_proposal.as_ref()
    }

    /// Handle a phase 1 prepare.
    ///
    /// Promises `id` unless a higher id was already promised, and echoes
    /// `id` back together with whatever value was accepted before.
    pub fn prepare_handler(&mut self, id: ProposalNumber) -> Result<Proposal> {
        tracing::debug!("Acceptor: starting preparation with id {}", id);

        if id < self.state.max_seen_id {
            tracing::warn!(
                "Acceptor: rejected prepare {} (already promised {})",
                id,
                self.state.max_seen_id
            );
            return Err(ConsensusError::StalePromise {
                requested: id,
                promised: self.state.max_seen_id,
            });
        }

        self.state.max_seen_id = id;

        let value = self
            .state
            .accepted_proposal
            .as_ref()
            .and_then(|accepted| accepted.value.clone());
        let promise = Proposal { id, value };

        tracing::debug!("Acceptor: promised {}", promise);
        Ok(promise)
    }

    /// Handle a phase 2 propose.
    ///
    /// Only the exact id most recently promised is accepted; a lower or a
    /// higher id is rejected.
    pub fn propose_handler(&mut self, proposal: Proposal) -> Result<Proposal> {
        tracing::debug!("Acceptor: starting proposal {}", proposal);

        if proposal.id != self.state.max_seen_id {
            tracing::warn!(
                "Acceptor: rejected proposal {} (promised {})",
                proposal.id,
                self.state.max_seen_id
            );
            return Err(ConsensusError::IdMismatch {
                requested: proposal.id,
                promised: self.state.max_seen_id,
            });
        }

        self.state.accepted_proposal = Some(proposal.clone());

        tracing::debug!("Acceptor: accepted {}", proposal);
        Ok(proposal)
    }
}
