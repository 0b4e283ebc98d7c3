//! Consensus Errors

use crate::types::{Phase, ProposalNumber, Value};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every way a prepare/propose round can fail.
///
/// Serializable so an acceptor's rejection keeps its kind when it crosses
/// the wire back to the proposer.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsensusError {
    #[error("no majority {phase}: {responses} responses plus self, {required} required")]
    QuorumNotReached {
        phase: Phase,
        responses: usize,
        required: usize,
    },

    #[error("a higher-numbered proposal was already promised (requested {requested}, promised {promised})")]
    StalePromise {
        requested: ProposalNumber,
        promised: ProposalNumber,
    },

    #[error("cannot accept proposal {requested}: id does not match the last promised id {promised}")]
    IdMismatch {
        requested: ProposalNumber,
        promised: ProposalNumber,
    },

    #[error("value already accepted by another proposer: {value:?}")]
    ValueAlreadyAccepted { value: Value },

    #[error("transport failure talking to {peer}: {reason}")]
    TransportFailure { peer: String, reason: String },
}

impl ConsensusError {
    /// Build a transport failure for the given peer
    pub fn transport(peer: impl Into<String>, reason: impl ToString) -> Self {
        ConsensusError::TransportFailure {
            peer: peer.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = ConsensusError> = std::result::Result<T, E>;
