//! Core types for proposals and acceptor messages

use serde::{Deserialize, Serialize};
use std::fmt;

/// Proposal number, totally ordering attempts from one proposer
pub type ProposalNumber = u64;

/// Opaque client value
pub type Value = String;

/// A proposal number paired with a value, if any.
///
/// Used both as the promise returned from a prepare and as the accept
/// record echoed back from a propose.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Proposal {
    /// Proposal number
    pub id: ProposalNumber,
    /// Value carried by this proposal, `None` when nothing was accepted yet
    pub value: Option<Value>,
}

impl Proposal {
    /// Create a proposal carrying a value
    pub fn new(id: ProposalNumber, value: impl Into<Value>) -> Self {
        Self {
            id,
            value: Some(value.into()),
        }
    }

    /// Create a proposal with no value
    pub fn empty(id: ProposalNumber) -> Self {
        Self { id, value: None }
    }
}

impl fmt::Display for Proposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "#{} {:?}", self.id, value),
            None => write!(f, "#{} <none>", self.id),
        }
    }
}

/// Phase 1 request body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareRequest {
    pub id: ProposalNumber,
}

/// Phase 2 request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposeRequest {
    pub data: Proposal,
}

/// Protocol phase, used when reporting quorum failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Phase 1: prepare/promise
    Prepare,
    /// Phase 2: propose/accept
    Propose,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Prepare => f.write_str("promise"),
            Phase::Propose => f.write_str("accept"),
        }
    }
}

/// Outcome of a successful attempt: the value this proposer got chosen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Proposal number the value was accepted under
    pub id: ProposalNumber,
    /// The chosen value
    pub value: Value,
}
