//! Paxos Consensus - single-decree proposer and acceptor
//!
//! Architecture:
//! - Acceptor: passive voter holding the highest promised id and the last accepted proposal
//! - Proposer: runs prepare/promise then propose/accept across a fixed node set
//! - Transport: trait the proposer uses to reach acceptors (HTTP lives in `paxos-rpc`)
//!
//! Every failure is a `ConsensusError` value; nothing is retried.

pub mod acceptor;
pub mod error;
pub mod proposer;
pub mod quorum;
pub mod transport;
pub mod types;

pub use acceptor::{Acceptor, AcceptorState, SharedAcceptor};
pub use error::{ConsensusError, Result};
pub use proposer::{FanOut, Proposer, ProposerConfig};
pub use transport::{AcceptorTransport, Fault, LocalTransport};
pub use types::*;
