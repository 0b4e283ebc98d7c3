//! Proposer - drives one consensus attempt per client value
//!
//! An attempt is two broadcast phases separated by a barrier: every phase 1
//! reply (or the decision to abort) is in hand before any phase 2 request
//! goes out. Any failed peer call aborts the whole attempt; nothing is
//! retried.

use crate::error::{ConsensusError, Result};
use crate::quorum;
use crate::transport::AcceptorTransport;
use crate::types::{Decision, Phase, PrepareRequest, Proposal, ProposalNumber, ProposeRequest, Value};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;

/// How a phase reaches the node set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanOut {
    /// Call every peer at once and gather the replies
    #[default]
    Concurrent,
    /// Call peers one after another in node-set order
    Sequential,
}

impl FromStr for FanOut {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "concurrent" => Ok(FanOut::Concurrent),
            "sequential" => Ok(FanOut::Sequential),
            other => Err(format!(
                "unknown fan-out mode '{}', expected 'concurrent' or 'sequential'",
                other
            )),
        }
    }
}

/// Proposer configuration
#[derive(Debug, Clone, Default)]
pub struct ProposerConfig {
    /// Fan-out mode for both phases
    pub fan_out: FanOut,
    /// Bound on each peer call; a timeout counts as a transport failure
    pub rpc_timeout: Option<Duration>,
}

/// Single-decree Paxos proposer
pub struct Proposer<T> {
    transport: T,
    config: ProposerConfig,
    /// Last proposal number used. Held for the whole attempt, so attempts on
    /// one proposer never interleave.
    current_id: Mutex<ProposalNumber>,
}

impl<T: AcceptorTransport> Proposer<T> {
    /// Create a proposer with the default configuration
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ProposerConfig::default())
    }

    pub fn with_config(transport: T, config: ProposerConfig) -> Self {
        Self {
            transport,
            config,
            current_id: Mutex::new(0),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Last proposal number used (waits for a running attempt to finish)
    pub async fn current_id(&self) -> ProposalNumber {
        *self.current_id.lock().await
    }

    /// Run one attempt to get `propose_value` chosen.
    ///
    /// Fails with `ValueAlreadyAccepted` when phase 1 turned up a value some
    /// earlier attempt got accepted: that value is re-proposed and committed,
    /// but the caller's own value lost.
    pub async fn prepare(&self, propose_value: impl Into<Value>) -> Result<Decision> {
        let propose_value = propose_value.into();
        let mut current_id = self.current_id.lock().await;
        *current_id += 1;
        let id = *current_id;
        let node_count = self.transport.node_set().len();

        tracing::info!(
            "Proposer: starting attempt {} with value {:?} across {} nodes",
            id,
            propose_value,
            node_count
        );

        let request = PrepareRequest { id };
        let promises = self
            .broadcast(Phase::Prepare, |peer| self.transport.prepare(peer, request))
            .await?;
        quorum::check(Phase::Prepare, promises.len(), node_count)?;

        let accepted_response = quorum::highest_promise(&promises);
        tracing::info!(
            "Proposer: attempt {} promised, highest promise {}",
            id,
            accepted_response
        );

        let chosen = accepted_response
            .value
            .clone()
            .unwrap_or_else(|| propose_value.clone());
        let proposal = Proposal::new(id, chosen.clone());

        let accepts = self
            .broadcast(Phase::Propose, |peer| {
                self.transport.propose(
                    peer,
                    ProposeRequest {
                        data: proposal.clone(),
                    },
                )
            })
            .await?;
        quorum::check(Phase::Propose, accepts.len(), node_count)?;

        if let Some(value) = accepted_response.value {
            tracing::warn!(
                "Proposer: attempt {} re-proposed previously accepted value {:?} instead of {:?}",
                id,
                value,
                propose_value
            );
            return Err(ConsensusError::ValueAlreadyAccepted { value });
        }

        tracing::info!("Proposer: value {:?} accepted under id {}", chosen, id);
        Ok(Decision { id, value: chosen })
    }

    /// Send one phase to every peer, returning replies in node-set order.
    /// The first failure aborts the phase.
    async fn broadcast<F, Fut>(&self, phase: Phase, call: F) -> Result<Vec<Proposal>>
    where
        F: Fn(usize) -> Fut,
        Fut: Future<Output = Result<Proposal>>,
    {
        let peers = 0..self.transport.node_set().len();
        let result = match self.config.fan_out {
            FanOut::Concurrent => {
                try_join_all(peers.map(|peer| self.bounded(peer, call(peer)))).await
            }
            FanOut::Sequential => {
                let mut replies = Vec::with_capacity(peers.len());
                for peer in peers {
                    replies.push(self.bounded(peer, call(peer)).await?);
                }
                Ok(replies)
            }
        };

        if let Err(e) = &result {
            tracing::warn!("Proposer: aborting {} phase: {}", phase, e);
        }
        result
    }

    async fn bounded<Fut>(&self, peer: usize, call: Fut) -> Result<Proposal>
    where
        Fut: Future<Output = Result<Proposal>>,
    {
        match self.config.rpc_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(reply) => reply,
                Err(_) => Err(ConsensusError::transport(
                    self.peer_name(peer),
                    format!("timed out after {:?}", limit),
                )),
            },
            None => call.await,
        }
    }

    fn peer_name(&self, peer: usize) -> String {
        self.transport
            .node_set()
            .get(peer)
            .cloned()
            .unwrap_or_else(|| format!("peer {}", peer))
    }
}
