//! Transport boundary between a proposer and the acceptors it drives
//!
//! The proposer only sees the ordered node set and two calls per node.
//! `LocalTransport` wires a proposer straight to in-process acceptors.

use crate::acceptor::{Acceptor, SharedAcceptor};
use crate::error::{ConsensusError, Result};
use crate::types::{PrepareRequest, Proposal, ProposeRequest};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Reaches every acceptor in a fixed, ordered node set
#[async_trait]
pub trait AcceptorTransport: Send + Sync {
    /// Ordered node set. Indices into this slice address peers in the calls below.
    fn node_set(&self) -> &[String];

    /// Send a phase 1 prepare to one peer
    async fn prepare(&self, peer: usize, request: PrepareRequest) -> Result<Proposal>;

    /// Send a phase 2 propose to one peer
    async fn propose(&self, peer: usize, request: ProposeRequest) -> Result<Proposal>;
}

#[async_trait]
impl<T: AcceptorTransport + ?Sized> AcceptorTransport for Box<T> {
    fn node_set(&self) -> &[String] {
        (**self).node_set()
    }

    async fn prepare(&self, peer: usize, request: PrepareRequest) -> Result<Proposal> {
        (**self).prepare(peer, request).await
    }

    async fn propose(&self, peer: usize, request: ProposeRequest) -> Result<Proposal> {
        (**self).propose(peer, request).await
    }
}

/// Injected failure for a local peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Every call fails immediately with a transport failure
    Unreachable,
    /// Every call hangs forever
    Hang,
}

/// In-process transport over a set of shared acceptors
pub struct LocalTransport {
    names: Vec<String>,
    acceptors: Vec<SharedAcceptor>,
    faults: RwLock<HashMap<usize, Fault>>,
}

impl LocalTransport {
    /// Create a transport over existing acceptors, named `local-0`, `local-1`, ...
    pub fn new(acceptors: Vec<SharedAcceptor>) -> Self {
        let names = (0..acceptors.len())
            .map(|i| format!("local-{}", i))
            .collect();
        Self {
            names,
            acceptors,
            faults: RwLock::new(HashMap::new()),
        }
    }

    /// Create `size` fresh acceptors and a transport over them
    pub fn cluster(size: usize) -> (Self, Vec<SharedAcceptor>) {
        let acceptors: Vec<SharedAcceptor> = (0..size).map(|_| Acceptor::shared()).collect();
        (Self::new(acceptors.clone()), acceptors)
    }

    /// Set or clear the fault for one peer
    pub fn set_fault(&self, peer: usize, fault: Option<Fault>) {
        let mut faults = self.faults.write();
        match fault {
            Some(fault) => {
                faults.insert(peer, fault);
            }
            None => {
                faults.remove(&peer);
            }
        }
    }

    async fn reach(&self, peer: usize) -> Result<&SharedAcceptor> {
        let fault = self.faults.read().get(&peer).copied();
        match fault {
            Some(Fault::Unreachable) => Err(ConsensusError::transport(
                self.name(peer),
                "connection refused",
            )),
            Some(Fault::Hang) => futures::future::pending().await,
            None => self
                .acceptors
                .get(peer)
                .ok_or_else(|| ConsensusError::transport(self.name(peer), "no such peer")),
        }
    }

    fn name(&self, peer: usize) -> String {
        self.names
            .get(peer)
            .cloned()
            .unwrap_or_else(|| format!("local-{}", peer))
    }
}

#[async_trait]
impl AcceptorTransport for LocalTransport {
    fn node_set(&self) -> &[String] {
        &self.names
    }

    async fn prepare(&self, peer: usize, request: PrepareRequest) -> Result<Proposal> {
        let acceptor = self.reach(peer).await?;
        let result = acceptor.lock().prepare_handler(request.id);
        result
    }

    async fn propose(&self, peer: usize, request: ProposeRequest) -> Result<Proposal> {
        let acceptor = self.reach(peer).await?;
        let result = acceptor.lock().propose_handler(request.data);
        result
    }
}
