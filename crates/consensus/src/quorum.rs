//! Quorum arithmetic and promise selection
//!
//! The proposer counts itself as one implicit vote on top of the peer
//! responses it collected.

use crate::error::{ConsensusError, Result};
use crate::types::{Phase, Proposal};

/// Majority of `node_count` nodes: `floor(n / 2) + 1`
pub fn majority(node_count: usize) -> usize {
    node_count / 2 + 1
}

/// Check that `responses` peer replies plus the proposer's own vote reach a
/// majority of `node_count`
pub fn check(phase: Phase, responses: usize, node_count: usize) -> Result<()> {
    let required = majority(node_count);
    if responses + 1 < required {
        return Err(ConsensusError::QuorumNotReached {
            phase,
            responses,
            required,
        });
    }
    Ok(())
}

/// Pick the promise with the strictly highest id.
///
/// Starts from `{ id: 0, value: None }`, so an empty set yields a proposal
/// without a value. Acceptors echo the prepare id, so every promise of one
/// round ties on id: among tied promises the first one carrying a value
/// wins, otherwise the first one found.
pub fn highest_promise(promises: &[Proposal]) -> Proposal {
    let mut highest = Proposal::empty(0);
    for promise in promises {
        let fills_value =
            promise.id == highest.id && highest.value.is_none() && promise.value.is_some();
        if promise.id > highest.id || fills_value {
            highest = promise.clone();
        }
    }
    highest
}
