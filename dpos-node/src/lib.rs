//! The node aggregate: wires the cache, delegate registry, finality manager,
//! and governance engine into the handful of entry points an embedding
//! process needs. Grounded on `node/src/{lib,node}.rs`'s `Node` struct, which
//! already owns a consensus/governance/repository trio; generalised here to
//! own this core's own subsystems instead.

pub mod node;

pub use node::{Node, NodeError};

use async_trait::async_trait;
use dpos_cache::{CacheRead, CacheWrapper, CacheWrite};
use dpos_core::time::Timestamp;
use dpos_governance::Receipt;

/// The external contract VM collaborator. Contract semantics are out of
/// scope for this core; a block's non-governance transactions are opaque to
/// everything here except through this trait, which the embedding process
/// wires to an actual VM. Takes a deadline rather than owning a clock, so the
/// caller decides how much of a block's execution budget is left.
#[async_trait]
pub trait ContractVm: Send + Sync {
    async fn execute<P>(&self, ctx: &mut CacheWrapper<P>, deadline: Timestamp) -> (Vec<Receipt>, Option<String>)
    where
        P: CacheRead + CacheWrite + Send;
}

/// A `ContractVm` that does nothing, for nodes or tests that never exercise
/// contract execution.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopVm;

#[async_trait]
impl ContractVm for NoopVm {
    async fn execute<P>(&self, _ctx: &mut CacheWrapper<P>, _deadline: Timestamp) -> (Vec<Receipt>, Option<String>)
    where
        P: CacheRead + CacheWrite + Send,
    {
        (vec![], None)
    }
}
