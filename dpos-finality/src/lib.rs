//! The two-pointer finality core: `local_final` / `global_final` pointer
//! bookkeeping, quorum arithmetic, inbound message validation, and outbound
//! broadcast gating for the Confirm/Finality PBFT rounds.

pub mod broadcast;
pub mod chain;
pub mod pointers;
pub mod quorum;
pub mod relay;
pub mod validate;

pub use broadcast::{broadcast_block_confirm, broadcast_block_finality, BroadcastConfig, PeerBus, Signer};
pub use chain::ChainIndex;
pub use pointers::{
    FinalityConfig, FinalityError, FinalityManager, DEFAULT_GLOBAL_WINDOW, DEFAULT_LOCAL_WINDOW,
};
pub use quorum::quorum_met;
pub use relay::{add_block_confirm_message, add_block_finality_message, Accepted, Rejection};
pub use validate::{check_pbft_message, check_pbft_message_signer, MinerKeys, ValidationError, PBFT_LATEST_BLOCK_COUNT};
