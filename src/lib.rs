//! Tokengate Library
//!
//! Token-gated chat-group membership verifier:
//! - Per-user verification state machine (address → balance → transfer → invite)
//! - Ordered balance/transfer provider fallback across Moralis, Etherscan,
//!   public JSON-RPC and Solana RPC
//! - 3-strike group admission control with owner-approved whitelist
//! - Periodic re-verification sweep revoking access below threshold

pub mod admission;
pub mod chat;
pub mod config;
pub mod links;
pub mod models;
pub mod providers;
pub mod session;
pub mod store;
pub mod sweep;
pub mod utils;

pub use admission::{GroupAdmission, MAX_REJECTIONS};
pub use chat::{BotApiChat, ChatPlatform, MemberStatus, INVITE_TTL_SECS};
pub use config::AppConfig;
pub use links::LinkRegistry;
pub use models::{ErrorCode, GateError, GateResult, GroupConfig, RejectionRecord, UserRecord};
pub use providers::{BalanceChain, BalanceProvider, ProviderSet, TransferChain, TransferProvider};
pub use session::{
    AddressOutcome, JoinOutcome, SetupOutcome, StartOutcome, TransferOutcome, Verifier,
};
pub use store::{JsonFileStore, MemoryStore, Store};
pub use sweep::{ReverificationSweep, SweepReport};
