//! Data model and error types

pub mod errors;
pub mod types;

pub use errors::{ErrorCode, GateError, GateResult};
pub use types::{
    GroupConfig, GroupConfigs, PendingGroup, PendingWhitelist, RejectedGroups, RejectionRecord,
    UserRecord, UserRecords, VerificationLink, VerificationLinks, Whitelist,
};
