//! Centralized Error Handling Module
//!
//! Every failure carries a unique error code so production logs can be
//! filtered and counted without parsing free-form messages.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - VALIDATION_xxx: malformed user input, always recoverable (re-prompt)
//! - PROVIDER_xxx: balance/transfer lookup failures, absorbed as negative results
//! - SESSION_xxx: verification session terminal conditions
//! - STORAGE_xxx: persistence failures, surfaced to the caller
//! - CFG_xxx: configuration errors

use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct GateError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl GateError {
    /// Create a new GateError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create GateError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for GateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Validation Errors
    // ============================================
    /// Malformed wallet/token address for the chain family
    ValidationAddress,
    /// Malformed decimal amount (min balance input)
    ValidationAmount,

    // ============================================
    // Provider Errors
    // ============================================
    /// Provider HTTP request failed
    ProviderRequestFailed,
    /// Provider request timed out
    ProviderTimeout,
    /// Provider rate limited (HTTP 429)
    ProviderRateLimited,
    /// Provider returned malformed/unexpected payload
    ProviderBadResponse,
    /// No provider in the fallback chain could answer
    ProviderExhausted,

    // ============================================
    // Session Errors
    // ============================================
    /// Wallet already bound to another verified user in the group
    RaceConflict,
    /// Transfer-check window (5 minutes) exceeded
    SessionTimeout,
    /// No active session for this user
    SessionNotFound,

    // ============================================
    // Storage Errors
    // ============================================
    /// Collection load failed
    StorageRead,
    /// Collection save failed
    StorageWrite,

    // ============================================
    // Configuration Errors
    // ============================================
    /// Missing credential/environment variable
    ConfigMissingCredential,
    /// Chain alias not in the registry
    ConfigUnsupportedChain,
    /// Group has no GroupConfig yet
    ConfigGroupNotFound,

    // ============================================
    // Chat Platform Errors
    // ============================================
    /// Invite link creation failed
    ChatInviteFailed,
    /// Outbound chat call failed (message, kick, member lookup)
    ChatCallFailed,

    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationAddress => "VALIDATION_ADDRESS",
            Self::ValidationAmount => "VALIDATION_AMOUNT",

            Self::ProviderRequestFailed => "PROVIDER_REQUEST_FAILED",
            Self::ProviderTimeout => "PROVIDER_TIMEOUT",
            Self::ProviderRateLimited => "PROVIDER_RATE_LIMITED",
            Self::ProviderBadResponse => "PROVIDER_BAD_RESPONSE",
            Self::ProviderExhausted => "PROVIDER_EXHAUSTED",

            Self::RaceConflict => "SESSION_RACE_CONFLICT",
            Self::SessionTimeout => "SESSION_TIMEOUT",
            Self::SessionNotFound => "SESSION_NOT_FOUND",

            Self::StorageRead => "STORAGE_READ",
            Self::StorageWrite => "STORAGE_WRITE",

            Self::ConfigMissingCredential => "CFG_MISSING_CREDENTIAL",
            Self::ConfigUnsupportedChain => "CFG_UNSUPPORTED_CHAIN",
            Self::ConfigGroupNotFound => "CFG_GROUP_NOT_FOUND",

            Self::ChatInviteFailed => "CHAT_INVITE_FAILED",
            Self::ChatCallFailed => "CHAT_CALL_FAILED",

            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Validation errors re-prompt the same step instead of terminating
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ValidationAddress | Self::ValidationAmount)
    }

    /// Provider errors are absorbed at the component boundary and become
    /// negative verification results, never user-visible exceptions
    pub fn is_provider(&self) -> bool {
        matches!(
            self,
            Self::ProviderRequestFailed
                | Self::ProviderTimeout
                | Self::ProviderRateLimited
                | Self::ProviderBadResponse
                | Self::ProviderExhausted
        )
    }
}

// ============================================
// Convenience constructors
// ============================================

impl GateError {
    /// Malformed address input
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationAddress, msg)
    }

    /// Malformed amount input
    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationAmount, msg)
    }

    /// Provider request failed
    pub fn provider_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProviderRequestFailed, msg)
    }

    /// Provider rate limited
    pub fn provider_rate_limited() -> Self {
        Self::new(ErrorCode::ProviderRateLimited, "Rate limited (HTTP 429)")
    }

    /// Provider returned malformed payload
    pub fn bad_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProviderBadResponse, msg)
    }

    /// Duplicate wallet claim in the same group
    pub fn race_conflict(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RaceConflict, msg)
    }

    /// Transfer-check window exceeded
    pub fn session_timeout() -> Self {
        Self::new(
            ErrorCode::SessionTimeout,
            "No qualifying transfer within 5 minutes",
        )
    }

    /// Collection load failed
    pub fn storage_read(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageRead, msg)
    }

    /// Collection save failed
    pub fn storage_write(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageWrite, msg)
    }

    /// Missing credential
    pub fn missing_credential(name: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissingCredential,
            format!("Missing credential: {}", name),
        )
    }

    /// Unsupported chain alias
    pub fn unsupported_chain(alias: &str) -> Self {
        Self::new(
            ErrorCode::ConfigUnsupportedChain,
            format!("Unsupported chain: {}", alias),
        )
    }

    /// Group not configured
    pub fn group_not_found(group_id: &str) -> Self {
        Self::new(
            ErrorCode::ConfigGroupNotFound,
            format!("No configuration for group {}", group_id),
        )
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type GateResult<T> = Result<T, GateError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<std::io::Error> for GateError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::StorageRead, "IO error", err)
    }
}

impl From<reqwest::Error> for GateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::ProviderTimeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::ProviderRequestFailed, "Connection failed")
        } else {
            Self::new(ErrorCode::ProviderRequestFailed, err.to_string())
        }
    }
}

impl From<serde_json::Error> for GateError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::ProviderBadResponse, "JSON parse error", err)
    }
}
