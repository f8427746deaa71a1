//! Error types surfaced by the RPC pipeline.
//!
//! Three disjoint kinds reach the caller and are never conflated:
//! [`ValidationFailure`] (bad input, or a server payload that fails result
//! decoding), [`MethodError`] (Bitcoin Core rejected the call) and
//! [`TransportError`] (the HTTP exchange around the call failed).
//! [`CoreError`] unifies them at the API boundary.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;

// ==============================================================================
// Field Violations
// ==============================================================================

/// Fieldless tag for a [`Violation`], convenient for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Required,
    InvalidType,
    Length,
    Number,
    Inclusion,
    Format,
    Exclusive,
    Forbidden,
}

/// Comparison operator used by numeric range checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl Comparison {
    /// Whether `value <op> bound` holds.
    pub fn holds<T: PartialOrd>(self, value: T, bound: T) -> bool {
        match self {
            Self::GreaterThan => value > bound,
            Self::GreaterThanOrEqual => value >= bound,
            Self::LessThan => value < bound,
            Self::LessThanOrEqual => value <= bound,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::GreaterThan => "greater than",
            Self::GreaterThanOrEqual => "greater than or equal to",
            Self::LessThan => "less than",
            Self::LessThanOrEqual => "less than or equal to",
        }
    }
}

/// Structured metadata describing why a field was rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "validation", rename_all = "snake_case")]
pub enum Violation {
    Required,
    InvalidType {
        expected: &'static str,
    },
    /// `min == max` denotes an exact-length requirement.
    Length {
        min: Option<usize>,
        max: Option<usize>,
    },
    Number {
        op: Comparison,
        bound: f64,
    },
    Inclusion {
        allowed: Vec<String>,
    },
    Format {
        expected: &'static str,
    },
    Exclusive {
        other: String,
    },
    Forbidden {
        condition_field: String,
        condition_value: Value,
    },
}

impl Violation {
    pub fn kind(&self) -> ViolationKind {
        match self {
            Self::Required => ViolationKind::Required,
            Self::InvalidType { .. } => ViolationKind::InvalidType,
            Self::Length { .. } => ViolationKind::Length,
            Self::Number { .. } => ViolationKind::Number,
            Self::Inclusion { .. } => ViolationKind::Inclusion,
            Self::Format { .. } => ViolationKind::Format,
            Self::Exclusive { .. } => ViolationKind::Exclusive,
            Self::Forbidden { .. } => ViolationKind::Forbidden,
        }
    }
}

/// A single rejected field: its path, a human-readable message and the
/// structured violation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub violation: Violation,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>, violation: Violation) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            violation,
        }
    }

    pub fn required(field: impl Into<String>) -> Self {
        Self::new(field, "can't be blank", Violation::Required)
    }

    pub fn invalid_type(field: impl Into<String>, expected: &'static str) -> Self {
        Self::new(
            field,
            format!("invalid type, expected {expected}"),
            Violation::InvalidType { expected },
        )
    }

    pub fn kind(&self) -> ViolationKind {
        self.violation.kind()
    }

    /// Re-root this error under `prefix` (e.g. `requests[2]`).
    pub(crate) fn prefixed(mut self, prefix: &str) -> Self {
        self.field = join_path(prefix, &self.field);
        self
    }
}

/// Join a field path prefix and a child segment.
///
/// Index segments (`[3]`) attach directly; named segments use a dot.
pub(crate) fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_owned()
    } else if field.is_empty() {
        prefix.to_owned()
    } else if field.starts_with('[') {
        format!("{prefix}{field}")
    } else {
        format!("{prefix}.{field}")
    }
}

// ==============================================================================
// Validation Failure
// ==============================================================================

/// One or more field-level errors produced by a request or result schema.
///
/// Every violated field is reported; validation never stops at the first
/// error.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("validation failed: {}", summarize(.errors))]
pub struct ValidationFailure {
    errors: Vec<FieldError>,
}

impl ValidationFailure {
    pub fn new(errors: Vec<FieldError>) -> Self {
        debug_assert!(!errors.is_empty(), "a validation failure needs at least one error");
        Self { errors }
    }

    pub fn single(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }

    /// The set of failing field paths.
    pub fn fields(&self) -> BTreeSet<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }

    pub fn errors_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldError> + 'a {
        self.errors.iter().filter(move |e| e.field == field)
    }

    /// Whether `field` failed with a violation of `kind`.
    pub fn has(&self, field: &str, kind: ViolationKind) -> bool {
        self.errors_for(field).any(|e| e.kind() == kind)
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

// ==============================================================================
// Method Error
// ==============================================================================

/// Symbolic reason for a Bitcoin Core JSON-RPC error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodErrorReason {
    // Standard JSON-RPC 2.0 errors
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    // General application errors
    MiscError,
    TypeError,
    InvalidAddressOrKey,
    OutOfMemory,
    InvalidParameter,
    DatabaseError,
    DeserializationError,
    VerifyError,
    VerifyRejected,
    VerifyAlreadyInChain,
    InWarmup,
    MethodDeprecated,
    // P2P client errors
    ClientNotConnected,
    ClientInInitialDownload,
    ClientNodeAlreadyAdded,
    ClientNodeNotAdded,
    ClientNodeNotConnected,
    ClientInvalidIpOrSubnet,
    ClientP2pDisabled,
    ClientNodeCapacityReached,
    ClientMempoolDisabled,
    // Wallet errors
    WalletError,
    WalletInsufficientFunds,
    WalletInvalidLabelName,
    WalletKeypoolRanOut,
    WalletUnlockNeeded,
    WalletPassphraseIncorrect,
    WalletWrongEncState,
    WalletEncryptionFailed,
    WalletAlreadyUnlocked,
    WalletNotFound,
    WalletNotSpecified,
    WalletAlreadyLoaded,
    WalletAlreadyExists,
    UnknownRpcError,
}

impl MethodErrorReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ParseError => "parse_error",
            Self::InvalidRequest => "invalid_request",
            Self::MethodNotFound => "method_not_found",
            Self::InvalidParams => "invalid_params",
            Self::InternalError => "internal_error",
            Self::MiscError => "misc_error",
            Self::TypeError => "type_error",
            Self::InvalidAddressOrKey => "invalid_address_or_key",
            Self::OutOfMemory => "out_of_memory",
            Self::InvalidParameter => "invalid_parameter",
            Self::DatabaseError => "database_error",
            Self::DeserializationError => "deserialization_error",
            Self::VerifyError => "verify_error",
            Self::VerifyRejected => "verify_rejected",
            Self::VerifyAlreadyInChain => "verify_already_in_chain",
            Self::InWarmup => "in_warmup",
            Self::MethodDeprecated => "method_deprecated",
            Self::ClientNotConnected => "client_not_connected",
            Self::ClientInInitialDownload => "client_in_initial_download",
            Self::ClientNodeAlreadyAdded => "client_node_already_added",
            Self::ClientNodeNotAdded => "client_node_not_added",
            Self::ClientNodeNotConnected => "client_node_not_connected",
            Self::ClientInvalidIpOrSubnet => "client_invalid_ip_or_subnet",
            Self::ClientP2pDisabled => "client_p2p_disabled",
            Self::ClientNodeCapacityReached => "client_node_capacity_reached",
            Self::ClientMempoolDisabled => "client_mempool_disabled",
            Self::WalletError => "wallet_error",
            Self::WalletInsufficientFunds => "wallet_insufficient_funds",
            Self::WalletInvalidLabelName => "wallet_invalid_label_name",
            Self::WalletKeypoolRanOut => "wallet_keypool_ran_out",
            Self::WalletUnlockNeeded => "wallet_unlock_needed",
            Self::WalletPassphraseIncorrect => "wallet_passphrase_incorrect",
            Self::WalletWrongEncState => "wallet_wrong_enc_state",
            Self::WalletEncryptionFailed => "wallet_encryption_failed",
            Self::WalletAlreadyUnlocked => "wallet_already_unlocked",
            Self::WalletNotFound => "wallet_not_found",
            Self::WalletNotSpecified => "wallet_not_specified",
            Self::WalletAlreadyLoaded => "wallet_already_loaded",
            Self::WalletAlreadyExists => "wallet_already_exists",
            Self::UnknownRpcError => "unknown_rpc_error",
        }
    }
}

impl std::fmt::Display for MethodErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bitcoin Core received the call and rejected it.
///
/// The raw numeric `code` is always preserved, even when `reason` is
/// [`MethodErrorReason::UnknownRpcError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("RPC error {code} ({reason}): {message}")]
pub struct MethodError {
    pub id: Option<String>,
    pub code: i64,
    pub message: String,
    pub reason: MethodErrorReason,
}

// ==============================================================================
// Transport Error
// ==============================================================================

/// Symbolic reason for a failure at the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportReason {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    /// The request timed out before any response arrived.
    Timeout,
    /// The connection could not be established or was dropped.
    ConnectionFailed,
    UnknownError,
}

impl TransportReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::InternalServerError => "internal_server_error",
            Self::BadGateway => "bad_gateway",
            Self::ServiceUnavailable => "service_unavailable",
            Self::GatewayTimeout => "gateway_timeout",
            Self::Timeout => "timeout",
            Self::ConnectionFailed => "connection_failed",
            Self::UnknownError => "unknown_error",
        }
    }

    /// Only 5xx-class reasons are worth retrying.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::InternalServerError
                | Self::BadGateway
                | Self::ServiceUnavailable
                | Self::GatewayTimeout
        )
    }
}

impl std::fmt::Display for TransportReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The HTTP exchange failed before or around the JSON-RPC call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{}", describe_transport(self))]
pub struct TransportError {
    pub reason: TransportReason,
    pub status: Option<u16>,
    /// Raw response body, kept for diagnostics.
    pub body: Option<String>,
    pub message: Option<String>,
}

impl TransportError {
    pub fn from_status(reason: TransportReason, status: u16) -> Self {
        Self {
            reason,
            status: Some(status),
            body: None,
            message: None,
        }
    }

    /// A failure with no HTTP response at all.
    pub fn connection(reason: TransportReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            status: None,
            body: None,
            message: Some(message.into()),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.reason.is_retryable()
    }
}

fn describe_transport(err: &TransportError) -> String {
    let mut detail = err.reason.to_string();
    if let Some(status) = err.status {
        detail.push_str(&format!(", HTTP {status}"));
    }
    let mut out = format!("transport error ({detail})");
    if let Some(message) = &err.message {
        out.push_str(&format!(": {message}"));
    }
    out
}

// ==============================================================================
// Unified Error
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error(transparent)]
    Method(#[from] MethodError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl CoreError {
    /// Validation failures and method errors are never retryable; transport
    /// errors only for 5xx-class reasons.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_retryable(),
            Self::Validation(_) | Self::Method(_) => false,
        }
    }
}

// ==============================================================================
// Transport Configuration
// ==============================================================================

/// Rejected HTTP transport settings, raised before any call is made.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid connection `{url}`: expected HTTP(S) URL ({reason})")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported connection scheme `{0}`; expected http or https")]
    UnsupportedScheme(String),

    #[error("both rpc user and rpc pass must be set together")]
    PartialCredentials,

    #[error("failed to read rpc cookie file {}: {source}", .path.display())]
    CookieUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rpc cookie file {} must contain non-empty `username:password`", .0.display())]
    MalformedCookie(PathBuf),

    #[error("requests_per_second must be at least 1")]
    ZeroRateLimit,

    #[error("failed to build http client: {0}")]
    HttpClient(String),
}
