//! Classifies a transport outcome into exactly one [`Response`] variant.
//!
//! Pure function of `(status, body)`: no I/O, no retries, no shared state.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{MethodError, MethodErrorReason, TransportError, TransportReason};

/// Statuses that map to a named transport reason when the body carries no
/// JSON-RPC error object.
const KNOWN_ERROR_STATUSES: [u16; 9] = [400, 401, 403, 404, 405, 500, 502, 503, 504];

/// Response body as handed over by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Raw(String),
}

impl ResponseBody {
    /// Decode `text` as JSON, keeping it raw when it is not.
    pub fn from_text(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Raw(text),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Self::Json(value) => value.to_string(),
            Self::Raw(text) => text.clone(),
        }
    }
}

/// The classified outcome of one call.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Success { id: Option<String>, result: Value },
    MethodError(MethodError),
    TransportError(TransportError),
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Decision table, in precedence order:
///
/// 1. HTTP 200, `error` null and `result` present: success.
/// 2. `result` null and a `{code, message}` error, at any status: method error.
/// 3. A known HTTP error status without a JSON-RPC error body: transport error.
/// 4. Anything else: `unknown_error` with the raw body attached.
pub fn classify(status: u16, body: &ResponseBody) -> Response {
    if let ResponseBody::Json(Value::Object(envelope)) = body {
        let error = envelope.get("error").filter(|e| !e.is_null());
        let result = envelope.get("result");

        if status == 200 && error.is_none() {
            if let Some(result) = result {
                return Response::Success {
                    id: echoed_id(envelope),
                    result: result.clone(),
                };
            }
        }

        if result.map_or(true, Value::is_null) {
            if let Some(parsed) = error.and_then(|e| JsonRpcError::deserialize(e).ok()) {
                return Response::MethodError(MethodError {
                    id: echoed_id(envelope),
                    code: parsed.code,
                    message: parsed.message,
                    reason: reason_for_code(parsed.code),
                });
            }
        }
    }

    if KNOWN_ERROR_STATUSES.contains(&status) {
        return Response::TransportError(
            TransportError::from_status(reason_for_status(status), status)
                .with_body(body.to_text()),
        );
    }

    Response::TransportError(
        TransportError::from_status(TransportReason::UnknownError, status)
            .with_body(body.to_text())
            .with_message("unexpected response shape"),
    )
}

fn echoed_id(envelope: &Map<String, Value>) -> Option<String> {
    match envelope.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Bitcoin Core's RPC error codes (`src/rpc/protocol.h`).
pub const fn reason_for_code(code: i64) -> MethodErrorReason {
    use MethodErrorReason::*;

    match code {
        -32700 => ParseError,
        -32600 => InvalidRequest,
        -32601 => MethodNotFound,
        -32602 => InvalidParams,
        -32603 => InternalError,
        -1 => MiscError,
        -3 => TypeError,
        -4 => WalletError,
        -5 => InvalidAddressOrKey,
        -6 => WalletInsufficientFunds,
        -7 => OutOfMemory,
        -8 => InvalidParameter,
        -9 => ClientNotConnected,
        -10 => ClientInInitialDownload,
        -11 => WalletInvalidLabelName,
        -12 => WalletKeypoolRanOut,
        -13 => WalletUnlockNeeded,
        -14 => WalletPassphraseIncorrect,
        -15 => WalletWrongEncState,
        -16 => WalletEncryptionFailed,
        -17 => WalletAlreadyUnlocked,
        -18 => WalletNotFound,
        -19 => WalletNotSpecified,
        -20 => DatabaseError,
        -22 => DeserializationError,
        -23 => ClientNodeAlreadyAdded,
        -24 => ClientNodeNotAdded,
        -25 => VerifyError,
        -26 => VerifyRejected,
        -27 => VerifyAlreadyInChain,
        -28 => InWarmup,
        -29 => ClientNodeNotConnected,
        -30 => ClientInvalidIpOrSubnet,
        -31 => ClientP2pDisabled,
        -32 => MethodDeprecated,
        -33 => ClientMempoolDisabled,
        -34 => ClientNodeCapacityReached,
        -35 => WalletAlreadyLoaded,
        -36 => WalletAlreadyExists,
        _ => UnknownRpcError,
    }
}

pub const fn reason_for_status(status: u16) -> TransportReason {
    match status {
        400 => TransportReason::BadRequest,
        401 => TransportReason::Unauthorized,
        403 => TransportReason::Forbidden,
        404 => TransportReason::NotFound,
        405 => TransportReason::MethodNotAllowed,
        500 => TransportReason::InternalServerError,
        502 => TransportReason::BadGateway,
        503 => TransportReason::ServiceUnavailable,
        504 => TransportReason::GatewayTimeout,
        _ => TransportReason::UnknownError,
    }
}
