//! The request and result schema contracts every RPC method implements.

use bitcoin::{Amount, BlockHash, SignedAmount, Txid};
use serde_json::Value;

use crate::error::{join_path, FieldError, ValidationFailure};
use crate::params::{self, root_name, IntoParams, Params};

// ==============================================================================
// Request Schema
// ==============================================================================

/// A validated Bitcoin Core RPC request.
///
/// Instances only come out of [`RpcRequest::build`]; request fields are
/// private, so there is no way to hand the encoder an unvalidated value.
pub trait RpcRequest: Sized {
    /// Lowercase Bitcoin Core method name.
    const METHOD: &'static str;

    /// Result schema for a successful call.
    type Output: RpcResult;

    /// Apply defaults and run every validator over normalized params.
    fn validate(params: Params) -> Result<Self, ValidationFailure>;

    /// Argument slots in Bitcoin Core's positional order. `None` marks an
    /// omitted optional argument; the encoder decides whether it becomes a
    /// `null` placeholder or is dropped from the tail.
    fn arguments(&self) -> Vec<Option<Value>>;

    /// Wallet the call is scoped to, if any.
    fn wallet_name(&self) -> Option<&str> {
        None
    }

    fn build(params: impl IntoParams) -> Result<Self, ValidationFailure> {
        Self::validate(params.into_params()?)
    }

    /// Like [`RpcRequest::build`], but panics with the [`ValidationFailure`]
    /// as the panic payload.
    fn build_or_panic(params: impl IntoParams) -> Self {
        match Self::build(params) {
            Ok(request) => request,
            Err(failure) => std::panic::panic_any(failure),
        }
    }
}

// ==============================================================================
// Result Schema
// ==============================================================================

/// Typed decoding of a successful response's `result` payload.
pub trait RpcResult: Sized {
    /// Decode a payload located at `path` (empty for the top-level result).
    fn decode_at(raw: &Value, path: &str) -> Result<Self, ValidationFailure>;

    fn decode(raw: &Value) -> Result<Self, ValidationFailure> {
        Self::decode_at(raw, "")
    }

    /// Like [`RpcResult::decode`], but panics with the [`ValidationFailure`]
    /// as the panic payload.
    fn decode_or_panic(raw: &Value) -> Self {
        match Self::decode(raw) {
            Ok(result) => result,
            Err(failure) => std::panic::panic_any(failure),
        }
    }
}

fn scalar<T>(
    raw: &Value,
    path: &str,
    cast: impl FnOnce(&str, &Value) -> Result<T, FieldError>,
    expected: &'static str,
) -> Result<T, ValidationFailure> {
    let field = root_name(path);
    if raw.is_null() {
        return Err(ValidationFailure::single(FieldError::invalid_type(
            field, expected,
        )));
    }
    cast(field, raw).map_err(ValidationFailure::single)
}

/// Calls like `walletpassphrase` succeed with a `null` result.
impl RpcResult for () {
    fn decode_at(raw: &Value, path: &str) -> Result<Self, ValidationFailure> {
        if raw.is_null() {
            Ok(())
        } else {
            Err(ValidationFailure::single(FieldError::invalid_type(
                root_name(path),
                "null",
            )))
        }
    }
}

impl RpcResult for Value {
    fn decode_at(raw: &Value, _path: &str) -> Result<Self, ValidationFailure> {
        Ok(raw.clone())
    }
}

impl RpcResult for bool {
    fn decode_at(raw: &Value, path: &str) -> Result<Self, ValidationFailure> {
        scalar(raw, path, params::cast_boolean, "boolean")
    }
}

impl RpcResult for u64 {
    fn decode_at(raw: &Value, path: &str) -> Result<Self, ValidationFailure> {
        scalar(raw, path, params::cast_unsigned, "integer")
    }
}

impl RpcResult for i64 {
    fn decode_at(raw: &Value, path: &str) -> Result<Self, ValidationFailure> {
        scalar(raw, path, params::cast_integer, "integer")
    }
}

impl RpcResult for String {
    fn decode_at(raw: &Value, path: &str) -> Result<Self, ValidationFailure> {
        scalar(
            raw,
            path,
            |field, value| {
                value
                    .as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| FieldError::invalid_type(field, "string"))
            },
            "string",
        )
    }
}

impl RpcResult for Amount {
    fn decode_at(raw: &Value, path: &str) -> Result<Self, ValidationFailure> {
        scalar(raw, path, params::cast_amount, "amount")
    }
}

impl RpcResult for SignedAmount {
    fn decode_at(raw: &Value, path: &str) -> Result<Self, ValidationFailure> {
        scalar(raw, path, params::cast_signed_amount, "amount")
    }
}

impl RpcResult for Txid {
    fn decode_at(raw: &Value, path: &str) -> Result<Self, ValidationFailure> {
        scalar(raw, path, params::cast_txid, "txid")
    }
}

impl RpcResult for BlockHash {
    fn decode_at(raw: &Value, path: &str) -> Result<Self, ValidationFailure> {
        scalar(raw, path, params::cast_block_hash, "block hash")
    }
}

/// Element-wise decoding. Every failing element is reported (not just the
/// first), each under its `[index]` path.
impl<T: RpcResult> RpcResult for Vec<T> {
    fn decode_at(raw: &Value, path: &str) -> Result<Self, ValidationFailure> {
        let Value::Array(items) = raw else {
            return Err(ValidationFailure::single(FieldError::invalid_type(
                root_name(path),
                "list",
            )));
        };

        let mut out = Vec::with_capacity(items.len());
        let mut errors = Vec::new();
        for (index, item) in items.iter().enumerate() {
            match T::decode_at(item, &join_path(path, &format!("[{index}]"))) {
                Ok(v) => out.push(v),
                Err(failure) => errors.extend(failure.into_errors()),
            }
        }

        if errors.is_empty() {
            Ok(out)
        } else {
            Err(ValidationFailure::new(errors))
        }
    }
}
