//! Representative Bitcoin Core RPC methods, grouped the way Bitcoin Core's
//! `help` output groups them.
//!
//! Every request implements [`RpcRequest`](crate::schema::RpcRequest) and
//! names its result schema through `Output`.

pub mod blockchain;
pub mod mining;
pub mod rawtransactions;
pub mod util;
pub mod wallet;

use serde::Serialize;
use serde_json::{json, Value};

use crate::params::Validation;
use crate::validate;

/// Wallet names are bounded so they stay usable as a path segment.
pub const WALLET_NAME_MAX_LEN: usize = 64;

/// Optional `wallet_name`, which scopes the call to `/wallet/<name>`.
pub(crate) fn wallet_name(v: &mut Validation) -> Option<String> {
    let name = v.string("wallet_name")?;
    v.check(validate::length(
        "wallet_name",
        &name,
        Some(1),
        Some(WALLET_NAME_MAX_LEN),
    ));
    Some(name)
}

/// Required address with length and charset checks.
pub(crate) fn address(v: &mut Validation, field: &str) -> Option<String> {
    let address = v.required(field, Validation::string)?;
    match validate::bitcoin_address_format(field, &address) {
        Ok(()) => Some(address),
        Err(err) => {
            v.push(err);
            None
        }
    }
}

pub(crate) fn arg(value: impl Serialize) -> Option<Value> {
    Some(json!(value))
}

pub(crate) fn opt_arg<T: Serialize>(value: &Option<T>) -> Option<Value> {
    value.as_ref().map(|v| json!(v))
}
