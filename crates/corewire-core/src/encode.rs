//! Serializes validated requests into JSON-RPC 1.0 envelopes.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::Value;

use crate::schema::RpcRequest;

pub const JSONRPC_VERSION: &str = "1.0";

/// Characters left unescaped in a wallet path segment (RFC 3986 unreserved).
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A wire-ready call: the JSON body fields plus the URL path to post to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodedRequest {
    pub jsonrpc: &'static str,
    pub id: String,
    pub method: &'static str,
    pub params: Vec<Value>,
    /// `/` or `/wallet/<name>`; not part of the JSON body.
    #[serde(skip)]
    pub path: String,
}

/// Encode `request` with the given id.
///
/// Path precedence: explicit override, then the request's wallet, then `/`.
pub fn encode<R: RpcRequest>(
    request: &R,
    id: impl Into<String>,
    path_override: Option<&str>,
) -> EncodedRequest {
    let path = match (path_override, request.wallet_name()) {
        (Some(path), _) => path.to_owned(),
        (None, Some(wallet)) => wallet_path(wallet),
        (None, None) => "/".to_owned(),
    };

    EncodedRequest {
        jsonrpc: JSONRPC_VERSION,
        id: id.into(),
        method: R::METHOD,
        params: positional(request.arguments()),
        path,
    }
}

/// Collapse argument slots into Bitcoin Core's positional array.
///
/// Trailing omitted slots are dropped; an omitted slot followed by a
/// supplied one becomes an explicit `null`.
pub fn positional(mut arguments: Vec<Option<Value>>) -> Vec<Value> {
    while matches!(arguments.last(), Some(None)) {
        arguments.pop();
    }
    arguments
        .into_iter()
        .map(|arg| arg.unwrap_or(Value::Null))
        .collect()
}

pub fn wallet_path(wallet: &str) -> String {
    format!("/wallet/{}", utf8_percent_encode(wallet, PATH_SEGMENT))
}
