//! Shared test fixtures for `corewire-core` unit tests.

use serde_json::{json, Value};

use crate::classify::ResponseBody;

/// Genesis block coinbase txid.
pub const TXID_HEX: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

/// Mainnet genesis block hash.
pub const BLOCK_HASH_HEX: &str =
    "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";

pub const BECH32_ADDRESS: &str = "bc1q09vm5lfy0j5reeulh4x5752q25uqqvz34hufdl";

pub const BASE58_ADDRESS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

/// A deterministic 64-character hex hash distinguished by one byte.
pub fn hash_hex(b: u8) -> String {
    format!("{b:02x}").repeat(32)
}

pub fn success_body(id: &str, result: Value) -> ResponseBody {
    ResponseBody::Json(json!({"id": id, "result": result, "error": null}))
}

pub fn method_error_body(id: &str, code: i64, message: &str) -> ResponseBody {
    ResponseBody::Json(json!({
        "id": id,
        "result": null,
        "error": {"code": code, "message": message}
    }))
}
