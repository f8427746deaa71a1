//! Chain state RPCs.

use std::collections::BTreeMap;

use bitcoin::BlockHash;
use serde::Serialize;
use serde_json::Value;

use super::arg;
use crate::error::ValidationFailure;
use crate::params::{Params, Validation};
use crate::schema::{RpcRequest, RpcResult};

// ==============================================================================
// getblockchaininfo
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetBlockchainInfo;

impl RpcRequest for GetBlockchainInfo {
    const METHOD: &'static str = "getblockchaininfo";
    type Output = GetBlockchainInfoResult;

    fn validate(params: Params) -> Result<Self, ValidationFailure> {
        Validation::new(params).finish(|| Some(Self))
    }

    fn arguments(&self) -> Vec<Option<Value>> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetBlockchainInfoResult {
    pub chain: String,
    pub blocks: u64,
    pub headers: u64,
    pub bestblockhash: BlockHash,
    pub difficulty: f64,
    pub time: Option<u64>,
    pub mediantime: u64,
    pub verificationprogress: f64,
    pub initialblockdownload: bool,
    pub chainwork: String,
    pub size_on_disk: u64,
    pub pruned: bool,
    pub pruneheight: Option<u64>,
    pub automatic_pruning: Option<bool>,
    pub prune_target_size: Option<u64>,
    /// Empty on nodes that moved deployment status to `getdeploymentinfo`.
    pub softforks: BTreeMap<String, Softfork>,
    pub warnings: Vec<String>,
}

impl RpcResult for GetBlockchainInfoResult {
    fn decode_at(raw: &Value, path: &str) -> Result<Self, ValidationFailure> {
        let mut v = Validation::for_result(raw, path)?;

        let chain = v.required("chain", Validation::string);
        let blocks = v.required("blocks", Validation::unsigned);
        let headers = v.required("headers", Validation::unsigned);
        let bestblockhash = v.required("bestblockhash", Validation::block_hash);
        let difficulty = v.required("difficulty", Validation::float);
        let time = v.unsigned("time");
        let mediantime = v.required("mediantime", Validation::unsigned);
        let verificationprogress = v.required("verificationprogress", Validation::float);
        let initialblockdownload = v.required("initialblockdownload", Validation::boolean);
        let chainwork = v.required("chainwork", Validation::hex);
        let size_on_disk = v.required("size_on_disk", Validation::unsigned);
        let pruned = v.required("pruned", Validation::boolean);
        let pruneheight = v.unsigned("pruneheight");
        let automatic_pruning = v.boolean("automatic_pruning");
        let prune_target_size = v.unsigned("prune_target_size");
        let softforks = v
            .embeds_map("softforks", |_, fork| Softfork::from_validation(fork))
            .unwrap_or_default();
        let warnings = warnings(&mut v);

        v.finish(|| {
            Some(Self {
                chain: chain?,
                blocks: blocks?,
                headers: headers?,
                bestblockhash: bestblockhash?,
                difficulty: difficulty?,
                time,
                mediantime: mediantime?,
                verificationprogress: verificationprogress?,
                initialblockdownload: initialblockdownload?,
                chainwork: chainwork?,
                size_on_disk: size_on_disk?,
                pruned: pruned?,
                pruneheight,
                automatic_pruning,
                prune_target_size,
                softforks,
                warnings,
            })
        })
    }
}

/// Bitcoin Core reports `warnings` as one string before v28 and as a list
/// after. An empty string means no warnings.
fn warnings(v: &mut Validation) -> Vec<String> {
    let is_list = matches!(v.raw("warnings"), Some(Value::Array(_)));
    if is_list {
        v.strings("warnings").unwrap_or_default()
    } else {
        v.string("warnings").into_iter().collect()
    }
}

/// A soft fork deployment, dispatched on its `type` discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Softfork {
    /// Activated by a hard-coded height.
    Buried { active: bool, height: u64 },
    /// Signalled through BIP9 version bits.
    Bip9 {
        active: bool,
        height: Option<u64>,
        bip9: Bip9Info,
    },
}

impl Softfork {
    pub const TYPES: [&'static str; 2] = ["buried", "bip9"];

    pub fn is_active(&self) -> bool {
        match self {
            Self::Buried { active, .. } | Self::Bip9 { active, .. } => *active,
        }
    }

    fn from_validation(v: &mut Validation) -> Option<Self> {
        let active = v.required("active", Validation::boolean);
        let kind = v.required("type", |v, f| v.one_of(f, &Self::TYPES))?;

        match kind.as_str() {
            "buried" => {
                let height = v.required("height", Validation::unsigned);
                Some(Self::Buried {
                    active: active?,
                    height: height?,
                })
            }
            _ => {
                let height = v.unsigned("height");
                let bip9 = v.required("bip9", |v, f| v.embeds_one(f, Bip9Info::from_validation));
                Some(Self::Bip9 {
                    active: active?,
                    height,
                    bip9: bip9?,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bip9Status {
    Defined,
    Started,
    LockedIn,
    Active,
    Failed,
}

impl Bip9Status {
    pub const ALL: [&'static str; 5] = ["defined", "started", "locked_in", "active", "failed"];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "defined" => Some(Self::Defined),
            "started" => Some(Self::Started),
            "locked_in" => Some(Self::LockedIn),
            "active" => Some(Self::Active),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bip9Info {
    pub status: Bip9Status,
    pub bit: Option<u64>,
    pub start_time: i64,
    pub timeout: i64,
    pub since: u64,
    pub min_activation_height: u64,
    pub statistics: Option<Bip9Statistics>,
}

impl Bip9Info {
    fn from_validation(v: &mut Validation) -> Option<Self> {
        let status = v
            .required("status", |v, f| v.one_of(f, &Bip9Status::ALL))
            .and_then(|s| Bip9Status::parse(&s));
        let bit = v.unsigned("bit");
        // `-1` marks an always-active deployment on test chains.
        let start_time = v.required("start_time", Validation::integer);
        let timeout = v.required("timeout", Validation::integer);
        let since = v.required("since", Validation::unsigned);
        let min_activation_height = v.unsigned("min_activation_height").unwrap_or(0);
        let statistics = v.embeds_one("statistics", Bip9Statistics::from_validation);

        Some(Self {
            status: status?,
            bit,
            start_time: start_time?,
            timeout: timeout?,
            since: since?,
            min_activation_height,
            statistics,
        })
    }
}

/// Signalling progress for the current retarget period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bip9Statistics {
    pub period: u64,
    pub threshold: Option<u64>,
    pub elapsed: u64,
    pub count: u64,
    pub possible: Option<bool>,
}

impl Bip9Statistics {
    fn from_validation(v: &mut Validation) -> Option<Self> {
        let period = v.required("period", Validation::unsigned);
        let threshold = v.unsigned("threshold");
        let elapsed = v.required("elapsed", Validation::unsigned);
        let count = v.required("count", Validation::unsigned);
        let possible = v.boolean("possible");

        Some(Self {
            period: period?,
            threshold,
            elapsed: elapsed?,
            count: count?,
            possible,
        })
    }
}

// ==============================================================================
// getblockcount / getblockhash
// ==============================================================================

/// Height of the most-work fully validated chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetBlockCount;

impl RpcRequest for GetBlockCount {
    const METHOD: &'static str = "getblockcount";
    type Output = u64;

    fn validate(params: Params) -> Result<Self, ValidationFailure> {
        Validation::new(params).finish(|| Some(Self))
    }

    fn arguments(&self) -> Vec<Option<Value>> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetBlockHash {
    height: u64,
}

impl GetBlockHash {
    pub fn height(&self) -> u64 {
        self.height
    }
}

impl RpcRequest for GetBlockHash {
    const METHOD: &'static str = "getblockhash";
    type Output = BlockHash;

    fn validate(params: Params) -> Result<Self, ValidationFailure> {
        let mut v = Validation::new(params);
        let height = v.required("height", Validation::unsigned);
        v.finish(|| Some(Self { height: height? }))
    }

    fn arguments(&self) -> Vec<Option<Value>> {
        vec![arg(self.height)]
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::encode::encode;
    use crate::error::ViolationKind;
    use crate::test_util::BLOCK_HASH_HEX;

    fn info(softforks: Value) -> Value {
        json!({
            "chain": "regtest",
            "blocks": 101,
            "headers": 101,
            "bestblockhash": BLOCK_HASH_HEX,
            "difficulty": 4.656542373906925e-10,
            "time": 1_700_000_000,
            "mediantime": 1_700_000_000,
            "verificationprogress": 1,
            "initialblockdownload": false,
            "chainwork": "00000000000000000000000000000000000000000000000000000000000000cc",
            "size_on_disk": 30_000,
            "pruned": false,
            "softforks": softforks,
            "warnings": ""
        })
    }

    #[test]
    fn decodes_buried_and_bip9_softforks() {
        let raw = info(json!({
            "segwit": {"type": "buried", "active": true, "height": 0},
            "taproot": {
                "type": "bip9",
                "active": false,
                "bip9": {
                    "status": "started",
                    "bit": 2,
                    "start_time": -1,
                    "timeout": 9_223_372_036_854_775_807_i64,
                    "since": 0,
                    "min_activation_height": 0,
                    "statistics": {
                        "period": 144,
                        "threshold": 108,
                        "elapsed": 10,
                        "count": 8,
                        "possible": true
                    }
                }
            }
        }));

        let result = GetBlockchainInfoResult::decode(&raw).expect("decodes");
        assert_eq!(result.chain, "regtest");
        assert!(result.warnings.is_empty());
        assert_eq!(
            result.softforks["segwit"],
            Softfork::Buried {
                active: true,
                height: 0
            }
        );
        let Softfork::Bip9 { active, bip9, .. } = &result.softforks["taproot"] else {
            panic!("taproot should be bip9");
        };
        assert!(!active);
        assert_eq!(bip9.status, Bip9Status::Started);
        assert_eq!(bip9.start_time, -1);
        assert_eq!(bip9.statistics.as_ref().map(|s| s.count), Some(8));
    }

    #[test]
    fn nested_softfork_errors_carry_full_path() {
        let raw = info(json!({
            "segwit": {"type": "buried", "active": true},
            "taproot": {
                "type": "bip9",
                "active": true,
                "bip9": {"status": "halfway", "start_time": 0, "timeout": 0, "since": 0}
            },
            "mystery": {"type": "bip8", "active": false}
        }));

        let failure = GetBlockchainInfoResult::decode(&raw).expect_err("invalid softforks");
        assert!(failure.has("softforks.segwit.height", ViolationKind::Required));
        assert!(failure.has("softforks.taproot.bip9.status", ViolationKind::Inclusion));
        assert!(failure.has("softforks.mystery.type", ViolationKind::Inclusion));
        assert_eq!(failure.fields().len(), 3);
    }

    #[test]
    fn warnings_accept_string_or_list() {
        let mut raw = info(json!({}));
        raw["warnings"] = json!("This is a pre-release test build");
        let result = GetBlockchainInfoResult::decode(&raw).expect("string warnings");
        assert_eq!(result.warnings, vec!["This is a pre-release test build".to_owned()]);

        raw["warnings"] = json!(["one", "two"]);
        let result = GetBlockchainInfoResult::decode(&raw).expect("list warnings");
        assert_eq!(result.warnings.len(), 2);

        if let Some(fields) = raw.as_object_mut() {
            fields.remove("softforks");
        }
        let result = GetBlockchainInfoResult::decode(&raw).expect("no softforks");
        assert!(result.softforks.is_empty());
    }

    #[test]
    fn missing_required_fields_are_all_reported() {
        let failure = GetBlockchainInfoResult::decode(&json!({"chain": "main"}))
            .expect_err("sparse result");
        for field in ["blocks", "headers", "bestblockhash", "chainwork", "pruned"] {
            assert!(failure.has(field, ViolationKind::Required), "{field}");
        }
        assert!(!failure.has("chain", ViolationKind::Required));
    }

    #[test]
    fn getblockhash_rejects_negative_height() {
        let request = GetBlockHash::build(json!({"height": 0})).expect("genesis");
        assert_eq!(encode(&request, "1", None).params, vec![json!(0)]);

        let failure = GetBlockHash::build(json!({"height": -1})).expect_err("negative");
        assert!(failure.has("height", ViolationKind::Number));
        let failure = GetBlockHash::build(()).expect_err("missing");
        assert!(failure.has("height", ViolationKind::Required));
        let failure = GetBlockHash::build(json!({"height": ""})).expect_err("blank");
        assert!(failure.has("height", ViolationKind::Required));
        assert!(!failure.has("height", ViolationKind::InvalidType));
    }

    #[test]
    fn parameterless_requests_encode_empty_params() {
        let request = GetBlockCount::build(()).expect("no params");
        let encoded = encode(&request, "1", None);
        assert_eq!(encoded.method, "getblockcount");
        assert!(encoded.params.is_empty());
        assert_eq!(u64::decode(&json!(101)), Ok(101));
    }
}
