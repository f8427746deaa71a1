//! Utility RPCs: fee estimation and address inspection.

use bitcoin::Amount;
use serde::Serialize;
use serde_json::Value;

use super::arg;
use super::rawtransactions::MAX_CONF_TARGET;
use crate::error::{Comparison, ValidationFailure};
use crate::params::{Params, Validation};
use crate::schema::{RpcRequest, RpcResult};
use crate::validate;

/// Fee estimation mode shared by `estimatesmartfee` and `fundrawtransaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateMode {
    Unset,
    Economical,
    #[default]
    Conservative,
}

impl EstimateMode {
    pub const ALL: [&'static str; 3] = ["unset", "economical", "conservative"];

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "unset" => Some(Self::Unset),
            "economical" => Some(Self::Economical),
            "conservative" => Some(Self::Conservative),
            _ => None,
        }
    }
}

// ==============================================================================
// estimatesmartfee
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimateSmartFee {
    conf_target: u64,
    estimate_mode: EstimateMode,
}

impl EstimateSmartFee {
    pub fn conf_target(&self) -> u64 {
        self.conf_target
    }

    pub fn estimate_mode(&self) -> EstimateMode {
        self.estimate_mode
    }
}

impl RpcRequest for EstimateSmartFee {
    const METHOD: &'static str = "estimatesmartfee";
    type Output = EstimateSmartFeeResult;

    fn validate(params: Params) -> Result<Self, ValidationFailure> {
        let mut v = Validation::new(params);

        let conf_target = v.required("conf_target", Validation::integer);
        if let Some(target) = conf_target {
            v.check(validate::number(
                "conf_target",
                target,
                Comparison::GreaterThanOrEqual,
                1,
            ));
            v.check(validate::number(
                "conf_target",
                target,
                Comparison::LessThanOrEqual,
                MAX_CONF_TARGET as i64,
            ));
        }
        let estimate_mode = v
            .one_of("estimate_mode", &EstimateMode::ALL)
            .map(|s| EstimateMode::parse(&s))
            .unwrap_or(Some(EstimateMode::default()));

        v.finish(|| {
            Some(Self {
                conf_target: conf_target?.unsigned_abs(),
                estimate_mode: estimate_mode?,
            })
        })
    }

    fn arguments(&self) -> Vec<Option<Value>> {
        vec![arg(self.conf_target), arg(self.estimate_mode)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EstimateSmartFeeResult {
    /// BTC/kvB; absent when the node has too little data.
    #[serde(with = "bitcoin::amount::serde::as_btc::opt")]
    pub feerate: Option<Amount>,
    pub errors: Vec<String>,
    pub blocks: u64,
}

impl RpcResult for EstimateSmartFeeResult {
    fn decode_at(raw: &Value, path: &str) -> Result<Self, ValidationFailure> {
        let mut v = Validation::for_result(raw, path)?;
        let feerate = v.amount("feerate");
        let errors = v.strings("errors").unwrap_or_default();
        let blocks = v.required("blocks", Validation::unsigned);

        v.finish(|| {
            Some(Self {
                feerate,
                errors,
                blocks: blocks?,
            })
        })
    }
}

// ==============================================================================
// validateaddress
// ==============================================================================

/// Ask the node whether an address decodes. No local format check beyond
/// non-empty: answering that is the point of the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateAddress {
    address: String,
}

impl ValidateAddress {
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl RpcRequest for ValidateAddress {
    const METHOD: &'static str = "validateaddress";
    type Output = ValidateAddressResult;

    fn validate(params: Params) -> Result<Self, ValidationFailure> {
        let mut v = Validation::new(params);
        let address = v.required("address", Validation::string);
        v.finish(|| Some(Self { address: address? }))
    }

    fn arguments(&self) -> Vec<Option<Value>> {
        vec![arg(&self.address)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidateAddressResult {
    pub isvalid: bool,
    pub address: Option<String>,
    pub script_pub_key: Option<String>,
    pub isscript: Option<bool>,
    pub iswitness: Option<bool>,
    pub witness_version: Option<u64>,
    pub witness_program: Option<String>,
    pub error: Option<String>,
    pub error_locations: Vec<u64>,
}

impl ValidateAddressResult {
    const RENAMES: &'static [(&'static str, &'static str)] = &[("scriptPubKey", "script_pub_key")];
}

impl RpcResult for ValidateAddressResult {
    fn decode_at(raw: &Value, path: &str) -> Result<Self, ValidationFailure> {
        let mut v = Validation::for_result(raw, path)?;
        v.rename_keys(Self::RENAMES);

        let isvalid = v.required("isvalid", Validation::boolean);
        let address = v.string("address");
        let script_pub_key = v.hex("script_pub_key");
        let isscript = v.boolean("isscript");
        let iswitness = v.boolean("iswitness");
        let witness_version = v.unsigned("witness_version");
        let witness_program = v.hex("witness_program");
        let error = v.string("error");
        let error_locations = v
            .list_of("error_locations", crate::params::cast_unsigned)
            .unwrap_or_default();

        v.finish(|| {
            Some(Self {
                isvalid: isvalid?,
                address,
                script_pub_key,
                isscript,
                iswitness,
                witness_version,
                witness_program,
                error,
                error_locations,
            })
        })
    }
}
