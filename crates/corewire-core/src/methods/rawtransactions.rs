//! Raw transaction RPCs: funding, signing with explicit keys and broadcast.

use std::fmt;

use bitcoin::{Amount, Txid};
use serde::Serialize;
use serde_json::Value;

use super::util::EstimateMode;
use super::wallet::AddressType;
use super::{arg, opt_arg, wallet_name};
use crate::error::{Comparison, FieldError, ValidationFailure};
use crate::params::{self, Params, Validation};
use crate::schema::{RpcRequest, RpcResult};
use crate::validate;

/// Bitcoin Core's fee estimator horizon, in blocks.
pub const MAX_CONF_TARGET: u64 = 1008;

fn hexstring(v: &mut Validation) -> Option<String> {
    v.required("hexstring", Validation::hex)
}

fn vout(v: &mut Validation, field: &str) -> Option<u32> {
    let n = v.unsigned(field)?;
    match u32::try_from(n) {
        Ok(n) => Some(n),
        Err(_) => {
            v.push(FieldError::invalid_type(field, "32-bit output index"));
            None
        }
    }
}

// ==============================================================================
// fundrawtransaction
// ==============================================================================

/// Options object for `fundrawtransaction`.
///
/// Callers use snake_case keys; serialization emits the mixed camelCase and
/// snake_case keys Bitcoin Core expects.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FundOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_inputs: Option<bool>,
    #[serde(rename = "changeAddress", skip_serializing_if = "Option::is_none")]
    pub change_address: Option<String>,
    #[serde(rename = "changePosition", skip_serializing_if = "Option::is_none")]
    pub change_position: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_type: Option<AddressType>,
    #[serde(rename = "includeWatching", skip_serializing_if = "Option::is_none")]
    pub include_watching: Option<bool>,
    #[serde(rename = "lockUnspents", skip_serializing_if = "Option::is_none")]
    pub lock_unspents: Option<bool>,
    /// sat/vB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_rate: Option<f64>,
    /// BTC/kvB, sent as `feeRate`.
    #[serde(
        rename = "feeRate",
        with = "bitcoin::amount::serde::as_btc::opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub fee_rate_btc: Option<Amount>,
    #[serde(rename = "subtractFeeFromOutputs", skip_serializing_if = "Option::is_none")]
    pub subtract_fee_from_outputs: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaceable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conf_target: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate_mode: Option<EstimateMode>,
}

impl FundOptions {
    fn from_validation(v: &mut Validation) -> Option<Self> {
        let add_inputs = v.boolean("add_inputs");
        let change_address = v.string("change_address");
        if let Some(address) = &change_address {
            v.check(validate::bitcoin_address_format("change_address", address));
        }
        let change_position = v.unsigned("change_position");
        let change_type = v
            .one_of("change_type", &AddressType::ALL)
            .and_then(|s| AddressType::parse(&s));
        let include_watching = v.boolean("include_watching");
        let lock_unspents = v.boolean("lock_unspents");

        let fee_rate = v.float("fee_rate");
        if let Some(rate) = fee_rate {
            v.check(validate::number("fee_rate", rate, Comparison::GreaterThan, 0.0));
        }
        let fee_rate_btc = v.amount("fee_rate_btc");
        if let Some(rate) = fee_rate_btc {
            v.check(validate::number(
                "fee_rate_btc",
                rate.to_sat(),
                Comparison::GreaterThan,
                0,
            ));
        }
        v.check(validate::mutually_exclusive(
            "fee_rate",
            &fee_rate,
            "fee_rate_btc",
            &fee_rate_btc,
        ));

        let subtract_fee_from_outputs =
            v.list_of("subtract_fee_from_outputs", params::cast_unsigned);
        let replaceable = v.boolean("replaceable");
        let conf_target = v.unsigned("conf_target");
        if let Some(target) = conf_target {
            v.check(validate::number("conf_target", target, Comparison::GreaterThanOrEqual, 1));
            v.check(validate::number(
                "conf_target",
                target,
                Comparison::LessThanOrEqual,
                MAX_CONF_TARGET,
            ));
        }
        let estimate_mode = v
            .one_of("estimate_mode", &EstimateMode::ALL)
            .and_then(|s| EstimateMode::parse(&s));

        Some(Self {
            add_inputs,
            change_address,
            change_position,
            change_type,
            include_watching,
            lock_unspents,
            fee_rate,
            fee_rate_btc,
            subtract_fee_from_outputs,
            replaceable,
            conf_target,
            estimate_mode,
        })
    }
}

/// Add inputs (and a change output) to a transaction until it covers its
/// outputs and fee.
#[derive(Debug, Clone, PartialEq)]
pub struct FundRawTransaction {
    hexstring: String,
    options: Option<FundOptions>,
    iswitness: Option<bool>,
    wallet_name: Option<String>,
}

impl FundRawTransaction {
    pub fn hexstring(&self) -> &str {
        &self.hexstring
    }

    pub fn options(&self) -> Option<&FundOptions> {
        self.options.as_ref()
    }
}

impl RpcRequest for FundRawTransaction {
    const METHOD: &'static str = "fundrawtransaction";
    type Output = FundRawTransactionResult;

    fn validate(params: Params) -> Result<Self, ValidationFailure> {
        let mut v = Validation::new(params);
        let hexstring = hexstring(&mut v);
        let options = v.embeds_one("options", FundOptions::from_validation);
        let iswitness = v.boolean("iswitness");
        let wallet_name = wallet_name(&mut v);

        v.finish(|| {
            Some(Self {
                hexstring: hexstring?,
                options,
                iswitness,
                wallet_name,
            })
        })
    }

    fn arguments(&self) -> Vec<Option<Value>> {
        vec![
            arg(&self.hexstring),
            opt_arg(&self.options),
            opt_arg(&self.iswitness),
        ]
    }

    fn wallet_name(&self) -> Option<&str> {
        self.wallet_name.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundRawTransactionResult {
    pub hex: String,
    #[serde(with = "bitcoin::amount::serde::as_btc")]
    pub fee: Amount,
    /// `-1` when no change output was added.
    pub changepos: i64,
}

impl RpcResult for FundRawTransactionResult {
    fn decode_at(raw: &Value, path: &str) -> Result<Self, ValidationFailure> {
        let mut v = Validation::for_result(raw, path)?;
        let hex = v.required("hex", Validation::hex);
        let fee = v.required("fee", Validation::amount);
        let changepos = v.required("changepos", Validation::integer);

        v.finish(|| {
            Some(Self {
                hex: hex?,
                fee: fee?,
                changepos: changepos?,
            })
        })
    }
}

// ==============================================================================
// signrawtransactionwithkey
// ==============================================================================

/// Signature hash types accepted by `signrawtransactionwithkey`.
pub const SIGHASH_TYPES: [&str; 7] = [
    "DEFAULT",
    "ALL",
    "NONE",
    "SINGLE",
    "ALL|ANYONECANPAY",
    "NONE|ANYONECANPAY",
    "SINGLE|ANYONECANPAY",
];

/// A previous output the transaction spends that the node may not know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrevTx {
    pub txid: Txid,
    pub vout: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: String,
    #[serde(rename = "redeemScript", skip_serializing_if = "Option::is_none")]
    pub redeem_script: Option<String>,
    #[serde(rename = "witnessScript", skip_serializing_if = "Option::is_none")]
    pub witness_script: Option<String>,
    #[serde(
        with = "bitcoin::amount::serde::as_btc::opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<Amount>,
}

impl PrevTx {
    const RENAMES: &'static [(&'static str, &'static str)] = &[
        ("scriptPubKey", "script_pub_key"),
        ("redeemScript", "redeem_script"),
        ("witnessScript", "witness_script"),
    ];

    fn from_validation(v: &mut Validation) -> Option<Self> {
        v.rename_keys(Self::RENAMES);
        let txid = v.required("txid", Validation::txid);
        let vout = v.required("vout", vout);
        let script_pub_key = v.required("script_pub_key", Validation::hex);
        let redeem_script = v.hex("redeem_script");
        let witness_script = v.hex("witness_script");
        let amount = v.amount("amount");

        Some(Self {
            txid: txid?,
            vout: vout?,
            script_pub_key: script_pub_key?,
            redeem_script,
            witness_script,
            amount,
        })
    }
}

/// Sign inputs with the given base58 private keys, without a wallet.
#[derive(Clone, PartialEq, Eq)]
pub struct SignRawTransactionWithKey {
    hexstring: String,
    privkeys: Vec<String>,
    prevtxs: Option<Vec<PrevTx>>,
    sighashtype: Option<String>,
}

impl SignRawTransactionWithKey {
    pub fn hexstring(&self) -> &str {
        &self.hexstring
    }

    pub fn prevtxs(&self) -> Option<&[PrevTx]> {
        self.prevtxs.as_deref()
    }

    pub fn sighashtype(&self) -> Option<&str> {
        self.sighashtype.as_deref()
    }
}

impl fmt::Debug for SignRawTransactionWithKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignRawTransactionWithKey")
            .field("hexstring", &self.hexstring)
            .field("privkeys", &format_args!("<{} redacted>", self.privkeys.len()))
            .field("prevtxs", &self.prevtxs)
            .field("sighashtype", &self.sighashtype)
            .finish()
    }
}

impl RpcRequest for SignRawTransactionWithKey {
    const METHOD: &'static str = "signrawtransactionwithkey";
    type Output = SignRawTransactionResult;

    fn validate(params: Params) -> Result<Self, ValidationFailure> {
        let mut v = Validation::new(params);
        let hexstring = hexstring(&mut v);
        let privkeys = v.required("privkeys", Validation::strings);
        if let Some(keys) = &privkeys {
            v.check(validate::count("privkeys", keys.len(), Some(1), None));
        }
        let prevtxs = v.embeds_many("prevtxs", PrevTx::from_validation);
        let sighashtype = v.one_of("sighashtype", &SIGHASH_TYPES);

        v.finish(|| {
            Some(Self {
                hexstring: hexstring?,
                privkeys: privkeys?,
                prevtxs,
                sighashtype,
            })
        })
    }

    fn arguments(&self) -> Vec<Option<Value>> {
        vec![
            arg(&self.hexstring),
            arg(&self.privkeys),
            opt_arg(&self.prevtxs),
            opt_arg(&self.sighashtype),
        ]
    }
}

/// Per-input signing failure reported inside a successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigningError {
    pub txid: Txid,
    pub vout: u32,
    pub witness: Vec<String>,
    pub script_sig: String,
    pub sequence: u64,
    pub error: String,
}

impl SigningError {
    const RENAMES: &'static [(&'static str, &'static str)] = &[("scriptSig", "script_sig")];

    fn from_validation(v: &mut Validation) -> Option<Self> {
        v.rename_keys(Self::RENAMES);
        let txid = v.required("txid", Validation::txid);
        let vout = v.required("vout", vout);
        let witness = v.strings("witness").unwrap_or_default();
        // Empty for inputs that were never signed.
        let script_sig = v.hex("script_sig").unwrap_or_default();
        let sequence = v.required("sequence", Validation::unsigned);
        let error = v.required("error", Validation::string);

        Some(Self {
            txid: txid?,
            vout: vout?,
            witness,
            script_sig,
            sequence: sequence?,
            error: error?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignRawTransactionResult {
    pub hex: String,
    pub complete: bool,
    pub errors: Vec<SigningError>,
}

impl RpcResult for SignRawTransactionResult {
    fn decode_at(raw: &Value, path: &str) -> Result<Self, ValidationFailure> {
        let mut v = Validation::for_result(raw, path)?;
        let hex = v.required("hex", Validation::hex);
        let complete = v.required("complete", Validation::boolean);
        let errors = v
            .embeds_many("errors", SigningError::from_validation)
            .unwrap_or_default();

        v.finish(|| {
            Some(Self {
                hex: hex?,
                complete: complete?,
                errors,
            })
        })
    }
}

// ==============================================================================
// sendrawtransaction
// ==============================================================================

/// Broadcast a signed transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct SendRawTransaction {
    hexstring: String,
    maxfeerate: Option<f64>,
    maxburnamount: Option<f64>,
}

impl SendRawTransaction {
    pub fn hexstring(&self) -> &str {
        &self.hexstring
    }
}

impl RpcRequest for SendRawTransaction {
    const METHOD: &'static str = "sendrawtransaction";
    type Output = Txid;

    fn validate(params: Params) -> Result<Self, ValidationFailure> {
        let mut v = Validation::new(params);
        let hexstring = hexstring(&mut v);
        let maxfeerate = v.float("maxfeerate");
        if let Some(rate) = maxfeerate {
            v.check(validate::number(
                "maxfeerate",
                rate,
                Comparison::GreaterThanOrEqual,
                0.0,
            ));
        }
        let maxburnamount = v.float("maxburnamount");
        if let Some(amount) = maxburnamount {
            v.check(validate::number(
                "maxburnamount",
                amount,
                Comparison::GreaterThanOrEqual,
                0.0,
            ));
        }

        v.finish(|| {
            Some(Self {
                hexstring: hexstring?,
                maxfeerate,
                maxburnamount,
            })
        })
    }

    fn arguments(&self) -> Vec<Option<Value>> {
        vec![
            arg(&self.hexstring),
            opt_arg(&self.maxfeerate),
            opt_arg(&self.maxburnamount),
        ]
    }
}
