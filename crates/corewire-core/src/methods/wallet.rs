//! Wallet RPCs. All of them accept an optional `wallet_name` that scopes the
//! call to `/wallet/<name>`.

use std::fmt;

use bitcoin::{Amount, BlockHash, SignedAmount, Txid};
use serde::{Serialize, Serializer};
use serde_json::{json, Value};

use super::{address, arg, opt_arg, wallet_name};
use crate::error::{Comparison, FieldError, ValidationFailure, Violation};
use crate::params::{self, Params, Validation};
use crate::schema::{RpcRequest, RpcResult};
use crate::validate;

// ==============================================================================
// getreceivedbyaddress
// ==============================================================================

/// Total amount received by an address with at least `minconf` confirmations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetReceivedByAddress {
    address: String,
    minconf: u64,
    include_immature_coinbase: Option<bool>,
    wallet_name: Option<String>,
}

impl GetReceivedByAddress {
    pub const DEFAULT_MINCONF: u64 = 1;

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn minconf(&self) -> u64 {
        self.minconf
    }

    pub fn include_immature_coinbase(&self) -> Option<bool> {
        self.include_immature_coinbase
    }
}

impl RpcRequest for GetReceivedByAddress {
    const METHOD: &'static str = "getreceivedbyaddress";
    type Output = Amount;

    fn validate(params: Params) -> Result<Self, ValidationFailure> {
        let mut v = Validation::new(params);
        let address = address(&mut v, "address");
        let minconf = v.unsigned("minconf").unwrap_or(Self::DEFAULT_MINCONF);
        let include_immature_coinbase = v.boolean("include_immature_coinbase");
        let wallet_name = wallet_name(&mut v);

        v.finish(|| {
            Some(Self {
                address: address?,
                minconf,
                include_immature_coinbase,
                wallet_name,
            })
        })
    }

    fn arguments(&self) -> Vec<Option<Value>> {
        vec![
            arg(&self.address),
            arg(self.minconf),
            opt_arg(&self.include_immature_coinbase),
        ]
    }

    fn wallet_name(&self) -> Option<&str> {
        self.wallet_name.as_deref()
    }
}

// ==============================================================================
// walletpassphrase
// ==============================================================================

/// Unlock an encrypted wallet for `timeout` seconds.
#[derive(Clone, PartialEq, Eq)]
pub struct WalletPassphrase {
    passphrase: String,
    timeout: u64,
    wallet_name: Option<String>,
}

impl WalletPassphrase {
    pub const MAX_PASSPHRASE_LEN: usize = 1024;
    /// Bitcoin Core caps the unlock window at 100M seconds (~3 years).
    pub const MAX_TIMEOUT: i64 = 100_000_000;

    pub fn timeout(&self) -> u64 {
        self.timeout
    }
}

impl fmt::Debug for WalletPassphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletPassphrase")
            .field("passphrase", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("wallet_name", &self.wallet_name)
            .finish()
    }
}

impl RpcRequest for WalletPassphrase {
    const METHOD: &'static str = "walletpassphrase";
    type Output = ();

    fn validate(params: Params) -> Result<Self, ValidationFailure> {
        let mut v = Validation::new(params);

        let passphrase = v.required("passphrase", Validation::string);
        if let Some(passphrase) = &passphrase {
            v.check(validate::length(
                "passphrase",
                passphrase,
                Some(1),
                Some(Self::MAX_PASSPHRASE_LEN),
            ));
        }

        let timeout = v.required("timeout", Validation::integer);
        if let Some(timeout) = timeout {
            v.check(validate::number(
                "timeout",
                timeout,
                Comparison::GreaterThan,
                0,
            ));
            v.check(validate::number(
                "timeout",
                timeout,
                Comparison::LessThanOrEqual,
                Self::MAX_TIMEOUT,
            ));
        }

        let wallet_name = wallet_name(&mut v);

        v.finish(|| {
            Some(Self {
                passphrase: passphrase?,
                timeout: timeout?.unsigned_abs(),
                wallet_name,
            })
        })
    }

    fn arguments(&self) -> Vec<Option<Value>> {
        vec![arg(&self.passphrase), arg(self.timeout)]
    }

    fn wallet_name(&self) -> Option<&str> {
        self.wallet_name.as_deref()
    }
}

// ==============================================================================
// getbalance
// ==============================================================================

/// Wallet balance. `dummy` only exists for backwards compatibility and must
/// be `*` when given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetBalance {
    dummy: Option<String>,
    minconf: u64,
    include_watchonly: Option<bool>,
    avoid_reuse: Option<bool>,
    wallet_name: Option<String>,
}

impl GetBalance {
    pub const DEFAULT_MINCONF: u64 = 0;

    pub fn minconf(&self) -> u64 {
        self.minconf
    }

    pub fn include_watchonly(&self) -> Option<bool> {
        self.include_watchonly
    }

    pub fn avoid_reuse(&self) -> Option<bool> {
        self.avoid_reuse
    }
}

impl RpcRequest for GetBalance {
    const METHOD: &'static str = "getbalance";
    type Output = Amount;

    fn validate(params: Params) -> Result<Self, ValidationFailure> {
        let mut v = Validation::new(params);
        let dummy = v.one_of("dummy", &["*"]);
        let minconf = v.unsigned("minconf").unwrap_or(Self::DEFAULT_MINCONF);
        let include_watchonly = v.boolean("include_watchonly");
        let avoid_reuse = v.boolean("avoid_reuse");
        let wallet_name = wallet_name(&mut v);

        v.finish(|| {
            Some(Self {
                dummy,
                minconf,
                include_watchonly,
                avoid_reuse,
                wallet_name,
            })
        })
    }

    fn arguments(&self) -> Vec<Option<Value>> {
        vec![
            opt_arg(&self.dummy),
            arg(self.minconf),
            opt_arg(&self.include_watchonly),
            opt_arg(&self.avoid_reuse),
        ]
    }

    fn wallet_name(&self) -> Option<&str> {
        self.wallet_name.as_deref()
    }
}

// ==============================================================================
// getnewaddress
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressType {
    Legacy,
    P2shSegwit,
    Bech32,
    Bech32m,
}

impl AddressType {
    pub const ALL: [&'static str; 4] = ["legacy", "p2sh-segwit", "bech32", "bech32m"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::P2shSegwit => "p2sh-segwit",
            Self::Bech32 => "bech32",
            Self::Bech32m => "bech32m",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "legacy" => Some(Self::Legacy),
            "p2sh-segwit" => Some(Self::P2shSegwit),
            "bech32" => Some(Self::Bech32),
            "bech32m" => Some(Self::Bech32m),
            _ => None,
        }
    }
}

/// Derive a fresh receiving address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetNewAddress {
    label: Option<String>,
    address_type: AddressType,
    wallet_name: Option<String>,
}

impl GetNewAddress {
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn address_type(&self) -> AddressType {
        self.address_type
    }
}

impl RpcRequest for GetNewAddress {
    const METHOD: &'static str = "getnewaddress";
    type Output = String;

    fn validate(params: Params) -> Result<Self, ValidationFailure> {
        let mut v = Validation::new(params);
        let label = v.string("label");
        let address_type = v
            .one_of("address_type", &AddressType::ALL)
            .map(|s| AddressType::parse(&s))
            .unwrap_or(Some(AddressType::Bech32));
        let wallet_name = wallet_name(&mut v);

        v.finish(|| {
            Some(Self {
                label,
                address_type: address_type?,
                wallet_name,
            })
        })
    }

    fn arguments(&self) -> Vec<Option<Value>> {
        vec![opt_arg(&self.label), arg(self.address_type)]
    }

    fn wallet_name(&self) -> Option<&str> {
        self.wallet_name.as_deref()
    }
}

// ==============================================================================
// gettransaction
// ==============================================================================

/// Detailed information about an in-wallet transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetTransaction {
    txid: Txid,
    include_watchonly: Option<bool>,
    verbose: Option<bool>,
    wallet_name: Option<String>,
}

impl GetTransaction {
    pub fn txid(&self) -> Txid {
        self.txid
    }
}

impl RpcRequest for GetTransaction {
    const METHOD: &'static str = "gettransaction";
    type Output = GetTransactionResult;

    fn validate(params: Params) -> Result<Self, ValidationFailure> {
        let mut v = Validation::new(params);
        let txid = v.required("txid", Validation::txid);
        let include_watchonly = v.boolean("include_watchonly");
        let verbose = v.boolean("verbose");
        let wallet_name = wallet_name(&mut v);

        v.finish(|| {
            Some(Self {
                txid: txid?,
                include_watchonly,
                verbose,
                wallet_name,
            })
        })
    }

    fn arguments(&self) -> Vec<Option<Value>> {
        vec![
            arg(self.txid.to_string()),
            opt_arg(&self.include_watchonly),
            opt_arg(&self.verbose),
        ]
    }

    fn wallet_name(&self) -> Option<&str> {
        self.wallet_name.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionCategory {
    Send,
    Receive,
    Generate,
    Immature,
    Orphan,
}

impl TransactionCategory {
    pub const ALL: [&'static str; 5] = ["send", "receive", "generate", "immature", "orphan"];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "send" => Some(Self::Send),
            "receive" => Some(Self::Receive),
            "generate" => Some(Self::Generate),
            "immature" => Some(Self::Immature),
            "orphan" => Some(Self::Orphan),
            _ => None,
        }
    }
}

/// BIP125 opt-in replace-by-fee signalling as reported by the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bip125Replaceable {
    Yes,
    No,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionDetail {
    pub address: Option<String>,
    pub category: TransactionCategory,
    #[serde(with = "bitcoin::amount::serde::as_btc")]
    pub amount: SignedAmount,
    pub label: Option<String>,
    pub vout: u32,
    #[serde(with = "bitcoin::amount::serde::as_btc::opt")]
    pub fee: Option<SignedAmount>,
    pub abandoned: Option<bool>,
    pub involves_watchonly: bool,
}

impl TransactionDetail {
    const RENAMES: &'static [(&'static str, &'static str)] =
        &[("involvesWatchonly", "involves_watchonly")];

    fn from_validation(v: &mut Validation) -> Option<Self> {
        v.rename_keys(Self::RENAMES);
        let address = v.string("address");
        let category = v
            .required("category", |v, f| v.one_of(f, &TransactionCategory::ALL))
            .and_then(|s| TransactionCategory::parse(&s));
        let amount = v.required("amount", Validation::signed_amount);
        let label = v.string("label");
        let vout = v.required("vout", Validation::unsigned);
        let fee = v.signed_amount("fee");
        let abandoned = v.boolean("abandoned");
        let involves_watchonly = v.boolean("involves_watchonly").unwrap_or(false);

        let vout = match vout.map(u32::try_from) {
            Some(Ok(vout)) => Some(vout),
            Some(Err(_)) => {
                v.push(FieldError::invalid_type("vout", "32-bit output index"));
                None
            }
            None => None,
        };

        Some(Self {
            address,
            category: category?,
            amount: amount?,
            label,
            vout: vout?,
            fee,
            abandoned,
            involves_watchonly,
        })
    }
}

/// Result of `gettransaction`.
///
/// `confirmations` is signed: a negative count marks a transaction that
/// conflicts with one in the active chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetTransactionResult {
    #[serde(with = "bitcoin::amount::serde::as_btc")]
    pub amount: SignedAmount,
    #[serde(with = "bitcoin::amount::serde::as_btc::opt")]
    pub fee: Option<SignedAmount>,
    pub confirmations: i64,
    pub generated: bool,
    pub trusted: Option<bool>,
    pub blockhash: Option<BlockHash>,
    pub blockheight: Option<u64>,
    pub blockindex: Option<u64>,
    pub blocktime: Option<u64>,
    pub txid: Txid,
    pub walletconflicts: Vec<Txid>,
    pub replaced_by_txid: Option<Txid>,
    pub replaces_txid: Option<Txid>,
    pub comment: Option<String>,
    pub time: u64,
    pub timereceived: u64,
    pub bip125_replaceable: Bip125Replaceable,
    pub details: Vec<TransactionDetail>,
    pub hex: String,
}

impl GetTransactionResult {
    const RENAMES: &'static [(&'static str, &'static str)] =
        &[("bip125-replaceable", "bip125_replaceable")];
}

impl RpcResult for GetTransactionResult {
    fn decode_at(raw: &Value, path: &str) -> Result<Self, ValidationFailure> {
        let mut v = Validation::for_result(raw, path)?;
        v.rename_keys(Self::RENAMES);

        let amount = v.required("amount", Validation::signed_amount);
        let fee = v.signed_amount("fee");
        let confirmations = v.required("confirmations", Validation::integer);
        let generated = v.boolean("generated").unwrap_or(false);
        let trusted = v.boolean("trusted");
        let blockhash = v.block_hash("blockhash");
        let blockheight = v.unsigned("blockheight");
        let blockindex = v.unsigned("blockindex");
        let blocktime = v.unsigned("blocktime");
        let txid = v.required("txid", Validation::txid);
        let walletconflicts = v
            .list_of("walletconflicts", params::cast_txid)
            .unwrap_or_default();
        let replaced_by_txid = v.txid("replaced_by_txid");
        let replaces_txid = v.txid("replaces_txid");
        let comment = v.string("comment");
        let time = v.required("time", Validation::unsigned);
        let timereceived = v.required("timereceived", Validation::unsigned);
        let bip125_replaceable = v
            .one_of("bip125_replaceable", &["yes", "no", "unknown"])
            .map(|s| match s.as_str() {
                "yes" => Bip125Replaceable::Yes,
                "no" => Bip125Replaceable::No,
                _ => Bip125Replaceable::Unknown,
            })
            .unwrap_or_default();
        let details = v
            .embeds_many("details", TransactionDetail::from_validation)
            .unwrap_or_default();
        let hex = v.required("hex", Validation::hex);

        v.finish(|| {
            Some(Self {
                amount: amount?,
                fee,
                confirmations: confirmations?,
                generated,
                trusted,
                blockhash,
                blockheight,
                blockindex,
                blocktime,
                txid: txid?,
                walletconflicts,
                replaced_by_txid,
                replaces_txid,
                comment,
                time: time?,
                timereceived: timereceived?,
                bip125_replaceable,
                details,
                hex: hex?,
            })
        })
    }
}

// ==============================================================================
// importdescriptors
// ==============================================================================

/// Rescan start point for an imported descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Now,
    Unix(u64),
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Now => serializer.serialize_str("now"),
            Self::Unix(ts) => serializer.serialize_u64(*ts),
        }
    }
}

/// Derivation range: an end index, or an inclusive `[begin, end]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DescriptorRange {
    End(u64),
    Span(u64, u64),
}

/// One entry of an `importdescriptors` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptorImport {
    desc: String,
    active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    range: Option<DescriptorRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_index: Option<u64>,
    timestamp: Timestamp,
    internal: bool,
    // Bitcoin Core rejects any `label` key on internal imports, even "".
    #[serde(skip_serializing_if = "String::is_empty")]
    label: String,
}

impl DescriptorImport {
    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn range(&self) -> Option<DescriptorRange> {
        self.range
    }

    pub fn internal(&self) -> bool {
        self.internal
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn from_validation(v: &mut Validation) -> Option<Self> {
        let desc = v.required("desc", Validation::string);
        let timestamp = import_timestamp(v);
        let range = import_range(v);
        let next_index = v.unsigned("next_index");
        let active = v.boolean("active").unwrap_or(false);
        let internal = v.boolean("internal").unwrap_or(false);
        let label = v.string("label");
        v.check(validate::conditional_forbidden(
            "label",
            label.is_some(),
            "internal",
            &json!(internal),
            &json!(true),
        ));

        Some(Self {
            desc: desc?,
            active,
            range,
            next_index,
            timestamp: timestamp?,
            internal,
            label: label.unwrap_or_default(),
        })
    }
}

fn import_timestamp(v: &mut Validation) -> Option<Timestamp> {
    let parsed = match v.raw("timestamp") {
        None => Err(FieldError::required("timestamp")),
        Some(Value::String(s)) if s == "now" => Ok(Timestamp::Now),
        Some(value) => params::cast_unsigned("timestamp", value).map(Timestamp::Unix),
    };
    match parsed {
        Ok(ts) => Some(ts),
        Err(err) => {
            v.push(err);
            None
        }
    }
}

fn import_range(v: &mut Validation) -> Option<DescriptorRange> {
    let parsed = match v.raw("range")? {
        Value::Array(bounds) if bounds.len() == 2 => {
            let begin = params::cast_unsigned("range[0]", &bounds[0]);
            let end = params::cast_unsigned("range[1]", &bounds[1]);
            match (begin, end) {
                (Ok(begin), Ok(end)) => {
                    validate::number("range", begin, Comparison::LessThanOrEqual, end)
                        .map(|()| DescriptorRange::Span(begin, end))
                }
                (Err(err), _) | (_, Err(err)) => Err(err),
            }
        }
        Value::Array(_) => Err(FieldError::new(
            "range",
            "should be an end index or a [begin, end] pair",
            Violation::Length {
                min: Some(2),
                max: Some(2),
            },
        )),
        other => params::cast_unsigned("range", other).map(DescriptorRange::End),
    };
    match parsed {
        Ok(range) => Some(range),
        Err(err) => {
            v.push(err);
            None
        }
    }
}

/// Import output descriptors into a descriptor wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDescriptors {
    requests: Vec<DescriptorImport>,
    wallet_name: Option<String>,
}

impl ImportDescriptors {
    pub fn requests(&self) -> &[DescriptorImport] {
        &self.requests
    }
}

impl RpcRequest for ImportDescriptors {
    const METHOD: &'static str = "importdescriptors";
    type Output = Vec<ImportDescriptorResult>;

    fn validate(params: Params) -> Result<Self, ValidationFailure> {
        let mut v = Validation::new(params);
        let requests = v.required("requests", |v, f| {
            v.embeds_many(f, DescriptorImport::from_validation)
        });
        if let Some(requests) = &requests {
            v.check(validate::count("requests", requests.len(), Some(1), None));
        }
        let wallet_name = wallet_name(&mut v);

        v.finish(|| {
            Some(Self {
                requests: requests?,
                wallet_name,
            })
        })
    }

    fn arguments(&self) -> Vec<Option<Value>> {
        vec![arg(&self.requests)]
    }

    fn wallet_name(&self) -> Option<&str> {
        self.wallet_name.as_deref()
    }
}

/// `{code, message}` error object embedded in a successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddedError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportDescriptorResult {
    pub success: bool,
    pub warnings: Vec<String>,
    pub error: Option<EmbeddedError>,
}

impl RpcResult for ImportDescriptorResult {
    fn decode_at(raw: &Value, path: &str) -> Result<Self, ValidationFailure> {
        let mut v = Validation::for_result(raw, path)?;
        let success = v.required("success", Validation::boolean);
        let warnings = v.strings("warnings").unwrap_or_default();
        let error = v.embeds_one("error", |e| {
            let code = e.required("code", Validation::integer);
            let message = e.required("message", Validation::string);
            Some(EmbeddedError {
                code: code?,
                message: message?,
            })
        });

        v.finish(|| {
            Some(Self {
                success: success?,
                warnings,
                error,
            })
        })
    }
}
