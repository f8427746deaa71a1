//! Caller input normalization and the validation accumulator.
//!
//! Whatever shape the caller hands in (a JSON object, a `serde_json::Map`,
//! or ordered key-value pairs) is normalized once into [`Params`] by
//! [`IntoParams`]. Schemas then pull typed fields out through a
//! [`Validation`], which casts each field, runs validators and collects
//! every error before deciding success or failure.

use std::collections::BTreeMap;

use bitcoin::{Amount, BlockHash, Denomination, SignedAmount, Txid};
use serde_json::{Map, Value};

use crate::error::{join_path, Comparison, FieldError, ValidationFailure, Violation};
use crate::validate;

// ==============================================================================
// Params
// ==============================================================================

/// Canonical string-keyed parameter map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Map<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Look up a field; JSON `null` and the empty string count as absent,
    /// whatever type the field is cast to.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !is_blank(v))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rename server-side keys (`scriptPubKey`) to canonical ones
    /// (`script_pub_key`). Keys not in the table are kept as-is.
    pub fn rename_keys(&mut self, renames: &[(&str, &str)]) {
        for (from, to) in renames {
            if let Some(value) = self.0.remove(*from) {
                self.0.insert((*to).to_owned(), value);
            }
        }
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        // Later pairs win, matching keyword-list-to-map conversion.
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// Anything a caller may pass as RPC parameters.
pub trait IntoParams {
    fn into_params(self) -> Result<Params, ValidationFailure>;
}

impl IntoParams for Params {
    fn into_params(self) -> Result<Params, ValidationFailure> {
        Ok(self)
    }
}

impl IntoParams for Map<String, Value> {
    fn into_params(self) -> Result<Params, ValidationFailure> {
        Ok(Params(self))
    }
}

impl IntoParams for Value {
    fn into_params(self) -> Result<Params, ValidationFailure> {
        match self {
            Value::Object(map) => Ok(Params(map)),
            Value::Null => Ok(Params::new()),
            _ => Err(ValidationFailure::single(FieldError::invalid_type(
                "params", "object",
            ))),
        }
    }
}

impl IntoParams for () {
    fn into_params(self) -> Result<Params, ValidationFailure> {
        Ok(Params::new())
    }
}

impl<K: Into<String>, V: Into<Value>> IntoParams for Vec<(K, V)> {
    fn into_params(self) -> Result<Params, ValidationFailure> {
        Ok(self.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> IntoParams for [(K, V); N] {
    fn into_params(self) -> Result<Params, ValidationFailure> {
        Ok(self.into_iter().collect())
    }
}

// ==============================================================================
// Casts
// ==============================================================================
//
// Each cast takes a non-null value and the field path used for errors.

pub(crate) fn cast_string(path: &str, value: &Value) -> Result<Option<String>, FieldError> {
    match value {
        // Empty strings count as absent so required/default handling applies.
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(FieldError::invalid_type(path, "string")),
    }
}

pub(crate) fn cast_integer(path: &str, value: &Value) -> Result<i64, FieldError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| FieldError::invalid_type(path, "integer")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| FieldError::invalid_type(path, "integer")),
        _ => Err(FieldError::invalid_type(path, "integer")),
    }
}

pub(crate) fn cast_unsigned(path: &str, value: &Value) -> Result<u64, FieldError> {
    let n = cast_integer(path, value)?;
    validate::number(path, n, Comparison::GreaterThanOrEqual, 0)?;
    Ok(n.unsigned_abs())
}

pub(crate) fn cast_float(path: &str, value: &Value) -> Result<f64, FieldError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| FieldError::invalid_type(path, "float")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| FieldError::invalid_type(path, "float")),
        _ => Err(FieldError::invalid_type(path, "float")),
    }
}

pub(crate) fn cast_boolean(path: &str, value: &Value) -> Result<bool, FieldError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s == "true" => Ok(true),
        Value::String(s) if s == "false" => Ok(false),
        _ => Err(FieldError::invalid_type(path, "boolean")),
    }
}

fn invalid_amount(path: &str, detail: impl std::fmt::Display) -> FieldError {
    FieldError::new(
        path,
        format!("is not a valid BTC amount: {detail}"),
        Violation::Format {
            expected: "btc_amount",
        },
    )
}

/// Number values go through `from_float_in` (so scientific notation works);
/// string values through `from_str_in`.
pub(crate) fn cast_amount(path: &str, value: &Value) -> Result<Amount, FieldError> {
    match value {
        Value::Number(n) => {
            let btc = n.as_f64().ok_or_else(|| invalid_amount(path, n))?;
            Amount::from_float_in(btc, Denomination::Bitcoin).map_err(|e| invalid_amount(path, e))
        }
        Value::String(s) => {
            Amount::from_str_in(s, Denomination::Bitcoin).map_err(|e| invalid_amount(path, e))
        }
        _ => Err(FieldError::invalid_type(path, "amount")),
    }
}

pub(crate) fn cast_signed_amount(path: &str, value: &Value) -> Result<SignedAmount, FieldError> {
    match value {
        Value::Number(n) => {
            let btc = n.as_f64().ok_or_else(|| invalid_amount(path, n))?;
            SignedAmount::from_float_in(btc, Denomination::Bitcoin)
                .map_err(|e| invalid_amount(path, e))
        }
        Value::String(s) => SignedAmount::from_str_in(s, Denomination::Bitcoin)
            .map_err(|e| invalid_amount(path, e)),
        _ => Err(FieldError::invalid_type(path, "amount")),
    }
}

fn cast_hash_str<'a>(path: &str, value: &'a Value) -> Result<&'a str, FieldError> {
    let s = value
        .as_str()
        .ok_or_else(|| FieldError::invalid_type(path, "string"))?;
    validate::hash_format(path, s)?;
    Ok(s)
}

pub(crate) fn cast_txid(path: &str, value: &Value) -> Result<Txid, FieldError> {
    let s = cast_hash_str(path, value)?;
    s.parse().map_err(|_| FieldError::invalid_type(path, "txid"))
}

pub(crate) fn cast_block_hash(path: &str, value: &Value) -> Result<BlockHash, FieldError> {
    let s = cast_hash_str(path, value)?;
    s.parse()
        .map_err(|_| FieldError::invalid_type(path, "block hash"))
}

pub(crate) fn cast_hex(path: &str, value: &Value) -> Result<Option<String>, FieldError> {
    let s = cast_string(path, value)?;
    if let Some(s) = &s {
        validate::hex_format(path, s)?;
    }
    Ok(s)
}

// ==============================================================================
// Validation Accumulator
// ==============================================================================

/// Collects field errors while a schema extracts its fields.
///
/// Cast failures are recorded and the field reads as absent, so later
/// validators only ever see well-typed values.
#[derive(Debug)]
pub struct Validation {
    params: Params,
    prefix: String,
    errors: Vec<FieldError>,
}

impl Validation {
    pub fn new(params: Params) -> Self {
        Self::nested(params, String::new())
    }

    fn nested(params: Params, prefix: String) -> Self {
        Self {
            params,
            prefix,
            errors: Vec::new(),
        }
    }

    /// Start validating a server result object located at `path`.
    pub fn for_result(raw: &Value, path: &str) -> Result<Self, ValidationFailure> {
        match raw {
            Value::Object(map) => Ok(Self::nested(Params(map.clone()), path.to_owned())),
            _ => Err(ValidationFailure::single(FieldError::invalid_type(
                root_name(path),
                "object",
            ))),
        }
    }

    pub fn rename_keys(&mut self, renames: &[(&str, &str)]) {
        self.params.rename_keys(renames);
    }

    pub fn path(&self, field: &str) -> String {
        join_path(&self.prefix, field)
    }

    pub fn raw(&self, field: &str) -> Option<&Value> {
        self.params.get(field)
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record an error produced for a field relative to this validation.
    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error.prefixed(&self.prefix));
    }

    pub fn check(&mut self, result: Result<(), FieldError>) {
        if let Err(err) = result {
            self.push(err);
        }
    }

    /// Record a `required` error when `value` is absent; pass it through.
    pub fn require<T>(&mut self, field: &str, value: Option<T>) -> Option<T> {
        self.check(validate::required(field, &value));
        value
    }

    /// Extract a required field with `cast`.
    ///
    /// A `required` error is only added when the cast produced nothing and
    /// did not already report a problem, so a badly typed field is not
    /// flagged twice.
    pub fn required<T>(
        &mut self,
        field: &str,
        cast: impl FnOnce(&mut Self, &str) -> Option<T>,
    ) -> Option<T> {
        let before = self.errors.len();
        let value = cast(self, field);
        if value.is_none() && self.errors.len() == before {
            self.push(FieldError::required(field));
        }
        value
    }

    fn cast<T>(
        &mut self,
        field: &str,
        cast: impl FnOnce(&str, &Value) -> Result<T, FieldError>,
    ) -> Option<T> {
        let value = self.params.get(field)?;
        match cast(field, value) {
            Ok(v) => Some(v),
            Err(err) => {
                self.push(err);
                None
            }
        }
    }

    pub fn string(&mut self, field: &str) -> Option<String> {
        self.cast(field, cast_string).flatten()
    }

    pub fn integer(&mut self, field: &str) -> Option<i64> {
        self.cast(field, cast_integer)
    }

    pub fn unsigned(&mut self, field: &str) -> Option<u64> {
        self.cast(field, cast_unsigned)
    }

    pub fn float(&mut self, field: &str) -> Option<f64> {
        self.cast(field, cast_float)
    }

    pub fn boolean(&mut self, field: &str) -> Option<bool> {
        self.cast(field, cast_boolean)
    }

    pub fn amount(&mut self, field: &str) -> Option<Amount> {
        self.cast(field, cast_amount)
    }

    pub fn signed_amount(&mut self, field: &str) -> Option<SignedAmount> {
        self.cast(field, cast_signed_amount)
    }

    pub fn txid(&mut self, field: &str) -> Option<Txid> {
        self.cast(field, cast_txid)
    }

    pub fn block_hash(&mut self, field: &str) -> Option<BlockHash> {
        self.cast(field, cast_block_hash)
    }

    pub fn hex(&mut self, field: &str) -> Option<String> {
        self.cast(field, cast_hex).flatten()
    }

    /// A string restricted to `allowed`.
    pub fn one_of(&mut self, field: &str, allowed: &[&str]) -> Option<String> {
        let value = self.string(field)?;
        match validate::inclusion(field, &value, allowed) {
            Ok(()) => Some(value),
            Err(err) => {
                self.push(err);
                None
            }
        }
    }

    /// A list whose elements are cast one by one; every bad element is
    /// reported at `field[index]`.
    pub fn list_of<T>(
        &mut self,
        field: &str,
        cast: impl Fn(&str, &Value) -> Result<T, FieldError>,
    ) -> Option<Vec<T>> {
        let items = self.array(field)?;
        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (index, item) in items.iter().enumerate() {
            let path = format!("{field}[{index}]");
            match cast(&path, item) {
                Ok(v) => out.push(v),
                Err(err) => {
                    ok = false;
                    self.push(err);
                }
            }
        }
        ok.then_some(out)
    }

    pub fn strings(&mut self, field: &str) -> Option<Vec<String>> {
        self.list_of(field, |path, value| {
            value
                .as_str()
                .map(str::to_owned)
                .ok_or_else(|| FieldError::invalid_type(path, "string"))
        })
    }

    fn array(&mut self, field: &str) -> Option<Vec<Value>> {
        self.cast(field, |path, value| match value {
            Value::Array(items) => Ok(items.clone()),
            _ => Err(FieldError::invalid_type(path, "list")),
        })
    }

    /// A list of nested objects, each validated by `build` under
    /// `field[index]`.
    pub fn embeds_many<T>(
        &mut self,
        field: &str,
        mut build: impl FnMut(&mut Validation) -> Option<T>,
    ) -> Option<Vec<T>> {
        let items = self.array(field)?;
        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (index, item) in items.into_iter().enumerate() {
            let element = format!("{field}[{index}]");
            match self.embed(&element, item, &mut build) {
                Some(v) => out.push(v),
                None => ok = false,
            }
        }
        ok.then_some(out)
    }

    /// A single nested object validated by `build` under `field`.
    pub fn embeds_one<T>(
        &mut self,
        field: &str,
        mut build: impl FnMut(&mut Validation) -> Option<T>,
    ) -> Option<T> {
        let item = self.params.get(field)?.clone();
        self.embed(field, item, &mut build)
    }

    /// An object of nested objects keyed by name (e.g. soft forks), each
    /// validated under `field.<key>`.
    pub fn embeds_map<T>(
        &mut self,
        field: &str,
        mut build: impl FnMut(&str, &mut Validation) -> Option<T>,
    ) -> Option<BTreeMap<String, T>> {
        let entries = self.cast(field, |path, value| match value {
            Value::Object(map) => Ok(map.clone()),
            _ => Err(FieldError::invalid_type(path, "object")),
        })?;
        let mut out = BTreeMap::new();
        let mut ok = true;
        for (key, item) in entries {
            let element = join_path(field, &key);
            let built = self.embed(&element, item, &mut |v: &mut Validation| build(&key, v));
            match built {
                Some(v) => {
                    out.insert(key, v);
                }
                None => ok = false,
            }
        }
        ok.then_some(out)
    }

    fn embed<T>(
        &mut self,
        element: &str,
        item: Value,
        build: &mut impl FnMut(&mut Validation) -> Option<T>,
    ) -> Option<T> {
        let Value::Object(map) = item else {
            self.push(FieldError::invalid_type(element, "object"));
            return None;
        };
        let mut child = Self::nested(Params(map), self.path(element));
        let built = build(&mut child);
        let child_ok = child.is_valid();
        self.errors.append(&mut child.errors);
        built.filter(|_| child_ok)
    }

    /// Fail with every collected error, or assemble the value.
    ///
    /// `build` only runs when no error was recorded; it returns `None` when a
    /// required field is missing, which cannot happen if the schema called
    /// [`Validation::require`] for it.
    pub fn finish<T>(self, build: impl FnOnce() -> Option<T>) -> Result<T, ValidationFailure> {
        if !self.errors.is_empty() {
            return Err(ValidationFailure::new(self.errors));
        }
        build().ok_or_else(|| {
            ValidationFailure::single(FieldError::new(
                root_name(&self.prefix),
                "is incomplete",
                Violation::Required,
            ))
        })
    }
}

/// Name used for errors about a whole payload rather than one field.
pub(crate) fn root_name(path: &str) -> &str {
    if path.is_empty() {
        "result"
    } else {
        path
    }
}
