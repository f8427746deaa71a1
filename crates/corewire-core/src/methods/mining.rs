//! Mining RPCs usable on regtest.

use bitcoin::BlockHash;
use serde_json::Value;

use super::{address, arg};
use crate::error::{Comparison, ValidationFailure};
use crate::params::{Params, Validation};
use crate::schema::RpcRequest;
use crate::validate;

/// Mine `nblocks` blocks immediately to `address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateToAddress {
    nblocks: u64,
    address: String,
    maxtries: u64,
}

impl GenerateToAddress {
    pub const DEFAULT_MAXTRIES: u64 = 1_000_000;

    pub fn nblocks(&self) -> u64 {
        self.nblocks
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn maxtries(&self) -> u64 {
        self.maxtries
    }
}

fn positive(v: &mut Validation, field: &str) -> Option<u64> {
    let n = v.integer(field)?;
    match validate::number(field, n, Comparison::GreaterThan, 0) {
        Ok(()) => Some(n.unsigned_abs()),
        Err(err) => {
            v.push(err);
            None
        }
    }
}

impl RpcRequest for GenerateToAddress {
    const METHOD: &'static str = "generatetoaddress";
    type Output = Vec<BlockHash>;

    fn validate(params: Params) -> Result<Self, ValidationFailure> {
        let mut v = Validation::new(params);
        let nblocks = v.required("nblocks", positive);
        let address = address(&mut v, "address");
        let maxtries = positive(&mut v, "maxtries").unwrap_or(Self::DEFAULT_MAXTRIES);

        v.finish(|| {
            Some(Self {
                nblocks: nblocks?,
                address: address?,
                maxtries,
            })
        })
    }

    fn arguments(&self) -> Vec<Option<Value>> {
        vec![arg(self.nblocks), arg(&self.address), arg(self.maxtries)]
    }
}
