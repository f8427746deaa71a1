//! Typed schemas for Bitcoin Core's JSON-RPC interface.
//!
//! A call flows through five stages: caller params are normalized and
//! validated into a request ([`schema::RpcRequest`]), encoded into a
//! positional JSON-RPC 1.0 envelope ([`encode`]), executed by a
//! [`rpc::Transport`], classified into success, method error or transport
//! error ([`classify`]), and finally decoded into a typed result
//! ([`schema::RpcResult`]). [`rpc::Client`] drives the whole pipeline.

pub mod classify;
pub mod encode;
pub mod error;
pub mod methods;
pub mod params;
pub mod rpc;
pub mod schema;
pub mod validate;

#[cfg(test)]
mod test_util;

pub use classify::{classify, Response, ResponseBody};
pub use encode::{encode, EncodedRequest};
pub use error::{
    ConfigError, CoreError, FieldError, MethodError, MethodErrorReason, TransportError,
    TransportReason, ValidationFailure, Violation, ViolationKind,
};
pub use params::{IntoParams, Params};
pub use rpc::{
    CallOptions, Client, HttpTransport, HttpTransportConfig, RawResponse, RetryPolicy, Transport,
};
pub use schema::{RpcRequest, RpcResult};
