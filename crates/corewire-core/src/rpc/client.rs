use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, trace, warn};

use crate::classify::{classify, Response};
use crate::encode::{encode, EncodedRequest};
use crate::error::{CoreError, TransportError, TransportReason};
use crate::params::IntoParams;
use crate::schema::{RpcRequest, RpcResult};

use super::Transport;

/// How often a retryable failure is attempted again.
///
/// Only transport errors with a 5xx-class reason are retried; validation
/// failures and method errors never are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. `1` disables retries.
    pub max_attempts: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub const fn attempts(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Per-call overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Request id; generated when `None`.
    pub id: Option<String>,
    /// URL path; overrides the request's wallet path when set.
    pub path: Option<String>,
    pub retry: RetryPolicy,
}

impl CallOptions {
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Drives build, encode, execute, classify and decode for typed calls.
pub struct Client<T> {
    transport: T,
    next_id: AtomicU64,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(initial_request_id()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn reserve_request_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    /// Validate `params` for `R`, then [`send`](Self::send) it.
    ///
    /// Invalid params fail with [`CoreError::Validation`] before anything is
    /// written to the transport.
    pub async fn call<R: RpcRequest>(
        &self,
        params: impl IntoParams,
        options: &CallOptions,
    ) -> Result<R::Output, CoreError> {
        let request = R::build(params)?;
        self.send(&request, options).await
    }

    /// Like [`call`](Self::call), but panics with the [`CoreError`] as the
    /// panic payload.
    pub async fn call_or_panic<R: RpcRequest>(
        &self,
        params: impl IntoParams,
        options: &CallOptions,
    ) -> R::Output {
        match self.call::<R>(params, options).await {
            Ok(output) => output,
            Err(err) => std::panic::panic_any(err),
        }
    }

    /// Execute an already validated request. Retries reuse the same id.
    pub async fn send<R: RpcRequest>(
        &self,
        request: &R,
        options: &CallOptions,
    ) -> Result<R::Output, CoreError> {
        let id = options
            .id
            .clone()
            .unwrap_or_else(|| self.reserve_request_id());
        let encoded = encode(request, id, options.path.as_deref());
        debug!(
            rpc.id = %encoded.id,
            rpc.method = encoded.method,
            rpc.params = encoded.params.len(),
            rpc.path = %encoded.path,
            "rpc call"
        );

        let max_attempts = options.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt::<R>(&encoded).await {
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!(
                        rpc.id = %encoded.id,
                        rpc.method = encoded.method,
                        attempt,
                        error = %err,
                        "retrying rpc call"
                    );
                    tokio::time::sleep(options.retry.delay(attempt)).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    async fn attempt<R: RpcRequest>(
        &self,
        encoded: &EncodedRequest,
    ) -> Result<R::Output, CoreError> {
        let raw = self.transport.execute(encoded).await?;
        trace!(rpc.id = %encoded.id, status = raw.status, "rpc raw response");

        match classify(raw.status, &raw.body) {
            Response::Success { id, result } => {
                if let Some(echoed) = id.filter(|echoed| *echoed != encoded.id) {
                    let mismatch = format!(
                        "response id `{echoed}` does not match request id `{}`",
                        encoded.id
                    );
                    return Err(TransportError::from_status(
                        TransportReason::UnknownError,
                        raw.status,
                    )
                    .with_body(raw.body.to_text())
                    .with_message(mismatch)
                    .into());
                }
                Ok(<R::Output as RpcResult>::decode(&result)?)
            }
            Response::MethodError(err) => Err(err.into()),
            Response::TransportError(err) => Err(err.into()),
        }
    }
}

fn initial_request_id() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bitcoin::Amount;
    use serde_json::json;

    use super::*;
    use crate::classify::ResponseBody;
    use crate::error::{MethodErrorReason, ViolationKind};
    use crate::methods::blockchain::GetBlockCount;
    use crate::methods::wallet::{GetBalance, GetReceivedByAddress, WalletPassphrase};
    use crate::rpc::mock::MockTransport;
    use crate::test_util::{method_error_body, success_body, BECH32_ADDRESS};

    fn no_wait(attempts: u32) -> CallOptions {
        CallOptions::default().with_retry(RetryPolicy::attempts(attempts, Duration::ZERO))
    }

    #[tokio::test]
    async fn call_decodes_success_and_targets_wallet_path() {
        let client = Client::new(MockTransport::builder().success(json!(0.5)).build());

        let balance = client
            .call::<GetReceivedByAddress>(
                json!({"address": BECH32_ADDRESS, "wallet_name": "savings"}),
                &CallOptions::default(),
            )
            .await
            .expect("call succeeds");
        assert_eq!(balance, Amount::from_sat(50_000_000));

        let requests = client.transport().requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "getreceivedbyaddress");
        assert_eq!(requests[0].path, "/wallet/savings");
        assert_eq!(requests[0].params, vec![json!(BECH32_ADDRESS), json!(1)]);
    }

    #[tokio::test]
    async fn validation_failure_never_reaches_transport() {
        let client = Client::new(MockTransport::builder().build());

        let err = client
            .call::<WalletPassphrase>(json!({"timeout": 0}), &CallOptions::default())
            .await
            .expect_err("invalid params");
        let CoreError::Validation(failure) = err else {
            panic!("expected validation failure, got {err:?}");
        };
        assert!(failure.has("passphrase", ViolationKind::Required));
        assert!(client.transport().requests().await.is_empty());
    }

    #[tokio::test]
    async fn method_errors_are_not_retried() {
        let client = Client::new(
            MockTransport::builder()
                .method_error(-13, "Please enter the wallet passphrase first.")
                .build(),
        );

        let err = client
            .call::<GetBalance>((), &no_wait(3))
            .await
            .expect_err("locked wallet");
        let CoreError::Method(err) = err else {
            panic!("expected method error, got {err:?}");
        };
        assert_eq!(err.reason, MethodErrorReason::WalletUnlockNeeded);
        assert_eq!(client.transport().requests().await.len(), 1);
    }

    #[tokio::test]
    async fn retries_5xx_with_the_same_id() {
        let client = Client::new(
            MockTransport::builder()
                .text(503, "Work queue depth exceeded")
                .text(502, "")
                .success(json!(101))
                .build(),
        );

        let height = client
            .call::<GetBlockCount>((), &no_wait(3).with_id("fixed"))
            .await
            .expect("third attempt succeeds");
        assert_eq!(height, 101);

        let requests = client.transport().requests().await;
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.id == "fixed"));
    }

    #[tokio::test]
    async fn retries_stop_at_max_attempts() {
        let client = Client::new(
            MockTransport::builder()
                .text(500, "")
                .text(500, "")
                .success(json!(1))
                .build(),
        );

        let err = client
            .call::<GetBlockCount>((), &no_wait(2))
            .await
            .expect_err("out of attempts");
        let CoreError::Transport(err) = err else {
            panic!("expected transport error, got {err:?}");
        };
        assert_eq!(err.reason, TransportReason::InternalServerError);
        assert_eq!(client.transport().requests().await.len(), 2);
    }

    #[tokio::test]
    async fn unauthorized_and_connection_failures_are_final() {
        let client = Client::new(
            MockTransport::builder()
                .text(401, "")
                .fail(TransportError::connection(
                    TransportReason::ConnectionFailed,
                    "connection refused",
                ))
                .build(),
        );

        let err = client
            .call::<GetBlockCount>((), &no_wait(5))
            .await
            .expect_err("unauthorized");
        assert!(matches!(
            err,
            CoreError::Transport(TransportError {
                reason: TransportReason::Unauthorized,
                ..
            })
        ));

        let err = client
            .call::<GetBlockCount>((), &no_wait(5))
            .await
            .expect_err("refused");
        assert!(!err.is_retryable());
        assert_eq!(client.transport().requests().await.len(), 2);
    }

    #[tokio::test]
    async fn mismatched_response_id_is_a_transport_error() {
        let client = Client::new(
            MockTransport::builder()
                .raw(200, success_body("someone-else", json!(7)))
                .build(),
        );

        let err = client
            .call::<GetBlockCount>((), &CallOptions::default().with_id("mine"))
            .await
            .expect_err("id mismatch");
        let CoreError::Transport(err) = err else {
            panic!("expected transport error, got {err:?}");
        };
        assert_eq!(err.reason, TransportReason::UnknownError);
        assert!(err.message.unwrap_or_default().contains("someone-else"));
    }

    #[tokio::test]
    async fn undecodable_result_is_a_validation_failure() {
        let client = Client::new(
            MockTransport::builder()
                .raw(200, success_body("x", json!("not a number")))
                .build(),
        );

        let err = client
            .call::<GetBlockCount>((), &CallOptions::default().with_id("x"))
            .await
            .expect_err("bad result");
        let CoreError::Validation(failure) = err else {
            panic!("expected validation failure, got {err:?}");
        };
        assert!(failure.has("result", ViolationKind::InvalidType));
    }

    #[tokio::test]
    async fn method_error_on_200_carries_echoed_id() {
        let client = Client::new(
            MockTransport::builder()
                .raw(200, method_error_body("abc", -18, "Requested wallet does not exist"))
                .build(),
        );

        let err = client
            .call::<GetBalance>(json!({"wallet_name": "missing"}), &CallOptions::default())
            .await
            .expect_err("wallet not loaded");
        let CoreError::Method(err) = err else {
            panic!("expected method error, got {err:?}");
        };
        assert_eq!(err.reason, MethodErrorReason::WalletNotFound);
        assert_eq!(err.id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn generated_ids_are_unique() {
        let client = Client::new(
            MockTransport::builder()
                .success(json!(1))
                .success(json!(2))
                .build(),
        );
        for _ in 0..2 {
            client
                .call::<GetBlockCount>((), &CallOptions::default())
                .await
                .expect("call succeeds");
        }
        let requests = client.transport().requests().await;
        assert_ne!(requests[0].id, requests[1].id);
    }

    #[tokio::test]
    async fn call_or_panic_payload_is_the_error() {
        let client = Arc::new(Client::new(
            MockTransport::builder()
                .raw(404, ResponseBody::Raw(String::new()))
                .build(),
        ));

        let task = tokio::spawn({
            let client = Arc::clone(&client);
            async move {
                client
                    .call_or_panic::<GetBlockCount>((), &CallOptions::default())
                    .await
            }
        });
        let payload = task.await.expect_err("task panics").into_panic();
        let err = payload
            .downcast_ref::<CoreError>()
            .expect("payload is the core error");
        assert!(matches!(
            err,
            CoreError::Transport(TransportError {
                reason: TransportReason::NotFound,
                ..
            })
        ));
    }
}
