use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::classify::ResponseBody;
use crate::encode::EncodedRequest;
use crate::error::{TransportError, TransportReason};

use super::{RawResponse, Transport};

enum Scripted {
    /// A 200 response echoing the request id.
    Success(Value),
    Raw(RawResponse),
    Fail(TransportError),
}

/// A scripted transport for tests. Replies are consumed in order, and every
/// request it sees is recorded.
pub struct MockTransport {
    replies: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<EncodedRequest>>,
}

impl MockTransport {
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder {
            replies: VecDeque::new(),
        }
    }

    pub async fn requests(&self) -> Vec<EncodedRequest> {
        self.requests.lock().await.clone()
    }
}

pub struct MockTransportBuilder {
    replies: VecDeque<Scripted>,
}

impl MockTransportBuilder {
    pub fn success(mut self, result: Value) -> Self {
        self.replies.push_back(Scripted::Success(result));
        self
    }

    pub fn method_error(self, code: i64, message: &str) -> Self {
        self.json(
            500,
            json!({"result": null, "error": {"code": code, "message": message}}),
        )
    }

    pub fn json(self, status: u16, body: Value) -> Self {
        self.raw(status, ResponseBody::Json(body))
    }

    pub fn text(self, status: u16, body: &str) -> Self {
        self.raw(status, ResponseBody::Raw(body.to_owned()))
    }

    pub fn raw(mut self, status: u16, body: ResponseBody) -> Self {
        self.replies
            .push_back(Scripted::Raw(RawResponse { status, body }));
        self
    }

    pub fn fail(mut self, err: TransportError) -> Self {
        self.replies.push_back(Scripted::Fail(err));
        self
    }

    pub fn build(self) -> MockTransport {
        MockTransport {
            replies: Mutex::new(self.replies),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &EncodedRequest) -> Result<RawResponse, TransportError> {
        self.requests.lock().await.push(request.clone());
        match self.replies.lock().await.pop_front() {
            Some(Scripted::Success(result)) => Ok(RawResponse {
                status: 200,
                body: ResponseBody::Json(
                    json!({"id": request.id, "result": result, "error": null}),
                ),
            }),
            Some(Scripted::Raw(response)) => Ok(response),
            Some(Scripted::Fail(err)) => Err(err),
            None => Err(TransportError::connection(
                TransportReason::ConnectionFailed,
                "mock transport has no scripted reply left",
            )),
        }
    }
}
