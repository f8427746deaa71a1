//! Drives the public API end to end against a scripted transport.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use corewire_core::methods::blockchain::{GetBlockchainInfo, Softfork};
use corewire_core::methods::wallet::{GetTransaction, ImportDescriptors};
use corewire_core::{
    CallOptions, Client, CoreError, EncodedRequest, RawResponse, ResponseBody, RetryPolicy,
    RpcRequest, Transport, TransportError, TransportReason, ViolationKind,
};
use serde_json::{json, Value};

const TXID: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

/// Replies with queued `(status, body)` pairs, stamping the request id into
/// object bodies.
#[derive(Default)]
struct ScriptedNode {
    replies: Mutex<VecDeque<(u16, Value)>>,
    seen: Mutex<Vec<EncodedRequest>>,
}

impl ScriptedNode {
    fn reply(&self, status: u16, body: Value) {
        self.replies
            .lock()
            .expect("replies lock")
            .push_back((status, body));
    }

    fn seen(&self) -> Vec<EncodedRequest> {
        self.seen.lock().expect("seen lock").clone()
    }
}

#[async_trait]
impl Transport for ScriptedNode {
    async fn execute(&self, request: &EncodedRequest) -> Result<RawResponse, TransportError> {
        self.seen.lock().expect("seen lock").push(request.clone());
        let next = self.replies.lock().expect("replies lock").pop_front();
        let Some((status, mut body)) = next else {
            return Err(TransportError::connection(
                TransportReason::ConnectionFailed,
                "no scripted reply",
            ));
        };
        if let Some(envelope) = body.as_object_mut() {
            envelope.insert("id".into(), json!(request.id));
        }
        Ok(RawResponse {
            status,
            body: ResponseBody::Json(body),
        })
    }
}

fn success(result: Value) -> Value {
    json!({"result": result, "error": null})
}

#[tokio::test]
async fn importdescriptors_round_trip_through_wallet_path() {
    let node = Arc::new(ScriptedNode::default());
    node.reply(
        200,
        success(json!([
            {"success": true, "warnings": []},
            {"success": false, "error": {"code": -5, "message": "Invalid descriptor"}}
        ])),
    );
    let client = Client::new(Arc::clone(&node));

    let results = client
        .call::<ImportDescriptors>(
            json!({
                "requests": [
                    {
                        "desc": "wpkh(tpubD6NzVbkrYhZ4X/0/*)#00000000",
                        "timestamp": "now",
                        "range": [0, 999],
                        "active": true
                    },
                    {"desc": "bogus", "timestamp": 0}
                ],
                "wallet_name": "watch only"
            }),
            &CallOptions::default(),
        )
        .await
        .expect("call succeeds");

    assert!(results[0].success);
    assert_eq!(results[1].error.as_ref().map(|e| e.code), Some(-5));

    let seen = node.seen();
    assert_eq!(seen[0].path, "/wallet/watch%20only");
    assert_eq!(seen[0].method, ImportDescriptors::METHOD);
    let body = serde_json::to_value(&seen[0]).expect("envelope serializes");
    assert_eq!(body["jsonrpc"], "1.0");
    assert_eq!(body["params"][0][0]["range"], json!([0, 999]));
    assert!(body.get("path").is_none());
}

#[tokio::test]
async fn conflicted_transaction_decodes_with_negative_confirmations() {
    let node = Arc::new(ScriptedNode::default());
    node.reply(
        200,
        success(json!({
            "amount": -0.1,
            "fee": -0.00000500,
            "confirmations": -2,
            "txid": TXID,
            "walletconflicts": [],
            "time": 1_700_000_000,
            "timereceived": 1_700_000_000,
            "bip125-replaceable": "yes",
            "details": [{"category": "send", "amount": -0.1, "vout": 0, "abandoned": false}],
            "hex": "02000000"
        })),
    );
    let client = Client::new(Arc::clone(&node));

    let tx = client
        .call::<GetTransaction>(json!({"txid": TXID}), &CallOptions::default())
        .await
        .expect("call succeeds");
    assert_eq!(tx.confirmations, -2);
    assert_eq!(tx.fee.map(|f| f.to_sat()), Some(-500));
    assert_eq!(node.seen()[0].params, vec![json!(TXID)]);
}

#[tokio::test]
async fn result_decoding_errors_point_at_nested_fields() {
    let node = Arc::new(ScriptedNode::default());
    node.reply(
        200,
        success(json!({
            "chain": "regtest",
            "blocks": 0,
            "headers": 0,
            "bestblockhash": "0f9188f13cb7b2c71f2a335e3a4fc328bf5beb436012afca590b1a11466e2206",
            "difficulty": 4.656542373906925e-10,
            "mediantime": 1_296_688_602,
            "verificationprogress": 1,
            "initialblockdownload": true,
            "chainwork": "0000000000000000000000000000000000000000000000000000000000000002",
            "size_on_disk": 293,
            "pruned": false,
            "softforks": {
                "csv": {"type": "buried", "active": true, "height": 0},
                "taproot": {
                    "type": "bip9",
                    "active": true,
                    "bip9": {"status": "active", "start_time": -1, "timeout": 0, "since": "soon"}
                }
            },
            "warnings": ""
        })),
    );
    let client = Client::new(Arc::clone(&node));

    let err = client
        .call::<GetBlockchainInfo>((), &CallOptions::default())
        .await
        .expect_err("since is not an integer");
    let CoreError::Validation(failure) = err else {
        panic!("expected validation failure, got {err:?}");
    };
    assert!(failure.has("softforks.taproot.bip9.since", ViolationKind::InvalidType));
    assert_eq!(failure.fields().len(), 1);
}

#[tokio::test]
async fn retry_policy_recovers_from_a_busy_node() {
    let node = Arc::new(ScriptedNode::default());
    node.reply(503, json!("Work queue depth exceeded"));
    node.reply(
        200,
        success(json!({
            "chain": "regtest",
            "blocks": 1,
            "headers": 1,
            "bestblockhash": "0f9188f13cb7b2c71f2a335e3a4fc328bf5beb436012afca590b1a11466e2206",
            "difficulty": 1,
            "mediantime": 0,
            "verificationprogress": 1,
            "initialblockdownload": false,
            "chainwork": "02",
            "size_on_disk": 1,
            "pruned": false,
            "softforks": {"segwit": {"type": "buried", "active": true, "height": 0}},
            "warnings": []
        })),
    );
    let client = Client::new(Arc::clone(&node));
    let options = CallOptions::default()
        .with_retry(RetryPolicy::attempts(2, std::time::Duration::from_millis(1)));

    let info = client
        .call::<GetBlockchainInfo>((), &options)
        .await
        .expect("second attempt succeeds");
    assert!(info.softforks["segwit"].is_active());
    assert!(matches!(info.softforks["segwit"], Softfork::Buried { height: 0, .. }));
    assert_eq!(node.seen().len(), 2);
}
