mod cli;

use std::time::Duration;

use bitcoin::Amount;
use clap::Parser;
use eyre::{bail, eyre, WrapErr};
use serde::Serialize;
use serde_json::{json, Map, Value};

use corewire_core::methods::{blockchain, mining, rawtransactions, util, wallet};
use corewire_core::{
    CallOptions, Client, CoreError, HttpTransport, HttpTransportConfig, RetryPolicy, Transport,
    TransportReason,
};

/// Methods accepted on the command line.
const METHODS: &[&str] = &[
    "getblockchaininfo",
    "getblockcount",
    "getblockhash",
    "getreceivedbyaddress",
    "walletpassphrase",
    "getbalance",
    "getnewaddress",
    "gettransaction",
    "importdescriptors",
    "fundrawtransaction",
    "signrawtransactionwithkey",
    "sendrawtransaction",
    "generatetoaddress",
    "estimatesmartfee",
    "validateaddress",
];

/// Methods that take `wallet_name`, so `--wallet` applies to them.
const WALLET_METHODS: &[&str] = &[
    "getreceivedbyaddress",
    "walletpassphrase",
    "getbalance",
    "getnewaddress",
    "gettransaction",
    "importdescriptors",
    "fundrawtransaction",
];

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    let method = args.method.to_ascii_lowercase();
    if !METHODS.contains(&method.as_str()) {
        bail!(
            "unsupported method `{}`; supported: {}",
            args.method,
            METHODS.join(", ")
        );
    }

    let mut params = parse_params(&args.params).context("parse method params")?;
    apply_wallet(&method, &mut params, args.wallet.as_deref());

    let transport = HttpTransport::new(&HttpTransportConfig {
        url: args.rpc_url.clone(),
        user: args.rpc_user.clone(),
        pass: args.rpc_pass.clone(),
        cookie_file: args.rpc_cookie_file.clone(),
        requests_per_second: args.rpc_requests_per_second,
        ..HttpTransportConfig::new(&args.rpc_url)
    })
    .context("configure Bitcoin Core RPC transport")?;
    let client = Client::new(transport);

    let mut options = CallOptions::default().with_retry(RetryPolicy::attempts(
        args.attempts,
        Duration::from_millis(args.backoff_ms),
    ));
    options.id = args.id.clone();

    let output = dispatch(&client, &method, params, &options, &args.rpc_url).await?;

    tracing::debug!(method = %method, "rpc call complete");
    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("render result as JSON")?
    );
    Ok(())
}

/// Turn `key=value` pairs, or a single JSON object, into named params.
fn parse_params(args: &[String]) -> eyre::Result<Map<String, Value>> {
    if let [single] = args {
        if single.trim_start().starts_with('{') {
            return match serde_json::from_str(single).context("params are not valid JSON")? {
                Value::Object(map) => Ok(map),
                _ => Err(eyre!("params JSON must be an object")),
            };
        }
    }

    let mut params = Map::new();
    for arg in args {
        let (key, raw) = arg
            .split_once('=')
            .ok_or_else(|| eyre!("expected `key=value`, got `{arg}`"))?;
        if key.is_empty() {
            bail!("empty parameter name in `{arg}`");
        }
        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));
        params.insert(key.to_owned(), value);
    }
    Ok(params)
}

fn apply_wallet(method: &str, params: &mut Map<String, Value>, wallet: Option<&str>) {
    let Some(wallet) = wallet else {
        return;
    };
    if WALLET_METHODS.contains(&method) && !params.contains_key("wallet_name") {
        params.insert("wallet_name".to_owned(), json!(wallet));
    }
}

async fn dispatch<T: Transport>(
    client: &Client<T>,
    method: &str,
    params: Map<String, Value>,
    options: &CallOptions,
    rpc_url: &str,
) -> eyre::Result<Value> {
    let failed = |err| describe_failure(err, rpc_url);
    macro_rules! call {
        ($request:ty) => {
            client
                .call::<$request>(params, options)
                .await
                .map_err(failed)?
        };
    }

    let output = match method {
        "getblockchaininfo" => render(call!(blockchain::GetBlockchainInfo)),
        "getblockcount" => render(call!(blockchain::GetBlockCount)),
        "getblockhash" => render(call!(blockchain::GetBlockHash)),
        "getreceivedbyaddress" => btc(call!(wallet::GetReceivedByAddress)),
        "walletpassphrase" => render(call!(wallet::WalletPassphrase)),
        "getbalance" => btc(call!(wallet::GetBalance)),
        "getnewaddress" => render(call!(wallet::GetNewAddress)),
        "gettransaction" => render(call!(wallet::GetTransaction)),
        "importdescriptors" => render(call!(wallet::ImportDescriptors)),
        "fundrawtransaction" => render(call!(rawtransactions::FundRawTransaction)),
        "signrawtransactionwithkey" => render(call!(rawtransactions::SignRawTransactionWithKey)),
        "sendrawtransaction" => render(call!(rawtransactions::SendRawTransaction)),
        "generatetoaddress" => render(call!(mining::GenerateToAddress)),
        "estimatesmartfee" => render(call!(util::EstimateSmartFee)),
        "validateaddress" => render(call!(util::ValidateAddress)),
        other => bail!("unsupported method `{other}`"),
    };
    output.context("render result as JSON")
}

fn render<S: Serialize>(output: S) -> serde_json::Result<Value> {
    serde_json::to_value(output)
}

/// Amounts print in BTC, as `bitcoin-cli` does.
fn btc(amount: Amount) -> serde_json::Result<Value> {
    Ok(json!(amount.to_btc()))
}

fn describe_failure(err: CoreError, rpc_url: &str) -> eyre::Report {
    let hint = match &err {
        CoreError::Validation(_) => Some("params were rejected before anything was sent"),
        CoreError::Method(_) => None,
        CoreError::Transport(t) => match t.reason {
            TransportReason::Unauthorized | TransportReason::Forbidden => {
                Some("authentication failed; verify --rpc-user/--rpc-pass or --rpc-cookie-file")
            }
            TransportReason::NotFound => {
                Some("endpoint path is invalid; verify the RPC URL and wallet name")
            }
            TransportReason::ConnectionFailed | TransportReason::Timeout => Some(
                "node unreachable; verify the RPC URL, network access and that bitcoind is running",
            ),
            _ => None,
        },
    };

    let report = eyre::Report::new(err);
    match hint {
        Some(hint) => report.wrap_err(format!("rpc call to `{rpc_url}` failed ({hint})")),
        None => report.wrap_err(format!("rpc call to `{rpc_url}` failed")),
    }
}

#[cfg(test)]
fn method_name<R: corewire_core::RpcRequest>() -> &'static str {
    R::METHOD
}
