use std::path::PathBuf;

use clap::Parser;

/// corewire: validated, typed Bitcoin Core RPC calls from the command line.
///
/// Parameters are given by name, either as `key=value` pairs (values are
/// parsed as JSON when possible, otherwise taken as strings) or as a single
/// JSON object.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Bitcoin Core RPC URL.
    #[arg(long, default_value = "http://127.0.0.1:8332", env = "COREWIRE_RPC_URL")]
    pub rpc_url: String,

    /// RPC username (requires --rpc-pass).
    #[arg(long, env = "COREWIRE_RPC_USER")]
    pub rpc_user: Option<String>,

    /// RPC password (requires --rpc-user).
    #[arg(long, env = "COREWIRE_RPC_PASS")]
    pub rpc_pass: Option<String>,

    /// Bitcoin Core `.cookie` file, used when no user/pass is given.
    #[arg(long, env = "COREWIRE_RPC_COOKIE_FILE")]
    pub rpc_cookie_file: Option<PathBuf>,

    /// Wallet for wallet-scoped methods, unless params set `wallet_name`.
    #[arg(long, env = "COREWIRE_WALLET")]
    pub wallet: Option<String>,

    /// Explicit JSON-RPC request id.
    #[arg(long)]
    pub id: Option<String>,

    /// Total attempts for calls failing with a 5xx-class transport error.
    #[arg(long, default_value = "1")]
    pub attempts: u32,

    /// Base delay between attempts, in milliseconds (grows linearly).
    #[arg(long, default_value = "250")]
    pub backoff_ms: u64,

    /// Maximum outbound RPC requests per second.
    #[arg(long)]
    pub rpc_requests_per_second: Option<u32>,

    /// RPC method name, e.g. `getblockchaininfo`.
    pub method: String,

    /// Named parameters: `key=value ...` or one JSON object.
    pub params: Vec<String>,
}
