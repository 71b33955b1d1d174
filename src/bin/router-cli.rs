use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

use segment_router::config::load_config;
use segment_router::routing::{Dispatch, HandlerTree, Principal, RouteRequest};
use segment_router::security::TokenStore;

#[derive(Parser)]
#[command(name = "router-cli")]
#[command(about = "Management CLI for the segment router", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file and build its handler tree
    Check { config: PathBuf },
    /// Dispatch a path offline against a configuration file
    Route {
        config: PathBuf,
        path: String,
        #[arg(short, long, default_value = "GET")]
        method: String,
        /// Bearer token to dispatch as
        #[arg(short, long)]
        token: Option<String>,
    },
    /// Check router status
    Status,
    /// Show resolved rule tables and allow-lists
    Handlers,
    /// Show per-handler dispatch counters
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => {
            let config = load_config(&config)?;
            let tree = HandlerTree::build(&config)?;
            println!(
                "OK: {} handlers, root `{}`, max depth {}",
                tree.len(),
                config.dispatch.root,
                tree.dispatcher().max_depth()
            );
        }
        Commands::Route {
            config,
            path,
            method,
            token,
        } => {
            let config = load_config(&config)?;
            let tree = HandlerTree::build(&config)?;
            let tokens = TokenStore::from_config(&config.auth);

            let mut request = RouteRequest::new(&method, &path);
            if let Some(token) = token {
                let principal = tokens
                    .lookup(&token)
                    .ok_or_else(|| format!("unknown token `{token}`"))?;
                request = request.with_principal(principal as Arc<dyn Principal>);
            }

            let outcome = match tree.dispatch(&mut request) {
                Ok(Dispatch::Handled(response)) => json!({
                    "status": response.status().as_u16(),
                    "headers": response.headers(),
                    "body": response.body(),
                }),
                Ok(Dispatch::Unhandled { handler, remaining }) => json!({
                    "unhandled": { "handler": handler, "remaining": remaining },
                }),
                Err(e) => json!({
                    "status": e.status().as_u16(),
                    "error": e.to_string(),
                }),
            };
            let report = json!({
                "trail": request.trail(),
                "consumed": request.queue().consumed(),
                "unconsumed": request.remaining(),
                "params": request.params(),
                "outcome": outcome,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Status => admin_get(&cli.url, &cli.key, "status").await?,
        Commands::Handlers => admin_get(&cli.url, &cli.key, "handlers").await?,
        Commands::Stats => admin_get(&cli.url, &cli.key, "stats").await?,
    }

    Ok(())
}

async fn admin_get(url: &str, key: &str, endpoint: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);

    let res = reqwest::Client::new()
        .get(format!("{url}/admin/{endpoint}"))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
