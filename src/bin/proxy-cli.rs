use std::collections::BTreeMap;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Send requests through the forwarding proxy", long_about = None)]
struct Cli {
    /// Base URL of the proxy.
    #[arg(short, long, default_value = "http://localhost:5010")]
    url: String,

    /// API key sent as x-api-key.
    #[arg(short, long, env = "X_API_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forward one request to an upstream URL
    Send {
        /// HTTP method for the upstream call
        method: String,

        /// Upstream URL
        target: String,

        /// Upstream header as name:value (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Query parameter as name=value (repeatable)
        #[arg(short, long = "query")]
        query: Vec<String>,

        /// JSON body for the upstream call
        #[arg(short, long)]
        data: Option<String>,

        /// Upstream timeout in milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert("x-api-key", HeaderValue::from_str(&cli.key)?);

    match cli.command {
        Commands::Send {
            method,
            target,
            headers: upstream_headers,
            query,
            data,
            timeout_ms,
        } => {
            let mut payload = json!({
                "url": target,
                "method": method,
                "headers": split_pairs(&upstream_headers, ':')?,
                "query": split_pairs(&query, '=')?,
            });
            if let Some(data) = data {
                payload["body"] = serde_json::from_str::<Value>(&data)?;
            }
            if let Some(timeout_ms) = timeout_ms {
                payload["timeoutMs"] = json!(timeout_ms);
            }

            let res = client
                .post(format!("{}/proxy", cli.url.trim_end_matches('/')))
                .headers(headers)
                .json(&payload)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn split_pairs(items: &[String], sep: char) -> Result<BTreeMap<String, String>, String> {
    items
        .iter()
        .map(|item| {
            item.split_once(sep)
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| format!("expected name{}value, got {:?}", sep, item))
        })
        .collect()
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Proxy returned status {}", status);
    }

    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
