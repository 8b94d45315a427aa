//! Probes a running dashboard server and prints one OK/FAIL line per check.
//!
//! Usage: `check_status [base_url]` (default `http://localhost:8000`).

use std::{process::ExitCode, time::Duration};

use anyhow::{Result, bail};
use serde_json::Value;

const DEFAULT_BASE: &str = "http://localhost:8000";

const CHECKS: [(&str, &str); 3] = [
    ("health", "/api/health"),
    ("stock info (AAPL)", "/api/realtime/stock/info/AAPL"),
    ("crypto price (bitcoin)", "/api/realtime/crypto/price/bitcoin"),
];

#[tokio::main]
async fn main() -> ExitCode {
    let base = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_BASE.to_string());
    let base = base.trim_end_matches('/');

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("FAIL  cannot build http client: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("Checking {base}");
    let mut failed = 0;
    for (name, path) in CHECKS {
        match probe(&client, &format!("{base}{path}")).await {
            Ok(summary) => println!("OK    {name}: {summary}"),
            Err(e) => {
                failed += 1;
                println!("FAIL  {name}: {e:#}");
            }
        }
    }

    if failed == 0 {
        println!("All {} checks passed", CHECKS.len());
        ExitCode::SUCCESS
    } else {
        println!("{failed}/{} checks failed", CHECKS.len());
        ExitCode::FAILURE
    }
}

async fn probe(client: &reqwest::Client, url: &str) -> Result<String> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    let body: Value = resp.json().await?;

    if !status.is_success() {
        let detail = body["detail"].as_str().unwrap_or("no detail");
        bail!("HTTP {status}: {detail}");
    }

    Ok(summarize(&body))
}

fn summarize(body: &Value) -> String {
    if let Some(status) = body["status"].as_str() {
        return status.to_string();
    }
    let data = &body["data"];
    match (data["price"].as_f64(), data["name"].as_str()) {
        (Some(price), Some(name)) => format!("{name} ${price:.2}"),
        (Some(price), None) => format!("${price:.2}"),
        _ => "ok".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summarizes_known_shapes() {
        assert_eq!(summarize(&json!({ "status": "healthy" })), "healthy");
        assert_eq!(
            summarize(&json!({ "data": { "name": "Apple", "price": 190.5 } })),
            "Apple $190.50"
        );
        assert_eq!(summarize(&json!({ "data": { "price": 2.0 } })), "$2.00");
        assert_eq!(summarize(&json!({ "data": [] })), "ok");
    }
}
