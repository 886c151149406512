// src/scoring/http.rs
use anyhow::{anyhow, bail, Context, Result};
use reqwest::Client;
use std::time::Duration;

use super::ScoringEngine;

/// Remote scoring engine reachable over HTTP.
///
/// Request: `POST {base_url}/v1/score?data=1.2,3.4,5.6`.
/// Response body: `true`/`false` (plain or JSON), or a number where `0`
/// means anomaly.
pub struct HttpScoringEngine {
    http: Client,
    score_url: String,
}

impl HttpScoringEngine {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent("vector-anomaly-ingest/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building scoring http client")?;
        Ok(Self {
            http,
            score_url: format!("{}/v1/score", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait::async_trait]
impl ScoringEngine for HttpScoringEngine {
    async fn is_normal(&self, features: &[f64]) -> Result<bool> {
        let data = join_features(features);
        let resp = self
            .http
            .post(&self.score_url)
            .query(&[("data", data.as_str())])
            .send()
            .await
            .context("scoring request")?;

        let status = resp.status();
        let body = resp.text().await.context("read scoring body")?;
        if !status.is_success() {
            bail!("scoring engine returned {status}: {}", body.trim());
        }
        interpret_body(&body)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn join_features(features: &[f64]) -> String {
    features
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn interpret_body(body: &str) -> Result<bool> {
    let t = body.trim().trim_matches('"');
    if t.eq_ignore_ascii_case("true") {
        return Ok(true);
    }
    if t.eq_ignore_ascii_case("false") {
        return Ok(false);
    }
    let n: f64 = t
        .parse()
        .map_err(|_| anyhow!("unexpected scoring response: {t:?}"))?;
    Ok(n != 0.0)
}
