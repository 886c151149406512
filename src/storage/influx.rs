//! InfluxDB 1.x store over the HTTP API.
//!
//! Anomaly scores are written to the `classification` measurement with the
//! score as both the `class` tag and the `value` field, so the read path can
//! count observations per class and per time bucket.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::Context;
use metrics::histogram;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;

use super::aggregate::{aggregate, AggregationResult, TimeSeriesRow};
use super::{DataStore, ScoreSink};
use crate::config::InfluxConfig;
use crate::error::{PersistenceError, QueryError};

const MEASUREMENT: &str = "classification";
const CLASS_TAG: &str = "class";
const VALUE_FIELD: &str = "value";

pub struct InfluxDataStore {
    http: Client,
    base_url: String,
    username: String,
    password: String,
    database: String,
    default_grouping_interval: String,
    default_time_limit: String,
}

impl InfluxDataStore {
    /// Build the client and make sure the configured database exists.
    pub async fn connect(cfg: &InfluxConfig) -> anyhow::Result<Self> {
        let store = Self::new(cfg)?;
        store.initialize_database().await?;
        Ok(store)
    }

    /// Build the client without touching the network.
    pub fn new(cfg: &InfluxConfig) -> anyhow::Result<Self> {
        validate_duration(&cfg.default_grouping_interval)
            .context("influx.default_grouping_interval")?;
        validate_duration(&cfg.default_time_limit).context("influx.default_time_limit")?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .context("building influx http client")?;

        Ok(Self {
            http,
            base_url: cfg.url.trim_end_matches('/').to_string(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            database: cfg.database.clone(),
            default_grouping_interval: cfg.default_grouping_interval.clone(),
            default_time_limit: cfg.default_time_limit.clone(),
        })
    }

    async fn initialize_database(&self) -> anyhow::Result<()> {
        if self
            .database_exists()
            .await
            .context("checking influx databases")?
        {
            tracing::info!(database = %self.database, "influx database present");
            return Ok(());
        }
        tracing::info!(database = %self.database, "creating influx database");
        self.create_database()
            .await
            .context("creating influx database")
    }

    async fn database_exists(&self) -> Result<bool, QueryError> {
        tracing::debug!("check if database exists");
        let req = self.http.get(self.url("query")).query(&[("q", "SHOW DATABASES")]);
        let resp = self.send_query(req).await?;
        Ok(database_names(&resp)?.iter().any(|n| n == &self.database))
    }

    async fn create_database(&self) -> Result<(), QueryError> {
        let q = format!("CREATE DATABASE \"{}\"", self.database.replace('"', "\\\""));
        let req = self.http.post(self.url("query")).query(&[("q", q.as_str())]);
        let resp = self.send_query(req).await?;
        first_statement_error(&resp).map_or(Ok(()), |e| Err(QueryError::Store(e)))
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    fn auth(&self, req: RequestBuilder) -> RequestBuilder {
        if self.username.is_empty() {
            req
        } else {
            req.basic_auth(&self.username, Some(&self.password))
        }
    }

    async fn send_query(&self, req: RequestBuilder) -> Result<QueryResponse, QueryError> {
        let resp = self
            .auth(req)
            .send()
            .await
            .map_err(|e| QueryError::Transport(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| QueryError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(QueryError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        let parsed: QueryResponse =
            serde_json::from_str(&body).map_err(|e| QueryError::Decode(e.to_string()))?;
        if let Some(err) = parsed.error.clone() {
            return Err(QueryError::Store(err));
        }
        Ok(parsed)
    }
}

#[async_trait::async_trait]
impl ScoreSink for InfluxDataStore {
    async fn save(&self, score: f64) -> Result<(), PersistenceError> {
        let ts_ms = chrono::Utc::now().timestamp_millis();
        let line = line_protocol(score, ts_ms);
        tracing::debug!(%line, database = %self.database, "influx write");

        let req = self
            .http
            .post(self.url("write"))
            .query(&[("db", self.database.as_str()), ("precision", "ms")])
            .body(line);
        let resp = self
            .auth(req)
            .send()
            .await
            .map_err(|e| PersistenceError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(PersistenceError::Rejected {
            status: status.as_u16(),
            body: body.trim().to_string(),
        })
    }
}

#[async_trait::async_trait]
impl DataStore for InfluxDataStore {
    async fn read(
        &self,
        since: Option<&str>,
        group_by: Option<&str>,
    ) -> Result<AggregationResult, QueryError> {
        let since = since.unwrap_or(&self.default_time_limit);
        let group_by = group_by.unwrap_or(&self.default_grouping_interval);
        let q = count_query(since, group_by)?;
        tracing::debug!(query = %q, "influx read");

        let started = Instant::now();
        let req = self.http.get(self.url("query")).query(&[
            ("db", self.database.as_str()),
            ("q", q.as_str()),
            ("epoch", "ms"),
        ]);
        let resp = self.send_query(req).await;
        histogram!("chart_query_ms").record(started.elapsed().as_secs_f64() * 1000.0);

        let rows = rows_from_response(&resp?)?;
        tracing::debug!(rows = rows.len(), "rows read");
        Ok(aggregate(rows))
    }
}

// ------------------------------------------------------------
// Wire format helpers (pure, tested below)
// ------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Series {
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// InfluxQL duration literal, e.g. `30s`, `1h`, `1h30m`, `7d`.
pub fn validate_duration(s: &str) -> Result<(), QueryError> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^(?:[0-9]+(?:ns|u|µ|ms|s|m|h|d|w))+$").expect("static duration regex")
    });
    if re.is_match(s) {
        Ok(())
    } else {
        Err(QueryError::InvalidDuration(s.to_string()))
    }
}

fn count_query(since: &str, group_by: &str) -> Result<String, QueryError> {
    validate_duration(since)?;
    validate_duration(group_by)?;
    Ok(format!(
        "SELECT count({VALUE_FIELD}) FROM {MEASUREMENT} WHERE time > now() - {since} \
         GROUP BY time({group_by}), {CLASS_TAG}"
    ))
}

fn line_protocol(score: f64, ts_ms: i64) -> String {
    format!("{MEASUREMENT},{CLASS_TAG}={score:?} {VALUE_FIELD}={score:?} {ts_ms}")
}

fn first_statement_error(resp: &QueryResponse) -> Option<String> {
    resp.results.iter().find_map(|r| r.error.clone())
}

fn database_names(resp: &QueryResponse) -> Result<Vec<String>, QueryError> {
    if let Some(e) = first_statement_error(resp) {
        return Err(QueryError::Store(e));
    }
    let names = resp
        .results
        .iter()
        .flat_map(|r| r.series.iter())
        .flat_map(|s| s.values.iter())
        .filter_map(|row| row.first().and_then(Value::as_str).map(str::to_string))
        .collect();
    Ok(names)
}

/// Flatten every `(class tag) x (time bucket)` series into rows.
/// Buckets with a null count are skipped.
fn rows_from_response(resp: &QueryResponse) -> Result<Vec<TimeSeriesRow>, QueryError> {
    if let Some(e) = first_statement_error(resp) {
        return Err(QueryError::Store(e));
    }

    let mut rows = Vec::new();
    for series in resp.results.iter().flat_map(|r| r.series.iter()) {
        let class = series
            .tags
            .get(CLASS_TAG)
            .ok_or_else(|| QueryError::Decode(format!("series without '{CLASS_TAG}' tag")))?;
        let time_idx = column_index(series, "time")?;
        let count_idx = column_index(series, "count")?;

        for values in &series.values {
            let interval_ms = values
                .get(time_idx)
                .and_then(as_millis)
                .ok_or_else(|| QueryError::Decode(format!("bad time value in {values:?}")))?;
            let count = match values.get(count_idx) {
                None | Some(Value::Null) => continue,
                Some(v) => as_count(v)
                    .ok_or_else(|| QueryError::Decode(format!("bad count value {v}")))?,
            };
            rows.push(TimeSeriesRow::new(interval_ms, class.clone(), count));
        }
    }
    Ok(rows)
}

fn column_index(series: &Series, name: &str) -> Result<usize, QueryError> {
    series
        .columns
        .iter()
        .position(|c| c == name)
        .ok_or_else(|| QueryError::Decode(format!("missing column '{name}'")))
}

fn as_millis(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))
}

fn as_count(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| {
        v.as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> QueryResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn duration_literals() {
        for ok in ["1d", "30s", "15m", "1h30m", "500ms", "2w"] {
            assert!(validate_duration(ok).is_ok(), "{ok}");
        }
        for bad in ["", "1", "d", "1 d", "1d; DROP DATABASE x", "-1h", "1y"] {
            assert!(
                matches!(validate_duration(bad), Err(QueryError::InvalidDuration(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn count_query_is_grouped_by_time_and_class() {
        let q = count_query("1d", "1h").unwrap();
        assert_eq!(
            q,
            "SELECT count(value) FROM classification WHERE time > now() - 1d \
             GROUP BY time(1h), class"
        );
        assert!(count_query("1d) or (1=1", "1h").is_err());
    }

    #[test]
    fn line_protocol_tags_class_like_the_chart_expects() {
        assert_eq!(
            line_protocol(1.0, 1_700_000_000_000),
            "classification,class=1.0 value=1.0 1700000000000"
        );
        assert_eq!(
            line_protocol(4.5, 1),
            "classification,class=4.5 value=4.5 1"
        );
    }

    #[test]
    fn series_are_flattened_into_rows() {
        let resp = parse(
            r#"{"results":[{"statement_id":0,"series":[
                {"name":"classification","tags":{"class":"1.0"},"columns":["time","count"],
                 "values":[[1000,3],[2000,null],[3000,0]]},
                {"name":"classification","tags":{"class":"4.0"},"columns":["time","count"],
                 "values":[[1000,5]]}
            ]}]}"#,
        );
        let rows = rows_from_response(&resp).unwrap();
        assert_eq!(
            rows,
            vec![
                TimeSeriesRow::new(1000, "1.0", 3),
                TimeSeriesRow::new(3000, "1.0", 0),
                TimeSeriesRow::new(1000, "4.0", 5),
            ]
        );

        let agg = aggregate(rows);
        assert_eq!(agg[&1000]["1.0"], 3);
        assert_eq!(agg[&1000]["4.0"], 5);
    }

    #[test]
    fn no_series_is_empty_not_error() {
        let resp = parse(r#"{"results":[{"statement_id":0}]}"#);
        assert!(rows_from_response(&resp).unwrap().is_empty());
    }

    #[test]
    fn statement_error_surfaces() {
        let resp = parse(r#"{"results":[{"statement_id":0,"error":"database not found: x"}]}"#);
        let err = rows_from_response(&resp).unwrap_err();
        assert!(matches!(err, QueryError::Store(ref m) if m.contains("database not found")));
    }

    #[test]
    fn missing_class_tag_is_decode_error() {
        let resp = parse(
            r#"{"results":[{"series":[{"columns":["time","count"],"values":[[1,1]]}]}]}"#,
        );
        assert!(matches!(
            rows_from_response(&resp),
            Err(QueryError::Decode(_))
        ));
    }

    #[test]
    fn database_names_from_show_databases() {
        let resp = parse(
            r#"{"results":[{"statement_id":0,"series":[{"name":"databases","columns":["name"],
               "values":[["_internal"],["space_shuttle"]]}]}]}"#,
        );
        assert_eq!(
            database_names(&resp).unwrap(),
            vec!["_internal".to_string(), "space_shuttle".to_string()]
        );
    }

    #[test]
    fn bad_default_durations_fail_construction() {
        let cfg = InfluxConfig {
            default_time_limit: "yesterday".into(),
            ..InfluxConfig::default()
        };
        assert!(InfluxDataStore::new(&cfg).is_err());
        assert!(InfluxDataStore::new(&InfluxConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn read_rejects_bad_duration_before_network() {
        let store = InfluxDataStore::new(&InfluxConfig {
            url: "http://127.0.0.1:9".into(),
            ..InfluxConfig::default()
        })
        .unwrap();
        let err = store.read(Some("1d or 1=1"), None).await.unwrap_err();
        assert!(matches!(err, QueryError::InvalidDuration(_)));
    }
}
