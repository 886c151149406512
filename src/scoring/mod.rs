//! Scoring engine abstraction.
//!
//! The engine answers one question per feature vector: "is this normal?".
//! `true` means normal, `false` means anomaly. Implementations may fail;
//! callers never retry or approximate a failed score.

pub mod http;

use anyhow::Result;

pub use http::HttpScoringEngine;

#[async_trait::async_trait]
pub trait ScoringEngine: Send + Sync {
    async fn is_normal(&self, features: &[f64]) -> Result<bool>;
    fn name(&self) -> &'static str;
}

/// Wraps a synchronous predicate so it can be injected as an engine.
pub struct FnScoringEngine<F> {
    f: F,
}

impl<F> FnScoringEngine<F>
where
    F: Fn(&[f64]) -> Result<bool> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait::async_trait]
impl<F> ScoringEngine for FnScoringEngine<F>
where
    F: Fn(&[f64]) -> Result<bool> + Send + Sync,
{
    async fn is_normal(&self, features: &[f64]) -> Result<bool> {
        (self.f)(features)
    }

    fn name(&self) -> &'static str {
        "fn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fn_engine_forwards_predicate() {
        let engine = FnScoringEngine::new(|f: &[f64]| Ok(f.iter().all(|x| *x < 10.0)));
        assert!(engine.is_normal(&[1.0, 2.0]).await.unwrap());
        assert!(!engine.is_normal(&[1.0, 20.0]).await.unwrap());
    }

    #[tokio::test]
    async fn fn_engine_forwards_errors() {
        let engine =
            FnScoringEngine::new(|_: &[f64]| -> Result<bool> { anyhow::bail!("model not loaded") });
        let err = engine.is_normal(&[1.0]).await.unwrap_err();
        assert!(err.to_string().contains("model not loaded"));
    }
}
