//! Shared utilities for integration and load testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use provider_resilience::{Provider, ProviderError};

/// Scripted result of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Outcome {
    Succeed,
    Transport,
    Timeout,
    InvalidInput,
    NonRetryable,
}

impl Outcome {
    fn into_result(self, provider_id: &str) -> Result<String, ProviderError> {
        match self {
            Outcome::Succeed => Ok(format!("response from {}", provider_id)),
            Outcome::Transport => Err(ProviderError::Transport(format!("{} refused connection", provider_id))),
            Outcome::Timeout => Err(ProviderError::Timeout(Duration::from_secs(1))),
            Outcome::InvalidInput => Err(ProviderError::InvalidInput("malformed request".into())),
            Outcome::NonRetryable => Err(ProviderError::NonRetryable("quota exhausted".into())),
        }
    }
}

/// Programmable mock provider.
///
/// Plays its scripted outcomes in order, then repeats `fallback` forever.
#[derive(Debug)]
pub struct MockProvider {
    id: String,
    script: Mutex<VecDeque<Outcome>>,
    fallback: Mutex<Outcome>,
    latency: Duration,
    calls: AtomicU32,
}

#[allow(dead_code)]
impl MockProvider {
    pub fn new(id: &str, fallback: Outcome) -> Arc<Self> {
        Self::build(id, Vec::new(), fallback, Duration::ZERO)
    }

    pub fn scripted(id: &str, script: Vec<Outcome>, fallback: Outcome) -> Arc<Self> {
        Self::build(id, script, fallback, Duration::ZERO)
    }

    pub fn with_latency(id: &str, fallback: Outcome, latency: Duration) -> Arc<Self> {
        Self::build(id, Vec::new(), fallback, latency)
    }

    fn build(id: &str, script: Vec<Outcome>, fallback: Outcome, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            script: Mutex::new(script.into()),
            fallback: Mutex::new(fallback),
            latency,
            calls: AtomicU32::new(0),
        })
    }

    /// Change the behaviour once the script is exhausted.
    pub fn set_fallback(&self, outcome: Outcome) {
        *self.fallback.lock().unwrap() = outcome;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn call(&self, cancel: CancellationToken) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = {
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or(*self.fallback.lock().unwrap())
        };

        if !self.latency.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(self.latency) => {}
            }
        }
        outcome.into_result(&self.id)
    }
}

impl Provider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }
}
