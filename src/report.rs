//! Load distribution reporting.
//!
//! Shares of traffic are computed on demand from the metrics store; nothing is
//! cached between calls.

use serde::Serialize;

use crate::store::MetricsStore;

/// Traffic share of one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderLoad {
    pub provider_id: String,
    pub request_count: u64,
    /// `request_count / total_requests`, 0 when nothing was recorded.
    pub fraction: f64,
}

/// Traffic split across every provider the store knows about.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadDistribution {
    pub total_requests: u64,
    pub providers: Vec<ProviderLoad>,
}

impl LoadDistribution {
    pub fn get(&self, provider_id: &str) -> Option<&ProviderLoad> {
        self.providers.iter().find(|p| p.provider_id == provider_id)
    }
}

#[derive(Debug, Clone)]
pub struct LoadDistributionReporter {
    store: MetricsStore,
}

impl LoadDistributionReporter {
    pub fn new(store: MetricsStore) -> Self {
        Self { store }
    }

    pub fn distribution(&self) -> LoadDistribution {
        let counts: Vec<(String, u64)> = self
            .store
            .get_all_metrics()
            .into_iter()
            .map(|m| (m.provider_id, m.request_count))
            .collect();
        let total_requests: u64 = counts.iter().map(|(_, n)| n).sum();

        let providers = counts
            .into_iter()
            .map(|(provider_id, request_count)| ProviderLoad {
                fraction: if total_requests == 0 {
                    0.0
                } else {
                    request_count as f64 / total_requests as f64
                },
                provider_id,
                request_count,
            })
            .collect();

        LoadDistribution {
            total_requests,
            providers,
        }
    }
}
