//! Session commands.

use crate::output::{self, OutputFormat};
use crate::simulated::SimulatedConnector;
use anyhow::Result;
use identity_config_and_utils::{Config, Paths};
use identity_storage::{FileStorage, MemoryStorage, PersistedStorage};
use serde::Serialize;
use session_runtime::{Clock, IdentitySessionManager, SessionOptions, SystemClock, TokenStore};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Parameters for a concurrent-caller burst.
#[derive(Debug, Clone)]
pub struct SimulateParams {
    pub callers: usize,
    /// Lifetime of the seeded token; negative means already expired.
    pub expires_in_secs: i64,
    pub latency: Duration,
    pub reject_refresh: bool,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub callers: usize,
    pub backend_refresh_calls: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Distinct access tokens handed to successful callers.
    pub distinct_tokens: usize,
    pub elapsed_ms: u64,
    pub session_valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        output::heading(f, "Refresh simulation")?;
        output::row(f, "Callers", self.callers)?;
        output::row(f, "Refresh calls", self.backend_refresh_calls)?;
        output::row(f, "Succeeded", self.succeeded)?;
        output::row(f, "Failed", self.failed)?;
        output::row(f, "Distinct tokens", self.distinct_tokens)?;
        output::row(f, "Elapsed", format!("{} ms", self.elapsed_ms))?;
        output::row(f, "Session valid", self.session_valid)?;
        for error in &self.errors {
            output::row(f, "Error", error)?;
        }
        Ok(())
    }
}

/// Seed a session, then issue `callers` concurrent token requests.
pub async fn simulate(
    connector: Arc<SimulatedConnector>,
    store: Arc<TokenStore>,
    options: SessionOptions,
    params: &SimulateParams,
) -> SimulationReport {
    let manager = Arc::new(IdentitySessionManager::new(
        connector.clone(),
        store,
        options,
    ));
    manager.set_tokens(SimulatedConnector::issue(params.expires_in_secs));

    let started = tokio::time::Instant::now();
    let handles: Vec<_> = (0..params.callers)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.get_valid_access_token().await })
        })
        .collect();
    let results = futures::future::join_all(handles).await;
    let elapsed = started.elapsed();

    let mut tokens = BTreeSet::new();
    let mut errors = BTreeSet::new();
    let mut failed = 0;
    for result in results {
        match result {
            Ok(Ok(token)) => {
                tokens.insert(token);
            }
            Ok(Err(e)) => {
                failed += 1;
                errors.insert(e.to_string());
            }
            Err(e) => {
                failed += 1;
                errors.insert(e.to_string());
            }
        }
    }

    let report = SimulationReport {
        callers: params.callers,
        backend_refresh_calls: connector.refresh_calls(),
        succeeded: params.callers - failed,
        failed,
        distinct_tokens: tokens.len(),
        elapsed_ms: elapsed.as_millis() as u64,
        session_valid: manager.has_valid_session(),
        errors: errors.into_iter().collect(),
    };
    info!(
        callers = report.callers,
        refresh_calls = report.backend_refresh_calls,
        failed = report.failed,
        "Simulation finished"
    );
    report
}

/// Run a burst against the simulated backend and print the report.
pub async fn session_simulate(
    params: SimulateParams,
    persist: bool,
    config: &Config,
    paths: &Paths,
    format: &OutputFormat,
) -> Result<()> {
    if params.callers == 0 {
        anyhow::bail!("--callers must be at least 1");
    }

    let storage: Arc<dyn PersistedStorage> = if persist {
        paths.ensure_dirs()?;
        Arc::new(FileStorage::new(paths.session_file()))
    } else {
        Arc::new(MemoryStorage::new())
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(TokenStore::load(
        storage,
        config.storage_namespace.clone(),
        clock,
    ));

    let connector = Arc::new(SimulatedConnector::new(
        params.latency,
        params.reject_refresh,
    ));
    let report = simulate(
        connector,
        store,
        SessionOptions::from(&config.session),
        &params,
    )
    .await;

    output::print(&report, format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_runtime::TokioClock;

    fn store() -> Arc<TokenStore> {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
        Arc::new(TokenStore::in_memory(clock))
    }

    fn params(expires_in_secs: i64, reject_refresh: bool) -> SimulateParams {
        SimulateParams {
            callers: 8,
            expires_in_secs,
            latency: Duration::from_millis(200),
            reject_refresh,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_burst_refreshes_once() {
        let params = params(-5, false);
        let connector = Arc::new(SimulatedConnector::new(params.latency, false));

        let report = simulate(connector, store(), SessionOptions::default(), &params).await;

        assert_eq!(report.backend_refresh_calls, 1);
        assert_eq!(report.succeeded, 8);
        assert_eq!(report.distinct_tokens, 1);
        assert!(report.session_valid);
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_token_needs_no_refresh() {
        let params = params(3600, false);
        let connector = Arc::new(SimulatedConnector::new(params.latency, false));

        let report = simulate(connector, store(), SessionOptions::default(), &params).await;

        assert_eq!(report.backend_refresh_calls, 0);
        assert_eq!(report.succeeded, 8);
        assert_eq!(report.distinct_tokens, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_refresh_fails_every_caller() {
        let params = params(-5, true);
        let connector = Arc::new(SimulatedConnector::new(params.latency, true));

        let report = simulate(connector, store(), SessionOptions::default(), &params).await;

        assert_eq!(report.backend_refresh_calls, 1);
        assert_eq!(report.failed, 8);
        assert_eq!(report.errors.len(), 1);
        assert!(!report.session_valid);
    }
}
