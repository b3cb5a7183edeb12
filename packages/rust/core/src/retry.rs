//! Per-stage retry and timeout policy.
//!
//! Every stage of the task graph runs under the same policy: a fixed number
//! of attempts, a fixed delay between attempts, and a hard per-attempt
//! timeout. A timed-out attempt counts like a failed one.

use std::time::Duration;

use tracing::{error, warn};

use pricewatch_shared::{PipelineConfig, PricewatchError};

/// A stage of the pipeline task graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scrape,
    FetchRate,
    Transform,
    Load,
}

impl Stage {
    /// The label recorded in `pipeline_runs.failed_stage` and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scrape => "scrape",
            Self::FetchRate => "fetch_rate",
            Self::Transform => "transform",
            Self::Load => "load",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry policy applied uniformly to each stage.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per stage before the run is marked failed.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    /// Hard per-attempt timeout.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for RetryPolicy {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            attempt_timeout: Duration::from_secs(config.attempt_timeout_secs),
        }
    }
}

/// A stage that exhausted its attempts. Carries the last underlying error.
#[derive(Debug, thiserror::Error)]
#[error("stage {stage} failed after {attempts} attempt(s): {source}")]
pub struct StageFailure {
    pub stage: Stage,
    pub attempts: u32,
    #[source]
    pub source: PricewatchError,
}

/// Run one stage under the retry policy.
///
/// `op` is invoked once per attempt. The stage succeeds on the first `Ok`;
/// after `max_attempts` failures the last error is returned as a
/// [`StageFailure`]. A `max_attempts` of zero is treated as one.
pub async fn run_stage<T, F, Fut>(
    stage: Stage,
    policy: RetryPolicy,
    mut op: F,
) -> std::result::Result<T, StageFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = pricewatch_shared::Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let result = match tokio::time::timeout(policy.attempt_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(PricewatchError::fetch(format!(
                "{stage} attempt timed out after {}s",
                policy.attempt_timeout.as_secs()
            ))),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt >= max_attempts {
                    error!(stage = %stage, attempts = attempt, error = %e, "stage failed, attempts exhausted");
                    return Err(StageFailure {
                        stage,
                        attempts: attempt,
                        source: e,
                    });
                }
                warn!(
                    stage = %stage,
                    attempt,
                    delay_secs = policy.retry_delay.as_secs(),
                    error = %e,
                    "stage attempt failed, retrying"
                );
                tokio::time::sleep(policy.retry_delay).await;
            }
        }
    }
}
