//! Guarded plugin invocation.
//!
//! Every call into plugin code (extractors, OCR backends, post-processors, validators,
//! embedding inference) goes through here: it runs as its own tokio task under a hard
//! timeout, and a panic inside it becomes a `Plugin` error carrying a [`PanicContext`]
//! instead of tearing down the caller.

use crate::core::config::CallPolicyConfig;
use crate::panic_context::{self, PanicContext, PanicSlot};
use crate::{DocweaveError, ErrorKind, Result};
use std::time::Duration;
use tokio::task::JoinError;

/// What a guarded call is attributed to when it times out.
#[derive(Debug, Clone)]
pub(crate) enum CallSite {
    Plugin(String),
    Ocr(String),
}

impl CallSite {
    fn name(&self) -> &str {
        match self {
            CallSite::Plugin(name) | CallSite::Ocr(name) => name,
        }
    }

    fn timeout_error(&self, timeout: Duration) -> DocweaveError {
        let message = format!("call timed out after {}ms", timeout.as_millis());
        match self {
            CallSite::Plugin(name) => DocweaveError::plugin(name.clone(), message),
            CallSite::Ocr(name) => DocweaveError::ocr(name.clone(), message),
        }
    }
}

pub(crate) fn policy_timeout(policy: &CallPolicyConfig) -> Duration {
    Duration::from_millis(policy.timeout_ms)
}

/// Run `fut` as a separate task with a timeout and panic capture.
pub(crate) async fn guarded<F, T>(site: &CallSite, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let (slot, scoped) = panic_context::capture_scope(fut);
    let mut handle = tokio::spawn(scoped);

    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(join_failure(site, join_error, &slot)),
        Err(_) => {
            handle.abort();
            tracing::warn!(plugin = site.name(), timeout_ms = timeout.as_millis() as u64, "plugin call timed out");
            Err(site.timeout_error(timeout))
        }
    }
}

/// Run a blocking closure on the blocking pool with a timeout and panic capture.
///
/// A timed-out blocking call keeps running in the background; only the wait is abandoned.
pub(crate) async fn guarded_blocking<F, T>(site: &CallSite, timeout: Duration, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(move || panic_context::capture_sync(f));

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(Ok(result))) => result,
        Ok(Ok(Err(context))) => Err(panic_error(site, context)),
        Ok(Err(join_error)) => Err(join_failure(site, join_error, &PanicSlot::default())),
        Err(_) => {
            tracing::warn!(plugin = site.name(), timeout_ms = timeout.as_millis() as u64, "blocking call timed out");
            Err(site.timeout_error(timeout))
        }
    }
}

/// Retry `op` on OCR failures according to `policy`, with linear backoff.
pub(crate) async fn with_retry<F, Fut, T>(policy: &CallPolicyConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.retry_attempts && e.kind() == ErrorKind::Ocr => {
                attempt += 1;
                let delay = Duration::from_millis(policy.retry_backoff_ms.saturating_mul(u64::from(attempt)));
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying OCR call");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn join_failure(site: &CallSite, join_error: JoinError, slot: &PanicSlot) -> DocweaveError {
    if join_error.is_panic() {
        let recorded = slot.lock().take();
        let context = recorded.unwrap_or_else(|| PanicContext::from_payload(join_error.into_panic().as_ref()));
        panic_error(site, context)
    } else {
        DocweaveError::plugin(site.name(), "task was cancelled")
    }
}

fn panic_error(site: &CallSite, context: PanicContext) -> DocweaveError {
    tracing::warn!(plugin = site.name(), panic = %context, "plugin panicked");
    DocweaveError::plugin_panic(site.name(), context)
}
