//! Panic capture for plugin invocations.
//!
//! Plugin calls run inside tokio tasks scoped with a capture slot. A process-wide panic hook
//! records the panic location and message into the slot of the task that panicked, and
//! [`crate::core::call`] turns the resulting `JoinError` into a `Plugin` error carrying the
//! [`PanicContext`]. Panics outside a capture scope are forwarded to the previous hook.
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanicContext {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl PanicContext {
    fn from_hook(info: &std::panic::PanicHookInfo<'_>) -> Self {
        let (file, line, column) = info
            .location()
            .map(|loc| (loc.file().to_string(), loc.line(), loc.column()))
            .unwrap_or_else(|| ("<unknown>".to_string(), 0, 0));

        Self {
            file,
            line,
            column,
            message: payload_message(info.payload()),
            timestamp_ms: now_ms(),
        }
    }

    /// Context for a panic whose location was not recorded by the hook.
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        Self {
            file: "<unknown>".to_string(),
            line: 0,
            column: 0,
            message: payload_message(payload),
            timestamp_ms: now_ms(),
        }
    }
}

impl std::fmt::Display for PanicContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}:{}:{}", self.message, self.file, self.line, self.column)
    }
}

pub(crate) type PanicSlot = Arc<Mutex<Option<PanicContext>>>;

tokio::task_local! {
    static PANIC_SLOT: PanicSlot;
}

thread_local! {
    static THREAD_SLOT: RefCell<Option<PanicSlot>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

pub(crate) fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let slot = PANIC_SLOT
                .try_with(Arc::clone)
                .ok()
                .or_else(|| THREAD_SLOT.try_with(|cell| cell.borrow().clone()).ok().flatten());

            let captured = match slot {
                Some(slot) => {
                    *slot.lock() = Some(PanicContext::from_hook(info));
                    true
                }
                None => false,
            };

            if !captured {
                previous(info);
            }
        }));
    });
}

/// Run `fut` with a fresh capture slot, returning the slot alongside the scoped future.
pub(crate) fn capture_scope<F>(fut: F) -> (PanicSlot, impl Future<Output = F::Output>)
where
    F: Future,
{
    install_panic_hook();
    let slot: PanicSlot = Arc::new(Mutex::new(None));
    let scoped = PANIC_SLOT.scope(Arc::clone(&slot), fut);
    (slot, scoped)
}

/// Run a blocking closure, catching a panic and recording where it happened.
pub(crate) fn capture_sync<F, R>(f: F) -> std::result::Result<R, PanicContext>
where
    F: FnOnce() -> R,
{
    install_panic_hook();
    let slot: PanicSlot = Arc::new(Mutex::new(None));
    THREAD_SLOT.with(|cell| *cell.borrow_mut() = Some(Arc::clone(&slot)));
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(f));
    THREAD_SLOT.with(|cell| cell.borrow_mut().take());

    outcome.map_err(|payload| {
        slot.lock()
            .take()
            .unwrap_or_else(|| PanicContext::from_payload(payload.as_ref()))
    })
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn explode() -> u32 {
        panic!("decoder exploded")
    }

    #[tokio::test]
    async fn test_capture_records_location_and_message() {
        let (slot, fut) = capture_scope(async { 42 });
        assert_eq!(fut.await, 42);
        assert!(slot.lock().is_none());

        let (slot, fut) = capture_scope(async { explode() });
        let joined = tokio::spawn(fut).await;
        assert!(joined.is_err());

        let context = slot.lock().clone().unwrap();
        assert_eq!(context.message, "decoder exploded");
        assert!(context.file.ends_with("panic_context.rs"));
        assert!(context.line > 0);
        assert!(context.timestamp_ms > 0);
    }

    #[test]
    fn test_capture_sync() {
        assert_eq!(capture_sync(|| 7).unwrap(), 7);

        let context = capture_sync(|| -> usize { panic!("blocking failure") }).unwrap_err();
        assert_eq!(context.message, "blocking failure");
        assert!(context.file.ends_with("panic_context.rs"));
    }

    #[test]
    fn test_from_payload_formats_string_payloads() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        let context = PanicContext::from_payload(payload.as_ref());
        assert_eq!(context.message, "owned message");
        assert_eq!(context.file, "<unknown>");
        assert!(context.to_string().starts_with("owned message at <unknown>"));
    }
}
