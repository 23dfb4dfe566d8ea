//! Base trait shared by every plugin type.

use crate::Result;

/// Lifecycle and identity common to extractors, OCR backends, post-processors, and
/// validators.
///
/// `initialize` runs when the plugin is registered and `shutdown` when it is unregistered
/// or its registry is cleared.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> String;

    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn description(&self) -> &str {
        ""
    }

    fn author(&self) -> &str {
        ""
    }
}
