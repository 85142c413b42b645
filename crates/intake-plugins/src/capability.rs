//! The processing contract every loaded plugin satisfies.
//!
//! A [`FileProcessor`] exposes one blocking method per [`Operation`]. The
//! dispatcher only ever holds processors through a [`ProcessorHandle`], which
//! pairs the implementation with the name it was registered under so log
//! lines and outcomes can identify the plugin without the trait carrying
//! identity.
//!
//! A panic raised by a processor is caught at the handle and reported as
//! [`PluginError::Panicked`], so one misbehaving in-process plugin cannot take
//! down the thread that invokes it.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use crate::error::PluginError;
use crate::operation::Operation;

/// Behaviour a plugin offers for ingested files.
///
/// Implementations must be shareable across threads; the dispatcher invokes
/// them from its consumer thread while the registry retains ownership.
pub trait FileProcessor: Send + Sync {
    /// Ingests a rate history document.
    ///
    /// # Errors
    ///
    /// Returns a [`PluginError`] when the processor cannot handle the file.
    fn history(&self, path: &Path) -> Result<(), PluginError>;

    /// Runs security checks on a rate limits document.
    ///
    /// # Errors
    ///
    /// Returns a [`PluginError`] when the checks fail or cannot run.
    fn security(&self, path: &Path) -> Result<(), PluginError>;

    /// Runs complex analysis on a rate limits document.
    ///
    /// # Errors
    ///
    /// Returns a [`PluginError`] when the analysis fails or cannot run.
    fn complex_analysis(&self, path: &Path) -> Result<(), PluginError>;
}

/// A named, shareable reference to a loaded processor.
#[derive(Clone)]
pub struct ProcessorHandle {
    name: String,
    processor: Arc<dyn FileProcessor>,
}

impl ProcessorHandle {
    /// Wraps a processor under the given registry name.
    #[must_use]
    pub fn new(name: impl Into<String>, processor: Arc<dyn FileProcessor>) -> Self {
        Self {
            name: name.into(),
            processor,
        }
    }

    /// Name the processor was registered under.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Invokes the method matching `operation` on the wrapped processor.
    ///
    /// # Errors
    ///
    /// Propagates the [`PluginError`] returned by the processor, or
    /// [`PluginError::Panicked`] when the processor panics.
    pub fn invoke(&self, operation: Operation, path: &Path) -> Result<(), PluginError> {
        let processor = &self.processor;
        panic::catch_unwind(AssertUnwindSafe(|| match operation {
            Operation::History => processor.history(path),
            Operation::Security => processor.security(path),
            Operation::ComplexAnalysis => processor.complex_analysis(path),
        }))
        .unwrap_or_else(|payload| {
            Err(PluginError::Panicked {
                name: self.name.clone(),
                operation,
                message: panic_message(payload.as_ref()),
            })
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("non-string panic payload"))
}

impl fmt::Debug for ProcessorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
