//! Registry of loaded file processors.
//!
//! The [`PluginRegistry`] holds every processor available to the dispatcher
//! in a stable order. Processors are either registered directly or
//! discovered from `*.json` manifests in a plugin directory, which are read
//! in lexical file name order. Duplicate names are rejected.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::capability::{FileProcessor, ProcessorHandle};
use crate::error::PluginError;
use crate::manifest::PluginManifest;
use crate::process::{PluginExecutor, ProcessExecutor, ProcessPlugin};

const REGISTRY_TARGET: &str = "intake_plugins::registry";
const MANIFEST_EXTENSION: &str = "json";

/// Ordered collection of named processors.
///
/// # Example
///
/// ```
/// use intake_plugins::{PluginManifest, PluginRegistry, ProcessExecutor, ProcessPlugin};
/// use std::path::PathBuf;
/// use std::sync::Arc;
///
/// let manifest = PluginManifest::new("rates", "1.0.0", PathBuf::from("/usr/bin/rates"));
/// let plugin = ProcessPlugin::new(manifest, Arc::new(ProcessExecutor));
///
/// let mut registry = PluginRegistry::new();
/// registry.register("rates", Arc::new(plugin)).expect("registration succeeds");
/// assert_eq!(registry.names(), vec!["rates"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    handles: Vec<ProcessorHandle>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every manifest in `dir`, running plugins as child processes.
    ///
    /// # Errors
    ///
    /// See [`PluginRegistry::discover_with`].
    pub fn discover(dir: &Path) -> Result<Self, PluginError> {
        Self::discover_with(dir, Arc::new(ProcessExecutor))
    }

    /// Loads every manifest in `dir`, running plugins through `executor`.
    ///
    /// An existing directory without manifests yields an empty registry.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Directory`] when `dir` cannot be listed, any
    /// manifest loading error, or [`PluginError::Manifest`] when two
    /// manifests share a name.
    pub fn discover_with(
        dir: &Path,
        executor: Arc<dyn PluginExecutor>,
    ) -> Result<Self, PluginError> {
        let mut registry = Self::new();
        for path in manifest_paths(dir)? {
            let manifest = PluginManifest::load(&path)?;
            debug!(
                target: REGISTRY_TARGET,
                plugin = manifest.name(),
                version = manifest.version(),
                manifest = %path.display(),
                "loaded plugin manifest"
            );
            let name = manifest.name().to_owned();
            let plugin = ProcessPlugin::new(manifest, Arc::clone(&executor));
            registry.register(name, Arc::new(plugin))?;
        }
        info!(
            target: REGISTRY_TARGET,
            directory = %dir.display(),
            plugins = registry.len(),
            "plugin discovery complete"
        );
        Ok(registry)
    }

    /// Registers a processor under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Manifest`] if the name is empty or already
    /// registered.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        processor: Arc<dyn FileProcessor>,
    ) -> Result<(), PluginError> {
        let owned = name.into();
        if owned.trim().is_empty() {
            return Err(PluginError::Manifest {
                message: String::from("plugin name must not be empty"),
            });
        }
        if self.get(&owned).is_some() {
            return Err(PluginError::Manifest {
                message: format!("plugin '{owned}' is already registered"),
            });
        }
        self.handles.push(ProcessorHandle::new(owned, processor));
        Ok(())
    }

    /// Looks up a processor by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ProcessorHandle> {
        self.handles.iter().find(|handle| handle.name() == name)
    }

    /// Returns every processor in registration order.
    #[must_use]
    pub fn handles(&self) -> &[ProcessorHandle] {
        &self.handles
    }

    /// Returns the registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.handles.iter().map(ProcessorHandle::name).collect()
    }

    /// Returns the number of registered processors.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns `true` when no processors are registered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Lists manifest files in `dir` sorted by file name.
fn manifest_paths(dir: &Path) -> Result<Vec<PathBuf>, PluginError> {
    let directory_error = |source: std::io::Error| PluginError::Directory {
        path: dir.to_path_buf(),
        source: Arc::new(source),
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(directory_error)? {
        let path = entry.map_err(directory_error)?.path();
        let is_manifest = path
            .extension()
            .is_some_and(|extension| extension == MANIFEST_EXTENSION);
        if is_manifest && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
