//! Format dispatch: an ordered registry of capability-probing handlers.
//!
//! Each handler answers `can_load`/`can_save` for a path without side effects
//! and performs the actual decode/encode. The registry walks handlers in
//! registration order and hands back the first willing one, so specific
//! handlers must be registered ahead of generic fallbacks.

mod json;
mod png;
mod tabular;

pub use json::JsonHandler;
pub use png::PngHandler;
pub use tabular::{CsvHandler, TsvHandler};

use crate::error::{CatalogError, Result};
use crate::table::Table;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

/// Free-form handler options (delimiter overrides and the like).
pub type HandlerOptions = Map<String, Value>;

/// In-memory result of decoding one file.
#[derive(Clone, Debug, PartialEq)]
pub enum Artifact {
    Table(Table),
    Json(Value),
    Binary { format: &'static str, bytes: Vec<u8> },
}

impl Artifact {
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Artifact::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut Table> {
        match self {
            Artifact::Table(table) => Some(table),
            _ => None,
        }
    }
}

/// Capability contract shared by every format variant.
///
/// Probes must not panic or touch the filesystem beyond reading.
pub trait FormatHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn can_load(&self, path: &Path) -> bool;
    fn can_save(&self, path: &Path) -> bool;
    fn load(&self, path: &Path, options: &HandlerOptions) -> anyhow::Result<Artifact>;
    fn save(&self, artifact: &Artifact, path: &Path, options: &HandlerOptions)
    -> anyhow::Result<()>;
}

/// Ordered handler list; first positive probe wins.
pub struct FormatRegistry {
    handlers: Vec<Box<dyn FormatHandler>>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(PngHandler);
        registry.register(TsvHandler);
        registry.register(CsvHandler);
        registry.register(JsonHandler);
        registry
    }
}

impl FormatRegistry {
    /// Registry with no handlers; callers register their own in priority order.
    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Append a handler after every already-registered one.
    pub fn register<H: FormatHandler + 'static>(&mut self, handler: H) {
        self.handlers.push(Box::new(handler));
    }

    pub fn handler_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.iter().map(|handler| handler.name())
    }

    pub fn resolve_for_load(&self, path: &Path) -> Result<&dyn FormatHandler> {
        self.resolve(path, |handler| handler.can_load(path))
    }

    pub fn resolve_for_save(&self, path: &Path) -> Result<&dyn FormatHandler> {
        self.resolve(path, |handler| handler.can_save(path))
    }

    /// Resolve a loader and decode `path`.
    pub fn load(&self, path: &Path, options: &HandlerOptions) -> anyhow::Result<Artifact> {
        let handler = self.resolve_for_load(path)?;
        handler.load(path, options)
    }

    /// Resolve a saver and encode `artifact` to `path`.
    pub fn save(
        &self,
        artifact: &Artifact,
        path: &Path,
        options: &HandlerOptions,
    ) -> anyhow::Result<()> {
        let handler = self.resolve_for_save(path)?;
        handler.save(artifact, path, options)
    }

    fn resolve<F>(&self, path: &Path, accepts: F) -> Result<&dyn FormatHandler>
    where
        F: Fn(&dyn FormatHandler) -> bool,
    {
        for handler in &self.handlers {
            if accepts(handler.as_ref()) {
                debug!(handler = handler.name(), path = %path.display(), "format handler selected");
                return Ok(handler.as_ref());
            }
        }
        Err(CatalogError::NoHandlerFound {
            path: path.to_path_buf(),
        })
    }
}

/// Lower-cased file name, used by the extension-based probes.
pub(crate) fn lowercase_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_ascii_lowercase)
}
