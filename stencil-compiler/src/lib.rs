//! Template compiler.
//!
//! `compile` scans a template into a tree of [`Node`]s. `generate` lowers the
//! tree to a [`Program`] that renders against a [`Host`], and
//! `generate_source` lowers it to the tokens of a standalone render closure,
//! which a [`Runtime`] runs against the same kind of host.
//!
//! The free functions share one process-wide [`Compiler`] configured from the
//! environment; construct a `Compiler` to use other options.

pub mod abi;
pub mod ast;
pub mod cache;
pub mod error;
pub mod naming;
pub mod optimize;
pub mod options;
pub mod parser;
pub mod platform;
pub mod render;
pub mod runtime;
pub mod scanner;
pub mod source;

use std::sync::{Arc, LazyLock};

use tracing::debug;

pub use ast::Node;
pub use cache::{CacheStats, TemplateCache};
pub use error::{CompileError, ErrorKind};
pub use options::{CompileOptions, Mode, Profile};
pub use platform::{Hint, Platform, WebPlatform};
pub use render::{Host, Program, RenderError};
pub use runtime::{Runtime, Template};
pub use source::{GeneratedSource, SourceError};

#[derive(Clone)]
pub struct Compiler {
    inner: Arc<Inner>,
}

struct Inner {
    options: CompileOptions,
    platform: Box<dyn Platform>,
    cache: TemplateCache,
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("options", &self.inner.options)
            .field("cache", &self.inner.cache)
            .finish_non_exhaustive()
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompileOptions::default())
    }
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self::with_platform(options, WebPlatform)
    }

    pub fn with_platform(options: CompileOptions, platform: impl Platform + 'static) -> Self {
        let cache = TemplateCache::new(options.cache_capacity);
        Self {
            inner: Arc::new(Inner {
                options,
                platform: Box::new(platform),
                cache,
            }),
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.inner.options
    }

    /// Compiles `template`, reusing the cached tree for a source seen before.
    /// Failures are not cached.
    pub fn compile(&self, template: &str) -> Result<Arc<[Node]>, CompileError> {
        if let Some(nodes) = self.inner.cache.get(template) {
            return Ok(nodes);
        }
        let nodes: Arc<[Node]> = parser::parse(
            template,
            self.inner.platform.as_ref(),
            self.inner.options.is_production(),
        )?
        .into();
        self.inner.cache.insert(template, Arc::clone(&nodes));
        Ok(nodes)
    }

    pub fn generate(&self, nodes: &[Node]) -> Program {
        debug!(nodes = nodes.len(), "generating program");
        render::Generator::new(self).program(nodes)
    }

    /// Render closure source under the configured naming profile.
    pub fn generate_source(&self, nodes: &[Node]) -> Result<GeneratedSource, SourceError> {
        debug!(nodes = nodes.len(), profile = ?self.inner.options.profile, "generating source");
        source::generate(nodes, naming::for_profile(self.inner.options.profile))
    }

    /// Helpers for a generated closure rendering against `host`. Host
    /// partials it imports are compiled with this compiler.
    pub fn runtime<'h>(&self, host: &'h mut dyn Host) -> Runtime<'h> {
        Runtime::new(host, self)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }
}

static DEFAULT: LazyLock<Compiler> = LazyLock::new(|| Compiler::new(CompileOptions::from_env()));

/// The process-wide compiler behind the free functions.
pub fn default_compiler() -> &'static Compiler {
    &DEFAULT
}

pub fn compile(template: &str) -> Result<Arc<[Node]>, CompileError> {
    DEFAULT.compile(template)
}

pub fn generate(nodes: &[Node]) -> Program {
    DEFAULT.generate(nodes)
}

pub fn generate_source(nodes: &[Node]) -> Result<GeneratedSource, SourceError> {
    DEFAULT.generate_source(nodes)
}
