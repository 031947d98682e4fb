//! A loaded language definition: the definition document plus the
//! dispatch table built from it.
//!
//! A [`Language`] is loaded once and shared (through an [`Arc`]) by
//! all the compilation units which use it.  Nothing about it changes
//! after loading.
use std::path::Path;
use std::sync::Arc;

use tracing::{event, span, Level};

use super::config::LanguageConfig;
use super::dispatch::DispatchTable;
use super::driver::CompilationUnit;
use super::handler::SymbolResolver;
use super::native::NativeRegistry;
use super::script::ScriptRuntime;
use super::types::ImplementationError;

#[derive(Debug)]
pub struct Language {
    config: Arc<LanguageConfig>,
    table: DispatchTable,
}

impl Language {
    /// Load the language whose definition lives in the directory
    /// `language_root`.  The handler modules are loaded from the
    /// configured load directory below it.
    ///
    /// # Errors
    ///
    /// Any problem with the definition document, the handler modules
    /// or the handler symbols the document names.
    pub fn load(language_root: &Path) -> Result<Arc<Language>, ImplementationError> {
        let span = span!(Level::INFO, "load language", root=%language_root.display());
        let _enter = span.enter();
        let config = LanguageConfig::load(language_root)?;
        let load_dir = language_root.join(&config.specification().language_load_path);
        let runtime = ScriptRuntime::load(&load_dir)?;
        Language::build(config, &runtime)
    }

    /// Build a language whose handlers are Rust closures.
    ///
    /// # Errors
    ///
    /// Fails if the document names a handler which `registry` does not
    /// contain.
    pub fn from_registry(
        config: LanguageConfig,
        registry: &NativeRegistry,
    ) -> Result<Arc<Language>, ImplementationError> {
        Language::build(config, registry)
    }

    fn build(
        config: LanguageConfig,
        resolver: &dyn SymbolResolver,
    ) -> Result<Arc<Language>, ImplementationError> {
        let table = DispatchTable::build(config.specification(), resolver)?;
        event!(
            Level::INFO,
            "language definition loaded ({} mnemonics)",
            table.mnemonics().count()
        );
        Ok(Arc::new(Language {
            config: Arc::new(config),
            table,
        }))
    }

    /// Start compiling `source` in this language.
    #[must_use]
    pub fn create_compilation_unit(self: &Arc<Self>, source: &str) -> CompilationUnit {
        CompilationUnit::new(Arc::clone(self), source)
    }

    #[must_use]
    pub fn config(&self) -> &LanguageConfig {
        &self.config
    }

    pub(crate) fn shared_config(&self) -> Arc<LanguageConfig> {
        Arc::clone(&self.config)
    }

    #[must_use]
    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    /// The mnemonics of the language (in lower case, sorted).
    pub fn mnemonics(&self) -> impl Iterator<Item = &str> {
        self.table.mnemonics()
    }
}
