//! Languages whose handlers are compiled into the program, rather
//! than loaded as script modules.
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use super::context::UnitContext;
use super::handler::{FnHandler, SharedHandler, SymbolResolver};
use super::types::HandlerResult;

/// A table of handlers keyed by the symbol names a definition
/// document uses to refer to them.
#[derive(Default, Clone)]
pub struct NativeRegistry {
    handlers: HashMap<String, SharedHandler>,
}

impl Debug for NativeRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut symbols: Vec<&String> = self.handlers.keys().collect();
        symbols.sort();
        f.debug_struct("NativeRegistry")
            .field("symbols", &symbols)
            .finish()
    }
}

impl NativeRegistry {
    #[must_use]
    pub fn new() -> NativeRegistry {
        NativeRegistry::default()
    }

    /// Register `body` as the handler called `symbol`, replacing any
    /// earlier registration of the same name.
    pub fn register<F>(&mut self, symbol: &str, body: F)
    where
        F: Fn(&mut UnitContext) -> HandlerResult + Send + Sync + 'static,
    {
        self.register_handler(symbol, Arc::new(FnHandler::new(symbol, body)));
    }

    pub fn register_handler(&mut self, symbol: &str, handler: SharedHandler) {
        self.handlers.insert(symbol.to_string(), handler);
    }

    #[must_use]
    pub fn with<F>(mut self, symbol: &str, body: F) -> NativeRegistry
    where
        F: Fn(&mut UnitContext) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(symbol, body);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl SymbolResolver for NativeRegistry {
    fn resolve(&self, symbol: &str) -> Option<SharedHandler> {
        self.handlers.get(symbol).cloned()
    }
}

#[test]
fn test_registry_resolves_by_exact_name() {
    let registry = NativeRegistry::new()
        .with("Linker", |_| Ok(()))
        .with("linker", |unit| Err(unit.compile_error("wrong one")));
    assert_eq!(registry.len(), 2);
    let handler = registry.resolve("Linker").expect("Linker is registered");
    assert_eq!(handler.symbol(), "Linker");
    assert!(registry.resolve("LINKER").is_none());
}
