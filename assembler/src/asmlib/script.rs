//! Handlers written as WebAssembly modules.
//!
//! Every `*.wasm` file below a language's load directory is
//! instantiated into one shared store.  Each function the modules
//! export with type `() -> i32` becomes a symbol which the definition
//! document can name.  The handlers reach the compilation unit
//! through the functions of the `asm` import module (see the `host`
//! module), and report their outcome through their return value:
//!
//! * `0` means success;
//! * a handle obtained from `asm.error_new` means the program being
//!   assembled is wrong (a compile error, with the message given to
//!   `error_new` and located where `error_new` was called);
//! * anything else, or a trap, is a defect in the handler.
use std::collections::HashMap;
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{event, span, Level};
use walkdir::WalkDir;
use wasmi::{Engine, ExternType, Linker, Module, Store, TypedFunc};

use super::context::UnitContext;
use super::handler::{InstructionHandler, SharedHandler, SymbolResolver};
use super::types::{AssemblerFailure, CompileError, HandlerResult, ImplementationError};

mod host;

pub const SCRIPT_EXTENSION: &str = "wasm";

/// The data of the shared store.  While a handler runs, the
/// compilation unit it is working on is moved in here so that the
/// host functions can reach it.
#[derive(Debug, Default)]
pub(crate) struct HostState {
    unit: UnitContext,
    /// A failure raised by a host function; it takes precedence over
    /// the trap the host function then causes.
    fault: Option<AssemblerFailure>,
    /// The structured errors created during the current call, each
    /// with the location at which it was raised; a handle is an index
    /// into this plus one.
    exceptions: Vec<RaisedError>,
}

#[derive(Debug)]
pub(crate) struct RaisedError {
    location: String,
    message: String,
}

type SharedStore = Arc<Mutex<Store<HostState>>>;

/// One shared runtime instance: all the modules of a language,
/// loaded together.
pub struct ScriptRuntime {
    store: SharedStore,
    symbols: HashMap<String, TypedFunc<(), i32>>,
    modules: Vec<PathBuf>,
}

impl std::fmt::Debug for ScriptRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut symbols: Vec<&String> = self.symbols.keys().collect();
        symbols.sort();
        f.debug_struct("ScriptRuntime")
            .field("modules", &self.modules)
            .field("symbols", &symbols)
            .finish_non_exhaustive()
    }
}

fn is_script(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SCRIPT_EXTENSION)
}

impl ScriptRuntime {
    /// Load every module below `load_dir` (including those in
    /// subdirectories).
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be read, if a module is invalid
    /// or cannot be instantiated (for example because it imports
    /// something the engine doesn't provide, or its start function
    /// traps) or if two modules export a handler of the same name.
    pub fn load(load_dir: &Path) -> Result<ScriptRuntime, ImplementationError> {
        let span = span!(Level::DEBUG, "load scripts", dir=%load_dir.display());
        let _enter = span.enter();

        if !load_dir.is_dir() {
            return Err(ImplementationError::new(format!(
                "handler directory {} does not exist",
                load_dir.display()
            )));
        }

        let engine = Engine::default();
        let mut linker: Linker<HostState> = Linker::new(&engine);
        host::define(&mut linker)?;
        let mut store = Store::new(&engine, HostState::default());

        let mut symbols: HashMap<String, TypedFunc<(), i32>> = HashMap::new();
        let mut origins: HashMap<String, PathBuf> = HashMap::new();
        let mut modules: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(load_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                ImplementationError::new(format!(
                    "failed to read handler directory {}: {e}",
                    load_dir.display()
                ))
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || !is_script(path) {
                continue;
            }
            let module_failure = |what: &str, e: &dyn std::fmt::Display| {
                ImplementationError::new(format!("{what} {}: {e}", path.display()))
            };
            let bytes = fs::read(path).map_err(|e| module_failure("failed to read", &e))?;
            let module = Module::new(&engine, &bytes)
                .map_err(|e| module_failure("invalid handler module", &e))?;
            let instance = linker
                .instantiate_and_start(&mut store, &module)
                .map_err(|e| module_failure("failed to instantiate", &e))?;

            let exported: Vec<String> = module
                .exports()
                .filter(|export| matches!(export.ty(), ExternType::Func(_)))
                .map(|export| export.name().to_string())
                .collect();
            for name in exported {
                let Some(func) = instance.get_func(&store, &name) else {
                    continue;
                };
                match func.typed::<(), i32>(&store) {
                    Ok(typed) => {
                        if let Some(previous) = origins.get(&name) {
                            return Err(ImplementationError::new(format!(
                                "handler {name} is defined both in {} and in {}",
                                previous.display(),
                                path.display()
                            )));
                        }
                        symbols.insert(name.clone(), typed);
                        origins.insert(name, path.to_path_buf());
                    }
                    Err(_) => {
                        event!(
                            Level::DEBUG,
                            "export {name} of {} is not a handler (handlers have type () -> i32)",
                            path.display()
                        );
                    }
                }
            }
            event!(Level::DEBUG, "loaded {}", path.display());
            modules.push(path.to_path_buf());
        }
        event!(
            Level::INFO,
            "loaded {} handler modules defining {} handlers",
            modules.len(),
            symbols.len()
        );
        Ok(ScriptRuntime {
            store: Arc::new(Mutex::new(store)),
            symbols,
            modules,
        })
    }

    /// The files which were loaded, in load order.
    #[must_use]
    pub fn modules(&self) -> &[PathBuf] {
        &self.modules
    }
}

impl SymbolResolver for ScriptRuntime {
    fn resolve(&self, symbol: &str) -> Option<SharedHandler> {
        let func = self.symbols.get(symbol)?.clone();
        Some(Arc::new(ScriptHandler {
            symbol: symbol.to_string(),
            func,
            store: Arc::clone(&self.store),
        }))
    }
}

struct ScriptHandler {
    symbol: String,
    func: TypedFunc<(), i32>,
    store: SharedStore,
}

impl ScriptHandler {
    fn classify(
        &self,
        outcome: Result<i32, wasmi::Error>,
        fault: Option<AssemblerFailure>,
        exceptions: &[RaisedError],
    ) -> HandlerResult {
        if let Some(failure) = fault {
            return Err(failure.attributed_to(&self.symbol));
        }
        match outcome {
            Ok(0) => Ok(()),
            Ok(handle) => {
                let raised = usize::try_from(handle)
                    .ok()
                    .and_then(|h| h.checked_sub(1))
                    .and_then(|index| exceptions.get(index));
                match raised {
                    Some(RaisedError { location, message }) => Err(AssemblerFailure::Compile(
                        CompileError::new(location.clone(), message.as_str()),
                    )),
                    None => Err(ImplementationError::in_handler(
                        &self.symbol,
                        format!("returned {handle}, which is neither 0 nor an error handle"),
                    )
                    .into()),
                }
            }
            Err(trap) => Err(ImplementationError::in_handler(
                &self.symbol,
                format!("handler failed: {trap}"),
            )
            .into()),
        }
    }
}

impl InstructionHandler for ScriptHandler {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn execute(&self, unit: &mut UnitContext) -> HandlerResult {
        let mut store = self.store.lock().map_err(|_| {
            ImplementationError::in_handler(
                &self.symbol,
                "the script runtime is unusable after an earlier failure",
            )
        })?;
        {
            let state = store.data_mut();
            state.unit = mem::take(unit);
            state.fault = None;
            state.exceptions.clear();
        }
        let outcome = self.func.call(&mut *store, ());
        let state = store.data_mut();
        *unit = mem::take(&mut state.unit);
        let fault = state.fault.take();
        let exceptions = mem::take(&mut state.exceptions);
        drop(store);
        self.classify(outcome, fault, &exceptions)
    }
}
