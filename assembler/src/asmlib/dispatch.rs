//! The dispatch table: from (lowercased) mnemonic, or reserved
//! phase, to handler.
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{event, Level};

use super::config::LanguageSpecification;
use super::handler::{NoOp, Phase, SharedHandler, SymbolResolver};
use super::token::{to_lower_case, Token};
use super::types::ImplementationError;

#[derive(Debug)]
struct PhaseHandlers {
    before_compile: SharedHandler,
    non_instruction: SharedHandler,
    before_link: SharedHandler,
    linker: SharedHandler,
    after_link: SharedHandler,
    output: SharedHandler,
}

/// Built once per language definition and never changed afterwards;
/// every compilation unit of the language shares it.
#[derive(Debug)]
pub struct DispatchTable {
    instructions: BTreeMap<String, SharedHandler>,
    phases: PhaseHandlers,
}

fn resolve_symbol(
    resolver: &dyn SymbolResolver,
    symbol: &str,
    role: &str,
) -> Result<SharedHandler, ImplementationError> {
    match resolver.resolve(symbol) {
        Some(handler) => {
            event!(Level::TRACE, "resolved {role} to {symbol}");
            Ok(handler)
        }
        None => Err(ImplementationError::new(format!(
            "handler symbol {symbol} (configured for {role}) is not defined"
        ))),
    }
}

fn resolve_hook(
    resolver: &dyn SymbolResolver,
    symbol: Option<&str>,
    phase: Phase,
) -> Result<SharedHandler, ImplementationError> {
    match symbol {
        Some(symbol) => resolve_symbol(resolver, symbol, phase.key()),
        None => Ok(Arc::new(NoOp)),
    }
}

impl DispatchTable {
    /// Resolve every handler symbol the definition document names.
    ///
    /// # Errors
    ///
    /// Fails if a configured symbol cannot be resolved, or if two
    /// mnemonics differ only in case.
    pub fn build(
        spec: &LanguageSpecification,
        resolver: &dyn SymbolResolver,
    ) -> Result<DispatchTable, ImplementationError> {
        let mut instructions: BTreeMap<String, SharedHandler> = BTreeMap::new();
        for (mnemonic, symbol) in &spec.instruction_to_handler_name_map {
            let key = to_lower_case(mnemonic);
            let handler = resolve_symbol(resolver, symbol, &format!("mnemonic {mnemonic}"))?;
            if instructions.insert(key, handler).is_some() {
                return Err(ImplementationError::new(format!(
                    "mnemonic {mnemonic} is configured more than once (mnemonics are not case-sensitive)"
                )));
            }
        }
        let phases = PhaseHandlers {
            before_compile: resolve_hook(
                resolver,
                spec.before_compile.as_deref(),
                Phase::BeforeCompile,
            )?,
            non_instruction: resolve_symbol(
                resolver,
                &spec.non_instruction_handler,
                Phase::NonInstructionHandler.key(),
            )?,
            before_link: resolve_hook(resolver, spec.before_link.as_deref(), Phase::BeforeLink)?,
            linker: resolve_symbol(resolver, &spec.linker, Phase::Linker.key())?,
            after_link: resolve_hook(resolver, spec.after_link.as_deref(), Phase::AfterLink)?,
            output: resolve_symbol(resolver, &spec.output, Phase::Output.key())?,
        };
        event!(
            Level::DEBUG,
            "dispatch table has {} mnemonics",
            instructions.len()
        );
        Ok(DispatchTable {
            instructions,
            phases,
        })
    }

    /// Find the handler for a mnemonic, ignoring case.
    #[must_use]
    pub fn lookup(&self, token: &Token) -> Option<&SharedHandler> {
        self.instructions.get(&token.to_lower_case())
    }

    #[must_use]
    pub fn phase(&self, phase: Phase) -> &SharedHandler {
        match phase {
            Phase::BeforeCompile => &self.phases.before_compile,
            Phase::NonInstructionHandler => &self.phases.non_instruction,
            Phase::BeforeLink => &self.phases.before_link,
            Phase::Linker => &self.phases.linker,
            Phase::AfterLink => &self.phases.after_link,
            Phase::Output => &self.phases.output,
        }
    }

    /// The (lowercase) mnemonics, in sorted order.
    pub fn mnemonics(&self) -> impl Iterator<Item = &str> {
        self.instructions.keys().map(String::as_str)
    }
}
