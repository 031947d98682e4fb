//! Handlers: the units of behaviour a language definition supplies.
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

use super::context::UnitContext;
use super::types::HandlerResult;

/// One piece of language-defined behaviour, bound either to a
/// mnemonic or to one of the pipeline [`Phase`]s.
///
/// A handler runs against the compilation unit it is given and
/// resolves to exactly one of success, a compile error (the program
/// is wrong) or an implementation error (the handler is wrong).
pub trait InstructionHandler: Send + Sync {
    /// The name by which the language definition refers to this
    /// handler; used in diagnostics.
    fn symbol(&self) -> &str;

    /// # Errors
    ///
    /// Whatever the handler reports.
    fn execute(&self, unit: &mut UnitContext) -> HandlerResult;
}

impl Debug for dyn InstructionHandler {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "InstructionHandler({})", self.symbol())
    }
}

pub type SharedHandler = Arc<dyn InstructionHandler>;

/// Stands in for an optional hook the language doesn't configure.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOp;

impl InstructionHandler for NoOp {
    fn symbol(&self) -> &str {
        "(none)"
    }

    fn execute(&self, _unit: &mut UnitContext) -> HandlerResult {
        Ok(())
    }
}

/// A handler implemented by a Rust closure.
pub struct FnHandler<F> {
    symbol: String,
    body: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&mut UnitContext) -> HandlerResult + Send + Sync,
{
    pub fn new<S: Into<String>>(symbol: S, body: F) -> FnHandler<F> {
        FnHandler {
            symbol: symbol.into(),
            body,
        }
    }
}

impl<F> InstructionHandler for FnHandler<F>
where
    F: Fn(&mut UnitContext) -> HandlerResult + Send + Sync,
{
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn execute(&self, unit: &mut UnitContext) -> HandlerResult {
        (self.body)(unit)
    }
}

/// Finds the handler which a language definition names.
pub trait SymbolResolver {
    fn resolve(&self, symbol: &str) -> Option<SharedHandler>;
}

/// The reserved dispatch keys, in the order in which a compilation
/// first reaches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    BeforeCompile,
    NonInstructionHandler,
    BeforeLink,
    Linker,
    AfterLink,
    Output,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::BeforeCompile,
        Phase::NonInstructionHandler,
        Phase::BeforeLink,
        Phase::Linker,
        Phase::AfterLink,
        Phase::Output,
    ];

    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Phase::BeforeCompile => "BeforeCompile",
            Phase::NonInstructionHandler => "NonInstructionHandler",
            Phase::BeforeLink => "BeforeLink",
            Phase::Linker => "Linker",
            Phase::AfterLink => "AfterLink",
            Phase::Output => "Output",
        }
    }

    /// Required phases must be bound to a real handler; the others
    /// default to [`NoOp`].
    #[must_use]
    pub fn is_required(&self) -> bool {
        matches!(
            self,
            Phase::NonInstructionHandler | Phase::Linker | Phase::Output
        )
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[test]
fn test_phase_keys() {
    let keys: Vec<&str> = Phase::ALL.iter().map(Phase::key).collect();
    assert_eq!(
        keys,
        vec![
            "BeforeCompile",
            "NonInstructionHandler",
            "BeforeLink",
            "Linker",
            "AfterLink",
            "Output"
        ]
    );
    let required: Vec<Phase> = Phase::ALL.into_iter().filter(Phase::is_required).collect();
    assert_eq!(
        required,
        vec![Phase::NonInstructionHandler, Phase::Linker, Phase::Output]
    );
    assert_eq!(Phase::AfterLink.to_string(), "AfterLink");
}
