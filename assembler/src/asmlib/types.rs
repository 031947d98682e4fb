use std::error::Error;
use std::fmt::{self, Display, Formatter};

use super::driver::PipelineState;

/// Line numbers count from 1.
pub type LineNumber = u32;

/// The input program is wrong.
///
/// The location is the approximate one reported by the token stream
/// at the time the error was raised (for example "At line 3, near
/// token 'r9'").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    location: String,
    message: String,
}

impl CompileError {
    pub fn new<L: Into<String>, M: Into<String>>(location: L, message: M) -> CompileError {
        CompileError {
            location: location.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}: {}", self.location, self.message)
    }
}

impl Error for CompileError {}

/// The language definition is wrong: a handler symbol is missing, a
/// handler returned something malformed or trapped, or the
/// definition document is unusable.  These are defects to be
/// reported against the language definition rather than against the
/// program being assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplementationError {
    handler: Option<String>,
    message: String,
}

impl ImplementationError {
    pub fn new<M: Into<String>>(message: M) -> ImplementationError {
        ImplementationError {
            handler: None,
            message: message.into(),
        }
    }

    pub fn in_handler<H: Into<String>, M: Into<String>>(
        handler: H,
        message: M,
    ) -> ImplementationError {
        ImplementationError {
            handler: Some(handler.into()),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn handler(&self) -> Option<&str> {
        self.handler.as_deref()
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ImplementationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str("defect in the language definition")?;
        if let Some(handler) = &self.handler {
            write!(f, " (in handler {handler})")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl Error for ImplementationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblerFailure {
    Compile(CompileError),
    Implementation(ImplementationError),
    /// The caller drove a compilation unit's phases out of order.
    OutOfOrder {
        operation: &'static str,
        state: PipelineState,
    },
}

impl AssemblerFailure {
    /// Record which handler an implementation error came from, unless
    /// that is already known.
    #[must_use]
    pub fn attributed_to(self, handler: &str) -> AssemblerFailure {
        match self {
            AssemblerFailure::Implementation(ImplementationError {
                handler: None,
                message,
            }) => AssemblerFailure::Implementation(ImplementationError::in_handler(
                handler, message,
            )),
            other => other,
        }
    }

    #[must_use]
    pub fn is_compile_error(&self) -> bool {
        matches!(self, AssemblerFailure::Compile(_))
    }

    #[must_use]
    pub fn is_implementation_error(&self) -> bool {
        matches!(self, AssemblerFailure::Implementation(_))
    }
}

impl From<CompileError> for AssemblerFailure {
    fn from(e: CompileError) -> AssemblerFailure {
        AssemblerFailure::Compile(e)
    }
}

impl From<ImplementationError> for AssemblerFailure {
    fn from(e: ImplementationError) -> AssemblerFailure {
        AssemblerFailure::Implementation(e)
    }
}

impl Display for AssemblerFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            AssemblerFailure::Compile(e) => e.fmt(f),
            AssemblerFailure::Implementation(e) => e.fmt(f),
            AssemblerFailure::OutOfOrder { operation, state } => {
                write!(
                    f,
                    "cannot {operation} a compilation unit which is in state {state}"
                )
            }
        }
    }
}

impl Error for AssemblerFailure {}

/// What every handler invocation resolves to.
pub type HandlerResult = Result<(), AssemblerFailure>;

#[test]
fn test_compile_error_display() {
    let e = CompileError::new("At line 2, near token 'r9'", "no such register");
    assert_eq!(e.to_string(), "At line 2, near token 'r9': no such register");
}

#[test]
fn test_attribution_only_fills_in_missing_handler() {
    let anonymous: AssemblerFailure = ImplementationError::new("bad").into();
    assert_eq!(
        anonymous.attributed_to("Encode").to_string(),
        "defect in the language definition (in handler Encode): bad"
    );
    let named: AssemblerFailure = ImplementationError::in_handler("First", "bad").into();
    assert_eq!(
        named.attributed_to("Second"),
        AssemblerFailure::Implementation(ImplementationError::in_handler("First", "bad"))
    );
    let compile: AssemblerFailure = CompileError::new("here", "bad").into();
    assert!(compile.attributed_to("Encode").is_compile_error());
}
