//! The compilation pipeline.
//!
//! A [`CompilationUnit`] moves strictly forward through the states of
//! [`PipelineState`]: it is created, compiled one line at a time,
//! linked and finally asked for its output.  The language's handlers
//! do all the work; this module decides which handler runs when.
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use base::prelude::BitBuffer;
use tracing::{event, span, Level};

use super::context::UnitContext;
use super::handler::{Phase, SharedHandler};
use super::language::Language;
use super::types::{AssemblerFailure, HandlerResult, ImplementationError};

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Created,
    Compiling,
    Linked,
    OutputGenerated,
}

impl Display for PipelineState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineState::Created => "created",
            PipelineState::Compiling => "compiling",
            PipelineState::Linked => "linked",
            PipelineState::OutputGenerated => "output-generated",
        })
    }
}

/// What [`CompilationUnit::compile_one_line`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    /// A handler ran; there may be more input.
    Continue,
    /// All the input has been compiled.
    Finished,
}

#[derive(Debug)]
pub struct CompilationUnit {
    language: Arc<Language>,
    unit: UnitContext,
    state: PipelineState,
    source_exhausted: bool,
    output: Option<String>,
}

impl CompilationUnit {
    pub(crate) fn new(language: Arc<Language>, source: &str) -> CompilationUnit {
        let unit = UnitContext::new(source, language.shared_config());
        CompilationUnit {
            language,
            unit,
            state: PipelineState::Created,
            source_exhausted: false,
            output: None,
        }
    }

    fn require(&self, operation: &'static str, allowed: &[PipelineState]) -> HandlerResult {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(AssemblerFailure::OutOfOrder {
                operation,
                state: self.state,
            })
        }
    }

    fn run(&mut self, handler: &SharedHandler, role: &str) -> HandlerResult {
        let span = span!(Level::DEBUG, "handler", symbol = handler.symbol(), role);
        let _enter = span.enter();
        let result = handler
            .execute(&mut self.unit)
            .map_err(|e| e.attributed_to(handler.symbol()));
        if let Err(e) = &result {
            event!(Level::DEBUG, "handler failed: {e}");
        }
        result
    }

    fn run_phase(&mut self, phase: Phase) -> HandlerResult {
        let handler = Arc::clone(self.language.table().phase(phase));
        self.run(&handler, phase.key())
    }

    /// Compile the next line of the source: run the handler for its
    /// leading mnemonic, or the non-instruction handler if the leading
    /// token is not a mnemonic.  The first call also runs the
    /// `BeforeCompile` hook.
    ///
    /// # Errors
    ///
    /// Whatever the handler reports, a compile error if the input
    /// continues with a malformed string literal, or an
    /// implementation error if the non-instruction handler consumes
    /// nothing (as it would then be called for ever).
    pub fn compile_one_line(&mut self) -> Result<LineStatus, AssemblerFailure> {
        self.require(
            "compile",
            &[PipelineState::Created, PipelineState::Compiling],
        )?;
        if self.state == PipelineState::Created {
            self.run_phase(Phase::BeforeCompile)?;
            self.state = PipelineState::Compiling;
        }
        if self.source_exhausted {
            return Ok(LineStatus::Finished);
        }

        let Some(token) = self.unit.peek_current() else {
            if self.unit.tokens().is_exhausted() {
                event!(Level::DEBUG, "reached the end of the source");
                self.source_exhausted = true;
                return Ok(LineStatus::Finished);
            }
            return Err(self
                .unit
                .compile_error("malformed or unterminated string literal"));
        };

        match self.language.table().lookup(&token).map(Arc::clone) {
            Some(handler) => {
                self.unit.skip_current();
                self.run(&handler, token.content())?;
            }
            None => {
                let start = self.unit.tokens().position();
                let handler = Arc::clone(self.language.table().phase(Phase::NonInstructionHandler));
                self.run(&handler, Phase::NonInstructionHandler.key())?;
                if self.unit.tokens().position() == start {
                    return Err(ImplementationError::in_handler(
                        handler.symbol(),
                        format!(
                            "handler consumed no input when given '{token}' (line {})",
                            self.unit.tokens().line()
                        ),
                    )
                    .into());
                }
            }
        }
        Ok(LineStatus::Continue)
    }

    /// Compile the whole of the (remaining) source.
    ///
    /// # Errors
    ///
    /// The first failure of [`CompilationUnit::compile_one_line`].
    pub fn compile_all(&mut self) -> HandlerResult {
        let span = span!(Level::INFO, "compile");
        let _enter = span.enter();
        while self.compile_one_line()? == LineStatus::Continue {}
        event!(
            Level::DEBUG,
            "compilation complete, {} bits emitted",
            self.unit.bit_len()
        );
        Ok(())
    }

    /// Run the `BeforeLink`, `Linker` and `AfterLink` hooks.  All the
    /// source must have been compiled first.
    ///
    /// # Errors
    ///
    /// Whatever the hooks report, or [`AssemblerFailure::OutOfOrder`]
    /// if compilation is incomplete or linking already happened.
    pub fn link(&mut self) -> HandlerResult {
        if !self.source_exhausted {
            return Err(AssemblerFailure::OutOfOrder {
                operation: "link",
                state: self.state,
            });
        }
        self.require("link", &[PipelineState::Compiling])?;
        let span = span!(Level::INFO, "link");
        let _enter = span.enter();
        for phase in [Phase::BeforeLink, Phase::Linker, Phase::AfterLink] {
            self.run_phase(phase)?;
        }
        self.state = PipelineState::Linked;
        Ok(())
    }

    /// Run the `Output` hook and return the text it produced.  Later
    /// calls return the same text without running the hook again.
    /// Text emitted by earlier hooks is not part of the output.
    ///
    /// # Errors
    ///
    /// Whatever the hook reports, an implementation error if it
    /// produced no text, or [`AssemblerFailure::OutOfOrder`] if the
    /// unit has not been linked.
    pub fn generate_output(&mut self) -> Result<&str, AssemblerFailure> {
        if self.state == PipelineState::OutputGenerated {
            return Ok(self.output.as_deref().unwrap_or_default());
        }
        self.require("generate output for", &[PipelineState::Linked])?;
        let span = span!(Level::INFO, "generate output");
        let _enter = span.enter();
        if let Some(early) = self.unit.take_output() {
            event!(
                Level::WARN,
                "discarding {} bytes of output emitted before the output phase",
                early.len()
            );
        }
        self.run_phase(Phase::Output)?;
        let Some(text) = self.unit.take_output() else {
            return Err(ImplementationError::in_handler(
                self.language.table().phase(Phase::Output).symbol(),
                "the output hook produced no output",
            )
            .into());
        };
        event!(Level::DEBUG, "generated {} bytes of output", text.len());
        self.state = PipelineState::OutputGenerated;
        Ok(self.output.insert(text).as_str())
    }

    /// Compile, link and generate output in one go.
    ///
    /// # Errors
    ///
    /// The first failure of any phase.
    pub fn assemble(&mut self) -> Result<&str, AssemblerFailure> {
        self.compile_all()?;
        self.link()?;
        self.generate_output()
    }

    /// The output, once it has been generated.
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    #[must_use]
    pub fn bits(&self) -> &BitBuffer {
        self.unit.bits()
    }

    #[must_use]
    pub fn context(&self) -> &UnitContext {
        &self.unit
    }

    pub fn context_mut(&mut self) -> &mut UnitContext {
        &mut self.unit
    }

    #[must_use]
    pub fn language(&self) -> &Arc<Language> {
        &self.language
    }
}
