//! A retargetable assembler engine.
//!
//! The engine knows nothing about any particular machine.  A language
//! definition (a YAML document plus handlers, which are either
//! WebAssembly modules or Rust closures) supplies the meaning of each
//! mnemonic and of each phase of the pipeline; the engine tokenises
//! the source, dispatches each line to its handler and drives the
//! compile, link and output phases in order.
//!
//! ```text
//! let language = Language::load(Path::new("langs/toy"))?;
//! let mut unit = language.create_compilation_unit(&source);
//! let output = unit.assemble()?;
//! ```
#![deny(unreachable_pub)]
#![deny(unsafe_code)]
#![warn(clippy::must_use_candidate)]
#![warn(clippy::manual_string_new)]
#![warn(clippy::semicolon_if_nothing_returned)]
#![warn(clippy::return_self_not_must_use)]
#![warn(clippy::wildcard_imports)]
#![warn(clippy::bool_to_int_with_if)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(clippy::match_same_arms)]
#![warn(clippy::missing_errors_doc)]
#![warn(clippy::items_after_statements)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::unreadable_literal)]
#![warn(clippy::pedantic)]
#![allow(clippy::doc_markdown)] // definition keys such as WordSize appear in docs

pub mod config;
pub mod context;
pub mod dispatch;
pub mod driver;
pub mod handler;
pub mod language;
pub mod lexer;
pub mod native;
pub mod script;
pub mod token;
pub mod types;

pub use config::{LanguageConfig, LanguageSpecification, DEFINITION_FILE_NAME};
pub use context::UnitContext;
pub use driver::{CompilationUnit, LineStatus, PipelineState};
pub use handler::{FnHandler, InstructionHandler, NoOp, Phase, SharedHandler, SymbolResolver};
pub use language::Language;
pub use native::NativeRegistry;
pub use token::Token;
pub use types::{AssemblerFailure, CompileError, HandlerResult, ImplementationError};
