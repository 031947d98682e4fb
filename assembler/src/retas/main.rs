use std::error::Error;
use std::ffi::OsString;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction::{Set, SetTrue};
use clap::Parser;
use tracing::{event, span, Level};
use tracing_subscriber::prelude::*;

use assembler::{AssemblerFailure, ImplementationError, Language};

/// Retargetable assembler: the instruction set comes from a language
/// definition directory.
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
struct Cli {
    /// Directory holding Language_Specification.yaml and the handler
    /// modules.
    #[clap(action = Set)]
    language_root: PathBuf,

    /// File from which assembly source is read.
    #[clap(action = Set, required_unless_present = "list_mnemonics")]
    input: Option<OsString>,

    /// File to which assembler output is written.
    #[clap(action = Set, short = 'o', long, required_unless_present = "list_mnemonics")]
    output: Option<OsString>,

    /// Print the mnemonics the language defines, and exit.
    #[clap(action = SetTrue, long)]
    list_mnemonics: bool,
}

#[derive(Debug)]
enum Fail {
    /// The program being assembled is wrong.
    Compile(AssemblerFailure),
    /// The language definition is wrong.
    Implementation(AssemblerFailure),
    /// We were not able to read or write a file, or to set up.
    InitialisationFailure(String),
}

impl Fail {
    fn exit_code(&self) -> ExitCode {
        match self {
            Fail::Compile(_) => ExitCode::from(1),
            Fail::Implementation(_) => ExitCode::from(2),
            Fail::InitialisationFailure(_) => ExitCode::from(3),
        }
    }
}

impl From<AssemblerFailure> for Fail {
    fn from(e: AssemblerFailure) -> Fail {
        if e.is_compile_error() {
            Fail::Compile(e)
        } else {
            // Out-of-order phases are a defect in this program, not in
            // its input.
            Fail::Implementation(e)
        }
    }
}

impl From<ImplementationError> for Fail {
    fn from(e: ImplementationError) -> Fail {
        Fail::Implementation(AssemblerFailure::Implementation(e))
    }
}

impl Display for Fail {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Fail::Compile(e) | Fail::Implementation(e) => e.fmt(f),
            Fail::InitialisationFailure(msg) => f.write_str(msg.as_str()),
        }
    }
}

impl Error for Fail {}

fn init_tracing() -> Result<(), Fail> {
    // RUST_LOG selects which trace messages get printed; see
    // https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);
    let filter_layer = match tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
    {
        Err(e) => {
            return Err(Fail::InitialisationFailure(format!(
                "failed to initialise tracing filter (perhaps there is a problem with environment variables): {e}"
            )));
        }
        Ok(layer) => layer,
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
    Ok(())
}

fn assemble(language: &Arc<Language>, input: &OsString, output: &OsString) -> Result<(), Fail> {
    let source = fs::read_to_string(input).map_err(|e| {
        Fail::InitialisationFailure(format!(
            "failed to read {}: {e}",
            input.to_string_lossy()
        ))
    })?;
    let mut unit = language.create_compilation_unit(&source);
    let text = unit.assemble()?;
    fs::write(output, text).map_err(|e| {
        Fail::InitialisationFailure(format!(
            "failed to write {}: {e}",
            output.to_string_lossy()
        ))
    })
}

fn run_assembler(cli: Cli) -> Result<(), Fail> {
    init_tracing()?;

    let language = Language::load(&cli.language_root)?;
    if cli.list_mnemonics {
        for mnemonic in language.mnemonics() {
            println!("{mnemonic}");
        }
        return Ok(());
    }
    let (Some(input), Some(output)) = (&cli.input, &cli.output) else {
        return Err(Fail::InitialisationFailure(
            "an input and an output file are required".to_string(),
        ));
    };

    let span = span!(Level::ERROR, "assemble", input=?input, output=?output);
    let _enter = span.enter();
    let result = assemble(&language, input, output);
    if let Err(e) = &result {
        event!(Level::ERROR, "assembly failed: {:?}", e);
    } else {
        event!(Level::INFO, "assembly succeeded");
    }
    result
}

fn main() -> ExitCode {
    match run_assembler(Cli::parse()) {
        Err(e) => {
            eprintln!("{e}");
            e.exit_code()
        }
        Ok(()) => ExitCode::SUCCESS,
    }
}
