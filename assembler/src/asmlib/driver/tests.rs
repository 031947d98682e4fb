use std::sync::Arc;

use super::super::config::LanguageConfig;
use super::super::context::UnitContext;
use super::super::language::Language;
use super::super::native::NativeRegistry;
use super::super::types::{AssemblerFailure, HandlerResult};
use super::{CompilationUnit, LineStatus, PipelineState};

const TOY_DEFINITION: &str = "\
InstructionToHandlerNameMap:
  nop: EncodeNop
  LDI: EncodeLdi
BeforeCompile: Reset
BeforeLink: Layout
AfterLink: Check
StartAddressAlignment: 8
";

/// Everything the toy language's handlers do is recorded in the
/// auxiliary slot, so that tests can see what ran and in what order.
fn log(unit: &mut UnitContext, entry: &str) -> HandlerResult {
    unit.aux_or_insert_with(Vec::<String>::new)?
        .push(entry.to_string());
    Ok(())
}

fn history(cu: &CompilationUnit) -> Vec<String> {
    cu.context()
        .aux::<Vec<String>>()
        .cloned()
        .unwrap_or_default()
}

fn encode_nop(unit: &mut UnitContext) -> HandlerResult {
    log(unit, "nop")?;
    unit.write_unsigned(0, 4)
}

/// `ldi N`: a 4-bit opcode followed by an 8-bit operand.
fn encode_ldi(unit: &mut UnitContext) -> HandlerResult {
    log(unit, "ldi")?;
    let operand = unit.expect_token("an operand")?;
    let value: u64 = operand
        .content()
        .parse()
        .map_err(|_| unit.compile_error(format!("{operand} is not a number")))?;
    unit.write_unsigned(1, 4)?;
    unit.write_unsigned(value, 8)
}

/// Accepts only label definitions (`name:`).
fn process_label(unit: &mut UnitContext) -> HandlerResult {
    let name = unit.expect_token("a label")?;
    if !unit.peek_current().is_some_and(|t| t.is(":")) {
        return Err(unit.compile_error(format!("unknown instruction {name}")));
    }
    unit.skip_current();
    log(unit, &format!("label {name}"))
}

fn emit_bits(unit: &mut UnitContext) -> HandlerResult {
    log(unit, "Output")?;
    let text = unit.bits().to_string();
    unit.emit_output(&text);
    Ok(())
}

fn toy_registry() -> NativeRegistry {
    NativeRegistry::new()
        .with("EncodeNop", encode_nop)
        .with("EncodeLdi", encode_ldi)
        .with("ProcessNonInstruction", process_label)
        .with("Reset", |unit| log(unit, "BeforeCompile"))
        .with("Layout", |unit| log(unit, "BeforeLink"))
        .with("Linker", |unit| {
            log(unit, "Linker")?;
            unit.align_start_address();
            Ok(())
        })
        .with("Check", |unit| log(unit, "AfterLink"))
        .with("GenerateOutput", emit_bits)
}

fn language_from(definition: &str, registry: &NativeRegistry) -> Arc<Language> {
    let config = LanguageConfig::parse(definition).expect("test definition should be valid");
    Language::from_registry(config, registry).expect("all handlers are registered")
}

fn toy() -> Arc<Language> {
    language_from(TOY_DEFINITION, &toy_registry())
}

#[test]
fn test_end_to_end() {
    let language = toy();
    let mut cu = language.create_compilation_unit("start: nop\nldi 5 ; load\n");
    let output = cu.assemble().expect("program is valid").to_string();
    assert_eq!(output, "0000100010100000");
    assert_eq!(cu.state(), PipelineState::OutputGenerated);
    assert_eq!(
        history(&cu),
        vec![
            "BeforeCompile",
            "label start",
            "nop",
            "ldi",
            "BeforeLink",
            "Linker",
            "AfterLink",
            "Output"
        ]
    );
}

#[test]
fn test_bit_length_is_sum_of_instruction_widths() {
    let language = toy();
    let mut cu = language.create_compilation_unit("nop\nldi 200");
    cu.compile_all().expect("program is valid");
    assert_eq!(cu.bits().len(), 4 + 12);
}

#[test]
fn test_mnemonics_ignore_case() {
    let language = toy();
    let mut cu = language.create_compilation_unit("NOP\nLdi 1\nnOp");
    cu.compile_all().expect("program is valid");
    assert_eq!(history(&cu), vec!["BeforeCompile", "nop", "ldi", "nop"]);
    assert_eq!(language.mnemonics().collect::<Vec<_>>(), vec!["ldi", "nop"]);
}

#[test]
fn test_stepping_one_line_at_a_time() {
    let language = toy();
    let mut cu = language.create_compilation_unit("nop\nnop");
    assert_eq!(cu.state(), PipelineState::Created);
    assert_eq!(cu.compile_one_line(), Ok(LineStatus::Continue));
    assert_eq!(cu.state(), PipelineState::Compiling);
    assert_eq!(cu.bits().len(), 4);
    assert_eq!(cu.compile_one_line(), Ok(LineStatus::Continue));
    assert_eq!(cu.compile_one_line(), Ok(LineStatus::Finished));
    assert_eq!(cu.compile_one_line(), Ok(LineStatus::Finished));
    // BeforeCompile ran only once.
    assert_eq!(history(&cu), vec!["BeforeCompile", "nop", "nop"]);
}

#[test]
fn test_empty_source() {
    let language = toy();
    let mut cu = language.create_compilation_unit("; nothing here\n\n");
    let output = cu.assemble().expect("an empty program is valid").to_string();
    assert_eq!(output, "");
}

#[test]
fn test_output_is_generated_once() {
    let language = toy();
    let mut cu = language.create_compilation_unit("nop");
    cu.compile_all().expect("program is valid");
    cu.link().expect("link should succeed");
    // The Linker hook aligned the 4 bits of the nop to 8.
    assert_eq!(cu.generate_output(), Ok("00000000"));
    assert_eq!(cu.generate_output(), Ok("00000000"));
    assert_eq!(cu.output(), Some("00000000"));
    let outputs = history(&cu).iter().filter(|e| *e == "Output").count();
    assert_eq!(outputs, 1);
}

#[test]
fn test_phases_out_of_order() {
    let language = toy();
    let mut cu = language.create_compilation_unit("nop");
    assert_eq!(
        cu.link(),
        Err(AssemblerFailure::OutOfOrder {
            operation: "link",
            state: PipelineState::Created
        })
    );
    assert!(matches!(
        cu.generate_output(),
        Err(AssemblerFailure::OutOfOrder { .. })
    ));
    cu.compile_all().expect("program is valid");
    cu.link().expect("link should succeed");
    let e = cu.link().expect_err("already linked");
    assert_eq!(
        e.to_string(),
        "cannot link a compilation unit which is in state linked"
    );
    assert!(matches!(
        cu.compile_one_line(),
        Err(AssemblerFailure::OutOfOrder { .. })
    ));
}

#[test]
fn test_link_requires_complete_compilation() {
    let language = toy();
    let mut cu = language.create_compilation_unit("nop\nnop");
    assert_eq!(cu.compile_one_line(), Ok(LineStatus::Continue));
    assert!(matches!(
        cu.link(),
        Err(AssemblerFailure::OutOfOrder {
            operation: "link",
            state: PipelineState::Compiling
        })
    ));
}

#[test]
fn test_compile_errors_are_located() {
    let language = toy();
    let mut cu = language.create_compilation_unit("nop\nldi 300\nnop");
    match cu.compile_all() {
        Err(AssemblerFailure::Compile(e)) => {
            assert_eq!(e.location(), "At line 3, near token 'nop'");
            assert!(e.message().contains("300"), "unexpected message {e}");
        }
        other => panic!("expected a compile error, got {other:?}"),
    }
}

#[test]
fn test_unknown_instruction_goes_to_non_instruction_handler() {
    let language = toy();
    let mut cu = language.create_compilation_unit("bogus r1");
    match cu.compile_all() {
        Err(AssemblerFailure::Compile(e)) => {
            assert_eq!(e.message(), "unknown instruction bogus");
        }
        other => panic!("expected a compile error, got {other:?}"),
    }
}

#[test]
fn test_malformed_string_literal() {
    let language = toy();
    let mut cu = language.create_compilation_unit("nop\n\"unterminated");
    match cu.compile_all() {
        Err(AssemblerFailure::Compile(e)) => {
            assert_eq!(e.location(), "At line 2, near a malformed string literal");
        }
        other => panic!("expected a compile error, got {other:?}"),
    }
}

#[test]
fn test_non_instruction_handler_must_consume_input() {
    let registry = toy_registry().with("ProcessNonInstruction", |_| Ok(()));
    let language = language_from(TOY_DEFINITION, &registry);
    let mut cu = language.create_compilation_unit("label:");
    match cu.compile_all() {
        Err(AssemblerFailure::Implementation(e)) => {
            assert_eq!(e.handler(), Some("ProcessNonInstruction"));
        }
        other => panic!("expected an implementation error, got {other:?}"),
    }
}

#[test]
fn test_output_hook_must_produce_text() {
    let registry = toy_registry().with("GenerateOutput", |_| Ok(()));
    let language = language_from(TOY_DEFINITION, &registry);
    let mut cu = language.create_compilation_unit("nop");
    match cu.assemble() {
        Err(AssemblerFailure::Implementation(e)) => {
            assert_eq!(e.handler(), Some("GenerateOutput"));
        }
        other => panic!("expected an implementation error, got {other:?}"),
    }
}

#[test]
fn test_only_the_output_hook_produces_output() {
    let registry = toy_registry()
        .with("Linker", |unit| {
            unit.emit_output("relocations");
            Ok(())
        })
        .with("GenerateOutput", |_| Ok(()));
    let language = language_from(TOY_DEFINITION, &registry);
    let mut cu = language.create_compilation_unit("nop");
    match cu.assemble() {
        Err(AssemblerFailure::Implementation(e)) => {
            assert_eq!(e.handler(), Some("GenerateOutput"));
        }
        other => panic!("expected an implementation error, got {other:?}"),
    }

    let registry = toy_registry().with("Check", |unit| {
        unit.emit_output("listing");
        Ok(())
    });
    let language = language_from(TOY_DEFINITION, &registry);
    let mut cu = language.create_compilation_unit("nop");
    assert_eq!(cu.assemble().expect("program is valid"), "00000000");
}

#[test]
fn test_implementation_errors_name_their_handler() {
    let registry = toy_registry().with("EncodeNop", |unit| {
        Err(unit.implementation_error("opcode table is empty"))
    });
    let language = language_from(TOY_DEFINITION, &registry);
    let mut cu = language.create_compilation_unit("nop");
    match cu.compile_all() {
        Err(AssemblerFailure::Implementation(e)) => {
            assert_eq!(e.handler(), Some("EncodeNop"));
            assert_eq!(e.message(), "opcode table is empty");
        }
        other => panic!("expected an implementation error, got {other:?}"),
    }
}

#[test]
fn test_units_share_a_language_but_not_state() {
    let language = toy();
    let mut first = language.create_compilation_unit("nop");
    let mut second = language.create_compilation_unit("ldi 3");
    first.compile_all().expect("program is valid");
    second.compile_all().expect("program is valid");
    assert_eq!(first.bits().len(), 4);
    assert_eq!(second.bits().len(), 12);
    assert!(Arc::ptr_eq(first.language(), second.language()));
}

#[test]
fn test_missing_handler_is_a_load_error() {
    let registry = NativeRegistry::new().with("EncodeNop", encode_nop);
    let config = LanguageConfig::parse(TOY_DEFINITION).expect("test definition should be valid");
    let e = Language::from_registry(config, &registry).expect_err("handlers are missing");
    assert!(e.message().contains("is not defined"), "unexpected message {e}");
}
