//! The `asm` import module: the functions through which handler
//! modules reach the compilation unit.
//!
//! Text crosses the boundary as a (pointer, length) pair in the
//! calling module's exported `memory`.  Functions which return text
//! take a (pointer, capacity) pair, write at most `capacity` bytes and
//! return the full length of the text (so a handler can detect
//! truncation), or -1 if there is no text to return.
//!
//! A host function which fails records the failure in the store and
//! then traps; the handler's caller reports the recorded failure
//! rather than the trap.
use std::fmt::Display;

use wasmi::{Caller, Extern, Linker, Memory};

use super::super::config::scalar_text;
use super::super::token::{to_lower_case, to_upper_case};
use super::super::types::{AssemblerFailure, HandlerResult, ImplementationError};
use super::{HostState, RaisedError};

pub(crate) const IMPORT_MODULE: &str = "asm";

type HostResult<T> = Result<T, wasmi::Error>;

/// Record `failure` (unless an earlier one is already recorded) and
/// produce the trap which aborts the handler.
fn fail(caller: &mut Caller<'_, HostState>, failure: AssemblerFailure) -> wasmi::Error {
    let trap = wasmi::Error::new(failure.to_string());
    let state = caller.data_mut();
    if state.fault.is_none() {
        state.fault = Some(failure);
    }
    trap
}

fn defect(caller: &mut Caller<'_, HostState>, message: String) -> wasmi::Error {
    fail(caller, ImplementationError::new(message).into())
}

fn check(caller: &mut Caller<'_, HostState>, result: HandlerResult) -> HostResult<()> {
    result.map_err(|failure| fail(caller, failure))
}

fn to_index(caller: &mut Caller<'_, HostState>, value: i64, what: &str) -> HostResult<usize> {
    usize::try_from(value).map_err(|_| defect(caller, format!("{what} {value} is negative")))
}

fn to_size(caller: &mut Caller<'_, HostState>, value: i32, what: &str) -> HostResult<usize> {
    to_index(caller, i64::from(value), what)
}

fn to_width(caller: &mut Caller<'_, HostState>, width: i32) -> HostResult<u32> {
    u32::try_from(width).map_err(|_| defect(caller, format!("field width {width} is negative")))
}

fn memory(caller: &mut Caller<'_, HostState>) -> HostResult<Memory> {
    match caller.get_export("memory").and_then(Extern::into_memory) {
        Some(memory) => Ok(memory),
        None => Err(defect(
            caller,
            "the handler's module does not export a memory named \"memory\"".to_string(),
        )),
    }
}

fn memory_failure(caller: &mut Caller<'_, HostState>, e: impl Display) -> wasmi::Error {
    defect(caller, format!("bad memory access: {e}"))
}

fn read_bytes(caller: &mut Caller<'_, HostState>, ptr: i32, len: i32) -> HostResult<Vec<u8>> {
    let len = to_size(caller, len, "length")?;
    let mut buffer = vec![0_u8; len];
    if len > 0 {
        let offset = to_size(caller, ptr, "pointer")?;
        let memory = memory(caller)?;
        if let Err(e) = memory.read(&*caller, offset, &mut buffer) {
            return Err(memory_failure(caller, e));
        }
    }
    Ok(buffer)
}

fn read_text(caller: &mut Caller<'_, HostState>, ptr: i32, len: i32) -> HostResult<String> {
    let bytes = read_bytes(caller, ptr, len)?;
    String::from_utf8(bytes).map_err(|e| defect(caller, format!("text is not UTF-8: {e}")))
}

fn write_bytes(caller: &mut Caller<'_, HostState>, ptr: i32, bytes: &[u8]) -> HostResult<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    let offset = to_size(caller, ptr, "pointer")?;
    let memory = memory(caller)?;
    match memory.write(&mut *caller, offset, bytes) {
        Ok(()) => Ok(()),
        Err(e) => Err(memory_failure(caller, e)),
    }
}

fn return_text(
    caller: &mut Caller<'_, HostState>,
    ptr: i32,
    capacity: i32,
    text: Option<&str>,
) -> HostResult<i32> {
    let Some(text) = text else {
        return Ok(-1);
    };
    let bytes = text.as_bytes();
    let full_length = i32::try_from(bytes.len())
        .map_err(|_| defect(caller, format!("text of {} bytes is too long", bytes.len())))?;
    let capacity = to_size(caller, capacity, "capacity")?;
    write_bytes(caller, ptr, &bytes[..bytes.len().min(capacity)])?;
    Ok(full_length)
}

fn convert_case(
    caller: &mut Caller<'_, HostState>,
    ptr: i32,
    len: i32,
    convert: fn(&str) -> String,
) -> HostResult<()> {
    let text = read_text(caller, ptr, len)?;
    // ASCII case conversion never changes the length.
    write_bytes(caller, ptr, convert(&text).as_bytes())
}

fn flag(bit: i32) -> bool {
    bit != 0
}

fn link_failure(name: &str, e: impl Display) -> ImplementationError {
    ImplementationError::new(format!("failed to define host function {IMPORT_MODULE}.{name}: {e}"))
}

pub(crate) fn define(linker: &mut Linker<HostState>) -> Result<(), ImplementationError> {
    linker
        .func_wrap(
            IMPORT_MODULE,
            "token_peek",
            |mut caller: Caller<'_, HostState>, ptr: i32, capacity: i32| -> HostResult<i32> {
                let token = caller.data().unit.peek_current();
                return_text(&mut caller, ptr, capacity, token.as_ref().map(|t| t.content()))
            },
        )
        .map_err(|e| link_failure("token_peek", e))?;
    linker
        .func_wrap(
            IMPORT_MODULE,
            "token_next",
            |mut caller: Caller<'_, HostState>, ptr: i32, capacity: i32| -> HostResult<i32> {
                let token = caller.data_mut().unit.parse_current();
                return_text(&mut caller, ptr, capacity, token.as_ref().map(|t| t.content()))
            },
        )
        .map_err(|e| link_failure("token_next", e))?;
    linker
        .func_wrap(
            IMPORT_MODULE,
            "token_skip",
            |mut caller: Caller<'_, HostState>| {
                caller.data_mut().unit.skip_current();
            },
        )
        .map_err(|e| link_failure("token_skip", e))?;
    linker
        .func_wrap(
            IMPORT_MODULE,
            "token_is",
            |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> HostResult<i32> {
                let expected = read_text(&mut caller, ptr, len)?;
                let token = caller.data().unit.peek_current();
                Ok(i32::from(token.is_some_and(|t| t.is(&expected))))
            },
        )
        .map_err(|e| link_failure("token_is", e))?;
    linker
        .func_wrap(
            IMPORT_MODULE,
            "assert_newline",
            |mut caller: Caller<'_, HostState>| -> HostResult<()> {
                let result = caller.data().unit.assert_is_new_line();
                check(&mut caller, result)
            },
        )
        .map_err(|e| link_failure("assert_newline", e))?;
    linker
        .func_wrap(
            IMPORT_MODULE,
            "location",
            |mut caller: Caller<'_, HostState>, ptr: i32, capacity: i32| -> HostResult<i32> {
                let location = caller.data().unit.approx_current_location();
                return_text(&mut caller, ptr, capacity, Some(&location))
            },
        )
        .map_err(|e| link_failure("location", e))?;
    linker
        .func_wrap(
            IMPORT_MODULE,
            "bits_len",
            |caller: Caller<'_, HostState>| -> i64 {
                i64::try_from(caller.data().unit.bit_len()).unwrap_or(i64::MAX)
            },
        )
        .map_err(|e| link_failure("bits_len", e))?;
    linker
        .func_wrap(
            IMPORT_MODULE,
            "bit_get",
            |caller: Caller<'_, HostState>, index: i64| -> i32 {
                let bit = usize::try_from(index)
                    .ok()
                    .and_then(|index| caller.data().unit.bits().get(index));
                match bit {
                    Some(bit) => i32::from(bit),
                    None => -1,
                }
            },
        )
        .map_err(|e| link_failure("bit_get", e))?;
    linker
        .func_wrap(
            IMPORT_MODULE,
            "bit_set",
            |mut caller: Caller<'_, HostState>, index: i64, bit: i32| -> HostResult<()> {
                let index = to_index(&mut caller, index, "bit index")?;
                let result = caller.data_mut().unit.set_bit(index, flag(bit));
                check(&mut caller, result)
            },
        )
        .map_err(|e| link_failure("bit_set", e))?;
    linker
        .func_wrap(
            IMPORT_MODULE,
            "write_bit",
            |mut caller: Caller<'_, HostState>, bit: i32| {
                caller.data_mut().unit.write_bit(flag(bit));
            },
        )
        .map_err(|e| link_failure("write_bit", e))?;
    linker
        .func_wrap(
            IMPORT_MODULE,
            "write_unsigned",
            |mut caller: Caller<'_, HostState>, value: i64, width: i32| -> HostResult<()> {
                let width = to_width(&mut caller, width)?;
                // The handler passes the 64 bits of the value; they are
                // read as unsigned.
                let value = u64::from_ne_bytes(value.to_ne_bytes());
                let result = caller.data_mut().unit.write_unsigned(value, width);
                check(&mut caller, result)
            },
        )
        .map_err(|e| link_failure("write_unsigned", e))?;
    linker
        .func_wrap(
            IMPORT_MODULE,
            "write_signed",
            |mut caller: Caller<'_, HostState>, value: i64, width: i32| -> HostResult<()> {
                let width = to_width(&mut caller, width)?;
                let result = caller.data_mut().unit.write_signed(value, width);
                check(&mut caller, result)
            },
        )
        .map_err(|e| link_failure("write_signed", e))?;
    linker
        .func_wrap(
            IMPORT_MODULE,
            "replace_unsigned",
            |mut caller: Caller<'_, HostState>,
             value: i64,
             width: i32,
             start: i64|
             -> HostResult<()> {
                let width = to_width(&mut caller, width)?;
                let start = to_index(&mut caller, start, "field start")?;
                let value = u64::from_ne_bytes(value.to_ne_bytes());
                let result = caller.data_mut().unit.replace_unsigned(value, width, start);
                check(&mut caller, result)
            },
        )
        .map_err(|e| link_failure("replace_unsigned", e))?;
    linker
        .func_wrap(IMPORT_MODULE, "align", |mut caller: Caller<'_, HostState>| {
            caller.data_mut().unit.align_start_address();
        })
        .map_err(|e| link_failure("align", e))?;
    linker
        .func_wrap(
            IMPORT_MODULE,
            "to_lower",
            |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> HostResult<()> {
                convert_case(&mut caller, ptr, len, to_lower_case)
            },
        )
        .map_err(|e| link_failure("to_lower", e))?;
    linker
        .func_wrap(
            IMPORT_MODULE,
            "to_upper",
            |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> HostResult<()> {
                convert_case(&mut caller, ptr, len, to_upper_case)
            },
        )
        .map_err(|e| link_failure("to_upper", e))?;
    linker
        .func_wrap(
            IMPORT_MODULE,
            "config_get",
            |mut caller: Caller<'_, HostState>,
             key_ptr: i32,
             key_len: i32,
             ptr: i32,
             capacity: i32|
             -> HostResult<i32> {
                let key = read_text(&mut caller, key_ptr, key_len)?;
                let value = caller.data().unit.config_value(&key).and_then(scalar_text);
                return_text(&mut caller, ptr, capacity, value.as_deref())
            },
        )
        .map_err(|e| link_failure("config_get", e))?;
    linker
        .func_wrap(
            IMPORT_MODULE,
            "output_write",
            |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> HostResult<()> {
                let text = read_text(&mut caller, ptr, len)?;
                caller.data_mut().unit.emit_output(&text);
                Ok(())
            },
        )
        .map_err(|e| link_failure("output_write", e))?;
    linker
        .func_wrap(
            IMPORT_MODULE,
            "error_new",
            |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> HostResult<i32> {
                let message = read_text(&mut caller, ptr, len)?;
                let state = caller.data_mut();
                let location = state.unit.approx_current_location();
                state.exceptions.push(RaisedError { location, message });
                Ok(i32::try_from(state.exceptions.len()).unwrap_or(i32::MAX))
            },
        )
        .map_err(|e| link_failure("error_new", e))?;
    Ok(())
}
