//! Built-In ABI Consumers
//!
//! The handful of runtime entry points that sit on top of the allocator
//! and the tagged-value ABI: printing a value and concatenating strings.
//! The dispatch layer is out of scope, so `print` formats the shapes the
//! runtime itself produces (strings, small integers, constants) and
//! reports a Type-Error for anything it cannot render.

use std::io::Write;

use crate::context::Context;
use crate::object;
use crate::value::{Constant, Value, TAG_CONSTANT, TAG_SMALL_INTEGER, TAG_STRING};

/// Write a printable value to `out`. Returns Empty, or a Type-Error when
/// the value has no printable shape.
pub fn print(out: &mut dyn Write, value: Value) -> Value {
    match value.tag() {
        TAG_STRING => {
            let bytes = unsafe { object::string_bytes(value.untag_pointer()) };
            let _ = out.write_all(bytes);
        }
        TAG_SMALL_INTEGER => {
            let _ = write!(out, "{}", value.untag_signed());
        }
        TAG_CONSTANT => match value.as_constant() {
            Some(constant) => {
                let _ = write!(out, "{}", constant.name());
            }
            None => {
                let _ = write!(out, "Constant-{}", value.untag_pointer());
            }
        },
        _ => return Value::error(Constant::TypeError),
    }
    Value::EMPTY
}

impl Context {
    /// Concatenate the `count` strings held in the operand slots starting
    /// at `frame`. Operands are re-read from the stack after allocating
    /// the result, because the allocation may compact the heap and move
    /// them.
    pub fn concat(&mut self, frame: usize, count: usize) -> Value {
        let mut size: usize = 0;
        for index in 0..count {
            let value = self.stack_slot(frame + index);
            if value.tag() != TAG_STRING {
                return Value::error(Constant::TypeError);
            }
            size += unsafe { object::string_size(value.untag_pointer()) } as usize;
            if size > u32::MAX as usize {
                return Value::error(Constant::SizeError);
            }
        }

        let body = self.allocate_string(size);
        let mut offset = 0;
        for index in 0..count {
            let value = self.stack_slot(frame + index);
            let bytes = unsafe { object::string_bytes(value.untag_pointer()) };
            unsafe {
                object::write_string_bytes(body, offset, bytes);
            }
            offset += bytes.len();
        }
        Value::pointer(TAG_STRING, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_integer() {
        let mut out = Vec::new();
        assert_eq!(print(&mut out, Value::integer(-42)), Value::EMPTY);
        assert_eq!(out, b"-42");
    }

    #[test]
    fn test_print_constants() {
        let mut out = Vec::new();
        print(&mut out, Value::TRUE);
        print(&mut out, Value::constant(Constant::TypeError));
        assert_eq!(out, b"TrueType-Error");
    }

    #[test]
    fn test_print_unprintable_is_type_error() {
        let mut out = Vec::new();
        let array = Value::pointer(crate::value::TAG_ARRAY, 0x1000);
        assert_eq!(print(&mut out, array), Value::error(Constant::TypeError));
        assert!(out.is_empty());
    }
}
