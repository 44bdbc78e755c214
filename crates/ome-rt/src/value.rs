//! Tagged Values - One-Word Encoding for OME Values
//!
//! Every OME value is a single 64-bit word. The high bits carry a tag, the
//! low bits carry the payload:
//!
//! ```text
//! 64-bit Value Layout:
//! ┌───────┬──────────────┬────────────────────────────────────────┐
//! │ Error │  Tag (16)    │            Payload (47)                │
//! │  63   │   62-47      │              46-0                      │
//! └───────┴──────────────┴────────────────────────────────────────┘
//!
//! Tag 0 (Constant):      payload is a constant ordinal
//! Tag 1 (Small-Integer): payload is a 47-bit two's-complement integer
//! Tag >= 2 (pointers):   payload is the address of an object body
//! ```
//!
//! The error flag is the top bit of the tag field, which is also the sign
//! bit of the word: error propagation checks compile to a sign test. An
//! error-flagged pointer still satisfies `is_pointer`, so the collector
//! scans through propagating errors; error-flagged constants untag to a
//! small ordinal and are rejected by the heap's address-range check.
//!
//! User-space addresses on the supported platforms fit in 47 bits, so
//! `untag_pointer(pointer(tag, addr)) == addr` holds for every mapping the
//! runtime can produce.

/// Number of tag bits, including the error flag.
pub const NUM_TAG_BITS: u32 = 17;

/// Number of payload bits.
pub const NUM_DATA_BITS: u32 = 64 - NUM_TAG_BITS;

/// Mask covering the payload bits.
pub const DATA_MASK: u64 = (1 << NUM_DATA_BITS) - 1;

const ERROR_BIT: u64 = 1 << 63;

/// Tag for constant values (booleans, sentinels, error ordinals).
pub const TAG_CONSTANT: u64 = 0;
/// Tag for small integers.
pub const TAG_SMALL_INTEGER: u64 = 1;
/// Tag for string objects.
pub const TAG_STRING: u64 = 2;
/// Tag for array objects.
pub const TAG_ARRAY: u64 = 3;

/// Values tagged at or above this are pointer-class.
pub const POINTER_TAG: u64 = 2;

/// Smallest representable small integer.
pub const MIN_SMALL_INTEGER: i64 = -(1 << (NUM_DATA_BITS - 1));
/// Largest representable small integer.
pub const MAX_SMALL_INTEGER: i64 = (1 << (NUM_DATA_BITS - 1)) - 1;

/// Ordinals of the constant values under [`TAG_CONSTANT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum Constant {
    False = 0,
    True = 1,
    Less = 2,
    Equal = 3,
    Greater = 4,
    Empty = 5,
    BuiltIn = 6,
    StackOverflow = 7,
    NotUnderstood = 8,
    TypeError = 9,
    IndexError = 10,
    Overflow = 11,
    DivideByZero = 12,
    SizeError = 13,
}

impl Constant {
    /// Surface name of the constant, as the `string` method would render it.
    pub fn name(self) -> &'static str {
        match self {
            Constant::False => "False",
            Constant::True => "True",
            Constant::Less => "Less",
            Constant::Equal => "Equal",
            Constant::Greater => "Greater",
            Constant::Empty => "Empty",
            Constant::BuiltIn => "BuiltIn",
            Constant::StackOverflow => "Stack-Overflow",
            Constant::NotUnderstood => "Not-Understood",
            Constant::TypeError => "Type-Error",
            Constant::IndexError => "Index-Error",
            Constant::Overflow => "Overflow",
            Constant::DivideByZero => "Divide-By-Zero",
            Constant::SizeError => "Size-Error",
        }
    }

    fn from_ordinal(ordinal: u64) -> Option<Constant> {
        Some(match ordinal {
            0 => Constant::False,
            1 => Constant::True,
            2 => Constant::Less,
            3 => Constant::Equal,
            4 => Constant::Greater,
            5 => Constant::Empty,
            6 => Constant::BuiltIn,
            7 => Constant::StackOverflow,
            8 => Constant::NotUnderstood,
            9 => Constant::TypeError,
            10 => Constant::IndexError,
            11 => Constant::Overflow,
            12 => Constant::DivideByZero,
            13 => Constant::SizeError,
            _ => return None,
        })
    }
}

/// A tagged OME value.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Value(u64);

impl Value {
    pub const FALSE: Value = Value::constant(Constant::False);
    pub const TRUE: Value = Value::constant(Constant::True);
    pub const EMPTY: Value = Value::constant(Constant::Empty);

    /// Build a constant value.
    #[inline]
    pub const fn constant(constant: Constant) -> Value {
        Value((TAG_CONSTANT << NUM_DATA_BITS) | constant as u64)
    }

    /// Build an error value: the constant with the error flag set.
    #[inline]
    pub const fn error(constant: Constant) -> Value {
        Value(Value::constant(constant).0 | ERROR_BIT)
    }

    #[inline]
    pub const fn boolean(value: bool) -> Value {
        if value {
            Value::TRUE
        } else {
            Value::FALSE
        }
    }

    /// Tag a small integer. `n` must be within
    /// [`MIN_SMALL_INTEGER`]..=[`MAX_SMALL_INTEGER`].
    #[inline]
    pub fn integer(n: i64) -> Value {
        debug_assert!((MIN_SMALL_INTEGER..=MAX_SMALL_INTEGER).contains(&n));
        Value((TAG_SMALL_INTEGER << NUM_DATA_BITS) | (n as u64 & DATA_MASK))
    }

    /// Tag a pointer to an object body. The address must fit in the payload
    /// bits, which holds for every user-space mapping on the supported
    /// platforms.
    #[inline]
    pub fn pointer(tag: u64, address: usize) -> Value {
        debug_assert!(address as u64 <= DATA_MASK);
        debug_assert!(tag >= POINTER_TAG);
        Value((tag << NUM_DATA_BITS) | address as u64)
    }

    /// The tag, error flag included.
    #[inline]
    pub fn tag(self) -> u64 {
        self.0 >> NUM_DATA_BITS
    }

    /// The tag with the error flag stripped.
    #[inline]
    pub fn tag_noerror(self) -> u64 {
        (self.0 << 1) >> (NUM_DATA_BITS + 1)
    }

    #[inline]
    pub fn is_error(self) -> bool {
        self.0 & ERROR_BIT != 0
    }

    #[inline]
    pub fn strip_error(self) -> Value {
        Value(self.0 & !ERROR_BIT)
    }

    /// Pointer-class test. Error-flagged values pass when their underlying
    /// tag does; the heap's address checks filter non-pointers out.
    #[inline]
    pub fn is_pointer(self) -> bool {
        self.tag() >= POINTER_TAG
    }

    /// Payload as an address.
    #[inline]
    pub fn untag_pointer(self) -> usize {
        (self.0 & DATA_MASK) as usize
    }

    /// Payload as a sign-extended integer.
    #[inline]
    pub fn untag_signed(self) -> i64 {
        ((self.0 << NUM_TAG_BITS) as i64) >> NUM_TAG_BITS
    }

    /// Raw word, for tests and diagnostics.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    /// The constant this value denotes, if it is one.
    pub fn as_constant(self) -> Option<Constant> {
        if self.tag_noerror() == TAG_CONSTANT {
            Constant::from_ordinal(self.0 & DATA_MASK)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let error = if self.is_error() { "error " } else { "" };
        match self.tag_noerror() {
            TAG_CONSTANT => match self.as_constant() {
                Some(c) => write!(f, "Value({}{})", error, c.name()),
                None => write!(f, "Value({}constant {})", error, self.0 & DATA_MASK),
            },
            TAG_SMALL_INTEGER => write!(f, "Value({}{})", error, self.untag_signed()),
            tag => write!(f, "Value({}tag {} @ {:#x})", error, tag, self.untag_pointer()),
        }
    }
}

// ============================================================================
// Small-integer arithmetic
// ============================================================================

// Arithmetic on small integers yields explicit error values instead of
// wrapping: a wrong operand tag is a Type-Error, a result outside the
// representable range is an Overflow, and a zero divisor is a
// Divide-By-Zero.

#[inline]
fn check_operands(lhs: Value, rhs: Value) -> Option<Value> {
    if lhs.tag() != TAG_SMALL_INTEGER || rhs.tag() != TAG_SMALL_INTEGER {
        return Some(Value::error(Constant::TypeError));
    }
    None
}

#[inline]
fn in_range(n: i64) -> bool {
    (MIN_SMALL_INTEGER..=MAX_SMALL_INTEGER).contains(&n)
}

pub fn integer_add(lhs: Value, rhs: Value) -> Value {
    if let Some(err) = check_operands(lhs, rhs) {
        return err;
    }
    let result = lhs.untag_signed() + rhs.untag_signed();
    if !in_range(result) {
        return Value::error(Constant::Overflow);
    }
    Value::integer(result)
}

pub fn integer_sub(lhs: Value, rhs: Value) -> Value {
    if let Some(err) = check_operands(lhs, rhs) {
        return err;
    }
    let result = lhs.untag_signed() - rhs.untag_signed();
    if !in_range(result) {
        return Value::error(Constant::Overflow);
    }
    Value::integer(result)
}

pub fn integer_mul(lhs: Value, rhs: Value) -> Value {
    if let Some(err) = check_operands(lhs, rhs) {
        return err;
    }
    // 47-bit operands can overflow i64, so multiply in 128 bits.
    let result = lhs.untag_signed() as i128 * rhs.untag_signed() as i128;
    if result < MIN_SMALL_INTEGER as i128 || result > MAX_SMALL_INTEGER as i128 {
        return Value::error(Constant::Overflow);
    }
    Value::integer(result as i64)
}

pub fn integer_div(lhs: Value, rhs: Value) -> Value {
    if let Some(err) = check_operands(lhs, rhs) {
        return err;
    }
    let divisor = rhs.untag_signed();
    if divisor == 0 {
        return Value::error(Constant::DivideByZero);
    }
    let result = lhs.untag_signed() / divisor;
    if !in_range(result) {
        // MIN_SMALL_INTEGER / -1 is the only overflowing quotient.
        return Value::error(Constant::Overflow);
    }
    Value::integer(result)
}

pub fn integer_mod(lhs: Value, rhs: Value) -> Value {
    if let Some(err) = check_operands(lhs, rhs) {
        return err;
    }
    let divisor = rhs.untag_signed();
    if divisor == 0 {
        return Value::error(Constant::DivideByZero);
    }
    Value::integer(lhs.untag_signed() % divisor)
}

pub fn integer_compare(lhs: Value, rhs: Value) -> Value {
    if let Some(err) = check_operands(lhs, rhs) {
        return err;
    }
    let (l, r) = (lhs.untag_signed(), rhs.untag_signed());
    Value::constant(match l.cmp(&r) {
        std::cmp::Ordering::Less => Constant::Less,
        std::cmp::Ordering::Equal => Constant::Equal,
        std::cmp::Ordering::Greater => Constant::Greater,
    })
}
