// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Machine values and their arithmetic.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Not, Rem, Sub};

/// A value on the operand stack or in memory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Integer (also characters and booleans)
    Int(i64),
    /// Floating point
    Float(f64),
}

impl Default for Value {
    fn default() -> Self {
        Value::Int(0)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Int(value as i64)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{:?}", n),
        }
    }
}

/// Either both integers, or both promoted to floats.
enum Pair {
    Ints(i64, i64),
    Floats(f64, f64),
}

fn pair(a: Value, b: Value) -> Pair {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Pair::Ints(a, b),
        (a, b) => Pair::Floats(a.to_f64(), b.to_f64()),
    }
}

impl Value {
    /// Numeric value as a float.
    pub fn to_f64(self) -> f64 {
        match self {
            Value::Int(n) => n as f64,
            Value::Float(n) => n,
        }
    }

    /// Whether this value counts as false.
    pub fn is_zero(self) -> bool {
        match self {
            Value::Int(n) => n == 0,
            Value::Float(n) => n == 0.0,
        }
    }

    /// `1` if equal, else `0`.
    pub fn equals(self, other: Value) -> Value {
        match pair(self, other) {
            Pair::Ints(a, b) => (a == b).into(),
            Pair::Floats(a, b) => (a == b).into(),
        }
    }

    /// `1` if `a > b`, else `0`.
    pub fn greater(self, other: Value) -> Value {
        match pair(self, other) {
            Pair::Ints(a, b) => (a > b).into(),
            Pair::Floats(a, b) => (a > b).into(),
        }
    }

    /// `1` if `a < b`, else `0`.
    pub fn less(self, other: Value) -> Value {
        match pair(self, other) {
            Pair::Ints(a, b) => (a < b).into(),
            Pair::Floats(a, b) => (a < b).into(),
        }
    }

    /// Logical and.
    pub fn and(self, other: Value) -> Value {
        (!self.is_zero() && !other.is_zero()).into()
    }

    /// Logical or.
    pub fn or(self, other: Value) -> Value {
        (!self.is_zero() || !other.is_zero()).into()
    }
}

macro_rules! wrapping_op {
    ($trait:ident, $method:ident, $int:ident, $op:tt, $doc:literal) => {
        impl $trait for Value {
            type Output = Value;

            #[doc = $doc]
            fn $method(self, other: Value) -> Value {
                match pair(self, other) {
                    Pair::Ints(a, b) => Value::Int(a.$int(b)),
                    Pair::Floats(a, b) => Value::Float(a $op b),
                }
            }
        }
    };
}

wrapping_op!(Add, add, wrapping_add, +, "`a + b`; integers wrap.");
wrapping_op!(Sub, sub, wrapping_sub, -, "`a - b`; integers wrap.");
wrapping_op!(Mul, mul, wrapping_mul, *, "`a * b`; integers wrap.");

impl Div for Value {
    type Output = Value;

    /// Floor division. A zero divisor yields zero.
    fn div(self, other: Value) -> Value {
        match pair(self, other) {
            Pair::Ints(_, 0) => Value::Int(0),
            Pair::Ints(a, b) => {
                let q = a.wrapping_div(b);
                if a.wrapping_rem(b) != 0 && (a < 0) != (b < 0) {
                    Value::Int(q - 1)
                } else {
                    Value::Int(q)
                }
            }
            Pair::Floats(_, b) if b == 0.0 => Value::Float(0.0),
            Pair::Floats(a, b) => Value::Float((a / b).floor()),
        }
    }
}

impl Rem for Value {
    type Output = Value;

    /// Floor remainder; the result takes the divisor's sign. A zero divisor
    /// yields zero.
    fn rem(self, other: Value) -> Value {
        match pair(self, other) {
            Pair::Ints(_, 0) => Value::Int(0),
            Pair::Ints(a, b) => {
                let r = a.wrapping_rem(b);
                if r != 0 && (r < 0) != (b < 0) {
                    Value::Int(r + b)
                } else {
                    Value::Int(r)
                }
            }
            Pair::Floats(_, b) if b == 0.0 => Value::Float(0.0),
            Pair::Floats(a, b) => {
                let r = a % b;
                if r != 0.0 && (r < 0.0) != (b < 0.0) {
                    Value::Float(r + b)
                } else {
                    Value::Float(r)
                }
            }
        }
    }
}

impl Neg for Value {
    type Output = Value;

    /// Arithmetic negation; integers wrap.
    fn neg(self) -> Value {
        match self {
            Value::Int(n) => Value::Int(n.wrapping_neg()),
            Value::Float(n) => Value::Float(-n),
        }
    }
}

impl Not for Value {
    type Output = Value;

    /// Logical not: `1` for zero, else `0`.
    fn not(self) -> Value {
        self.is_zero().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_division() {
        assert_eq!(Value::Int(7) / Value::Int(-4), Value::Int(-2));
        assert_eq!(Value::Int(-7) / Value::Int(4), Value::Int(-2));
        assert_eq!(Value::Int(-8) / Value::Int(4), Value::Int(-2));
        assert_eq!(Value::Int(7) / Value::Int(2), Value::Int(3));
        assert_eq!(Value::Float(7.0) / Value::Float(-2.0), Value::Float(-4.0));
    }

    #[test]
    fn test_floor_remainder() {
        assert_eq!(Value::Int(7) % Value::Int(-4), Value::Int(-1));
        assert_eq!(Value::Int(-7) % Value::Int(4), Value::Int(1));
        assert_eq!(Value::Int(8) % Value::Int(4), Value::Int(0));
        assert_eq!(Value::Float(-7.5) % Value::Float(2.0), Value::Float(0.5));
    }

    #[test]
    fn test_zero_divisor_yields_zero() {
        assert_eq!(Value::Int(7) / Value::Int(0), Value::Int(0));
        assert_eq!(Value::Int(7) % Value::Int(0), Value::Int(0));
        assert_eq!(Value::Float(1.0) / Value::Int(0), Value::Float(0.0));
    }

    #[test]
    fn test_wrapping_and_overflowing_division() {
        assert_eq!(Value::Int(i64::MAX) + Value::Int(1), Value::Int(i64::MIN));
        assert_eq!(Value::Int(i64::MIN) / Value::Int(-1), Value::Int(i64::MIN));
        assert_eq!(Value::Int(i64::MIN) % Value::Int(-1), Value::Int(0));
        assert_eq!(-Value::Int(i64::MIN), Value::Int(i64::MIN));
    }

    #[test]
    fn test_mixed_promotes_to_float() {
        assert_eq!(Value::Int(1) + Value::Float(0.5), Value::Float(1.5));
        assert_eq!(Value::Int(2).greater(Value::Float(1.5)), Value::Int(1));
        assert_eq!(Value::Int(2).equals(Value::Float(2.0)), Value::Int(1));
    }

    #[test]
    fn test_logic() {
        assert_eq!(!Value::Int(0), Value::Int(1));
        assert_eq!(!Value::Int(5), Value::Int(0));
        assert_eq!(Value::Int(3).and(Value::Int(0)), Value::Int(0));
        assert_eq!(Value::Int(3).or(Value::Float(0.0)), Value::Int(1));
        assert_eq!(Value::Int(3).less(Value::Int(4)), Value::Int(1));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
    }
}
