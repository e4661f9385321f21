//! Pluggable weight formulas.
//!
//! A ballot may declare how voting weight is computed from a token
//! amount. The formula is an ordered opcode list evaluated on a small
//! stack machine, so the same encoding can run natively and inside the
//! weight-checking circuit. The default formula is the identity:
//! `weight = amount`.
//!
//! Only [`WeightOp::PushAmount`] is exercised by the built-in flows; the
//! remaining opcodes are a closed extension point for affine or capped
//! formulas, not a general-purpose language.

use super::InputError;

/// One stack-machine opcode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WeightOp {
    /// Push the token amount.
    PushAmount,
    /// Push an immediate constant.
    PushConst(u64),
    /// Pop two, push their checked sum.
    Add,
    /// Pop two, push their checked product.
    Mul,
    /// Pop divisor then dividend, push the truncated quotient.
    Div,
}

impl WeightOp {
    /// Decode one `(opcode, immediate)` pair from the wire encoding.
    fn decode(code: u8, immediate: u64) -> Result<Self, InputError> {
        match code {
            0 => Ok(Self::PushAmount),
            1 => Ok(Self::PushConst(immediate)),
            2 => Ok(Self::Add),
            3 => Ok(Self::Mul),
            4 => Ok(Self::Div),
            other => Err(InputError::UnknownOpcode(other)),
        }
    }
}

/// An ordered opcode list computing `weight` from `amount`.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeightFormula(Vec<WeightOp>);

impl Default for WeightFormula {
    /// `weight = amount`.
    fn default() -> Self {
        Self(vec![WeightOp::PushAmount])
    }
}

impl WeightFormula {
    /// Build a formula from opcodes. Rejects an empty program.
    pub fn new(ops: Vec<WeightOp>) -> Result<Self, InputError> {
        if ops.is_empty() {
            return Err(InputError::EmptyFormula);
        }
        Ok(Self(ops))
    }

    /// Decode from `(opcode, immediate)` pairs as declared on a ballot.
    pub fn decode(encoded: &[(u8, u64)]) -> Result<Self, InputError> {
        let ops = encoded
            .iter()
            .map(|&(code, immediate)| WeightOp::decode(code, immediate))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(ops)
    }

    /// Evaluate the formula for one token amount.
    ///
    /// The program must leave exactly one value on the stack.
    pub fn evaluate(&self, amount: u64) -> Result<u64, InputError> {
        let mut stack: Vec<u64> = Vec::with_capacity(4);
        for op in &self.0 {
            match *op {
                WeightOp::PushAmount => stack.push(amount),
                WeightOp::PushConst(value) => stack.push(value),
                WeightOp::Add | WeightOp::Mul | WeightOp::Div => {
                    let rhs = stack.pop().ok_or(InputError::StackUnderflow)?;
                    let lhs = stack.pop().ok_or(InputError::StackUnderflow)?;
                    let result = match *op {
                        WeightOp::Add => lhs.checked_add(rhs),
                        WeightOp::Mul => lhs.checked_mul(rhs),
                        WeightOp::Div => lhs.checked_div(rhs),
                        WeightOp::PushAmount | WeightOp::PushConst(_) => None,
                    }
                    .ok_or(InputError::FormulaOverflow)?;
                    stack.push(result);
                }
            }
        }
        match (stack.pop(), stack.is_empty()) {
            (Some(weight), true) => Ok(weight),
            _ => Err(InputError::UnbalancedFormula),
        }
    }

    /// The opcode list, in evaluation order (for circuit input assembly).
    #[must_use]
    pub fn ops(&self) -> &[WeightOp] {
        &self.0
    }
}
