use std::fmt;

use crate::tuple::{
    field::{CmpOp, Field},
    Tuple,
};

/// Compares one field of a tuple against a constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub field: usize,
    pub op: CmpOp,
    pub operand: Field,
}

impl Predicate {
    pub fn new(field: usize, op: CmpOp, operand: Field) -> Self {
        Self { field, op, operand }
    }

    pub fn filter(&self, tuple: &Tuple) -> bool {
        tuple
            .field(self.field)
            .map_or(false, |f| f.compare(self.op, &self.operand))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f = {} op = {} operand = {}", self.field, self.op, self.operand)
    }
}

/// Compares a field of a left tuple with a field of a right tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinPredicate {
    pub field1: usize,
    pub op: CmpOp,
    pub field2: usize,
}

impl JoinPredicate {
    pub fn new(field1: usize, op: CmpOp, field2: usize) -> Self {
        Self { field1, op, field2 }
    }

    pub fn filter(&self, left: &Tuple, right: &Tuple) -> bool {
        match (left.field(self.field1), right.field(self.field2)) {
            (Some(l), Some(r)) => l.compare(self.op, r),
            _ => false,
        }
    }
}
