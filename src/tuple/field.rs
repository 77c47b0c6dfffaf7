use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use zerocopy::byteorder::{BigEndian, I32, U32};
use zerocopy::{AsBytes, FromBytes};

/// Maximum number of bytes a string field stores on a page.
pub const STRING_LEN: usize = 128;

const LEN_PREFIX: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Int,
    Str,
}

impl Type {
    /// Fixed on-page width of a field of this type.
    pub fn byte_len(self) -> usize {
        match self {
            Type::Int => 4,
            Type::Str => LEN_PREFIX + STRING_LEN,
        }
    }

    /// Decodes one field image. Returns `None` when the bytes do not hold a
    /// valid value of this type.
    pub fn parse(self, bytes: &[u8]) -> Option<Field> {
        match self {
            Type::Int => {
                let value = I32::<BigEndian>::read_from(bytes.get(..4)?)?;
                Some(Field::Int(value.get()))
            }
            Type::Str => {
                let len = U32::<BigEndian>::read_from(bytes.get(..LEN_PREFIX)?)?.get() as usize;
                if len > STRING_LEN {
                    return None;
                }
                let body = bytes.get(LEN_PREFIX..LEN_PREFIX + len)?;
                String::from_utf8(body.to_vec()).ok().map(Field::Str)
            }
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "INT_TYPE"),
            Type::Str => write!(f, "STRING_TYPE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
    Like,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Equals => "=",
            CmpOp::NotEquals => "<>",
            CmpOp::GreaterThan => ">",
            CmpOp::GreaterThanOrEq => ">=",
            CmpOp::LessThan => "<",
            CmpOp::LessThanOrEq => "<=",
            CmpOp::Like => "LIKE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    pub fn field_type(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::Str(_) => Type::Str,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Field::Int(v) => Some(*v),
            Field::Str(_) => None,
        }
    }

    /// Appends the fixed-width image of this field. Strings longer than
    /// `STRING_LEN` bytes are cut at the last char boundary that fits.
    pub fn serialize(&self, out: &mut Vec<u8>) {
        match self {
            Field::Int(v) => out.extend_from_slice(I32::<BigEndian>::new(*v).as_bytes()),
            Field::Str(s) => {
                let mut end = s.len().min(STRING_LEN);
                while !s.is_char_boundary(end) {
                    end -= 1;
                }
                let body = &s.as_bytes()[..end];
                out.extend_from_slice(U32::<BigEndian>::new(end as u32).as_bytes());
                out.extend_from_slice(body);
                out.resize(out.len() + STRING_LEN - end, 0);
            }
        }
    }

    /// Evaluates `self op other`. Fields of different types never compare.
    pub fn compare(&self, op: CmpOp, other: &Field) -> bool {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => match op {
                CmpOp::Like => a == b,
                _ => op.holds(a.cmp(b)),
            },
            (Field::Str(a), Field::Str(b)) => match op {
                CmpOp::Like => a.contains(b.as_str()),
                _ => op.holds(a.cmp(b)),
            },
            _ => false,
        }
    }
}

impl CmpOp {
    fn holds(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Equals | CmpOp::Like => ord == Ordering::Equal,
            CmpOp::NotEquals => ord != Ordering::Equal,
            CmpOp::GreaterThan => ord == Ordering::Greater,
            CmpOp::GreaterThanOrEq => ord != Ordering::Less,
            CmpOp::LessThan => ord == Ordering::Less,
            CmpOp::LessThanOrEq => ord != Ordering::Greater,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Str(s) => f.write_str(s),
        }
    }
}
