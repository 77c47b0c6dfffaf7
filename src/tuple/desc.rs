//! Tuple schemas.
//!
//! A [`TupleDesc`] is an ordered list of field types, optionally paired with
//! field names. Equality only looks at the type sequence: two schemas with
//! the same types but different names are equal.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::field::Type;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("a tuple desc needs at least one field")]
    Empty,
    #[error("{types} field types but {names} field names")]
    LengthMismatch { types: usize, names: usize },
    #[error("tuple desc has no field names")]
    MissingFieldNames,
    #[error("no field named {0:?}")]
    NoSuchField(String),
    #[error("field index {0} out of range")]
    IndexOutOfRange(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TdItem<'a> {
    pub field_type: Type,
    pub field_name: Option<&'a str>,
}

impl fmt::Display for TdItem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({})",
            self.field_name.unwrap_or("null"),
            self.field_type
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TupleDesc {
    types: Vec<Type>,
    // `None` for descs built from types alone; individual names may still be unset.
    names: Option<Vec<Option<String>>>,
}

impl TupleDesc {
    pub fn new(types: Vec<Type>, names: Vec<Option<String>>) -> Result<Self, Error> {
        if types.is_empty() {
            return Err(Error::Empty);
        }
        if types.len() != names.len() {
            return Err(Error::LengthMismatch {
                types: types.len(),
                names: names.len(),
            });
        }
        Ok(Self {
            types,
            names: Some(names),
        })
    }

    /// Builds a desc whose fields are all named.
    pub fn named<S: Into<String>>(
        fields: impl IntoIterator<Item = (Type, S)>,
    ) -> Result<Self, Error> {
        let (types, names) = fields
            .into_iter()
            .map(|(ty, name)| (ty, Some(name.into())))
            .unzip();
        Self::new(types, names)
    }

    /// Builds a desc without a name list. Such a desc cannot be merged or
    /// searched by name.
    pub fn anonymous(types: Vec<Type>) -> Result<Self, Error> {
        if types.is_empty() {
            return Err(Error::Empty);
        }
        Ok(Self { types, names: None })
    }

    pub fn num_fields(&self) -> usize {
        self.types.len()
    }

    pub fn has_names(&self) -> bool {
        self.names.is_some()
    }

    pub fn field_type(&self, i: usize) -> Result<Type, Error> {
        self.types.get(i).copied().ok_or(Error::IndexOutOfRange(i))
    }

    /// The (possibly unset) name of field `i`.
    pub fn field_name(&self, i: usize) -> Result<Option<&str>, Error> {
        if i >= self.num_fields() {
            return Err(Error::IndexOutOfRange(i));
        }
        Ok(self
            .names
            .as_ref()
            .and_then(|names| names[i].as_deref()))
    }

    /// Index of the first field called `name`.
    pub fn field_name_to_index(&self, name: &str) -> Result<usize, Error> {
        let names = self.names.as_ref().ok_or(Error::MissingFieldNames)?;
        names
            .iter()
            .position(|n| n.as_deref() == Some(name))
            .ok_or_else(|| Error::NoSuchField(name.to_owned()))
    }

    /// Byte size of one tuple image.
    pub fn size(&self) -> usize {
        self.types.iter().map(|ty| ty.byte_len()).sum()
    }

    pub fn types(&self) -> &[Type] {
        &self.types
    }

    pub fn items(&self) -> impl Iterator<Item = TdItem<'_>> + '_ {
        (0..self.num_fields()).map(move |i| TdItem {
            field_type: self.types[i],
            field_name: self
                .names
                .as_ref()
                .and_then(|names| names[i].as_deref()),
        })
    }

    /// Concatenates `left` and `right`, keeping both name lists.
    pub fn merge(left: &TupleDesc, right: &TupleDesc) -> Result<TupleDesc, Error> {
        let (left_names, right_names) = match (&left.names, &right.names) {
            (Some(l), Some(r)) => (l, r),
            _ => return Err(Error::MissingFieldNames),
        };
        let types = left.types.iter().chain(&right.types).copied().collect();
        let names = left_names.iter().chain(right_names).cloned().collect();
        Ok(TupleDesc {
            types,
            names: Some(names),
        })
    }

    /// Renames every field to `prefix.name`; unset parts render as `null`.
    pub fn with_prefix(&self, prefix: Option<&str>) -> TupleDesc {
        let prefix = prefix.unwrap_or("null");
        let names = self
            .items()
            .map(|item| Some(format!("{}.{}", prefix, item.field_name.unwrap_or("null"))))
            .collect();
        TupleDesc {
            types: self.types.clone(),
            names: Some(names),
        }
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.types == other.types
    }
}

impl Eq for TupleDesc {}

impl fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", item)?;
        }
        Ok(())
    }
}
