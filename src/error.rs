use crate::boxes::FourCC;
use std::fmt;

/// Chain of box types from the root down to the box being processed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BoxPath(pub Vec<FourCC>);

impl fmt::Display for BoxPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, typ) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", typ)?;
        }
        Ok(())
    }
}

/// What went wrong while reading a box.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("truncated box header: {needed} bytes needed, {available} available")]
    TruncatedHeader { needed: u64, available: u64 },
    #[error("invalid box size {size}: {reason}")]
    InvalidSize { size: u64, reason: &'static str },
    #[error("box declares {declared} bytes but only {available} remain in scope")]
    TruncatedBox { declared: u64, available: u64 },
    #[error("field `{field}` needs {needed} bytes, {available} left in box body")]
    MalformedField {
        field: &'static str,
        needed: usize,
        available: usize,
    },
    #[error("field `{field}` has unsupported value {value}")]
    InvalidFieldValue { field: &'static str, value: u64 },
    #[error("size-0 box leaves {len} unconsumed bytes but must be the last box in its scope")]
    UnboundedNotLast { len: u64 },
    #[error("{len} trailing bytes after the last child box")]
    TrailingData { len: u64 },
    #[error("box nesting exceeds {max_depth} levels")]
    DepthExceeded { max_depth: usize },
}

/// A fatal parse failure with the absolute input offset and the box path where it happened.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} at offset {offset} ({path})")]
pub struct ParseError {
    pub kind: ErrorKind,
    pub offset: u64,
    pub path: BoxPath,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializeErrorKind {
    #[error("value {value} of field `{field}` does not fit in {bits} bits")]
    FieldOverflow {
        field: &'static str,
        value: i128,
        bits: u8,
    },
    #[error("field `{field}` is flagged present but has no value")]
    MissingField { field: &'static str },
    #[error("field `{field}` has value {value} which the box layout cannot represent")]
    InvalidFieldValue { field: &'static str, value: u64 },
    #[error("{count} child boxes attached to a box whose layout has no children")]
    UnexpectedChildren { count: usize },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} ({path})")]
pub struct SerializeError {
    pub kind: SerializeErrorKind,
    pub path: BoxPath,
}

pub type Result<T, E = ParseError> = std::result::Result<T, E>;
