use crate::*;

/// Malformed descriptor construction.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
  #[error("nested runtime-sized array: element type `{0}` has no fixed size")]
  NestedRuntimeArray(String),
  #[error("invalid element count: {0}")]
  InvalidElementCount(i64),
  #[error("runtime-sized field `{0}` must be the last member of its struct")]
  NonFinalRuntimeField(String),
  #[error("duplicate struct field `{0}`")]
  DuplicateField(String),
  #[error("a struct must declare at least one field")]
  EmptyStruct,
  #[error("`{0}` is not a valid WGSL identifier")]
  InvalidIdentifier(String),
  #[error("matrix components must be floating point, got `{0}`")]
  InvalidMatrixComponent(ScalarKind),
  #[error("atomic components must be i32 or u32, got `{0}`")]
  InvalidAtomicComponent(ScalarKind),
  #[error("@align({align}) on field `{field}` must be a power of two no smaller than {natural}")]
  InvalidAlign {
    field: String,
    align: u32,
    natural: usize,
  },
  #[error("@size({size}) on field `{field}` is smaller than the field's natural size {natural}")]
  InvalidSize {
    field: String,
    size: u32,
    natural: usize,
  },
  #[error("builtin `{builtin}` on field `{field}` requires `{expected}`, found `{found}`")]
  BuiltinTypeMismatch {
    field: String,
    builtin: &'static str,
    expected: String,
    found: String,
  },
  #[error("struct `{0}` is too large to lay out")]
  StructTooLarge(String),
  #[error("invalid entry point io: {0}")]
  InvalidEntryIo(String),
}

impl From<std::convert::Infallible> for SchemaError {
  fn from(v: std::convert::Infallible) -> Self {
    match v {}
  }
}

/// Layout requested on a descriptor that could not have been produced by the
/// registry.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
  #[error("`{path}`: runtime-sized member must be the last field of its struct")]
  NonFinalRuntimeField { path: String },
  #[error("`{path}`: array element has no fixed size")]
  UnsizedElement { path: String },
  #[error("`{path}`: struct has no fields")]
  EmptyStruct { path: String },
  #[error("`{path}`: invalid layout attribute, {reason}")]
  InvalidAttribute { path: String, reason: String },
  #[error("`{path}`: not usable in the uniform address space, {reason}")]
  UniformIncompatible { path: String, reason: String },
  #[error("`{path}`: byte size does not fit in the address range")]
  SizeOverflow { path: String },
}

/// Host value does not fit the descriptor it is encoded against.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
  #[error("`{path}`: expected {expected}, found {found}")]
  ShapeMismatch {
    path: ValuePath,
    expected: String,
    found: String,
  },
  #[error("`{path}`: missing struct field `{field}`")]
  MissingField { path: ValuePath, field: String },
  #[error("`{path}`: unknown struct field `{field}`")]
  UnknownField { path: ValuePath, field: String },
  #[error("`{path}`: expected {expected} array elements, found {found}")]
  ArrayLength {
    path: ValuePath,
    expected: usize,
    found: usize,
  },
  #[error("`{path}`: {reason}")]
  InvalidPath { path: ValuePath, reason: String },
  #[error("`{path}`: write of {needed} bytes at offset {offset} exceeds buffer of {available} bytes")]
  OutOfBounds {
    path: ValuePath,
    offset: usize,
    needed: usize,
    available: usize,
  },
  #[error(transparent)]
  Layout(#[from] LayoutError),
}

/// Buffer does not hold what the descriptor describes.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
  #[error("`{path}`: read of {needed} bytes at offset {offset} exceeds buffer of {available} bytes")]
  OutOfBounds {
    path: ValuePath,
    offset: usize,
    needed: usize,
    available: usize,
  },
  #[error(transparent)]
  Layout(#[from] LayoutError),
}
