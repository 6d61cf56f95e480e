use crate::*;

/// Malformed function graph.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
  #[error("recursive shader function: {}", chain.join(" -> "))]
  RecursiveCall { chain: Vec<String> },
  #[error("`{function}` expects {expected} arguments, got {found}")]
  ArgumentCount {
    function: String,
    expected: usize,
    found: usize,
  },
  #[error("argument `{parameter}` of `{function}` expects `{expected}`, got `{found}`")]
  ArgumentType {
    function: String,
    parameter: String,
    expected: String,
    found: String,
  },
  #[error("`{function}` must return `{expected}`, got `{found}`")]
  ReturnType {
    function: String,
    expected: String,
    found: String,
  },
}

/// An operation recorded during tracing has no WGSL equivalent.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported construct in `{function}`: {construct}")]
pub struct UnsupportedConstructError {
  pub construct: String,
  pub function: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
  #[error("@group({group}) @binding({binding}) used by `{function}` is missing from the binding table")]
  UnknownBinding {
    group: u32,
    binding: u32,
    function: String,
  },
  #[error("@group({group}) @binding({binding}) disagrees with the binding table: {reason}")]
  BindingMismatch {
    group: u32,
    binding: u32,
    reason: String,
  },
  #[error("binding slot @group({group}) @binding({binding}) is declared twice")]
  DuplicateBinding { group: u32, binding: u32 },
  #[error("@group({group}) @binding({binding}) can not hold its type: {reason}")]
  InvalidBindingType {
    group: u32,
    binding: u32,
    reason: String,
  },
  #[error("uniform @group({group}) @binding({binding}): {source}")]
  UniformLayout {
    group: u32,
    binding: u32,
    #[source]
    source: LayoutError,
  },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ShaderError {
  #[error(transparent)]
  Schema(#[from] SchemaError),
  #[error(transparent)]
  Layout(#[from] LayoutError),
  #[error(transparent)]
  Encode(#[from] EncodeError),
  #[error(transparent)]
  Decode(#[from] DecodeError),
  #[error(transparent)]
  Graph(#[from] GraphError),
  #[error(transparent)]
  Unsupported(#[from] UnsupportedConstructError),
  #[error(transparent)]
  Resolve(#[from] ResolveError),
}

pub type ShaderResult<T> = Result<T, ShaderError>;
