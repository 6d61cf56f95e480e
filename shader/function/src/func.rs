use std::sync::atomic::{AtomicUsize, Ordering};

use crate::*;

/// Identity of a [`ShaderFn`], stable for the lifetime of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FnId(usize);

static FN_ID: AtomicUsize = AtomicUsize::new(0);

impl FnId {
  fn next() -> Self {
    Self(FN_ID.fetch_add(1, Ordering::Relaxed))
  }
}

pub type FnBody = dyn Fn(&mut FnBuilder<'_>, &[Node]) -> ShaderResult<Option<Node>> + Send + Sync;

#[derive(Clone)]
pub enum FnImplementation {
  /// Recorded by running the closure against a [`FnBuilder`].
  Traced(Arc<FnBody>),
  /// Hand written WGSL block. Each external name occurring in the body is
  /// replaced by the resolved identifier of its function.
  Wgsl {
    body: String,
    externals: Vec<(String, ShaderFn)>,
  },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryStage {
  Vertex,
  Fragment,
  Compute { workgroup_size: [u32; 3] },
}

impl EntryStage {
  pub fn wgsl_attribute(&self) -> String {
    match self {
      EntryStage::Vertex => String::from("@vertex"),
      EntryStage::Fragment => String::from("@fragment"),
      EntryStage::Compute {
        workgroup_size: [x, y, z],
      } => format!("@compute @workgroup_size({x}, {y}, {z})"),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FnParameter {
  pub name: String,
  pub ty: TypeDescriptor,
}

struct ShaderFnInner {
  id: FnId,
  name: String,
  params: Vec<FnParameter>,
  return_ty: Option<TypeDescriptor>,
  stage: Option<EntryStage>,
  implementation: FnImplementation,
}

/// An immutable, cheaply cloned shader function descriptor.
///
/// Equality is identity: two descriptors built from identical closures are
/// still two functions.
#[derive(Clone)]
pub struct ShaderFn {
  inner: Arc<ShaderFnInner>,
}

impl PartialEq for ShaderFn {
  fn eq(&self, other: &Self) -> bool {
    self.inner.id == other.inner.id
  }
}
impl Eq for ShaderFn {}

impl std::hash::Hash for ShaderFn {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    self.inner.id.hash(state);
  }
}

impl fmt::Debug for ShaderFn {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ShaderFn")
      .field("id", &self.inner.id)
      .field("name", &self.inner.name)
      .field("stage", &self.inner.stage)
      .finish()
  }
}

fn collect_params(params: &[(&str, TypeDescriptor)]) -> Result<Vec<FnParameter>, SchemaError> {
  let mut names = FastHashSet::default();
  params
    .iter()
    .map(|(name, ty)| {
      let name = name.to_string();
      if !is_valid_identifier(&name) {
        return Err(SchemaError::InvalidIdentifier(name));
      }
      if !names.insert(name.clone()) {
        return Err(SchemaError::DuplicateField(name));
      }
      if !ty.is_sized() {
        return Err(SchemaError::NestedRuntimeArray(ty.to_string()));
      }
      Ok(FnParameter {
        name,
        ty: ty.clone(),
      })
    })
    .collect()
}

fn check_return(return_ty: &Option<TypeDescriptor>) -> Result<(), SchemaError> {
  match return_ty {
    Some(ty) if !ty.is_constructible() => Err(SchemaError::NestedRuntimeArray(ty.to_string())),
    _ => Ok(()),
  }
}

#[derive(Clone, Copy, PartialEq)]
enum IoRole {
  VertexIn,
  VertexOut,
  FragmentIn,
  FragmentOut,
  ComputeIn,
}

/// Fills in missing `@location`s in declaration order and checks the
/// attributes against the stage.
fn prepare_io(ty: &TypeDescriptor, role: IoRole) -> Result<TypeDescriptor, SchemaError> {
  let Some(s) = ty.as_struct() else {
    return match (role, ty) {
      (IoRole::FragmentOut, TypeDescriptor::Scalar(kind) | TypeDescriptor::Vector { kind, .. })
        if kind.is_numeric() =>
      {
        Ok(ty.clone())
      }
      _ => Err(SchemaError::InvalidEntryIo(format!(
        "`{ty}` is not a struct of entry point inputs/outputs"
      ))),
    };
  };

  let mut used: FastHashSet<u32> = s
    .fields
    .iter()
    .filter_map(|f| match f.attributes.io {
      Some(IoAttribute::Location(l)) => Some(l),
      _ => None,
    })
    .collect();
  let mut next = 0;
  let mut has_position = false;

  let mut fields = Vec::with_capacity(s.fields.len());
  for field in &s.fields {
    let mut field = field.clone();
    match field.attributes.io {
      Some(IoAttribute::Builtin(builtin)) => {
        has_position |= builtin == Builtin::Position;
        if !builtin_allowed(builtin, role) {
          return Err(SchemaError::InvalidEntryIo(format!(
            "@builtin({}) is not available on field `{}` here",
            builtin.wgsl_name(),
            field.name
          )));
        }
      }
      location => {
        if role == IoRole::ComputeIn {
          return Err(SchemaError::InvalidEntryIo(format!(
            "compute inputs must be builtins, `{}` is not",
            field.name
          )));
        }
        let numeric = matches!(
          &field.ty,
          TypeDescriptor::Scalar(kind) | TypeDescriptor::Vector { kind, .. } if kind.is_numeric()
        );
        if !numeric {
          return Err(SchemaError::InvalidEntryIo(format!(
            "user defined io `{}` must be a numeric scalar or vector, got `{}`",
            field.name, field.ty
          )));
        }
        if location.is_none() {
          while used.contains(&next) {
            next += 1;
          }
          used.insert(next);
          field.attributes.io = Some(IoAttribute::Location(next));
        }
      }
    }
    fields.push(field);
  }

  if role == IoRole::VertexOut && !has_position {
    return Err(SchemaError::InvalidEntryIo(String::from(
      "vertex output must contain @builtin(position)",
    )));
  }

  match &s.label {
    Some(label) => named_struct_of(label.clone(), fields),
    None => struct_of(fields),
  }
}

fn builtin_allowed(builtin: Builtin, role: IoRole) -> bool {
  use Builtin::*;
  match role {
    IoRole::VertexIn => matches!(builtin, VertexIndex | InstanceIndex),
    IoRole::VertexOut => matches!(builtin, Position),
    IoRole::FragmentIn => matches!(builtin, Position | FrontFacing | SampleIndex | SampleMask),
    IoRole::FragmentOut => matches!(builtin, FragDepth | SampleMask),
    IoRole::ComputeIn => matches!(
      builtin,
      LocalInvocationId | LocalInvocationIndex | GlobalInvocationId | WorkgroupId | NumWorkgroups
    ),
  }
}

impl ShaderFn {
  fn create(
    name: String,
    params: Vec<FnParameter>,
    return_ty: Option<TypeDescriptor>,
    stage: Option<EntryStage>,
    implementation: FnImplementation,
  ) -> Result<Self, SchemaError> {
    check_return(&return_ty)?;
    Ok(Self {
      inner: Arc::new(ShaderFnInner {
        id: FnId::next(),
        name,
        params,
        return_ty,
        stage,
        implementation,
      }),
    })
  }

  /// A traced function. `body` receives the parameter nodes in declaration
  /// order and may return the value to return.
  pub fn new(
    name: impl Into<String>,
    params: &[(&str, TypeDescriptor)],
    return_ty: Option<TypeDescriptor>,
    body: impl Fn(&mut FnBuilder<'_>, &[Node]) -> ShaderResult<Option<Node>> + Send + Sync + 'static,
  ) -> Result<Self, SchemaError> {
    Self::create(
      name.into(),
      collect_params(params)?,
      return_ty,
      None,
      FnImplementation::Traced(Arc::new(body)),
    )
  }

  /// Hand written WGSL. `body` is the function block including its braces.
  pub fn from_wgsl(
    name: impl Into<String>,
    params: &[(&str, TypeDescriptor)],
    return_ty: Option<TypeDescriptor>,
    body: impl Into<String>,
    externals: &[(&str, ShaderFn)],
  ) -> Result<Self, SchemaError> {
    Self::create(
      name.into(),
      collect_params(params)?,
      return_ty,
      None,
      FnImplementation::Wgsl {
        body: body.into(),
        externals: externals
          .iter()
          .map(|(n, f)| (n.to_string(), f.clone()))
          .collect(),
      },
    )
  }

  fn entry(
    name: impl Into<String>,
    input: Option<TypeDescriptor>,
    output: Option<TypeDescriptor>,
    stage: EntryStage,
    body: impl Fn(&mut FnBuilder<'_>, &[Node]) -> ShaderResult<Option<Node>> + Send + Sync + 'static,
  ) -> Result<Self, SchemaError> {
    let (input_role, output_role) = match stage {
      EntryStage::Vertex => (IoRole::VertexIn, IoRole::VertexOut),
      EntryStage::Fragment => (IoRole::FragmentIn, IoRole::FragmentOut),
      EntryStage::Compute { .. } => (IoRole::ComputeIn, IoRole::ComputeIn),
    };
    let params = input
      .map(|ty| prepare_io(&ty, input_role))
      .transpose()?
      .map(|ty| FnParameter {
        name: String::from("input"),
        ty,
      })
      .into_iter()
      .collect();
    let output = output.map(|ty| prepare_io(&ty, output_role)).transpose()?;
    Self::create(
      name.into(),
      params,
      output,
      Some(stage),
      FnImplementation::Traced(Arc::new(body)),
    )
  }

  /// Vertex entry point, `output` must contain `@builtin(position)`.
  pub fn vertex(
    name: impl Into<String>,
    input: Option<TypeDescriptor>,
    output: TypeDescriptor,
    body: impl Fn(&mut FnBuilder<'_>, &[Node]) -> ShaderResult<Option<Node>> + Send + Sync + 'static,
  ) -> Result<Self, SchemaError> {
    Self::entry(name, input, Some(output), EntryStage::Vertex, body)
  }

  /// Fragment entry point, `output` is an io struct or a single numeric value
  /// written to `@location(0)`.
  pub fn fragment(
    name: impl Into<String>,
    input: Option<TypeDescriptor>,
    output: TypeDescriptor,
    body: impl Fn(&mut FnBuilder<'_>, &[Node]) -> ShaderResult<Option<Node>> + Send + Sync + 'static,
  ) -> Result<Self, SchemaError> {
    Self::entry(name, input, Some(output), EntryStage::Fragment, body)
  }

  pub fn compute(
    name: impl Into<String>,
    input: Option<TypeDescriptor>,
    workgroup_size: [u32; 3],
    body: impl Fn(&mut FnBuilder<'_>, &[Node]) -> ShaderResult<Option<Node>> + Send + Sync + 'static,
  ) -> Result<Self, SchemaError> {
    if workgroup_size.contains(&0) {
      return Err(SchemaError::InvalidEntryIo(String::from(
        "workgroup size must be at least 1 in every dimension",
      )));
    }
    Self::entry(name, input, None, EntryStage::Compute { workgroup_size }, body)
  }

  pub fn id(&self) -> FnId {
    self.inner.id
  }

  pub fn name(&self) -> &str {
    &self.inner.name
  }

  pub fn params(&self) -> &[FnParameter] {
    &self.inner.params
  }

  pub fn return_ty(&self) -> Option<&TypeDescriptor> {
    self.inner.return_ty.as_ref()
  }

  pub fn stage(&self) -> Option<EntryStage> {
    self.inner.stage
  }

  pub fn implementation(&self) -> &FnImplementation {
    &self.inner.implementation
  }

  /// Runs the function on the host: traces it in a fresh context and
  /// interprets the recorded statements.
  pub fn call_host(&self, args: &[HostValue]) -> ShaderResult<Option<HostValue>> {
    let mut ctx = TraceContext::new();
    let traced = ctx.trace(self)?;
    HostInterpreter::new(&ctx).call(&traced, args)
  }
}
