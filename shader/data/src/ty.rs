use crate::*;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ScalarKind {
  Bool,
  F16,
  F32,
  I32,
  U32,
}

impl ScalarKind {
  pub const fn wgsl_name(self) -> &'static str {
    match self {
      ScalarKind::Bool => "bool",
      ScalarKind::F16 => "f16",
      ScalarKind::F32 => "f32",
      ScalarKind::I32 => "i32",
      ScalarKind::U32 => "u32",
    }
  }

  pub const fn is_float(self) -> bool {
    matches!(self, ScalarKind::F16 | ScalarKind::F32)
  }

  pub const fn is_integer(self) -> bool {
    matches!(self, ScalarKind::I32 | ScalarKind::U32)
  }

  pub const fn is_numeric(self) -> bool {
    !matches!(self, ScalarKind::Bool)
  }

  /// Can be negated.
  pub const fn is_signed(self) -> bool {
    matches!(self, ScalarKind::F16 | ScalarKind::F32 | ScalarKind::I32)
  }

  /// Suffix of WGSL's predeclared vector and matrix aliases (`vec3f`, `mat2x2h`).
  pub const fn alias_suffix(self) -> Option<char> {
    match self {
      ScalarKind::Bool => None,
      ScalarKind::F16 => Some('h'),
      ScalarKind::F32 => Some('f'),
      ScalarKind::I32 => Some('i'),
      ScalarKind::U32 => Some('u'),
    }
  }
}

impl fmt::Display for ScalarKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.wgsl_name())
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub enum VectorWidth {
  Two,
  Three,
  Four,
}

impl VectorWidth {
  pub const fn count(self) -> usize {
    match self {
      VectorWidth::Two => 2,
      VectorWidth::Three => 3,
      VectorWidth::Four => 4,
    }
  }

  pub const fn from_count(count: usize) -> Option<Self> {
    match count {
      2 => Some(VectorWidth::Two),
      3 => Some(VectorWidth::Three),
      4 => Some(VectorWidth::Four),
      _ => None,
    }
  }
}

/// Shape of a piece of GPU data, independent of any instance.
///
/// Equality and hashing are structural: two descriptors built separately with
/// the same shape are the same type everywhere in the system.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeDescriptor {
  Scalar(ScalarKind),
  Vector {
    kind: ScalarKind,
    width: VectorWidth,
  },
  /// `columns` column vectors of `rows` components each.
  Matrix {
    kind: ScalarKind,
    columns: VectorWidth,
    rows: VectorWidth,
  },
  Atomic(ScalarKind),
  Array(Arc<ArrayDescriptor>),
  Struct(Arc<StructDescriptor>),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ArrayLength {
  Fixed(usize),
  /// Sized by the bound buffer, only legal as the last struct member or as a
  /// top level storage type.
  Runtime,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ArrayDescriptor {
  pub element: TypeDescriptor,
  pub length: ArrayLength,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct StructDescriptor {
  pub label: Option<String>,
  pub fields: Vec<StructField>,
}

impl StructDescriptor {
  pub fn field(&self, name: &str) -> Option<(usize, &StructField)> {
    self.fields.iter().enumerate().find(|(_, f)| f.name == name)
  }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct StructField {
  pub name: String,
  pub ty: TypeDescriptor,
  pub attributes: FieldAttributes,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Debug)]
pub struct FieldAttributes {
  pub align: Option<u32>,
  pub size: Option<u32>,
  pub io: Option<IoAttribute>,
}

/// Entry point io annotation of a struct member.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum IoAttribute {
  Location(u32),
  Builtin(Builtin),
}

/// https://www.w3.org/TR/WGSL/#builtin-inputs-outputs
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Builtin {
  VertexIndex,
  InstanceIndex,
  Position,
  FrontFacing,
  FragDepth,
  SampleIndex,
  SampleMask,
  LocalInvocationId,
  LocalInvocationIndex,
  GlobalInvocationId,
  WorkgroupId,
  NumWorkgroups,
}

impl Builtin {
  pub const fn wgsl_name(self) -> &'static str {
    match self {
      Builtin::VertexIndex => "vertex_index",
      Builtin::InstanceIndex => "instance_index",
      Builtin::Position => "position",
      Builtin::FrontFacing => "front_facing",
      Builtin::FragDepth => "frag_depth",
      Builtin::SampleIndex => "sample_index",
      Builtin::SampleMask => "sample_mask",
      Builtin::LocalInvocationId => "local_invocation_id",
      Builtin::LocalInvocationIndex => "local_invocation_index",
      Builtin::GlobalInvocationId => "global_invocation_id",
      Builtin::WorkgroupId => "workgroup_id",
      Builtin::NumWorkgroups => "num_workgroups",
    }
  }

  pub fn ty(self) -> TypeDescriptor {
    match self {
      Builtin::VertexIndex
      | Builtin::InstanceIndex
      | Builtin::SampleIndex
      | Builtin::SampleMask
      | Builtin::LocalInvocationIndex => U32,
      Builtin::Position => VEC4F,
      Builtin::FrontFacing => BOOL,
      Builtin::FragDepth => F32,
      Builtin::LocalInvocationId
      | Builtin::GlobalInvocationId
      | Builtin::WorkgroupId
      | Builtin::NumWorkgroups => VEC3U,
    }
  }
}

impl TypeDescriptor {
  /// Has a size known without looking at a bound buffer.
  pub fn is_sized(&self) -> bool {
    match self {
      TypeDescriptor::Scalar(_)
      | TypeDescriptor::Vector { .. }
      | TypeDescriptor::Matrix { .. }
      | TypeDescriptor::Atomic(_) => true,
      TypeDescriptor::Array(array) => array.length != ArrayLength::Runtime,
      TypeDescriptor::Struct(s) => s.fields.iter().all(|f| f.ty.is_sized()),
    }
  }

  pub fn is_runtime_sized_array(&self) -> bool {
    matches!(self, TypeDescriptor::Array(array) if array.length == ArrayLength::Runtime)
  }

  /// Component kind of scalars, vectors, matrices and atomics.
  pub fn scalar_kind(&self) -> Option<ScalarKind> {
    match self {
      TypeDescriptor::Scalar(kind)
      | TypeDescriptor::Vector { kind, .. }
      | TypeDescriptor::Matrix { kind, .. }
      | TypeDescriptor::Atomic(kind) => Some(*kind),
      _ => None,
    }
  }

  pub fn as_struct(&self) -> Option<&StructDescriptor> {
    match self {
      TypeDescriptor::Struct(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_array(&self) -> Option<&ArrayDescriptor> {
    match self {
      TypeDescriptor::Array(a) => Some(a),
      _ => None,
    }
  }

  /// Can appear in a WGSL value constructor expression.
  pub fn is_constructible(&self) -> bool {
    match self {
      TypeDescriptor::Scalar(_) | TypeDescriptor::Vector { .. } | TypeDescriptor::Matrix { .. } => {
        true
      }
      TypeDescriptor::Atomic(_) => false,
      TypeDescriptor::Array(array) => {
        array.length != ArrayLength::Runtime && array.element.is_constructible()
      }
      TypeDescriptor::Struct(s) => s.fields.iter().all(|f| f.ty.is_constructible()),
    }
  }

  /// Visits this descriptor and every descriptor nested in it, parents first.
  pub fn visit(&self, visitor: &mut impl FnMut(&TypeDescriptor)) {
    visitor(self);
    match self {
      TypeDescriptor::Array(array) => array.element.visit(visitor),
      TypeDescriptor::Struct(s) => s.fields.iter().for_each(|f| f.ty.visit(visitor)),
      _ => {}
    }
  }

  pub fn uses_scalar_kind(&self, kind: ScalarKind) -> bool {
    let mut found = false;
    self.visit(&mut |ty| found |= ty.scalar_kind() == Some(kind));
    found
  }
}

impl fmt::Display for TypeDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TypeDescriptor::Scalar(kind) => write!(f, "{kind}"),
      TypeDescriptor::Vector { kind, width } => match kind.alias_suffix() {
        Some(suffix) => write!(f, "vec{}{suffix}", width.count()),
        None => write!(f, "vec{}<{kind}>", width.count()),
      },
      TypeDescriptor::Matrix {
        kind,
        columns,
        rows,
      } => match kind.alias_suffix() {
        Some(suffix) => write!(f, "mat{}x{}{suffix}", columns.count(), rows.count()),
        None => write!(f, "mat{}x{}<{kind}>", columns.count(), rows.count()),
      },
      TypeDescriptor::Atomic(kind) => write!(f, "atomic<{kind}>"),
      TypeDescriptor::Array(array) => match array.length {
        ArrayLength::Fixed(n) => write!(f, "array<{}, {n}>", array.element),
        ArrayLength::Runtime => write!(f, "array<{}>", array.element),
      },
      TypeDescriptor::Struct(s) => {
        if let Some(label) = &s.label {
          return write!(f, "{label}");
        }
        write!(f, "struct {{ ")?;
        for (i, field) in s.fields.iter().enumerate() {
          if i > 0 {
            write!(f, ", ")?;
          }
          write!(f, "{}: {}", field.name, field.ty)?;
        }
        write!(f, " }}")
      }
    }
  }
}
