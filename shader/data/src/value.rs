use crate::*;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScalarValue {
  Bool(bool),
  F16(half::f16),
  F32(f32),
  I32(i32),
  U32(u32),
}

impl ScalarValue {
  pub fn kind(&self) -> ScalarKind {
    match self {
      ScalarValue::Bool(_) => ScalarKind::Bool,
      ScalarValue::F16(_) => ScalarKind::F16,
      ScalarValue::F32(_) => ScalarKind::F32,
      ScalarValue::I32(_) => ScalarKind::I32,
      ScalarValue::U32(_) => ScalarKind::U32,
    }
  }

  pub fn zero(kind: ScalarKind) -> Self {
    match kind {
      ScalarKind::Bool => ScalarValue::Bool(false),
      ScalarKind::F16 => ScalarValue::F16(half::f16::ZERO),
      ScalarKind::F32 => ScalarValue::F32(0.),
      ScalarKind::I32 => ScalarValue::I32(0),
      ScalarKind::U32 => ScalarValue::U32(0),
    }
  }

  /// Lossless for every kind.
  pub fn to_f64(self) -> f64 {
    match self {
      ScalarValue::Bool(v) => f64::from(u8::from(v)),
      ScalarValue::F16(v) => v.to_f64(),
      ScalarValue::F32(v) => f64::from(v),
      ScalarValue::I32(v) => f64::from(v),
      ScalarValue::U32(v) => f64::from(v),
    }
  }

  /// Value conversion with WGSL semantics: float to integer truncates and
  /// saturates, integer to integer reinterprets the bits.
  pub fn convert(self, kind: ScalarKind) -> Self {
    match (self, kind) {
      (ScalarValue::I32(v), ScalarKind::U32) => ScalarValue::U32(v as u32),
      (ScalarValue::U32(v), ScalarKind::I32) => ScalarValue::I32(v as i32),
      (v, ScalarKind::Bool) => ScalarValue::Bool(v.to_f64() != 0.),
      (v, ScalarKind::F16) => ScalarValue::F16(half::f16::from_f64(v.to_f64())),
      (v, ScalarKind::F32) => ScalarValue::F32(v.to_f64() as f32),
      (v, ScalarKind::I32) => ScalarValue::I32(v.to_f64() as i32),
      (v, ScalarKind::U32) => ScalarValue::U32(v.to_f64() as u32),
    }
  }

  pub fn is_finite(&self) -> bool {
    match self {
      ScalarValue::F16(v) => v.is_finite(),
      ScalarValue::F32(v) => v.is_finite(),
      _ => true,
    }
  }
}

impl From<bool> for ScalarValue {
  fn from(v: bool) -> Self {
    ScalarValue::Bool(v)
  }
}
impl From<half::f16> for ScalarValue {
  fn from(v: half::f16) -> Self {
    ScalarValue::F16(v)
  }
}
impl From<f32> for ScalarValue {
  fn from(v: f32) -> Self {
    ScalarValue::F32(v)
  }
}
impl From<i32> for ScalarValue {
  fn from(v: i32) -> Self {
    ScalarValue::I32(v)
  }
}
impl From<u32> for ScalarValue {
  fn from(v: u32) -> Self {
    ScalarValue::U32(v)
  }
}

pub type Components = SmallVec<[ScalarValue; 4]>;

/// Host side instance of a descriptor.
#[derive(Clone, Debug, PartialEq)]
pub enum HostValue {
  Scalar(ScalarValue),
  Vector(Components),
  /// Column major.
  Matrix(Vec<Components>),
  Array(Vec<HostValue>),
  /// Named members, in any order.
  Struct(Vec<(String, HostValue)>),
}

macro_rules! host_scalar_from {
  ($($ty: ty),*) => {
    $(
      impl From<$ty> for HostValue {
        fn from(v: $ty) -> Self {
          HostValue::Scalar(v.into())
        }
      }
    )*
  };
}

host_scalar_from!(bool, half::f16, f32, i32, u32, ScalarValue);

impl HostValue {
  pub fn vector<T: Into<ScalarValue>>(components: impl IntoIterator<Item = T>) -> Self {
    HostValue::Vector(components.into_iter().map(Into::into).collect())
  }

  pub fn matrix<T, C>(columns: impl IntoIterator<Item = C>) -> Self
  where
    T: Into<ScalarValue>,
    C: IntoIterator<Item = T>,
  {
    HostValue::Matrix(
      columns
        .into_iter()
        .map(|column| column.into_iter().map(Into::into).collect())
        .collect(),
    )
  }

  pub fn array(elements: impl IntoIterator<Item = HostValue>) -> Self {
    HostValue::Array(elements.into_iter().collect())
  }

  pub fn structure<N: Into<String>>(fields: impl IntoIterator<Item = (N, HostValue)>) -> Self {
    HostValue::Struct(fields.into_iter().map(|(n, v)| (n.into(), v)).collect())
  }

  /// The all zero value, runtime-sized arrays are empty.
  pub fn zeroed(ty: &TypeDescriptor) -> Self {
    match ty {
      TypeDescriptor::Scalar(kind) | TypeDescriptor::Atomic(kind) => {
        HostValue::Scalar(ScalarValue::zero(*kind))
      }
      TypeDescriptor::Vector { kind, width } => {
        HostValue::Vector(smallvec::smallvec![ScalarValue::zero(*kind); width.count()])
      }
      TypeDescriptor::Matrix {
        kind,
        columns,
        rows,
      } => HostValue::Matrix(vec![
        smallvec::smallvec![ScalarValue::zero(*kind); rows.count()];
        columns.count()
      ]),
      TypeDescriptor::Array(array) => match array.length {
        ArrayLength::Fixed(n) => HostValue::Array(vec![HostValue::zeroed(&array.element); n]),
        ArrayLength::Runtime => HostValue::Array(Vec::new()),
      },
      TypeDescriptor::Struct(s) => HostValue::Struct(
        s.fields
          .iter()
          .map(|f| (f.name.clone(), HostValue::zeroed(&f.ty)))
          .collect(),
      ),
    }
  }

  pub fn field(&self, name: &str) -> Option<&HostValue> {
    match self {
      HostValue::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
      _ => None,
    }
  }

  pub fn field_mut(&mut self, name: &str) -> Option<&mut HostValue> {
    match self {
      HostValue::Struct(fields) => fields.iter_mut().find(|(n, _)| n == name).map(|(_, v)| v),
      _ => None,
    }
  }

  pub fn as_scalar(&self) -> Option<ScalarValue> {
    match self {
      HostValue::Scalar(v) => Some(*v),
      _ => None,
    }
  }

  pub fn shape_name(&self) -> &'static str {
    match self {
      HostValue::Scalar(_) => "scalar",
      HostValue::Vector(_) => "vector",
      HostValue::Matrix(_) => "matrix",
      HostValue::Array(_) => "array",
      HostValue::Struct(_) => "struct",
    }
  }
}
