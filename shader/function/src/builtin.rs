use crate::*;

/// WGSL standard library functions callable from a traced body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinFunction {
  Abs,
  Min,
  Max,
  Clamp,
  Saturate,
  Sin,
  Cos,
  Tan,
  Sinh,
  Cosh,
  Tanh,
  Asin,
  Acos,
  Atan,
  Atan2,
  Exp,
  Exp2,
  Log,
  Log2,
  Pow,
  Sqrt,
  InverseSqrt,
  Floor,
  Ceil,
  Round,
  Fract,
  Trunc,
  Sign,
  Mix,
  Step,
  SmoothStep,
  Fma,
  Dot,
  Cross,
  Length,
  Distance,
  Normalize,
  Reflect,
  Transpose,
  Determinant,
  All,
  Any,
  /// `select(false_value, true_value, condition)`
  Select,
  Radians,
  Degrees,
  /// Element count of a runtime sized array, takes the array by reference.
  ArrayLength,
}

impl BuiltinFunction {
  pub const ALL: &'static [BuiltinFunction] = &[
    BuiltinFunction::Abs,
    BuiltinFunction::Min,
    BuiltinFunction::Max,
    BuiltinFunction::Clamp,
    BuiltinFunction::Saturate,
    BuiltinFunction::Sin,
    BuiltinFunction::Cos,
    BuiltinFunction::Tan,
    BuiltinFunction::Sinh,
    BuiltinFunction::Cosh,
    BuiltinFunction::Tanh,
    BuiltinFunction::Asin,
    BuiltinFunction::Acos,
    BuiltinFunction::Atan,
    BuiltinFunction::Atan2,
    BuiltinFunction::Exp,
    BuiltinFunction::Exp2,
    BuiltinFunction::Log,
    BuiltinFunction::Log2,
    BuiltinFunction::Pow,
    BuiltinFunction::Sqrt,
    BuiltinFunction::InverseSqrt,
    BuiltinFunction::Floor,
    BuiltinFunction::Ceil,
    BuiltinFunction::Round,
    BuiltinFunction::Fract,
    BuiltinFunction::Trunc,
    BuiltinFunction::Sign,
    BuiltinFunction::Mix,
    BuiltinFunction::Step,
    BuiltinFunction::SmoothStep,
    BuiltinFunction::Fma,
    BuiltinFunction::Dot,
    BuiltinFunction::Cross,
    BuiltinFunction::Length,
    BuiltinFunction::Distance,
    BuiltinFunction::Normalize,
    BuiltinFunction::Reflect,
    BuiltinFunction::Transpose,
    BuiltinFunction::Determinant,
    BuiltinFunction::All,
    BuiltinFunction::Any,
    BuiltinFunction::Select,
    BuiltinFunction::Radians,
    BuiltinFunction::Degrees,
    BuiltinFunction::ArrayLength,
  ];

  pub fn wgsl_name(self) -> &'static str {
    match self {
      BuiltinFunction::Abs => "abs",
      BuiltinFunction::Min => "min",
      BuiltinFunction::Max => "max",
      BuiltinFunction::Clamp => "clamp",
      BuiltinFunction::Saturate => "saturate",
      BuiltinFunction::Sin => "sin",
      BuiltinFunction::Cos => "cos",
      BuiltinFunction::Tan => "tan",
      BuiltinFunction::Sinh => "sinh",
      BuiltinFunction::Cosh => "cosh",
      BuiltinFunction::Tanh => "tanh",
      BuiltinFunction::Asin => "asin",
      BuiltinFunction::Acos => "acos",
      BuiltinFunction::Atan => "atan",
      BuiltinFunction::Atan2 => "atan2",
      BuiltinFunction::Exp => "exp",
      BuiltinFunction::Exp2 => "exp2",
      BuiltinFunction::Log => "log",
      BuiltinFunction::Log2 => "log2",
      BuiltinFunction::Pow => "pow",
      BuiltinFunction::Sqrt => "sqrt",
      BuiltinFunction::InverseSqrt => "inverseSqrt",
      BuiltinFunction::Floor => "floor",
      BuiltinFunction::Ceil => "ceil",
      BuiltinFunction::Round => "round",
      BuiltinFunction::Fract => "fract",
      BuiltinFunction::Trunc => "trunc",
      BuiltinFunction::Sign => "sign",
      BuiltinFunction::Mix => "mix",
      BuiltinFunction::Step => "step",
      BuiltinFunction::SmoothStep => "smoothstep",
      BuiltinFunction::Fma => "fma",
      BuiltinFunction::Dot => "dot",
      BuiltinFunction::Cross => "cross",
      BuiltinFunction::Length => "length",
      BuiltinFunction::Distance => "distance",
      BuiltinFunction::Normalize => "normalize",
      BuiltinFunction::Reflect => "reflect",
      BuiltinFunction::Transpose => "transpose",
      BuiltinFunction::Determinant => "determinant",
      BuiltinFunction::All => "all",
      BuiltinFunction::Any => "any",
      BuiltinFunction::Select => "select",
      BuiltinFunction::Radians => "radians",
      BuiltinFunction::Degrees => "degrees",
      BuiltinFunction::ArrayLength => "arrayLength",
    }
  }

  pub fn argument_count(self) -> usize {
    use BuiltinFunction::*;
    match self {
      Min | Max | Atan2 | Pow | Step | Dot | Cross | Distance | Reflect => 2,
      Clamp | Mix | SmoothStep | Fma | Select => 3,
      _ => 1,
    }
  }

  /// Result type for the given argument types, `None` when WGSL has no
  /// overload accepting them.
  pub fn result_type(self, args: &[TypeDescriptor]) -> Option<TypeDescriptor> {
    use BuiltinFunction::*;
    if args.len() != self.argument_count() {
      return None;
    }
    let first = &args[0];
    let all_same = args.iter().all(|a| a == first);
    match self {
      Saturate | Sin | Cos | Tan | Sinh | Cosh | Tanh | Asin | Acos | Atan | Exp | Exp2 | Log
      | Log2 | Sqrt | InverseSqrt | Floor | Ceil | Round | Fract | Trunc | Radians | Degrees => {
        is_float_value(first).then(|| first.clone())
      }
      Atan2 | Pow | Step | SmoothStep | Fma => {
        (all_same && is_float_value(first)).then(|| first.clone())
      }
      Abs => is_numeric_value(first).then(|| first.clone()),
      Sign => (is_numeric_value(first) && first.scalar_kind().is_some_and(|k| k.is_signed()))
        .then(|| first.clone()),
      Min | Max | Clamp => (all_same && is_numeric_value(first)).then(|| first.clone()),
      Mix => {
        let blend_ok = args[2] == *first || Some(&args[2]) == first.scalar_kind().map(scalar).as_ref();
        (args[0] == args[1] && blend_ok && is_float_value(first)).then(|| first.clone())
      }
      Dot => match first {
        TypeDescriptor::Vector { kind, .. } if all_same && kind.is_numeric() => Some(scalar(*kind)),
        _ => None,
      },
      Cross => match first {
        TypeDescriptor::Vector {
          kind,
          width: VectorWidth::Three,
        } if all_same && kind.is_float() => Some(first.clone()),
        _ => None,
      },
      Length => match first {
        TypeDescriptor::Scalar(kind) | TypeDescriptor::Vector { kind, .. } if kind.is_float() => {
          Some(scalar(*kind))
        }
        _ => None,
      },
      Distance => match first {
        TypeDescriptor::Scalar(kind) | TypeDescriptor::Vector { kind, .. }
          if all_same && kind.is_float() =>
        {
          Some(scalar(*kind))
        }
        _ => None,
      },
      Normalize => match first {
        TypeDescriptor::Vector { kind, .. } if kind.is_float() => Some(first.clone()),
        _ => None,
      },
      Reflect => match first {
        TypeDescriptor::Vector { kind, .. } if all_same && kind.is_float() => Some(first.clone()),
        _ => None,
      },
      Transpose => match first {
        TypeDescriptor::Matrix {
          kind,
          columns,
          rows,
        } => Some(TypeDescriptor::Matrix {
          kind: *kind,
          columns: *rows,
          rows: *columns,
        }),
        _ => None,
      },
      Determinant => match first {
        TypeDescriptor::Matrix {
          kind,
          columns,
          rows,
        } if columns == rows => Some(scalar(*kind)),
        _ => None,
      },
      All | Any => match first {
        TypeDescriptor::Scalar(ScalarKind::Bool)
        | TypeDescriptor::Vector {
          kind: ScalarKind::Bool,
          ..
        } => Some(BOOL),
        _ => None,
      },
      Select => {
        let condition_ok = match (first, &args[2]) {
          (TypeDescriptor::Vector { width, .. }, TypeDescriptor::Vector { kind, width: cw }) => {
            *kind == ScalarKind::Bool && width == cw
          }
          (_, condition) => *condition == BOOL,
        };
        let selectable = matches!(first, TypeDescriptor::Scalar(_) | TypeDescriptor::Vector { .. });
        (args[0] == args[1] && condition_ok && selectable).then(|| first.clone())
      }
      ArrayLength => first.is_runtime_sized_array().then_some(U32),
    }
  }
}

fn is_float_value(ty: &TypeDescriptor) -> bool {
  matches!(
    ty,
    TypeDescriptor::Scalar(kind) | TypeDescriptor::Vector { kind, .. } if kind.is_float()
  )
}

fn is_numeric_value(ty: &TypeDescriptor) -> bool {
  matches!(
    ty,
    TypeDescriptor::Scalar(kind) | TypeDescriptor::Vector { kind, .. } if kind.is_numeric()
  )
}

/// Standard library operations WGSL lacks, emitted as module functions by
/// the compiler when first used.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Helper {
  /// Component wise `|a - b| <= epsilon` over a float scalar or vector.
  IsCloseTo(TypeDescriptor),
}

impl Helper {
  pub fn base_name(&self) -> &'static str {
    match self {
      Helper::IsCloseTo(_) => "isCloseTo",
    }
  }

  pub fn parameter_types(&self) -> Vec<TypeDescriptor> {
    match self {
      Helper::IsCloseTo(ty) => {
        let precision = ty.scalar_kind().map(scalar).unwrap_or(F32);
        vec![ty.clone(), ty.clone(), precision]
      }
    }
  }

  pub fn return_type(&self) -> TypeDescriptor {
    match self {
      Helper::IsCloseTo(_) => BOOL,
    }
  }

  /// Function body including braces, written against the parameter names
  /// `a`, `b` and `epsilon`.
  pub fn wgsl_body(&self) -> String {
    match self {
      Helper::IsCloseTo(ty @ TypeDescriptor::Vector { .. }) => {
        format!("{{\n  return all(abs(a - b) <= {ty}(epsilon));\n}}")
      }
      Helper::IsCloseTo(_) => String::from("{\n  return abs(a - b) <= epsilon;\n}"),
    }
  }

  pub fn parameter_names(&self) -> &'static [&'static str] {
    match self {
      Helper::IsCloseTo(_) => &["a", "b", "epsilon"],
    }
  }
}
