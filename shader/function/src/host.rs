use crate::*;

/// Runs traced functions on the CPU over [`HostValue`]s.
///
/// Integer arithmetic wraps and division by zero yields the dividend, as on
/// the GPU. Float math is evaluated in `f64` and rounded to the component
/// type.
pub struct HostInterpreter<'a> {
  ctx: &'a TraceContext,
}

#[derive(Clone, Debug)]
enum Slot {
  Value(HostValue),
  /// Reference into a local variable.
  Place(LocalId, Vec<PathSegment>),
}

struct Frame<'t> {
  traced: &'t TracedFn,
  args: Vec<HostValue>,
  locals: Vec<HostValue>,
  values: Vec<Option<Slot>>,
}

enum Flow {
  Next,
  Break,
  Continue,
  Return(Option<HostValue>),
}

impl<'a> HostInterpreter<'a> {
  pub fn new(ctx: &'a TraceContext) -> Self {
    Self { ctx }
  }

  pub fn call(&self, traced: &TracedFn, args: &[HostValue]) -> ShaderResult<Option<HostValue>> {
    let function = &traced.function;
    let TracedBody::Recorded(body) = &traced.body else {
      return Err(unsupported(traced, "raw WGSL body on the host"));
    };
    if args.len() != function.params().len() {
      return Err(
        GraphError::ArgumentCount {
          function: function.name().to_string(),
          expected: function.params().len(),
          found: args.len(),
        }
        .into(),
      );
    }
    let args = args
      .iter()
      .zip(function.params())
      .map(|(arg, param)| -> ShaderResult<HostValue> {
        let bytes = encode_to_vec(arg, &param.ty)?;
        Ok(decode(&bytes, &param.ty, 0)?)
      })
      .collect::<ShaderResult<Vec<_>>>()?;

    let mut frame = Frame {
      traced,
      args,
      locals: traced.locals.iter().map(|l| HostValue::zeroed(&l.ty)).collect(),
      values: vec![None; traced.exprs.len()],
    };
    match self.run_block(&mut frame, body)? {
      Flow::Return(value) => Ok(value),
      _ => Ok(None),
    }
  }

  fn run_block(&self, frame: &mut Frame, block: &Block) -> ShaderResult<Flow> {
    for statement in block {
      let flow = self.run_statement(frame, statement)?;
      if !matches!(flow, Flow::Next) {
        return Ok(flow);
      }
    }
    Ok(Flow::Next)
  }

  fn run_statement(&self, frame: &mut Frame, statement: &Statement) -> ShaderResult<Flow> {
    match statement {
      Statement::Emit(node) => {
        let slot = self.compute(frame, *node)?;
        frame.values[node.index] = Some(slot);
      }
      Statement::Declare { local, init } => {
        let value = match init {
          Some(init) => self.value(frame, *init)?,
          None => HostValue::zeroed(&frame.traced.locals[local.0].ty),
        };
        frame.locals[local.0] = value;
      }
      Statement::Store { target, value } => {
        let value = self.value(frame, *value)?;
        let Slot::Place(local, path) = self.operand(frame, *target)? else {
          return Err(unsupported(frame.traced, "store into a value"));
        };
        write_at(&mut frame.locals[local.0], &path, value)
          .ok_or_else(|| unsupported(frame.traced, "store through an invalid path"))?;
      }
      Statement::CallVoid { callee, parameters } => {
        self.call_callee(frame, *callee, parameters)?;
      }
      Statement::If {
        condition,
        accept,
        reject,
      } => {
        let branch = if self.bool_value(frame, *condition)? {
          accept
        } else {
          reject
        };
        return self.run_block(frame, branch);
      }
      Statement::Loop { body } => loop {
        match self.run_block(frame, body)? {
          Flow::Next | Flow::Continue => {}
          Flow::Break => break,
          flow @ Flow::Return(_) => return Ok(flow),
        }
      },
      Statement::ForRange {
        counter,
        start,
        end,
        body,
      } => {
        let end = self.scalar_value(frame, *end)?;
        frame.locals[counter.0] = HostValue::Scalar(self.scalar_value(frame, *start)?);
        loop {
          let current = frame.locals[counter.0]
            .as_scalar()
            .ok_or_else(|| unsupported(frame.traced, "non scalar loop counter"))?;
          if scalar_binary(BinaryOperator::Less, current, end) != Some(ScalarValue::Bool(true)) {
            break;
          }
          match self.run_block(frame, body)? {
            Flow::Next | Flow::Continue => {}
            Flow::Break => break,
            flow @ Flow::Return(_) => return Ok(flow),
          }
          let one = ScalarValue::U32(1).convert(current.kind());
          let next = scalar_binary(BinaryOperator::Add, current, one)
            .ok_or_else(|| unsupported(frame.traced, "loop counter increment"))?;
          frame.locals[counter.0] = HostValue::Scalar(next);
        }
      }
      Statement::Break => return Ok(Flow::Break),
      Statement::Continue => return Ok(Flow::Continue),
      Statement::Return(value) => {
        let value = value.map(|v| self.value(frame, v)).transpose()?;
        return Ok(Flow::Return(value));
      }
      Statement::Discard => return Err(unsupported(frame.traced, "`discard` on the host")),
    }
    Ok(Flow::Next)
  }

  fn call_callee(&self, frame: &Frame, callee: FnId, parameters: &[Node]) -> ShaderResult<Option<HostValue>> {
    let args = parameters
      .iter()
      .map(|p| self.value(frame, *p))
      .collect::<ShaderResult<Vec<_>>>()?;
    let traced = self
      .ctx
      .get(callee)
      .ok_or_else(|| unsupported(frame.traced, "call to a function that was never traced"))?;
    self.call(traced, &args)
  }

  /// Slot of an operand: the bound value of emitted nodes, computed on the
  /// spot for inlined ones.
  fn operand(&self, frame: &Frame, node: Node) -> ShaderResult<Slot> {
    if let Some(slot) = &frame.values[node.index] {
      return Ok(slot.clone());
    }
    let entry = frame.traced.expr(node);
    if !entry.expr.is_inlined(entry.reference) {
      return Err(unsupported(frame.traced, "value read before it was computed"));
    }
    self.compute(frame, node)
  }

  fn value(&self, frame: &Frame, node: Node) -> ShaderResult<HostValue> {
    match self.operand(frame, node)? {
      Slot::Value(value) => Ok(value),
      Slot::Place(local, path) => read_at(&frame.locals[local.0], &path)
        .ok_or_else(|| unsupported(frame.traced, "read through an invalid path")),
    }
  }

  fn scalar_value(&self, frame: &Frame, node: Node) -> ShaderResult<ScalarValue> {
    self
      .value(frame, node)?
      .as_scalar()
      .ok_or_else(|| unsupported(frame.traced, "expected a scalar"))
  }

  fn bool_value(&self, frame: &Frame, node: Node) -> ShaderResult<bool> {
    match self.scalar_value(frame, node)? {
      ScalarValue::Bool(v) => Ok(v),
      _ => Err(unsupported(frame.traced, "condition is not a bool")),
    }
  }

  fn index_value(&self, frame: &Frame, node: Node) -> ShaderResult<usize> {
    match self.scalar_value(frame, node)? {
      ScalarValue::U32(i) => Ok(i as usize),
      ScalarValue::I32(i) if i >= 0 => Ok(i as usize),
      other => Err(unsupported(frame.traced, format!("index {other:?} on the host"))),
    }
  }

  fn compute(&self, frame: &Frame, node: Node) -> ShaderResult<Slot> {
    let entry = frame.traced.expr(node);
    let fail = |construct: &str| unsupported(frame.traced, construct);
    let value = match &entry.expr {
      ShaderNodeExpr::Parameter(i) => frame.args[*i].clone(),
      ShaderNodeExpr::Literal(v) => HostValue::Scalar(*v),
      ShaderNodeExpr::Constant(id) => self
        .ctx
        .constant(*id)
        .map(|c| c.value.clone())
        .ok_or_else(|| fail("unknown module constant"))?,
      ShaderNodeExpr::Binding { group, binding } => {
        return Err(unsupported(
          frame.traced,
          format!("@group({group}) @binding({binding}) access on the host"),
        ))
      }
      ShaderNodeExpr::Local(local) => return Ok(Slot::Place(*local, Vec::new())),
      ShaderNodeExpr::Load(source) => self.value(frame, *source)?,
      ShaderNodeExpr::Compose { parameters } => {
        let args = parameters
          .iter()
          .map(|p| self.value(frame, *p))
          .collect::<ShaderResult<Vec<_>>>()?;
        compose(&entry.ty, args).ok_or_else(|| fail("construction"))?
      }
      ShaderNodeExpr::Zeroed => HostValue::zeroed(&entry.ty),
      ShaderNodeExpr::Unary { op, operand } => {
        let operand = self.value(frame, *operand)?;
        map_components(&operand, |v| scalar_unary(*op, v)).ok_or_else(|| fail(op.wgsl_token()))?
      }
      ShaderNodeExpr::Binary { op, left, right } => {
        let left = self.value(frame, *left)?;
        let right = self.value(frame, *right)?;
        binary(*op, &left, &right).ok_or_else(|| fail(op.wgsl_token()))?
      }
      ShaderNodeExpr::FieldGet { base, field_index } => {
        let name = frame.traced.expr(*base).ty.as_struct().and_then(|s| s.fields.get(*field_index));
        let Some(field) = name else {
          return Err(fail("member access"));
        };
        return self.project(frame, *base, PathSegment::Field(field.name.clone()));
      }
      ShaderNodeExpr::IndexGet { base, index } => {
        let index = self.index_value(frame, *index)?;
        return self.project(frame, *base, PathSegment::Index(index));
      }
      ShaderNodeExpr::Swizzle { source, components } => {
        if let [component] = components.as_slice() {
          return self.project(frame, *source, PathSegment::Index(*component as usize));
        }
        let HostValue::Vector(values) = self.value(frame, *source)? else {
          return Err(fail("swizzle"));
        };
        let picked = components
          .iter()
          .map(|c| values.get(*c as usize).copied())
          .collect::<Option<Components>>()
          .ok_or_else(|| fail("swizzle"))?;
        HostValue::Vector(picked)
      }
      ShaderNodeExpr::FunctionCall { callee, parameters } => self
        .call_callee(frame, *callee, parameters)?
        .ok_or_else(|| fail("call result"))?,
      ShaderNodeExpr::BuiltinCall { function, parameters } => {
        if *function == BuiltinFunction::ArrayLength {
          return Err(fail("arrayLength on the host"));
        }
        let args = parameters
          .iter()
          .map(|p| self.value(frame, *p))
          .collect::<ShaderResult<Vec<_>>>()?;
        builtin(*function, &args).ok_or_else(|| unsupported(frame.traced, function.wgsl_name()))?
      }
      ShaderNodeExpr::HelperCall { helper, parameters } => {
        let args = parameters
          .iter()
          .map(|p| self.value(frame, *p))
          .collect::<ShaderResult<Vec<_>>>()?;
        match helper {
          Helper::IsCloseTo(_) => is_close_to(&args).ok_or_else(|| fail(helper.base_name()))?,
        }
      }
      ShaderNodeExpr::Convert { source } => {
        let kind = entry.ty.scalar_kind().ok_or_else(|| fail("conversion"))?;
        map_components(&self.value(frame, *source)?, |v| Some(v.convert(kind)))
          .ok_or_else(|| fail("conversion"))?
      }
    };
    Ok(Slot::Value(value))
  }

  /// Member or element of `base`, staying a reference when `base` is one.
  fn project(&self, frame: &Frame, base: Node, segment: PathSegment) -> ShaderResult<Slot> {
    match self.operand(frame, base)? {
      Slot::Place(local, mut path) => {
        path.push(segment);
        Ok(Slot::Place(local, path))
      }
      Slot::Value(value) => read_at(&value, std::slice::from_ref(&segment))
        .map(Slot::Value)
        .ok_or_else(|| unsupported(frame.traced, "access out of bounds")),
    }
  }
}

fn unsupported(traced: &TracedFn, construct: impl Into<String>) -> ShaderError {
  UnsupportedConstructError {
    construct: construct.into(),
    function: traced.function.name().to_string(),
  }
  .into()
}

fn read_at(value: &HostValue, path: &[PathSegment]) -> Option<HostValue> {
  let Some((first, rest)) = path.split_first() else {
    return Some(value.clone());
  };
  match (value, first) {
    (HostValue::Struct(_), PathSegment::Field(name)) => read_at(value.field(name)?, rest),
    (HostValue::Array(elements), PathSegment::Index(i)) => read_at(elements.get(*i)?, rest),
    (HostValue::Matrix(columns), PathSegment::Index(i)) => {
      read_at(&HostValue::Vector(columns.get(*i)?.clone()), rest)
    }
    (HostValue::Vector(components), PathSegment::Index(i)) if rest.is_empty() => {
      Some(HostValue::Scalar(*components.get(*i)?))
    }
    _ => None,
  }
}

fn write_at(target: &mut HostValue, path: &[PathSegment], value: HostValue) -> Option<()> {
  let Some((first, rest)) = path.split_first() else {
    *target = value;
    return Some(());
  };
  match (target, first) {
    (HostValue::Struct(fields), PathSegment::Field(name)) => {
      let (_, field) = fields.iter_mut().find(|(n, _)| n == name)?;
      write_at(field, rest, value)
    }
    (HostValue::Array(elements), PathSegment::Index(i)) => write_at(elements.get_mut(*i)?, rest, value),
    (HostValue::Matrix(columns), PathSegment::Index(i)) => {
      let column = columns.get_mut(*i)?;
      match rest {
        [] => match value {
          HostValue::Vector(components) if components.len() == column.len() => *column = components,
          _ => return None,
        },
        [PathSegment::Index(j)] => *column.get_mut(*j)? = value.as_scalar()?,
        _ => return None,
      }
      Some(())
    }
    (HostValue::Vector(components), PathSegment::Index(i)) if rest.is_empty() => {
      *components.get_mut(*i)? = value.as_scalar()?;
      Some(())
    }
    _ => None,
  }
}

fn compose(ty: &TypeDescriptor, args: Vec<HostValue>) -> Option<HostValue> {
  let flatten = |args: &[HostValue]| -> Option<Components> {
    let mut components = Components::new();
    for arg in args {
      match arg {
        HostValue::Scalar(v) => components.push(*v),
        HostValue::Vector(c) => components.extend(c.iter().copied()),
        _ => return None,
      }
    }
    Some(components)
  };
  match ty {
    TypeDescriptor::Scalar(kind) => Some(HostValue::Scalar(args.first()?.as_scalar()?.convert(*kind))),
    TypeDescriptor::Vector { width, .. } => {
      let components = flatten(&args)?;
      match components.as_slice() {
        [single] => Some(HostValue::Vector(std::iter::repeat(*single).take(width.count()).collect())),
        _ => Some(HostValue::Vector(components)),
      }
    }
    TypeDescriptor::Matrix { columns, rows, .. } => {
      if args.len() == columns.count() {
        args
          .into_iter()
          .map(|c| match c {
            HostValue::Vector(c) => Some(c),
            _ => None,
          })
          .collect::<Option<Vec<_>>>()
          .map(HostValue::Matrix)
      } else {
        let components = flatten(&args)?;
        Some(HostValue::Matrix(
          components.chunks(rows.count()).map(Components::from_slice).collect(),
        ))
      }
    }
    TypeDescriptor::Array(_) => Some(HostValue::Array(args)),
    TypeDescriptor::Struct(s) => Some(HostValue::Struct(
      s.fields.iter().map(|f| f.name.clone()).zip(args).collect(),
    )),
    TypeDescriptor::Atomic(_) => None,
  }
}

fn scalar_from_f64(kind: ScalarKind, v: f64) -> ScalarValue {
  match kind {
    ScalarKind::F32 => ScalarValue::F32(v as f32),
    ScalarKind::F16 => ScalarValue::F16(half::f16::from_f64(v)),
    ScalarKind::I32 => ScalarValue::I32(v as i32),
    ScalarKind::U32 => ScalarValue::U32(v as u32),
    ScalarKind::Bool => ScalarValue::Bool(v != 0.),
  }
}

fn map_components(value: &HostValue, f: impl Fn(ScalarValue) -> Option<ScalarValue>) -> Option<HostValue> {
  match value {
    HostValue::Scalar(v) => Some(HostValue::Scalar(f(*v)?)),
    HostValue::Vector(c) => c
      .iter()
      .map(|v| f(*v))
      .collect::<Option<Components>>()
      .map(HostValue::Vector),
    _ => None,
  }
}

/// Component wise combination, broadcasting a scalar against a vector.
fn zip_components(
  a: &HostValue,
  b: &HostValue,
  f: impl Fn(ScalarValue, ScalarValue) -> Option<ScalarValue>,
) -> Option<HostValue> {
  match (a, b) {
    (HostValue::Scalar(x), HostValue::Scalar(y)) => Some(HostValue::Scalar(f(*x, *y)?)),
    (HostValue::Vector(xs), HostValue::Vector(ys)) if xs.len() == ys.len() => xs
      .iter()
      .zip(ys)
      .map(|(x, y)| f(*x, *y))
      .collect::<Option<Components>>()
      .map(HostValue::Vector),
    (HostValue::Vector(xs), HostValue::Scalar(y)) => xs
      .iter()
      .map(|x| f(*x, *y))
      .collect::<Option<Components>>()
      .map(HostValue::Vector),
    (HostValue::Scalar(x), HostValue::Vector(ys)) => ys
      .iter()
      .map(|y| f(*x, *y))
      .collect::<Option<Components>>()
      .map(HostValue::Vector),
    _ => None,
  }
}

fn components_of(value: &HostValue) -> Option<Components> {
  match value {
    HostValue::Scalar(v) => Some(Components::from_slice(&[*v])),
    HostValue::Vector(c) => Some(c.clone()),
    _ => None,
  }
}

fn scalar_unary(op: UnaryOperator, v: ScalarValue) -> Option<ScalarValue> {
  Some(match (op, v) {
    (UnaryOperator::Neg, ScalarValue::F32(x)) => ScalarValue::F32(-x),
    (UnaryOperator::Neg, ScalarValue::F16(x)) => ScalarValue::F16(-x),
    (UnaryOperator::Neg, ScalarValue::I32(x)) => ScalarValue::I32(x.wrapping_neg()),
    (UnaryOperator::Not, ScalarValue::Bool(x)) => ScalarValue::Bool(!x),
    (UnaryOperator::BitNot, ScalarValue::I32(x)) => ScalarValue::I32(!x),
    (UnaryOperator::BitNot, ScalarValue::U32(x)) => ScalarValue::U32(!x),
    _ => return None,
  })
}

fn compare<T: PartialOrd>(op: BinaryOperator, x: T, y: T) -> Option<ScalarValue> {
  Some(ScalarValue::Bool(match op {
    BinaryOperator::Equal => x == y,
    BinaryOperator::NotEqual => x != y,
    BinaryOperator::Less => x < y,
    BinaryOperator::LessEqual => x <= y,
    BinaryOperator::Greater => x > y,
    BinaryOperator::GreaterEqual => x >= y,
    _ => return None,
  }))
}

fn float_binary(op: BinaryOperator, x: f64, y: f64, kind: ScalarKind) -> Option<ScalarValue> {
  let result = match op {
    BinaryOperator::Add => x + y,
    BinaryOperator::Sub => x - y,
    BinaryOperator::Mul => x * y,
    BinaryOperator::Div => x / y,
    BinaryOperator::Rem => x % y,
    _ => return compare(op, x, y),
  };
  Some(scalar_from_f64(kind, result))
}

macro_rules! integer_binary {
  ($op: expr, $x: ident, $y: ident, $variant: path, $overflow: expr) => {
    Some($variant(match $op {
      BinaryOperator::Add => $x.wrapping_add($y),
      BinaryOperator::Sub => $x.wrapping_sub($y),
      BinaryOperator::Mul => $x.wrapping_mul($y),
      BinaryOperator::Div if $overflow => $x,
      BinaryOperator::Div => $x / $y,
      BinaryOperator::Rem if $overflow => 0,
      BinaryOperator::Rem => $x % $y,
      BinaryOperator::BitAnd => $x & $y,
      BinaryOperator::BitOr => $x | $y,
      BinaryOperator::BitXor => $x ^ $y,
      _ => return compare($op, $x, $y),
    }))
  };
}

fn scalar_binary(op: BinaryOperator, a: ScalarValue, b: ScalarValue) -> Option<ScalarValue> {
  use ScalarValue as S;
  match (a, b) {
    (S::F32(x), S::F32(y)) => float_binary(op, f64::from(x), f64::from(y), ScalarKind::F32),
    (S::F16(x), S::F16(y)) => float_binary(op, x.to_f64(), y.to_f64(), ScalarKind::F16),
    (S::I32(x), S::U32(y)) => match op {
      BinaryOperator::ShiftLeft => Some(S::I32(x.wrapping_shl(y))),
      BinaryOperator::ShiftRight => Some(S::I32(x.wrapping_shr(y))),
      _ => None,
    },
    (S::U32(x), S::U32(y)) => match op {
      BinaryOperator::ShiftLeft => Some(S::U32(x.wrapping_shl(y))),
      BinaryOperator::ShiftRight => Some(S::U32(x.wrapping_shr(y))),
      _ => integer_binary!(op, x, y, S::U32, y == 0),
    },
    (S::I32(x), S::I32(y)) => {
      integer_binary!(op, x, y, S::I32, y == 0 || (x == i32::MIN && y == -1))
    }
    (S::Bool(x), S::Bool(y)) => Some(S::Bool(match op {
      BinaryOperator::LogicalAnd | BinaryOperator::BitAnd => x && y,
      BinaryOperator::LogicalOr | BinaryOperator::BitOr => x || y,
      _ => return compare(op, x, y),
    })),
    _ => None,
  }
}

fn matrix_f64(columns: &[Components]) -> Vec<Vec<f64>> {
  columns
    .iter()
    .map(|c| c.iter().map(|v| v.to_f64()).collect())
    .collect()
}

fn matrix_from_f64(kind: ScalarKind, columns: Vec<Vec<f64>>) -> HostValue {
  HostValue::Matrix(
    columns
      .into_iter()
      .map(|c| c.into_iter().map(|v| scalar_from_f64(kind, v)).collect())
      .collect(),
  )
}

fn binary(op: BinaryOperator, left: &HostValue, right: &HostValue) -> Option<HostValue> {
  use HostValue as H;
  let kind_of = |columns: &[Components]| columns.first()?.first().map(|v| v.kind());
  match (left, right) {
    (H::Matrix(a), H::Matrix(b)) => {
      let kind = kind_of(a)?;
      let (a, b) = (matrix_f64(a), matrix_f64(b));
      let result: Vec<Vec<f64>> = match op {
        BinaryOperator::Mul => {
          let rows = a.first()?.len();
          b.iter()
            .map(|column| {
              (0..rows)
                .map(|r| column.iter().zip(&a).map(|(v, a_column)| a_column[r] * v).sum())
                .collect()
            })
            .collect()
        }
        BinaryOperator::Add | BinaryOperator::Sub => a
          .iter()
          .zip(&b)
          .map(|(x, y)| {
            x.iter()
              .zip(y)
              .map(|(x, y)| if op == BinaryOperator::Add { x + y } else { x - y })
              .collect()
          })
          .collect(),
        _ => return None,
      };
      Some(matrix_from_f64(kind, result))
    }
    (H::Matrix(m), H::Vector(v)) if op == BinaryOperator::Mul => {
      let kind = kind_of(m)?;
      let m = matrix_f64(m);
      let rows = m.first()?.len();
      let result = (0..rows)
        .map(|r| m.iter().zip(v).map(|(column, x)| column[r] * x.to_f64()).sum::<f64>())
        .map(|x| scalar_from_f64(kind, x))
        .collect();
      Some(H::Vector(result))
    }
    (H::Vector(v), H::Matrix(m)) if op == BinaryOperator::Mul => {
      let kind = kind_of(m)?;
      let result = matrix_f64(m)
        .iter()
        .map(|column| column.iter().zip(v).map(|(c, x)| c * x.to_f64()).sum::<f64>())
        .map(|x| scalar_from_f64(kind, x))
        .collect();
      Some(H::Vector(result))
    }
    (H::Matrix(m), H::Scalar(s)) | (H::Scalar(s), H::Matrix(m)) if op == BinaryOperator::Mul => {
      let kind = kind_of(m)?;
      let s = s.to_f64();
      let result = matrix_f64(m)
        .into_iter()
        .map(|column| column.into_iter().map(|x| x * s).collect())
        .collect();
      Some(matrix_from_f64(kind, result))
    }
    _ => zip_components(left, right, |a, b| scalar_binary(op, a, b)),
  }
}

fn float_map(value: &HostValue, f: impl Fn(f64) -> f64) -> Option<HostValue> {
  map_components(value, |v| v.kind().is_float().then(|| scalar_from_f64(v.kind(), f(v.to_f64()))))
}

fn float_zip(a: &HostValue, b: &HostValue, f: impl Fn(f64, f64) -> f64) -> Option<HostValue> {
  zip_components(a, b, |x, y| {
    x.kind()
      .is_numeric()
      .then(|| scalar_from_f64(x.kind(), f(x.to_f64(), y.to_f64())))
  })
}

fn dot(a: &HostValue, b: &HostValue) -> Option<ScalarValue> {
  let (a, b) = (components_of(a)?, components_of(b)?);
  let mut sum = ScalarValue::zero(a.first()?.kind());
  for (x, y) in a.iter().zip(&b) {
    sum = scalar_binary(BinaryOperator::Add, sum, scalar_binary(BinaryOperator::Mul, *x, *y)?)?;
  }
  Some(sum)
}

fn length(value: &HostValue) -> Option<f64> {
  let components = components_of(value)?;
  Some(components.iter().map(|c| c.to_f64() * c.to_f64()).sum::<f64>().sqrt())
}

fn determinant(m: &[Vec<f64>]) -> f64 {
  match m.len() {
    0 => 1.,
    1 => m[0][0],
    n => (0..n)
      .map(|c| {
        let minor = m
          .iter()
          .enumerate()
          .filter(|(i, _)| *i != c)
          .map(|(_, column)| column[1..].to_vec())
          .collect::<Vec<_>>();
        let sign = if c % 2 == 0 { 1. } else { -1. };
        sign * m[c][0] * determinant(&minor)
      })
      .sum(),
  }
}

fn builtin(function: BuiltinFunction, args: &[HostValue]) -> Option<HostValue> {
  use BuiltinFunction as B;
  let arg = |i: usize| args.get(i);
  let first = arg(0)?;
  let kind = match first {
    HostValue::Matrix(m) => m.first()?.first()?.kind(),
    other => components_of(other)?.first()?.kind(),
  };
  let min = |a: &HostValue, b: &HostValue| float_zip(a, b, f64::min);
  let max = |a: &HostValue, b: &HostValue| float_zip(a, b, f64::max);
  match function {
    B::Abs => map_components(first, |v| {
      Some(match v {
        ScalarValue::I32(x) => ScalarValue::I32(x.wrapping_abs()),
        ScalarValue::U32(x) => ScalarValue::U32(x),
        other => scalar_from_f64(other.kind(), other.to_f64().abs()),
      })
    }),
    B::Min => min(first, arg(1)?),
    B::Max => max(first, arg(1)?),
    B::Clamp => min(&max(first, arg(1)?)?, arg(2)?),
    B::Saturate => float_map(first, |x| x.clamp(0., 1.)),
    B::Sin => float_map(first, f64::sin),
    B::Cos => float_map(first, f64::cos),
    B::Tan => float_map(first, f64::tan),
    B::Sinh => float_map(first, f64::sinh),
    B::Cosh => float_map(first, f64::cosh),
    B::Tanh => float_map(first, f64::tanh),
    B::Asin => float_map(first, f64::asin),
    B::Acos => float_map(first, f64::acos),
    B::Atan => float_map(first, f64::atan),
    B::Atan2 => float_zip(first, arg(1)?, f64::atan2),
    B::Exp => float_map(first, f64::exp),
    B::Exp2 => float_map(first, f64::exp2),
    B::Log => float_map(first, f64::ln),
    B::Log2 => float_map(first, f64::log2),
    B::Pow => float_zip(first, arg(1)?, f64::powf),
    B::Sqrt => float_map(first, f64::sqrt),
    B::InverseSqrt => float_map(first, |x| 1. / x.sqrt()),
    B::Floor => float_map(first, f64::floor),
    B::Ceil => float_map(first, f64::ceil),
    B::Round => float_map(first, f64::round_ties_even),
    B::Fract => float_map(first, |x| x - x.floor()),
    B::Trunc => float_map(first, f64::trunc),
    B::Sign => map_components(first, |v| {
      let x = v.to_f64();
      Some(scalar_from_f64(v.kind(), if x > 0. { 1. } else if x < 0. { -1. } else { 0. }))
    }),
    B::Mix => {
      let t = arg(2)?;
      let one_minus = float_map(t, |x| 1. - x)?;
      let a = binary(BinaryOperator::Mul, first, &one_minus)?;
      let b = binary(BinaryOperator::Mul, arg(1)?, t)?;
      binary(BinaryOperator::Add, &a, &b)
    }
    B::Step => float_zip(first, arg(1)?, |edge, x| if x >= edge { 1. } else { 0. }),
    B::SmoothStep => {
      let (low, high, x) = (components_of(first)?, components_of(arg(1)?)?, components_of(arg(2)?)?);
      let result = low
        .iter()
        .zip(&high)
        .zip(&x)
        .map(|((l, h), x)| {
          let t = ((x.to_f64() - l.to_f64()) / (h.to_f64() - l.to_f64())).clamp(0., 1.);
          scalar_from_f64(kind, t * t * (3. - 2. * t))
        })
        .collect::<Components>();
      Some(match first {
        HostValue::Scalar(_) => HostValue::Scalar(*result.first()?),
        _ => HostValue::Vector(result),
      })
    }
    B::Fma => {
      let product = binary(BinaryOperator::Mul, first, arg(1)?)?;
      binary(BinaryOperator::Add, &product, arg(2)?)
    }
    B::Dot => dot(first, arg(1)?).map(HostValue::Scalar),
    B::Cross => {
      let (a, b) = (components_of(first)?, components_of(arg(1)?)?);
      let [ax, ay, az] = [a.first()?, a.get(1)?, a.get(2)?].map(|v| v.to_f64());
      let [bx, by, bz] = [b.first()?, b.get(1)?, b.get(2)?].map(|v| v.to_f64());
      Some(HostValue::Vector(
        [ay * bz - az * by, az * bx - ax * bz, ax * by - ay * bx]
          .into_iter()
          .map(|x| scalar_from_f64(kind, x))
          .collect(),
      ))
    }
    B::Length => Some(HostValue::Scalar(scalar_from_f64(kind, length(first)?))),
    B::Distance => {
      let difference = binary(BinaryOperator::Sub, first, arg(1)?)?;
      Some(HostValue::Scalar(scalar_from_f64(kind, length(&difference)?)))
    }
    B::Normalize => {
      let len = length(first)?;
      float_map(first, |x| x / len)
    }
    B::Reflect => {
      let (incident, normal) = (first, arg(1)?);
      let d = dot(normal, incident)?.to_f64();
      let scaled = float_map(normal, |x| 2. * d * x)?;
      binary(BinaryOperator::Sub, incident, &scaled)
    }
    B::Transpose => {
      let HostValue::Matrix(m) = first else {
        return None;
      };
      let rows = m.first()?.len();
      Some(HostValue::Matrix(
        (0..rows)
          .map(|r| m.iter().map(|column| column.get(r).copied()).collect::<Option<Components>>())
          .collect::<Option<Vec<_>>>()?,
      ))
    }
    B::Determinant => {
      let HostValue::Matrix(m) = first else {
        return None;
      };
      Some(HostValue::Scalar(scalar_from_f64(kind, determinant(&matrix_f64(m)))))
    }
    B::All | B::Any => {
      let components = components_of(first)?;
      let mut bools = components.iter().map(|v| matches!(v, ScalarValue::Bool(true)));
      let result = if function == B::All {
        bools.all(|b| b)
      } else {
        bools.any(|b| b)
      };
      Some(HostValue::from(result))
    }
    B::Select => {
      let (if_false, if_true, condition) = (first, arg(1)?, arg(2)?);
      match condition {
        HostValue::Scalar(ScalarValue::Bool(c)) => Some(if *c { if_true.clone() } else { if_false.clone() }),
        HostValue::Vector(c) => {
          let (f, t) = (components_of(if_false)?, components_of(if_true)?);
          Some(HostValue::Vector(
            c.iter()
              .zip(f.iter().zip(&t))
              .map(|(c, (f, t))| if matches!(c, ScalarValue::Bool(true)) { *t } else { *f })
              .collect(),
          ))
        }
        _ => None,
      }
    }
    B::Radians => float_map(first, f64::to_radians),
    B::Degrees => float_map(first, f64::to_degrees),
    B::ArrayLength => None,
  }
}

fn is_close_to(args: &[HostValue]) -> Option<HostValue> {
  let [a, b, precision] = args else {
    return None;
  };
  let precision = precision.as_scalar()?.to_f64();
  let (a, b) = (components_of(a)?, components_of(b)?);
  let close = a
    .iter()
    .zip(&b)
    .all(|(x, y)| (x.to_f64() - y.to_f64()).abs() <= precision);
  Some(HostValue::from(close))
}
