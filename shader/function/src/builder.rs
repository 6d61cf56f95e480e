use crate::*;

/// Values a builder operation accepts in place of a [`Node`]. Rust scalars
/// become literals.
pub trait IntoNode {
  fn into_node(self, builder: &mut FnBuilder<'_>) -> ShaderResult<Node>;
}

impl IntoNode for Node {
  fn into_node(self, _: &mut FnBuilder<'_>) -> ShaderResult<Node> {
    Ok(self)
  }
}

macro_rules! literal_into_node {
  ($($ty: ty),*) => {
    $(
      impl IntoNode for $ty {
        fn into_node(self, builder: &mut FnBuilder<'_>) -> ShaderResult<Node> {
          builder.lit(self)
        }
      }
    )*
  };
}

literal_into_node!(bool, half::f16, f32, i32, u32);

/// Records the body of one shader function.
///
/// Every operation is type checked when it is recorded. Non inlined value
/// expressions are bound in the block that is open at the time of the call,
/// so a node may only be used inside that block and the blocks nested in it.
pub struct FnBuilder<'a> {
  ctx: &'a mut TraceContext,
  function: ShaderFn,
  exprs: Vec<ExprEntry>,
  locals: Vec<LocalVar>,
  blocks: Vec<Block>,
  scopes: Vec<usize>,
  scope_counter: usize,
  loop_depth: usize,
  callees: Vec<FnId>,
  constants: Vec<usize>,
  bindings: Vec<BindingEntry>,
  helpers: Vec<Helper>,
}

const GLOBAL_SCOPE: usize = 0;

impl<'a> FnBuilder<'a> {
  pub(crate) fn new(ctx: &'a mut TraceContext, function: ShaderFn) -> Self {
    Self {
      ctx,
      function,
      exprs: Vec::new(),
      locals: Vec::new(),
      blocks: vec![Vec::new()],
      scopes: vec![1],
      scope_counter: 1,
      loop_depth: 0,
      callees: Vec::new(),
      constants: Vec::new(),
      bindings: Vec::new(),
      helpers: Vec::new(),
    }
  }

  fn unsupported(&self, construct: impl Into<String>) -> ShaderError {
    UnsupportedConstructError {
      construct: construct.into(),
      function: self.function.name().to_string(),
    }
    .into()
  }

  fn current_scope(&self) -> usize {
    self.scopes.last().copied().unwrap_or(GLOBAL_SCOPE)
  }

  fn push_statement(&mut self, statement: Statement) {
    if let Some(block) = self.blocks.last_mut() {
      block.push(statement);
    }
  }

  fn push_expr(&mut self, expr: ShaderNodeExpr, ty: TypeDescriptor, reference: Option<Reference>) -> Node {
    let global = matches!(
      expr,
      ShaderNodeExpr::Parameter(_)
        | ShaderNodeExpr::Literal(_)
        | ShaderNodeExpr::Constant(_)
        | ShaderNodeExpr::Binding { .. }
    );
    let inlined = expr.is_inlined(reference);
    let node = Node {
      owner: self.function.id(),
      index: self.exprs.len(),
    };
    self.exprs.push(ExprEntry {
      expr,
      ty,
      reference,
      scope: if global { GLOBAL_SCOPE } else { self.current_scope() },
    });
    if !inlined {
      self.push_statement(Statement::Emit(node));
    }
    node
  }

  /// Checks `node` belongs to this function and is visible from the open
  /// block.
  fn entry(&self, node: Node) -> ShaderResult<&ExprEntry> {
    if node.owner != self.function.id() {
      return Err(self.unsupported("node recorded by another function"));
    }
    let entry = self
      .exprs
      .get(node.index)
      .ok_or_else(|| self.unsupported("unknown node"))?;
    if entry.scope != GLOBAL_SCOPE && !self.scopes.contains(&entry.scope) {
      return Err(self.unsupported("value used outside of the block that defined it"));
    }
    Ok(entry)
  }

  /// The value of `node`, loading it first when it is a reference.
  fn value(&mut self, node: impl IntoNode) -> ShaderResult<Node> {
    let node = node.into_node(self)?;
    let entry = self.entry(node)?;
    if entry.reference.is_none() {
      return Ok(node);
    }
    let ty = entry.ty.clone();
    if !ty.is_sized() {
      return Err(self.unsupported(format!("load of runtime sized `{ty}`")));
    }
    if !ty.is_constructible() {
      return Err(self.unsupported(format!("load of `{ty}`")));
    }
    Ok(self.push_expr(ShaderNodeExpr::Load(node), ty, None))
  }

  pub(crate) fn parameters(&mut self) -> Vec<Node> {
    let params: Vec<_> = self.function.params().iter().map(|p| p.ty.clone()).collect();
    params
      .into_iter()
      .enumerate()
      .map(|(i, ty)| self.push_expr(ShaderNodeExpr::Parameter(i), ty, None))
      .collect()
  }

  pub fn function(&self) -> &ShaderFn {
    &self.function
  }

  pub fn return_type(&self) -> Option<&TypeDescriptor> {
    self.function.return_ty()
  }

  pub fn parameter_type(&self, index: usize) -> Option<&TypeDescriptor> {
    self.function.params().get(index).map(|p| &p.ty)
  }

  /// Value type of `node`, the store type for references.
  pub fn ty_of(&self, node: Node) -> ShaderResult<TypeDescriptor> {
    Ok(self.entry(node)?.ty.clone())
  }

  pub fn lit(&mut self, value: impl Into<ScalarValue>) -> ShaderResult<Node> {
    let value = value.into();
    if !value.is_finite() {
      return Err(self.unsupported(format!("non-finite literal {value:?}")));
    }
    Ok(self.push_expr(ShaderNodeExpr::Literal(value), scalar(value.kind()), None))
  }

  /// A module scope constant. Equal `(descriptor, value)` pairs from any
  /// function share one declaration.
  pub fn constant(&mut self, value: impl Into<HostValue>, ty: &TypeDescriptor) -> ShaderResult<Node> {
    self.constant_impl(None, value.into(), ty)
  }

  pub fn named_constant(
    &mut self,
    label: impl Into<String>,
    value: impl Into<HostValue>,
    ty: &TypeDescriptor,
  ) -> ShaderResult<Node> {
    self.constant_impl(Some(label.into()), value.into(), ty)
  }

  fn constant_impl(&mut self, label: Option<String>, value: HostValue, ty: &TypeDescriptor) -> ShaderResult<Node> {
    if !ty.is_constructible() {
      return Err(self.unsupported(format!("constant of type `{ty}`")));
    }
    if !host_value_is_finite(&value) {
      return Err(self.unsupported("non-finite constant"));
    }
    let id = self.ctx.intern_constant(label, ty, &value)?;
    if !self.constants.contains(&id) {
      self.constants.push(id);
    }
    Ok(self.push_expr(ShaderNodeExpr::Constant(id), ty.clone(), None))
  }

  pub fn zeroed(&mut self, ty: &TypeDescriptor) -> ShaderResult<Node> {
    if !ty.is_constructible() {
      return Err(self.unsupported(format!("zero value of `{ty}`")));
    }
    Ok(self.push_expr(ShaderNodeExpr::Zeroed, ty.clone(), None))
  }

  /// Value constructor `ty(args...)`. No arguments give the zero value.
  pub fn construct(&mut self, ty: &TypeDescriptor, args: &[Node]) -> ShaderResult<Node> {
    if args.is_empty() {
      return self.zeroed(ty);
    }
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
      values.push(self.value(*arg)?);
    }
    let arg_types = values
      .iter()
      .map(|v| self.ty_of(*v))
      .collect::<ShaderResult<Vec<_>>>()?;

    let valid = match ty {
      TypeDescriptor::Scalar(_) if values.len() == 1 => {
        return self.convert(values[0], ty);
      }
      TypeDescriptor::Scalar(_) => false,
      TypeDescriptor::Vector { kind, width } => {
        let mut count = 0;
        let components_ok = arg_types.iter().all(|a| match a {
          TypeDescriptor::Scalar(k) if k == kind => {
            count += 1;
            true
          }
          TypeDescriptor::Vector { kind: k, width: w } if k == kind => {
            count += w.count();
            true
          }
          _ => false,
        });
        components_ok && (count == width.count() || (values.len() == 1 && count == 1))
      }
      TypeDescriptor::Matrix {
        kind,
        columns,
        rows,
      } => {
        let column = vec(*kind, *rows);
        let by_columns = values.len() == columns.count() && arg_types.iter().all(|a| *a == column);
        let by_scalars =
          values.len() == columns.count() * rows.count() && arg_types.iter().all(|a| *a == scalar(*kind));
        by_columns || by_scalars
      }
      TypeDescriptor::Array(array) => {
        array.length == ArrayLength::Fixed(values.len()) && arg_types.iter().all(|a| *a == array.element)
      }
      TypeDescriptor::Struct(s) => {
        s.fields.len() == values.len() && s.fields.iter().zip(&arg_types).all(|(f, a)| f.ty == *a)
      }
      TypeDescriptor::Atomic(_) => false,
    };
    if !valid || !ty.is_constructible() {
      let found = arg_types.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ");
      return Err(self.unsupported(format!("construction of `{ty}` from ({found})")));
    }
    Ok(self.push_expr(ShaderNodeExpr::Compose { parameters: values }, ty.clone(), None))
  }

  /// Conversion between scalars or same width vectors of another kind.
  pub fn convert(&mut self, source: impl IntoNode, ty: &TypeDescriptor) -> ShaderResult<Node> {
    let source = self.value(source)?;
    let from = self.ty_of(source)?;
    let valid = match (&from, ty) {
      (TypeDescriptor::Scalar(_), TypeDescriptor::Scalar(_)) => true,
      (TypeDescriptor::Vector { width, .. }, TypeDescriptor::Vector { width: target, .. }) => width == target,
      _ => false,
    };
    if !valid {
      return Err(self.unsupported(format!("conversion from `{from}` to `{ty}`")));
    }
    if from == *ty {
      return Ok(source);
    }
    Ok(self.push_expr(ShaderNodeExpr::Convert { source }, ty.clone(), None))
  }

  fn declare(&mut self, name: Option<String>, ty: TypeDescriptor, init: Option<Node>) -> ShaderResult<Node> {
    if !ty.is_constructible() {
      return Err(self.unsupported(format!("local variable of type `{ty}`")));
    }
    let local = LocalId(self.locals.len());
    self.locals.push(LocalVar {
      name,
      ty: ty.clone(),
    });
    self.push_statement(Statement::Declare { local, init });
    Ok(self.push_expr(
      ShaderNodeExpr::Local(local),
      ty,
      Some(Reference {
        access: ReferenceAccess::ReadWrite,
        root: ReferenceRoot::Local,
      }),
    ))
  }

  /// Function scope variable initialised with `init`, returned as a
  /// writable reference.
  pub fn var(&mut self, init: impl IntoNode) -> ShaderResult<Node> {
    let init = self.value(init)?;
    let ty = self.ty_of(init)?;
    self.declare(None, ty, Some(init))
  }

  pub fn var_named(&mut self, name: impl Into<String>, init: impl IntoNode) -> ShaderResult<Node> {
    let init = self.value(init)?;
    let ty = self.ty_of(init)?;
    self.declare(Some(name.into()), ty, Some(init))
  }

  pub fn var_zeroed(&mut self, ty: &TypeDescriptor) -> ShaderResult<Node> {
    self.declare(None, ty.clone(), None)
  }

  /// Current value behind a reference.
  pub fn load(&mut self, reference: Node) -> ShaderResult<Node> {
    let entry = self.entry(reference)?;
    if entry.reference.is_none() {
      let ty = entry.ty.clone();
      return Err(self.unsupported(format!("load from the `{ty}` value, which is not a reference")));
    }
    self.value(reference)
  }

  pub fn store(&mut self, target: Node, value: impl IntoNode) -> ShaderResult<()> {
    let entry = self.entry(target)?;
    let target_ty = entry.ty.clone();
    match entry.reference {
      Some(Reference {
        access: ReferenceAccess::ReadWrite,
        ..
      }) => {}
      Some(_) => return Err(self.unsupported(format!("store into read only `{target_ty}`"))),
      None => return Err(self.unsupported(format!("store into the `{target_ty}` value"))),
    }
    if !target_ty.is_constructible() {
      return Err(self.unsupported(format!("store into `{target_ty}`")));
    }
    let value = self.value(value)?;
    let value_ty = self.ty_of(value)?;
    if value_ty != target_ty {
      return Err(self.unsupported(format!("store of `{value_ty}` into `{target_ty}`")));
    }
    self.push_statement(Statement::Store { target, value });
    Ok(())
  }

  pub fn binary(&mut self, op: BinaryOperator, left: impl IntoNode, right: impl IntoNode) -> ShaderResult<Node> {
    let left = self.value(left)?;
    let right = self.value(right)?;
    let (left_ty, right_ty) = (self.ty_of(left)?, self.ty_of(right)?);
    let Some(ty) = op.result_type(&left_ty, &right_ty) else {
      return Err(self.unsupported(format!(
        "operator `{}` on `{left_ty}` and `{right_ty}`",
        op.wgsl_token()
      )));
    };
    Ok(self.push_expr(ShaderNodeExpr::Binary { op, left, right }, ty, None))
  }

  pub fn unary(&mut self, op: UnaryOperator, operand: impl IntoNode) -> ShaderResult<Node> {
    let operand = self.value(operand)?;
    let operand_ty = self.ty_of(operand)?;
    let Some(ty) = op.result_type(&operand_ty) else {
      return Err(self.unsupported(format!("operator `{}` on `{operand_ty}`", op.wgsl_token())));
    };
    Ok(self.push_expr(ShaderNodeExpr::Unary { op, operand }, ty, None))
  }

  pub fn add(&mut self, a: impl IntoNode, b: impl IntoNode) -> ShaderResult<Node> {
    self.binary(BinaryOperator::Add, a, b)
  }
  pub fn sub(&mut self, a: impl IntoNode, b: impl IntoNode) -> ShaderResult<Node> {
    self.binary(BinaryOperator::Sub, a, b)
  }
  pub fn mul(&mut self, a: impl IntoNode, b: impl IntoNode) -> ShaderResult<Node> {
    self.binary(BinaryOperator::Mul, a, b)
  }
  pub fn div(&mut self, a: impl IntoNode, b: impl IntoNode) -> ShaderResult<Node> {
    self.binary(BinaryOperator::Div, a, b)
  }
  pub fn rem(&mut self, a: impl IntoNode, b: impl IntoNode) -> ShaderResult<Node> {
    self.binary(BinaryOperator::Rem, a, b)
  }
  pub fn eq(&mut self, a: impl IntoNode, b: impl IntoNode) -> ShaderResult<Node> {
    self.binary(BinaryOperator::Equal, a, b)
  }
  pub fn ne(&mut self, a: impl IntoNode, b: impl IntoNode) -> ShaderResult<Node> {
    self.binary(BinaryOperator::NotEqual, a, b)
  }
  pub fn lt(&mut self, a: impl IntoNode, b: impl IntoNode) -> ShaderResult<Node> {
    self.binary(BinaryOperator::Less, a, b)
  }
  pub fn le(&mut self, a: impl IntoNode, b: impl IntoNode) -> ShaderResult<Node> {
    self.binary(BinaryOperator::LessEqual, a, b)
  }
  pub fn gt(&mut self, a: impl IntoNode, b: impl IntoNode) -> ShaderResult<Node> {
    self.binary(BinaryOperator::Greater, a, b)
  }
  pub fn ge(&mut self, a: impl IntoNode, b: impl IntoNode) -> ShaderResult<Node> {
    self.binary(BinaryOperator::GreaterEqual, a, b)
  }
  pub fn and(&mut self, a: impl IntoNode, b: impl IntoNode) -> ShaderResult<Node> {
    self.binary(BinaryOperator::LogicalAnd, a, b)
  }
  pub fn or(&mut self, a: impl IntoNode, b: impl IntoNode) -> ShaderResult<Node> {
    self.binary(BinaryOperator::LogicalOr, a, b)
  }
  pub fn bit_and(&mut self, a: impl IntoNode, b: impl IntoNode) -> ShaderResult<Node> {
    self.binary(BinaryOperator::BitAnd, a, b)
  }
  pub fn bit_or(&mut self, a: impl IntoNode, b: impl IntoNode) -> ShaderResult<Node> {
    self.binary(BinaryOperator::BitOr, a, b)
  }
  pub fn bit_xor(&mut self, a: impl IntoNode, b: impl IntoNode) -> ShaderResult<Node> {
    self.binary(BinaryOperator::BitXor, a, b)
  }
  pub fn shl(&mut self, a: impl IntoNode, b: impl IntoNode) -> ShaderResult<Node> {
    self.binary(BinaryOperator::ShiftLeft, a, b)
  }
  pub fn shr(&mut self, a: impl IntoNode, b: impl IntoNode) -> ShaderResult<Node> {
    self.binary(BinaryOperator::ShiftRight, a, b)
  }
  pub fn neg(&mut self, a: impl IntoNode) -> ShaderResult<Node> {
    self.unary(UnaryOperator::Neg, a)
  }
  pub fn not(&mut self, a: impl IntoNode) -> ShaderResult<Node> {
    self.unary(UnaryOperator::Not, a)
  }
  pub fn bit_not(&mut self, a: impl IntoNode) -> ShaderResult<Node> {
    self.unary(UnaryOperator::BitNot, a)
  }

  /// Struct member access. On vectors the name is read as a swizzle.
  pub fn field(&mut self, base: Node, name: &str) -> ShaderResult<Node> {
    let entry = self.entry(base)?;
    let (ty, reference) = (entry.ty.clone(), entry.reference);
    if let TypeDescriptor::Vector { .. } = ty {
      return self.swizzle(base, name);
    }
    let Some((field_index, field)) = ty.as_struct().and_then(|s| s.field(name)) else {
      return Err(self.unsupported(format!("member `.{name}` of `{ty}`")));
    };
    let field_ty = field.ty.clone();
    Ok(self.push_expr(ShaderNodeExpr::FieldGet { base, field_index }, field_ty, reference))
  }

  /// Element access. Array and matrix values only accept literal indices,
  /// references and vectors accept any integer scalar.
  pub fn index(&mut self, base: Node, index: impl IntoNode) -> ShaderResult<Node> {
    let index = self.value(index)?;
    let index_entry = self.entry(index)?;
    let literal = match index_entry.expr {
      ShaderNodeExpr::Literal(ScalarValue::U32(v)) => Some(v as i64),
      ShaderNodeExpr::Literal(ScalarValue::I32(v)) => Some(v as i64),
      _ => None,
    };
    let index_ty = index_entry.ty.clone();
    if !matches!(index_ty, TypeDescriptor::Scalar(k) if k.is_integer()) {
      return Err(self.unsupported(format!("index of type `{index_ty}`")));
    }

    let entry = self.entry(base)?;
    let (ty, reference) = (entry.ty.clone(), entry.reference);
    let (element, bound, dynamic_value_ok) = match &ty {
      TypeDescriptor::Vector { kind, width } => (scalar(*kind), Some(width.count()), true),
      TypeDescriptor::Matrix {
        kind,
        columns,
        rows,
      } => (vec(*kind, *rows), Some(columns.count()), false),
      TypeDescriptor::Array(array) => (
        array.element.clone(),
        match array.length {
          ArrayLength::Fixed(n) => Some(n),
          ArrayLength::Runtime => None,
        },
        false,
      ),
      _ => return Err(self.unsupported(format!("indexing into `{ty}`"))),
    };
    if let (Some(literal), Some(bound)) = (literal, bound) {
      if literal < 0 || literal as usize >= bound {
        return Err(self.unsupported(format!("index {literal} out of bounds for `{ty}`")));
      }
    }
    if reference.is_none() && !dynamic_value_ok && literal.is_none() {
      return Err(self.unsupported(format!("dynamic index into the `{ty}` value")));
    }
    Ok(self.push_expr(ShaderNodeExpr::IndexGet { base, index }, element, reference))
  }

  /// Vector swizzle from `xyzw` or `rgba` letters, one to four components.
  pub fn swizzle(&mut self, base: Node, pattern: &str) -> ShaderResult<Node> {
    let entry = self.entry(base)?;
    let (ty, reference) = (entry.ty.clone(), entry.reference);
    let TypeDescriptor::Vector { kind, width } = ty else {
      return Err(self.unsupported(format!("swizzle `.{pattern}` of `{ty}`")));
    };
    let components = parse_swizzle(pattern, width.count());
    let Some(components) = components else {
      return Err(self.unsupported(format!("swizzle `.{pattern}` of `{ty}`")));
    };

    if components.len() == 1 {
      return Ok(self.push_expr(
        ShaderNodeExpr::Swizzle {
          source: base,
          components,
        },
        scalar(kind),
        reference,
      ));
    }
    let source = self.value(base)?;
    let result_width = VectorWidth::from_count(components.len())
      .ok_or_else(|| self.unsupported(format!("swizzle `.{pattern}`")))?;
    Ok(self.push_expr(
      ShaderNodeExpr::Swizzle { source, components },
      vec(kind, result_width),
      None,
    ))
  }

  /// Calls another shader function and returns its result.
  pub fn call(&mut self, callee: &ShaderFn, args: &[Node]) -> ShaderResult<Node> {
    let parameters = self.prepare_call(callee, args)?;
    let Some(ty) = callee.return_ty().cloned() else {
      return Err(self.unsupported(format!("value of `{}`, which returns nothing", callee.name())));
    };
    Ok(self.push_expr(
      ShaderNodeExpr::FunctionCall {
        callee: callee.id(),
        parameters,
      },
      ty,
      None,
    ))
  }

  /// Calls another shader function as a statement, discarding any result.
  pub fn call_void(&mut self, callee: &ShaderFn, args: &[Node]) -> ShaderResult<()> {
    let parameters = self.prepare_call(callee, args)?;
    self.push_statement(Statement::CallVoid {
      callee: callee.id(),
      parameters,
    });
    Ok(())
  }

  fn prepare_call(&mut self, callee: &ShaderFn, args: &[Node]) -> ShaderResult<Vec<Node>> {
    if callee.stage().is_some() {
      return Err(self.unsupported(format!("call to entry point `{}`", callee.name())));
    }
    if args.len() != callee.params().len() {
      return Err(
        GraphError::ArgumentCount {
          function: callee.name().to_string(),
          expected: callee.params().len(),
          found: args.len(),
        }
        .into(),
      );
    }
    let mut parameters = Vec::with_capacity(args.len());
    for (arg, param) in args.iter().zip(callee.params()) {
      let value = self.value(*arg)?;
      let ty = self.ty_of(value)?;
      if ty != param.ty {
        return Err(
          GraphError::ArgumentType {
            function: callee.name().to_string(),
            parameter: param.name.clone(),
            expected: param.ty.to_string(),
            found: ty.to_string(),
          }
          .into(),
        );
      }
      parameters.push(value);
    }

    self.ctx.trace(callee)?;
    if !self.callees.contains(&callee.id()) {
      self.callees.push(callee.id());
    }
    Ok(parameters)
  }

  /// Standard library call.
  pub fn std(&mut self, function: BuiltinFunction, args: &[Node]) -> ShaderResult<Node> {
    let mut parameters = Vec::with_capacity(args.len());
    for arg in args {
      let node = if function == BuiltinFunction::ArrayLength {
        let entry = self.entry(*arg)?;
        if entry.reference.is_none() {
          return Err(self.unsupported("arrayLength of a value, it needs a reference"));
        }
        *arg
      } else {
        self.value(*arg)?
      };
      parameters.push(node);
    }
    let arg_types = parameters
      .iter()
      .map(|p| self.ty_of(*p))
      .collect::<ShaderResult<Vec<_>>>()?;
    let Some(ty) = function.result_type(&arg_types) else {
      let found = arg_types.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ");
      return Err(self.unsupported(format!("`{}` on ({found})", function.wgsl_name())));
    };
    Ok(self.push_expr(ShaderNodeExpr::BuiltinCall { function, parameters }, ty, None))
  }

  /// Component wise `|a - b| <= precision`, true when every component is.
  pub fn is_close_to(&mut self, a: impl IntoNode, b: impl IntoNode, precision: impl IntoNode) -> ShaderResult<Node> {
    let a = self.value(a)?;
    let b = self.value(b)?;
    let precision = self.value(precision)?;
    let ty = self.ty_of(a)?;
    let helper = Helper::IsCloseTo(ty.clone());
    let expected = helper.parameter_types();
    let found = [ty.clone(), self.ty_of(b)?, self.ty_of(precision)?];
    let float = ty.scalar_kind().is_some_and(|k| k.is_float()) && !matches!(ty, TypeDescriptor::Matrix { .. });
    if !float || expected.as_slice() != found.as_slice() {
      let found = found.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ");
      return Err(self.unsupported(format!("`isCloseTo` on ({found})")));
    }
    if !self.helpers.contains(&helper) {
      self.helpers.push(helper.clone());
    }
    Ok(self.push_expr(
      ShaderNodeExpr::HelperCall {
        helper,
        parameters: vec![a, b, precision],
      },
      BOOL,
      None,
    ))
  }

  /// Reference to a buffer binding. The resolver checks it against the
  /// module binding table.
  pub fn binding(&mut self, entry: &BindingEntry) -> ShaderResult<Node> {
    if !self.bindings.contains(entry) {
      self.bindings.push(entry.clone());
    }
    Ok(self.push_expr(
      ShaderNodeExpr::Binding {
        group: entry.group,
        binding: entry.binding,
      },
      entry.ty.clone(),
      Some(Reference {
        access: entry.access.reference_access(),
        root: ReferenceRoot::Binding,
      }),
    ))
  }

  fn scoped(&mut self, logic: impl FnOnce(&mut Self) -> ShaderResult<()>) -> ShaderResult<Block> {
    self.scope_counter += 1;
    self.scopes.push(self.scope_counter);
    self.blocks.push(Vec::new());
    let result = logic(self);
    self.scopes.pop();
    let block = self.blocks.pop().unwrap_or_default();
    result.map(|_| block)
  }

  fn condition(&mut self, condition: impl IntoNode) -> ShaderResult<Node> {
    let condition = self.value(condition)?;
    let ty = self.ty_of(condition)?;
    if ty != BOOL {
      return Err(self.unsupported(format!("condition of type `{ty}`")));
    }
    Ok(condition)
  }

  pub fn if_by(
    &mut self,
    condition: impl IntoNode,
    logic: impl FnOnce(&mut Self) -> ShaderResult<()>,
  ) -> ShaderResult<()> {
    self.if_by_else(condition, logic, |_| Ok(()))
  }

  pub fn if_by_else(
    &mut self,
    condition: impl IntoNode,
    accept: impl FnOnce(&mut Self) -> ShaderResult<()>,
    reject: impl FnOnce(&mut Self) -> ShaderResult<()>,
  ) -> ShaderResult<()> {
    let condition = self.condition(condition)?;
    let accept = self.scoped(accept)?;
    let reject = self.scoped(reject)?;
    self.push_statement(Statement::If {
      condition,
      accept,
      reject,
    });
    Ok(())
  }

  /// Unconditional loop, left through `break_by` or a return.
  pub fn loop_by(&mut self, logic: impl FnOnce(&mut Self) -> ShaderResult<()>) -> ShaderResult<()> {
    self.loop_depth += 1;
    let body = self.scoped(logic);
    self.loop_depth -= 1;
    let body = body?;
    self.push_statement(Statement::Loop { body });
    Ok(())
  }

  /// Counts from `start` up to, not including, `end`. The closure receives
  /// the current counter value.
  pub fn for_by(
    &mut self,
    start: impl IntoNode,
    end: impl IntoNode,
    logic: impl FnOnce(&mut Self, Node) -> ShaderResult<()>,
  ) -> ShaderResult<()> {
    let start = self.value(start)?;
    let end = self.value(end)?;
    let ty = self.ty_of(start)?;
    let end_ty = self.ty_of(end)?;
    if ty != end_ty || !matches!(ty, TypeDescriptor::Scalar(k) if k.is_integer()) {
      return Err(self.unsupported(format!("for range from `{ty}` to `{end_ty}`")));
    }
    let counter = LocalId(self.locals.len());
    self.locals.push(LocalVar {
      name: None,
      ty: ty.clone(),
    });

    self.loop_depth += 1;
    let body = self.scoped(|builder| {
      let local = builder.push_expr(
        ShaderNodeExpr::Local(counter),
        ty,
        Some(Reference {
          access: ReferenceAccess::Read,
          root: ReferenceRoot::Local,
        }),
      );
      let current = builder.value(local)?;
      logic(builder, current)
    });
    self.loop_depth -= 1;
    let body = body?;

    self.push_statement(Statement::ForRange {
      counter,
      start,
      end,
      body,
    });
    Ok(())
  }

  pub fn break_by(&mut self) -> ShaderResult<()> {
    if self.loop_depth == 0 {
      return Err(self.unsupported("`break` outside of a loop"));
    }
    self.push_statement(Statement::Break);
    Ok(())
  }

  pub fn continue_by(&mut self) -> ShaderResult<()> {
    if self.loop_depth == 0 {
      return Err(self.unsupported("`continue` outside of a loop"));
    }
    self.push_statement(Statement::Continue);
    Ok(())
  }

  pub fn return_by(&mut self, value: Option<Node>) -> ShaderResult<()> {
    let value = value.map(|v| self.value(v)).transpose()?;
    let found = value.map(|v| self.ty_of(v)).transpose()?;
    if found.as_ref() != self.function.return_ty() {
      return Err(
        GraphError::ReturnType {
          function: self.function.name().to_string(),
          expected: describe_return(self.function.return_ty()),
          found: describe_return(found.as_ref()),
        }
        .into(),
      );
    }
    self.push_statement(Statement::Return(value));
    Ok(())
  }

  /// Ends the fragment invocation.
  pub fn discard(&mut self) -> ShaderResult<()> {
    if self.function.stage() != Some(EntryStage::Fragment) {
      return Err(self.unsupported("`discard` outside of a fragment entry point"));
    }
    self.push_statement(Statement::Discard);
    Ok(())
  }

  pub(crate) fn finish(mut self, returned: Option<Node>) -> ShaderResult<TracedFn> {
    if let Some(value) = returned {
      self.return_by(Some(value))?;
    }
    let body = self.blocks.pop().unwrap_or_default();
    if self.function.return_ty().is_some() && !block_returns(&body) {
      return Err(
        GraphError::ReturnType {
          function: self.function.name().to_string(),
          expected: describe_return(self.function.return_ty()),
          found: describe_return(None),
        }
        .into(),
      );
    }
    Ok(TracedFn {
      function: self.function,
      exprs: self.exprs,
      locals: self.locals,
      body: TracedBody::Recorded(body),
      callees: self.callees,
      constants: self.constants,
      bindings: self.bindings,
      helpers: self.helpers,
    })
  }
}

fn describe_return(ty: Option<&TypeDescriptor>) -> String {
  ty.map(|t| t.to_string()).unwrap_or_else(|| String::from("nothing"))
}

fn block_returns(block: &Block) -> bool {
  match block.last() {
    Some(Statement::Return(_)) => true,
    Some(Statement::If { accept, reject, .. }) => block_returns(accept) && block_returns(reject),
    // only a return leaves a loop without a break of its own
    Some(Statement::Loop { body }) => !breaks_out(body),
    _ => false,
  }
}

/// Whether `block` holds a `break` targeting the enclosing loop. Breaks in
/// nested loops target those loops instead.
fn breaks_out(block: &Block) -> bool {
  block.iter().any(|statement| match statement {
    Statement::Break => true,
    Statement::If { accept, reject, .. } => breaks_out(accept) || breaks_out(reject),
    _ => false,
  })
}

fn parse_swizzle(pattern: &str, width: usize) -> Option<SmallVec<[u8; 4]>> {
  const SETS: [&[u8; 4]; 2] = [b"xyzw", b"rgba"];
  if pattern.is_empty() || pattern.len() > 4 {
    return None;
  }
  SETS.iter().find_map(|set| {
    pattern
      .bytes()
      .map(|c| {
        set
          .iter()
          .position(|s| *s == c)
          .filter(|i| *i < width)
          .map(|i| i as u8)
      })
      .collect::<Option<SmallVec<[u8; 4]>>>()
  })
}

fn host_value_is_finite(value: &HostValue) -> bool {
  match value {
    HostValue::Scalar(v) => v.is_finite(),
    HostValue::Vector(c) => c.iter().all(|v| v.is_finite()),
    HostValue::Matrix(columns) => columns.iter().flatten().all(|v| v.is_finite()),
    HostValue::Array(elements) => elements.iter().all(host_value_is_finite),
    HostValue::Struct(fields) => fields.iter().all(|(_, v)| host_value_is_finite(v)),
  }
}
