use crate::*;

/// Resolved identifiers of every module scope declaration.
#[derive(Default)]
pub struct ModuleNames {
  pub types: FastHashMap<TypeDescriptor, String>,
  pub constants: FastHashMap<usize, String>,
  pub bindings: FastHashMap<(u32, u32), String>,
  pub helpers: FastHashMap<Helper, String>,
  pub functions: FastHashMap<FnId, String>,
}

impl ModuleNames {
  pub fn type_name(&self, ty: &TypeDescriptor) -> String {
    match ty {
      TypeDescriptor::Struct(s) => match self.types.get(ty) {
        Some(name) => name.clone(),
        None => s
          .label
          .as_deref()
          .map(sanitize_identifier)
          .unwrap_or_else(|| String::from("Struct")),
      },
      TypeDescriptor::Array(array) => match array.length {
        ArrayLength::Fixed(n) => format!("array<{}, {n}>", self.type_name(&array.element)),
        ArrayLength::Runtime => format!("array<{}>", self.type_name(&array.element)),
      },
      _ => ty.to_string(),
    }
  }
}

pub fn gen_literal(value: ScalarValue) -> String {
  match value {
    ScalarValue::Bool(v) => v.to_string(),
    ScalarValue::F16(v) => wrap_negative(format!("{:?}h", v.to_f32())),
    ScalarValue::F32(v) => wrap_negative(format!("{v:?}f")),
    ScalarValue::I32(i32::MIN) => String::from("(-2147483647i - 1i)"),
    ScalarValue::I32(v) => wrap_negative(format!("{v}i")),
    ScalarValue::U32(v) => format!("{v}u"),
  }
}

fn wrap_negative(literal: String) -> String {
  if literal.starts_with('-') {
    format!("({literal})")
  } else {
    literal
  }
}

/// Const expression spelling of a host value.
pub fn gen_value(value: &HostValue, ty: &TypeDescriptor, names: &ModuleNames) -> String {
  match (value, ty) {
    (HostValue::Scalar(v), _) => gen_literal(*v),
    (HostValue::Vector(components), _) => format!(
      "{ty}({})",
      components.iter().map(|c| gen_literal(*c)).collect::<Vec<_>>().join(", ")
    ),
    (HostValue::Matrix(columns), TypeDescriptor::Matrix { kind, rows, .. }) => {
      let column_ty = vec(*kind, *rows);
      let columns = columns
        .iter()
        .map(|c| gen_value(&HostValue::Vector(c.clone()), &column_ty, names))
        .collect::<Vec<_>>();
      format!("{ty}({})", columns.join(", "))
    }
    (HostValue::Array(elements), TypeDescriptor::Array(array)) => format!(
      "{}({})",
      names.type_name(ty),
      elements
        .iter()
        .map(|e| gen_value(e, &array.element, names))
        .collect::<Vec<_>>()
        .join(", ")
    ),
    (HostValue::Struct(_), TypeDescriptor::Struct(s)) => format!(
      "{}({})",
      names.type_name(ty),
      s.fields
        .iter()
        .map(|f| match value.field(&f.name) {
          Some(v) => gen_value(v, &f.ty, names),
          None => format!("{}()", names.type_name(&f.ty)),
        })
        .collect::<Vec<_>>()
        .join(", ")
    ),
    _ => format!("{}()", names.type_name(ty)),
  }
}

pub fn gen_struct(name: &str, s: &StructDescriptor, names: &ModuleNames) -> String {
  let mut builder = CodeBuilder::default();
  builder.write_ln(format!("struct {name} {{")).tab();
  for field in &s.fields {
    let mut attributes = String::new();
    if let Some(align) = field.attributes.align {
      attributes += &format!("@align({align}) ");
    }
    if let Some(size) = field.attributes.size {
      attributes += &format!("@size({size}) ");
    }
    match field.attributes.io {
      Some(IoAttribute::Location(location)) => {
        attributes += &format!("@location({location}) ");
        if field.ty.scalar_kind().is_some_and(|k| k.is_integer()) {
          attributes += "@interpolate(flat) ";
        }
      }
      Some(IoAttribute::Builtin(builtin)) => {
        attributes += &format!("@builtin({}) ", builtin.wgsl_name());
      }
      None => {}
    }
    builder.write_ln(format!(
      "{attributes}{}: {},",
      field.name,
      names.type_name(&field.ty)
    ));
  }
  builder.un_tab().write_ln("}");
  builder.output()
}

pub fn gen_binding(name: &str, entry: &BindingEntry, names: &ModuleNames) -> String {
  format!(
    "@group({}) @binding({}) var<{}> {name}: {};\n",
    entry.group,
    entry.binding,
    entry.access.wgsl_address_space(),
    names.type_name(&entry.ty)
  )
}

pub fn gen_constant(name: &str, constant: &ModuleConstant, names: &ModuleNames) -> String {
  format!(
    "const {name}: {} = {};\n",
    names.type_name(&constant.ty),
    gen_value(&constant.value, &constant.ty, names)
  )
}

pub fn gen_helper(name: &str, helper: &Helper, names: &ModuleNames) -> String {
  let params = helper
    .parameter_names()
    .iter()
    .zip(helper.parameter_types())
    .map(|(n, ty)| format!("{n}: {}", names.type_name(&ty)))
    .collect::<Vec<_>>()
    .join(", ");
  format!(
    "fn {name}({params}) -> {} {}\n",
    names.type_name(&helper.return_type()),
    helper.wgsl_body()
  )
}

/// Replaces whole identifier tokens found in `replacements`, leaving member
/// accesses (`a.name`) untouched.
pub fn replace_identifiers(source: &str, replacements: &FastHashMap<String, String>) -> String {
  let mut output = String::with_capacity(source.len());
  let mut chars = source.char_indices().peekable();
  let mut previous_significant = None;
  while let Some((start, c)) = chars.next() {
    if c.is_ascii_alphabetic() || c == '_' {
      let mut end = start + c.len_utf8();
      while let Some((i, next)) = chars.peek() {
        if next.is_ascii_alphanumeric() || *next == '_' {
          end = i + next.len_utf8();
          chars.next();
        } else {
          break;
        }
      }
      let token = &source[start..end];
      match replacements.get(token) {
        Some(replacement) if previous_significant != Some('.') => output.push_str(replacement),
        _ => output.push_str(token),
      }
      previous_significant = Some('a');
    } else {
      output.push(c);
      if !c.is_whitespace() {
        previous_significant = Some(c);
      }
    }
  }
  output
}

/// Emits one traced function.
pub fn gen_function(traced: &TracedFn, identifier: &str, names: &ModuleNames, scope: NameRegistry) -> String {
  let function = &traced.function;
  let mut builder = CodeBuilder::default();
  if let Some(stage) = function.stage() {
    builder.write_ln(stage.wgsl_attribute());
  }

  match &traced.body {
    TracedBody::Wgsl(body) => {
      let replacements: FastHashMap<String, String> = match function.implementation() {
        FnImplementation::Wgsl { externals, .. } => externals
          .iter()
          .filter_map(|(name, f)| Some((name.clone(), names.functions.get(&f.id())?.clone())))
          .collect(),
        FnImplementation::Traced(_) => FastHashMap::default(),
      };
      let params = function
        .params()
        .iter()
        .map(|p| format!("{}: {}", p.name, names.type_name(&p.ty)))
        .collect::<Vec<_>>();
      builder.write_ln(format!(
        "fn {identifier}({}){} {}",
        params.join(", "),
        gen_return(function, names),
        replace_identifiers(body.trim(), &replacements)
      ));
    }
    TracedBody::Recorded(body) => {
      let mut emitter = FnEmitter::new(traced, names, scope);
      let params = function
        .params()
        .iter()
        .zip(&emitter.params)
        .map(|(p, name)| format!("{name}: {}", names.type_name(&p.ty)))
        .collect::<Vec<_>>();
      builder.write_ln(format!(
        "fn {identifier}({}){} {{",
        params.join(", "),
        gen_return(function, names)
      ));
      builder.tab();
      emitter.gen_block(body, &mut builder);
      if let Some(ty) = function.return_ty() {
        // unreachable, a trailing loop must not read as falling off the end
        if !ends_in_return(body) {
          builder.write_ln(format!("return {}();", names.type_name(ty)));
        }
      }
      builder.un_tab().write_ln("}");
    }
  }
  builder.output()
}

fn ends_in_return(block: &Block) -> bool {
  match block.last() {
    Some(Statement::Return(_)) => true,
    Some(Statement::If { accept, reject, .. }) => ends_in_return(accept) && ends_in_return(reject),
    _ => false,
  }
}

fn gen_return(function: &ShaderFn, names: &ModuleNames) -> String {
  match function.return_ty() {
    None => String::new(),
    Some(ty) if function.stage() == Some(EntryStage::Fragment) && ty.as_struct().is_none() => {
      format!(" -> @location(0) {}", names.type_name(ty))
    }
    Some(ty) => format!(" -> {}", names.type_name(ty)),
  }
}

struct FnEmitter<'a> {
  traced: &'a TracedFn,
  names: &'a ModuleNames,
  scope: NameRegistry,
  params: Vec<String>,
  locals: Vec<String>,
  bound: Vec<Option<String>>,
  counter: usize,
}

impl<'a> FnEmitter<'a> {
  fn new(traced: &'a TracedFn, names: &'a ModuleNames, mut scope: NameRegistry) -> Self {
    let params = traced
      .function
      .params()
      .iter()
      .map(|p| scope.make_unique_label(&p.name))
      .collect();
    let mut emitter = Self {
      traced,
      names,
      scope,
      params,
      locals: Vec::new(),
      bound: vec![None; traced.exprs.len()],
      counter: 0,
    };
    for local in &traced.locals {
      let name = match &local.name {
        Some(name) => emitter.scope.make_unique_label(name),
        None => emitter.create_new_unique_name(),
      };
      emitter.locals.push(name);
    }
    emitter
  }

  fn create_new_unique_name(&mut self) -> String {
    loop {
      let candidate = format!("v{}", self.counter);
      self.counter += 1;
      if !self.scope.is_taken(&candidate) {
        return self.scope.make_unique_label(&candidate);
      }
    }
  }

  fn text(&self, node: Node) -> String {
    match &self.bound[node.index] {
      Some(name) => name.clone(),
      None => self.gen_expr(node),
    }
  }

  fn args(&self, nodes: &[Node]) -> String {
    nodes.iter().map(|n| self.text(*n)).collect::<Vec<_>>().join(", ")
  }

  fn gen_expr(&self, node: Node) -> String {
    let entry = self.traced.expr(node);
    let names = self.names;
    match &entry.expr {
      ShaderNodeExpr::Parameter(i) => self.params[*i].clone(),
      ShaderNodeExpr::Literal(v) => gen_literal(*v),
      ShaderNodeExpr::Constant(id) => names.constants.get(id).cloned().unwrap_or_default(),
      ShaderNodeExpr::Binding { group, binding } => names
        .bindings
        .get(&(*group, *binding))
        .cloned()
        .unwrap_or_default(),
      ShaderNodeExpr::Local(local) => self.locals[local.0].clone(),
      ShaderNodeExpr::Load(source) => self.text(*source),
      ShaderNodeExpr::Compose { parameters } => {
        format!("{}({})", names.type_name(&entry.ty), self.args(parameters))
      }
      ShaderNodeExpr::Zeroed => format!("{}()", names.type_name(&entry.ty)),
      ShaderNodeExpr::Unary { op, operand } => format!("{}({})", op.wgsl_token(), self.text(*operand)),
      ShaderNodeExpr::Binary { op, left, right } => {
        format!("{} {} {}", self.text(*left), op.wgsl_token(), self.text(*right))
      }
      ShaderNodeExpr::FieldGet { base, field_index } => {
        let base_ty = &self.traced.expr(*base).ty;
        let field = base_ty
          .as_struct()
          .and_then(|s| s.fields.get(*field_index))
          .map(|f| f.name.as_str())
          .unwrap_or_default();
        format!("{}.{field}", self.text(*base))
      }
      ShaderNodeExpr::IndexGet { base, index } => {
        format!("{}[{}]", self.text(*base), self.text(*index))
      }
      ShaderNodeExpr::Swizzle { source, components } => {
        let letters: String = components.iter().map(|c| ['x', 'y', 'z', 'w'][*c as usize]).collect();
        format!("{}.{letters}", self.text(*source))
      }
      ShaderNodeExpr::FunctionCall { callee, parameters } => format!(
        "{}({})",
        names.functions.get(callee).cloned().unwrap_or_default(),
        self.args(parameters)
      ),
      ShaderNodeExpr::BuiltinCall {
        function: BuiltinFunction::ArrayLength,
        parameters,
      } => format!("arrayLength(&{})", self.args(parameters)),
      ShaderNodeExpr::BuiltinCall { function, parameters } => {
        format!("{}({})", function.wgsl_name(), self.args(parameters))
      }
      ShaderNodeExpr::HelperCall { helper, parameters } => format!(
        "{}({})",
        names.helpers.get(helper).cloned().unwrap_or_default(),
        self.args(parameters)
      ),
      ShaderNodeExpr::Convert { source } => {
        format!("{}({})", names.type_name(&entry.ty), self.text(*source))
      }
    }
  }

  fn gen_block(&mut self, block: &Block, builder: &mut CodeBuilder) {
    for statement in block {
      self.gen_statement(statement, builder);
    }
  }

  fn gen_statement(&mut self, statement: &Statement, builder: &mut CodeBuilder) {
    match statement {
      Statement::Emit(node) => {
        let expr = self.gen_expr(*node);
        let name = self.create_new_unique_name();
        builder.write_ln(format!("let {name} = {expr};"));
        self.bound[node.index] = Some(name);
      }
      Statement::Declare { local, init } => {
        let ty = self.names.type_name(&self.traced.locals[local.0].ty);
        let name = &self.locals[local.0];
        match init {
          Some(init) => builder.write_ln(format!("var {name}: {ty} = {};", self.text(*init))),
          None => builder.write_ln(format!("var {name}: {ty};")),
        };
      }
      Statement::Store { target, value } => {
        builder.write_ln(format!("{} = {};", self.text(*target), self.text(*value)));
      }
      Statement::CallVoid { callee, parameters } => {
        let callee = self.names.functions.get(callee).cloned().unwrap_or_default();
        builder.write_ln(format!("{callee}({});", self.args(parameters)));
      }
      Statement::If {
        condition,
        accept,
        reject,
      } => {
        builder.write_ln(format!("if {} {{", self.text(*condition))).tab();
        self.gen_block(accept, builder);
        builder.un_tab();
        if !reject.is_empty() {
          builder.write_ln("} else {").tab();
          self.gen_block(reject, builder);
          builder.un_tab();
        }
        builder.write_ln("}");
      }
      Statement::Loop { body } => {
        builder.write_ln("loop {").tab();
        self.gen_block(body, builder);
        builder.un_tab().write_ln("}");
      }
      Statement::ForRange {
        counter,
        start,
        end,
        body,
      } => {
        let ty = self.names.type_name(&self.traced.locals[counter.0].ty);
        let name = self.locals[counter.0].clone();
        builder
          .write_ln(format!(
            "for (var {name}: {ty} = {}; {name} < {}; {name}++) {{",
            self.text(*start),
            self.text(*end)
          ))
          .tab();
        self.gen_block(body, builder);
        builder.un_tab().write_ln("}");
      }
      Statement::Break => {
        builder.write_ln("break;");
      }
      Statement::Continue => {
        builder.write_ln("continue;");
      }
      Statement::Return(Some(value)) => {
        builder.write_ln(format!("return {};", self.text(*value)));
      }
      Statement::Return(None) => {
        builder.write_ln("return;");
      }
      Statement::Discard => {
        builder.write_ln("discard;");
      }
    }
  }
}
