use crate::*;

/// A deduplicated module scope constant.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleConstant {
  /// Label of the first occurrence, used for naming.
  pub label: Option<String>,
  pub ty: TypeDescriptor,
  /// Canonical form, as decoded back from its encoded bytes.
  pub value: HostValue,
}

/// Tracing state shared by every function reached from one root.
///
/// Each function is traced at most once per context. The completion order
/// is a post order: callees always finish before their callers.
#[derive(Default)]
pub struct TraceContext {
  traced: FastHashMap<FnId, Arc<TracedFn>>,
  order: Vec<FnId>,
  stack: Vec<ShaderFn>,
  constant_keys: OrderedInterning<(TypeDescriptor, Vec<u8>)>,
  constants: Vec<ModuleConstant>,
}

impl TraceContext {
  pub fn new() -> Self {
    Self::default()
  }

  /// Traces `function` and everything it calls, or returns the cached
  /// result of an earlier trace in this context.
  pub fn trace(&mut self, function: &ShaderFn) -> ShaderResult<Arc<TracedFn>> {
    if let Some(traced) = self.traced.get(&function.id()) {
      return Ok(traced.clone());
    }
    if let Some(position) = self.stack.iter().position(|f| f == function) {
      let chain = self.stack[position..]
        .iter()
        .chain(std::iter::once(function))
        .map(|f| f.name().to_string())
        .collect();
      return Err(GraphError::RecursiveCall { chain }.into());
    }

    log::trace!("tracing shader function `{}`", function.name());
    self.stack.push(function.clone());
    let result = self.trace_body(function);
    self.stack.pop();

    let traced = Arc::new(result?);
    log::trace!(
      "traced `{}`: {} expressions, {} callees",
      function.name(),
      traced.exprs.len(),
      traced.callees.len()
    );
    self.traced.insert(function.id(), traced.clone());
    self.order.push(function.id());
    Ok(traced)
  }

  fn trace_body(&mut self, function: &ShaderFn) -> ShaderResult<TracedFn> {
    match function.implementation() {
      FnImplementation::Traced(body) => {
        let body = body.clone();
        let mut builder = FnBuilder::new(self, function.clone());
        let params = builder.parameters();
        let returned = body(&mut builder, &params)?;
        builder.finish(returned)
      }
      FnImplementation::Wgsl { body, externals } => {
        let mut callees = Vec::new();
        for (_, external) in externals {
          self.trace(external)?;
          if !callees.contains(&external.id()) {
            callees.push(external.id());
          }
        }
        Ok(TracedFn {
          function: function.clone(),
          exprs: Vec::new(),
          locals: Vec::new(),
          body: TracedBody::Wgsl(body.clone()),
          callees,
          constants: Vec::new(),
          bindings: Vec::new(),
          helpers: Vec::new(),
        })
      }
    }
  }

  pub fn get(&self, id: FnId) -> Option<&Arc<TracedFn>> {
    self.traced.get(&id)
  }

  /// Traced functions in completion order.
  pub fn order(&self) -> &[FnId] {
    &self.order
  }

  pub fn constant(&self, id: usize) -> Option<&ModuleConstant> {
    self.constants.get(id)
  }

  pub fn constants(&self) -> &[ModuleConstant] {
    &self.constants
  }

  /// Interns a constant by descriptor and encoded bytes.
  pub(crate) fn intern_constant(
    &mut self,
    label: Option<String>,
    ty: &TypeDescriptor,
    value: &HostValue,
  ) -> ShaderResult<usize> {
    let bytes = encode_to_vec(value, ty)?;
    let (id, inserted) = self.constant_keys.intern(&(ty.clone(), bytes));
    if inserted {
      let canonical = match self.constant_keys.get_value(id) {
        Some((_, bytes)) => decode(bytes, ty, 0)?,
        None => value.clone(),
      };
      self.constants.push(ModuleConstant {
        label,
        ty: ty.clone(),
        value: canonical,
      });
    }
    Ok(id)
  }
}
