use parking_lot::Mutex;

use crate::*;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ResolveConfig {
  pub names: NamingStrategy,
  /// Prints the generated module through `log::info!`.
  pub log_result: bool,
}

/// One module scope item of the generated text.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Declaration {
  /// Struct declaration. Arrays are spelled inline where used.
  Type(TypeDescriptor),
  Constant(usize),
  Binding { group: u32, binding: u32 },
  Helper(Helper),
  Function(FnId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryPointInfo {
  pub name: String,
  pub stage: EntryStage,
  pub function: FnId,
}

/// Compiled module: the WGSL text plus what a pipeline needs to use it.
#[derive(Clone, Debug)]
pub struct ResolvedModule {
  pub code: String,
  /// Declarations in emission order, every dependency before its user.
  pub declarations: Vec<Declaration>,
  /// Identifier of each declaration, parallel to `declarations`.
  pub identifiers: Vec<String>,
  pub constants: Vec<ModuleConstant>,
  /// The binding table given to [`resolve`], unchanged.
  pub bindings: BindingTable,
  pub entry_points: Vec<EntryPointInfo>,
}

impl ResolvedModule {
  pub fn identifier(&self, declaration: &Declaration) -> Option<&str> {
    self
      .declarations
      .iter()
      .position(|d| d == declaration)
      .map(|i| self.identifiers[i].as_str())
  }

  pub fn function_identifier(&self, function: &ShaderFn) -> Option<&str> {
    self.identifier(&Declaration::Function(function.id()))
  }
}

struct DeclarationCollector<'a> {
  ctx: &'a TraceContext,
  table: &'a BindingTable,
  declarations: Vec<Declaration>,
  seen: FastHashSet<Declaration>,
}

impl DeclarationCollector<'_> {
  fn push(&mut self, declaration: Declaration) {
    if self.seen.insert(declaration.clone()) {
      self.declarations.push(declaration);
    }
  }

  /// Nested struct declarations come before the struct using them.
  fn collect_type(&mut self, ty: &TypeDescriptor) {
    match ty {
      TypeDescriptor::Array(array) => self.collect_type(&array.element),
      TypeDescriptor::Struct(s) => {
        if self.seen.contains(&Declaration::Type(ty.clone())) {
          return;
        }
        for field in &s.fields {
          self.collect_type(&field.ty);
        }
        self.push(Declaration::Type(ty.clone()));
      }
      _ => {}
    }
  }

  fn collect_function(&mut self, traced: &TracedFn) {
    for ty in traced.referenced_types() {
      self.collect_type(ty);
    }
    for id in &traced.constants {
      if let Some(constant) = self.ctx.constant(*id) {
        self.collect_type(&constant.ty);
      }
      self.push(Declaration::Constant(*id));
    }
    for entry in &traced.bindings {
      if let Some(entry) = self.table.get(entry.group, entry.binding) {
        self.collect_type(&entry.ty);
      }
      self.push(Declaration::Binding {
        group: entry.group,
        binding: entry.binding,
      });
    }
    for helper in &traced.helpers {
      for ty in helper.parameter_types() {
        self.collect_type(&ty);
      }
      self.push(Declaration::Helper(helper.clone()));
    }
    self.push(Declaration::Function(traced.function.id()));
  }
}

fn check_traced_bindings(traced: &TracedFn, table: &BindingTable) -> Result<(), ResolveError> {
  for used in &traced.bindings {
    let Some(declared) = table.get(used.group, used.binding) else {
      return Err(ResolveError::UnknownBinding {
        group: used.group,
        binding: used.binding,
        function: traced.function.name().to_string(),
      });
    };
    let mismatch = |reason: String| ResolveError::BindingMismatch {
      group: used.group,
      binding: used.binding,
      reason,
    };
    if declared.ty != used.ty {
      return Err(mismatch(format!(
        "`{}` uses `{}`, the table declares `{}`",
        traced.function.name(),
        used.ty,
        declared.ty
      )));
    }
    if declared.access != used.access {
      return Err(mismatch(format!(
        "`{}` uses var<{}>, the table declares var<{}>",
        traced.function.name(),
        used.access.wgsl_address_space(),
        declared.access.wgsl_address_space()
      )));
    }
  }
  Ok(())
}

/// Compiles everything reachable from `entry_points` into one WGSL module.
///
/// Plain functions may be passed as roots too, they are emitted without
/// being listed in [`ResolvedModule::entry_points`].
pub fn resolve(
  entry_points: &[ShaderFn],
  bindings: &BindingTable,
  config: &ResolveConfig,
) -> ShaderResult<ResolvedModule> {
  bindings.validate()?;

  let mut ctx = TraceContext::new();
  for entry in entry_points {
    ctx.trace(entry)?;
  }

  let mut traced_fns = Vec::with_capacity(ctx.order().len());
  for id in ctx.order() {
    if let Some(traced) = ctx.get(*id) {
      check_traced_bindings(traced, bindings)?;
      traced_fns.push(traced.clone());
    }
  }

  let mut collector = DeclarationCollector {
    ctx: &ctx,
    table: bindings,
    declarations: Vec::new(),
    seen: FastHashSet::default(),
  };
  for traced in &traced_fns {
    collector.collect_function(traced);
  }
  let declarations = collector.declarations;

  let mut registry = NameRegistry::new(config.names);
  let mut names = ModuleNames::default();
  let mut identifiers = Vec::with_capacity(declarations.len());
  for declaration in &declarations {
    let identifier = match declaration {
      Declaration::Type(ty) => {
        let label = ty.as_struct().and_then(|s| s.label.as_deref()).unwrap_or("Struct");
        let identifier = registry.make_unique(label);
        names.types.insert(ty.clone(), identifier.clone());
        identifier
      }
      Declaration::Constant(id) => {
        let label = ctx
          .constant(*id)
          .and_then(|c| c.label.as_deref())
          .unwrap_or("constant");
        let identifier = registry.make_unique(label);
        names.constants.insert(*id, identifier.clone());
        identifier
      }
      Declaration::Binding { group, binding } => {
        let label = bindings
          .get(*group, *binding)
          .and_then(|e| e.label.clone())
          .unwrap_or_else(|| format!("group{group}_binding{binding}"));
        let identifier = registry.make_unique(&label);
        names.bindings.insert((*group, *binding), identifier.clone());
        identifier
      }
      Declaration::Helper(helper) => {
        let identifier = registry.make_unique(helper.base_name());
        names.helpers.insert(helper.clone(), identifier.clone());
        identifier
      }
      Declaration::Function(id) => {
        let function = ctx.get(*id).map(|t| &t.function);
        let label = function.map(|f| f.name()).unwrap_or("function");
        // entry point names are part of the pipeline interface
        let identifier = if function.is_some_and(|f| f.stage().is_some()) {
          registry.make_unique_label(label)
        } else {
          registry.make_unique(label)
        };
        names.functions.insert(*id, identifier.clone());
        identifier
      }
    };
    identifiers.push(identifier);
  }

  let uses_f16 = traced_fns
    .iter()
    .flat_map(|t| t.referenced_types())
    .chain(ctx.constants().iter().map(|c| &c.ty))
    .chain(bindings.entries().iter().map(|e| &e.ty))
    .any(|ty| ty.uses_scalar_kind(ScalarKind::F16));

  let mut sections = Vec::with_capacity(declarations.len() + 1);
  if uses_f16 {
    sections.push(String::from("enable f16;\n"));
  }
  for (declaration, identifier) in declarations.iter().zip(&identifiers) {
    let section = match declaration {
      Declaration::Type(TypeDescriptor::Struct(s)) => gen_struct(identifier, s, &names),
      Declaration::Type(_) => continue,
      Declaration::Constant(id) => match ctx.constant(*id) {
        Some(constant) => gen_constant(identifier, constant, &names),
        None => continue,
      },
      Declaration::Binding { group, binding } => match bindings.get(*group, *binding) {
        Some(entry) => gen_binding(identifier, entry, &names),
        None => continue,
      },
      Declaration::Helper(helper) => gen_helper(identifier, helper, &names),
      Declaration::Function(id) => match ctx.get(*id) {
        Some(traced) => gen_function(traced, identifier, &names, registry.fork()),
        None => continue,
      },
    };
    sections.push(section);
  }
  let code = sections.join("\n");

  let entry_points = entry_points
    .iter()
    .filter_map(|f| {
      Some(EntryPointInfo {
        name: names.functions.get(&f.id())?.clone(),
        stage: f.stage()?,
        function: f.id(),
      })
    })
    .collect::<Vec<_>>();

  log::debug!(
    "resolved {} declarations from {} functions, {} entry points",
    declarations.len(),
    traced_fns.len(),
    entry_points.len()
  );
  if config.log_result {
    log::info!("{code}");
  }

  Ok(ResolvedModule {
    code,
    declarations,
    identifiers,
    constants: ctx.constants().to_vec(),
    bindings: bindings.clone(),
    entry_points,
  })
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct ModuleKey {
  entry_points: Vec<FnId>,
  bindings: BindingTable,
  config: ResolveConfig,
}

/// Memoizes [`resolve`] by entry point identity, binding table and config.
#[derive(Default)]
pub struct ModuleCache {
  modules: Mutex<FastHashMap<ModuleKey, Arc<ResolvedModule>>>,
}

impl ModuleCache {
  pub fn get_or_resolve(
    &self,
    entry_points: &[ShaderFn],
    bindings: &BindingTable,
    config: &ResolveConfig,
  ) -> ShaderResult<Arc<ResolvedModule>> {
    let key = ModuleKey {
      entry_points: entry_points.iter().map(|f| f.id()).collect(),
      bindings: bindings.clone(),
      config: *config,
    };
    if let Some(module) = self.modules.lock().get(&key) {
      return Ok(module.clone());
    }
    let module = Arc::new(resolve(entry_points, bindings, config)?);
    Ok(self.modules.lock().entry(key).or_insert(module).clone())
  }

  pub fn len(&self) -> usize {
    self.modules.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.modules.lock().is_empty()
  }

  pub fn clear(&self) {
    self.modules.lock().clear();
  }
}
