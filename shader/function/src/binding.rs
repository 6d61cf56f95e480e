use crate::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindingAccess {
  Uniform,
  Storage { writable: bool },
}

impl BindingAccess {
  /// Address space and access mode as written in `var<...>`.
  pub fn wgsl_address_space(self) -> &'static str {
    match self {
      BindingAccess::Uniform => "uniform",
      BindingAccess::Storage { writable: false } => "storage, read",
      BindingAccess::Storage { writable: true } => "storage, read_write",
    }
  }

  pub fn reference_access(self) -> ReferenceAccess {
    match self {
      BindingAccess::Storage { writable: true } => ReferenceAccess::ReadWrite,
      _ => ReferenceAccess::Read,
    }
  }
}

/// One buffer slot of the module interface.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BindingEntry {
  pub group: u32,
  pub binding: u32,
  pub ty: TypeDescriptor,
  pub access: BindingAccess,
  pub label: Option<String>,
}

impl BindingEntry {
  pub fn uniform(group: u32, binding: u32, ty: TypeDescriptor) -> Self {
    Self {
      group,
      binding,
      ty,
      access: BindingAccess::Uniform,
      label: None,
    }
  }

  pub fn storage(group: u32, binding: u32, ty: TypeDescriptor, writable: bool) -> Self {
    Self {
      group,
      binding,
      ty,
      access: BindingAccess::Storage { writable },
      label: None,
    }
  }

  pub fn with_label(mut self, label: impl Into<String>) -> Self {
    self.label = Some(label.into());
    self
  }

  pub fn slot(&self) -> (u32, u32) {
    (self.group, self.binding)
  }

  /// Checks the descriptor can live in this address space.
  pub fn validate(&self) -> Result<(), ResolveError> {
    let invalid = |reason: String| ResolveError::InvalidBindingType {
      group: self.group,
      binding: self.binding,
      reason,
    };
    match self.access {
      BindingAccess::Uniform => {
        check_uniform_layout(&self.ty).map_err(|source| ResolveError::UniformLayout {
          group: self.group,
          binding: self.binding,
          source,
        })
      }
      BindingAccess::Storage { writable } => {
        if self.ty.uses_scalar_kind(ScalarKind::Bool) {
          return Err(invalid(format!(
            "`{}` contains bool, which is not host shareable",
            self.ty
          )));
        }
        let mut has_atomic = false;
        self
          .ty
          .visit(&mut |ty| has_atomic |= matches!(ty, TypeDescriptor::Atomic(_)));
        if has_atomic && !writable {
          return Err(invalid(String::from(
            "atomics require a read_write storage binding",
          )));
        }
        Ok(())
      }
    }
  }
}

/// The module's buffer interface, carried through compilation unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BindingTable {
  entries: Vec<BindingEntry>,
}

impl BindingTable {
  pub fn new(entries: impl IntoIterator<Item = BindingEntry>) -> Self {
    Self {
      entries: entries.into_iter().collect(),
    }
  }

  pub fn push(&mut self, entry: BindingEntry) -> &mut Self {
    self.entries.push(entry);
    self
  }

  pub fn entries(&self) -> &[BindingEntry] {
    &self.entries
  }

  pub fn get(&self, group: u32, binding: u32) -> Option<&BindingEntry> {
    self
      .entries
      .iter()
      .find(|e| e.group == group && e.binding == binding)
  }

  pub fn validate(&self) -> Result<(), ResolveError> {
    let mut slots = FastHashSet::default();
    for entry in &self.entries {
      if !slots.insert(entry.slot()) {
        return Err(ResolveError::DuplicateBinding {
          group: entry.group,
          binding: entry.binding,
        });
      }
      entry.validate()?;
    }
    Ok(())
  }
}
