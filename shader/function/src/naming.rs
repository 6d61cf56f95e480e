use crate::*;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NamingStrategy {
  /// Identifiers derived from labels.
  #[default]
  Strict,
  /// `item_0`, `item_1`, ... regardless of labels.
  Compact,
}

static BUILTIN_NAMES: once_cell::sync::Lazy<FastHashSet<String>> = once_cell::sync::Lazy::new(|| {
  BuiltinFunction::ALL
    .iter()
    .map(|f| f.wgsl_name().to_string())
    .collect()
});

/// Hands out identifiers that are unique within one WGSL scope and never
/// collide with reserved words or standard library functions.
#[derive(Clone)]
pub struct NameRegistry {
  strategy: NamingStrategy,
  used: FastHashSet<String>,
  compact_counter: usize,
}

impl NameRegistry {
  pub fn new(strategy: NamingStrategy) -> Self {
    Self {
      strategy,
      used: BUILTIN_NAMES.clone(),
      compact_counter: 0,
    }
  }

  pub fn strategy(&self) -> NamingStrategy {
    self.strategy
  }

  pub fn is_taken(&self, name: &str) -> bool {
    self.used.contains(name) || !is_valid_identifier(name)
  }

  /// A fresh identifier for `label` following the registry strategy.
  pub fn make_unique(&mut self, label: &str) -> String {
    match self.strategy {
      NamingStrategy::Strict => self.make_unique_label(label),
      NamingStrategy::Compact => loop {
        let candidate = format!("item_{}", self.compact_counter);
        self.compact_counter += 1;
        if !self.is_taken(&candidate) {
          self.used.insert(candidate.clone());
          break candidate;
        }
      },
    }
  }

  /// A fresh identifier derived from `label` whatever the strategy.
  pub fn make_unique_label(&mut self, label: &str) -> String {
    let base = sanitize_identifier(label);
    let mut candidate = base.clone();
    let mut suffix = 0;
    while self.is_taken(&candidate) {
      suffix += 1;
      candidate = format!("{base}_{suffix}");
    }
    self.used.insert(candidate.clone());
    candidate
  }

  /// Registry for a nested scope: sees every name taken so far, names it
  /// hands out do not leak back.
  pub fn fork(&self) -> Self {
    Self {
      strategy: NamingStrategy::Strict,
      used: self.used.clone(),
      compact_counter: 0,
    }
  }
}
