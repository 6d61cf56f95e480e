// https://nnethercote.github.io/perf-book/hashing.html

use std::hash::Hash;

pub type FastHasher = rustc_hash::FxHasher;
pub type FastHasherBuilder = std::hash::BuildHasherDefault<FastHasher>;
pub type FastHashMap<K, V> = hashbrown::HashMap<K, V, FastHasherBuilder>;
pub type FastHashSet<K> = hashbrown::HashSet<K, FastHasherBuilder>;

/// Deduplicates values and hands out dense ids in first-seen order.
///
/// Iteration never depends on the hasher: `values()` is always in insertion
/// order, which is what code generation needs to stay byte-for-byte stable.
pub struct OrderedInterning<T> {
  mapping: FastHashMap<T, usize>,
  values: Vec<T>,
}

impl<T> Default for OrderedInterning<T> {
  fn default() -> Self {
    Self {
      mapping: Default::default(),
      values: Default::default(),
    }
  }
}

impl<T> OrderedInterning<T>
where
  T: Eq + Hash + Clone,
{
  /// Returns the id of `v` and whether it was newly inserted.
  pub fn intern(&mut self, v: &T) -> (usize, bool) {
    if let Some(id) = self.mapping.get(v) {
      return (*id, false);
    }
    let id = self.values.len();
    self.values.push(v.clone());
    self.mapping.insert(v.clone(), id);
    (id, true)
  }

  pub fn get_id(&self, v: &T) -> Option<usize> {
    self.mapping.get(v).copied()
  }

  pub fn get_value(&self, id: usize) -> Option<&T> {
    self.values.get(id)
  }

  pub fn contains(&self, v: &T) -> bool {
    self.mapping.contains_key(v)
  }

  pub fn values(&self) -> &[T] {
    &self.values
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

#[test]
fn interning_keeps_first_seen_order() {
  let mut interning = OrderedInterning::default();
  assert_eq!(interning.intern(&"b"), (0, true));
  assert_eq!(interning.intern(&"a"), (1, true));
  assert_eq!(interning.intern(&"b"), (0, false));
  assert_eq!(interning.values(), &["b", "a"]);
  assert_eq!(interning.get_id(&"a"), Some(1));
  assert_eq!(interning.get_value(2), None);
}
