use crate::*;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSegment {
  Field(String),
  Index(usize),
}

/// Location of a value inside a composite, `.light.color[2]` style.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ValuePath(pub Vec<PathSegment>);

impl ValuePath {
  pub fn root() -> Self {
    Self::default()
  }

  #[must_use]
  pub fn field(mut self, name: impl Into<String>) -> Self {
    self.0.push(PathSegment::Field(name.into()));
    self
  }

  #[must_use]
  pub fn index(mut self, index: usize) -> Self {
    self.0.push(PathSegment::Index(index));
    self
  }

  pub fn segments(&self) -> &[PathSegment] {
    &self.0
  }

  fn push_field(&mut self, name: &str) {
    self.0.push(PathSegment::Field(name.to_string()));
  }

  fn push_index(&mut self, index: usize) {
    self.0.push(PathSegment::Index(index));
  }

  fn pop(&mut self) {
    self.0.pop();
  }
}

impl fmt::Display for ValuePath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.0.is_empty() {
      return write!(f, "<root>");
    }
    for segment in &self.0 {
      match segment {
        PathSegment::Field(name) => write!(f, ".{name}")?,
        PathSegment::Index(index) => write!(f, "[{index}]")?,
      }
    }
    Ok(())
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PartialUpdate {
  pub path: ValuePath,
  pub value: HostValue,
}

/// A set of updates applied in order by [`encode_partial`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PartialValue {
  pub updates: Vec<PartialUpdate>,
}

impl PartialValue {
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub fn set(mut self, path: ValuePath, value: impl Into<HostValue>) -> Self {
    self.push(path, value);
    self
  }

  pub fn push(&mut self, path: ValuePath, value: impl Into<HostValue>) {
    self.updates.push(PartialUpdate {
      path,
      value: value.into(),
    });
  }
}

fn describe(value: &HostValue) -> String {
  match value {
    HostValue::Scalar(v) => v.kind().to_string(),
    HostValue::Vector(c) => format!("vector of {} components", c.len()),
    HostValue::Matrix(c) => format!("matrix of {} columns", c.len()),
    HostValue::Array(e) => format!("array of {} elements", e.len()),
    HostValue::Struct(_) => String::from("struct"),
  }
}

fn scalar_bytes(value: ScalarValue) -> SmallVec<[u8; 4]> {
  match value {
    ScalarValue::Bool(v) => SmallVec::from_slice(&u32::from(v).to_le_bytes()),
    ScalarValue::F16(v) => SmallVec::from_slice(&v.to_le_bytes()),
    ScalarValue::F32(v) => SmallVec::from_slice(&v.to_le_bytes()),
    ScalarValue::I32(v) => SmallVec::from_slice(&v.to_le_bytes()),
    ScalarValue::U32(v) => SmallVec::from_slice(&v.to_le_bytes()),
  }
}

struct Writer<'a> {
  buffer: &'a mut [u8],
  path: ValuePath,
  /// When unset every check runs but nothing is written.
  commit: bool,
}

impl Writer<'_> {
  fn mismatch(&self, ty: &TypeDescriptor, value: &HostValue) -> EncodeError {
    EncodeError::ShapeMismatch {
      path: self.path.clone(),
      expected: ty.to_string(),
      found: describe(value),
    }
  }

  fn scalar(&mut self, kind: ScalarKind, value: &HostValue, offset: usize) -> Result<(), EncodeError> {
    let scalar = match value {
      HostValue::Scalar(v) if v.kind() == kind => *v,
      _ => return Err(self.mismatch(&TypeDescriptor::Scalar(kind), value)),
    };
    let bytes = scalar_bytes(scalar);
    let end = offset + bytes.len();
    if end > self.buffer.len() {
      return Err(EncodeError::OutOfBounds {
        path: self.path.clone(),
        offset,
        needed: bytes.len(),
        available: self.buffer.len(),
      });
    }
    if self.commit {
      self.buffer[offset..end].copy_from_slice(&bytes);
    }
    Ok(())
  }

  fn components(
    &mut self,
    kind: ScalarKind,
    components: &[ScalarValue],
    offset: usize,
  ) -> Result<(), EncodeError> {
    for (i, component) in components.iter().enumerate() {
      self.path.push_index(i);
      self.scalar(kind, &HostValue::Scalar(*component), offset + i * scalar_size(kind))?;
      self.path.pop();
    }
    Ok(())
  }

  fn write(
    &mut self,
    value: &HostValue,
    ty: &TypeDescriptor,
    layout: &TypeLayout,
    offset: usize,
  ) -> Result<(), EncodeError> {
    match (ty, value, &layout.children) {
      (TypeDescriptor::Scalar(kind) | TypeDescriptor::Atomic(kind), _, _) => {
        self.scalar(*kind, value, offset)
      }
      (TypeDescriptor::Vector { kind, width }, HostValue::Vector(c), _) if c.len() == width.count() => {
        self.components(*kind, c, offset)
      }
      (
        TypeDescriptor::Matrix { kind, columns, rows },
        HostValue::Matrix(c),
        ChildLayout::Matrix { column_stride },
      ) if c.len() == columns.count() && c.iter().all(|col| col.len() == rows.count()) => {
        for (i, column) in c.iter().enumerate() {
          self.path.push_index(i);
          self.components(*kind, column, offset + i * column_stride)?;
          self.path.pop();
        }
        Ok(())
      }
      (TypeDescriptor::Array(array), HostValue::Array(elements), ChildLayout::Array { stride, element }) => {
        if let ArrayLength::Fixed(count) = array.length {
          if count != elements.len() {
            return Err(EncodeError::ArrayLength {
              path: self.path.clone(),
              expected: count,
              found: elements.len(),
            });
          }
        }
        for (i, v) in elements.iter().enumerate() {
          self.path.push_index(i);
          self.write(v, &array.element, element, offset + i * stride)?;
          self.path.pop();
        }
        Ok(())
      }
      (TypeDescriptor::Struct(s), HostValue::Struct(values), ChildLayout::Struct(fields)) => {
        if let Some((unknown, _)) = values.iter().find(|(name, _)| s.field(name).is_none()) {
          return Err(EncodeError::UnknownField {
            path: self.path.clone(),
            field: unknown.clone(),
          });
        }
        for (field, field_layout) in s.fields.iter().zip(fields) {
          let Some(v) = value.field(&field.name) else {
            return Err(EncodeError::MissingField {
              path: self.path.clone(),
              field: field.name.clone(),
            });
          };
          self.path.push_field(&field.name);
          self.write(v, &field.ty, &field_layout.layout, offset + field_layout.offset)?;
          self.path.pop();
        }
        Ok(())
      }
      _ => Err(self.mismatch(ty, value)),
    }
  }
}

/// Bytes `value` occupies when encoded, runtime-sized arrays sized by the
/// value's element count.
fn encoded_len(value: &HostValue, ty: &TypeDescriptor, layout: &TypeLayout) -> usize {
  if let Some(size) = layout.size {
    return size;
  }
  match (ty, value, &layout.children) {
    (_, HostValue::Array(elements), ChildLayout::Array { stride, .. }) => elements.len() * stride,
    (TypeDescriptor::Struct(s), _, ChildLayout::Struct(fields)) => {
      let end = match (s.fields.last(), fields.last()) {
        (Some(field), Some(field_layout)) => {
          let tail = value
            .field(&field.name)
            .map(|v| encoded_len(v, &field.ty, &field_layout.layout))
            .unwrap_or(0);
          field_layout.offset + tail
        }
        _ => 0,
      };
      round_up(layout.alignment, end)
    }
    _ => 0,
  }
}

/// Writes `value` at `byte_offset`. Padding bytes are left untouched.
pub fn encode(
  value: &HostValue,
  ty: &TypeDescriptor,
  buffer: &mut [u8],
  byte_offset: usize,
) -> Result<(), EncodeError> {
  let layout = compute_layout(ty)?;
  encode_with_layout(value, ty, &layout, buffer, byte_offset)
}

pub fn encode_with_layout(
  value: &HostValue,
  ty: &TypeDescriptor,
  layout: &TypeLayout,
  buffer: &mut [u8],
  byte_offset: usize,
) -> Result<(), EncodeError> {
  let needed = encoded_len(value, ty, layout);
  if byte_offset + needed > buffer.len() {
    return Err(EncodeError::OutOfBounds {
      path: ValuePath::root(),
      offset: byte_offset,
      needed,
      available: buffer.len(),
    });
  }
  let mut writer = Writer {
    buffer,
    path: ValuePath::root(),
    commit: true,
  };
  writer.write(value, ty, layout, byte_offset)
}

/// Zero initialized buffer holding exactly the encoded `value`.
pub fn encode_to_vec(value: &HostValue, ty: &TypeDescriptor) -> Result<Vec<u8>, EncodeError> {
  let layout = compute_layout(ty)?;
  let mut buffer = vec![0; encoded_len(value, ty, &layout)];
  encode_with_layout(value, ty, &layout, &mut buffer, 0)?;
  Ok(buffer)
}

struct Reader<'a> {
  buffer: &'a [u8],
  path: ValuePath,
}

impl Reader<'_> {
  fn bytes<const N: usize>(&self, offset: usize) -> Result<[u8; N], DecodeError> {
    self
      .buffer
      .get(offset..offset + N)
      .and_then(|bytes| bytes.try_into().ok())
      .ok_or_else(|| DecodeError::OutOfBounds {
        path: self.path.clone(),
        offset,
        needed: N,
        available: self.buffer.len(),
      })
  }

  fn scalar(&self, kind: ScalarKind, offset: usize) -> Result<ScalarValue, DecodeError> {
    Ok(match kind {
      ScalarKind::Bool => ScalarValue::Bool(u32::from_le_bytes(self.bytes(offset)?) != 0),
      ScalarKind::F16 => ScalarValue::F16(half::f16::from_le_bytes(self.bytes(offset)?)),
      ScalarKind::F32 => ScalarValue::F32(f32::from_le_bytes(self.bytes(offset)?)),
      ScalarKind::I32 => ScalarValue::I32(i32::from_le_bytes(self.bytes(offset)?)),
      ScalarKind::U32 => ScalarValue::U32(u32::from_le_bytes(self.bytes(offset)?)),
    })
  }

  fn components(&self, kind: ScalarKind, count: usize, offset: usize) -> Result<Components, DecodeError> {
    (0..count)
      .map(|i| self.scalar(kind, offset + i * scalar_size(kind)))
      .collect()
  }

  fn read(&mut self, ty: &TypeDescriptor, layout: &TypeLayout, offset: usize) -> Result<HostValue, DecodeError> {
    Ok(match (ty, &layout.children) {
      (TypeDescriptor::Scalar(kind) | TypeDescriptor::Atomic(kind), _) => {
        HostValue::Scalar(self.scalar(*kind, offset)?)
      }
      (TypeDescriptor::Vector { kind, width }, _) => {
        HostValue::Vector(self.components(*kind, width.count(), offset)?)
      }
      (TypeDescriptor::Matrix { kind, columns, rows }, ChildLayout::Matrix { column_stride }) => {
        HostValue::Matrix(
          (0..columns.count())
            .map(|i| self.components(*kind, rows.count(), offset + i * column_stride))
            .collect::<Result<_, _>>()?,
        )
      }
      (TypeDescriptor::Array(array), ChildLayout::Array { stride, element }) => {
        let count = match array.length {
          ArrayLength::Fixed(count) => count,
          ArrayLength::Runtime => self.buffer.len().saturating_sub(offset) / (*stride).max(1),
        };
        let mut elements = Vec::with_capacity(count);
        for i in 0..count {
          self.path.push_index(i);
          elements.push(self.read(&array.element, element, offset + i * stride)?);
          self.path.pop();
        }
        HostValue::Array(elements)
      }
      (TypeDescriptor::Struct(s), ChildLayout::Struct(fields)) => {
        let mut values = Vec::with_capacity(fields.len());
        for (field, field_layout) in s.fields.iter().zip(fields) {
          self.path.push_field(&field.name);
          let v = self.read(&field.ty, &field_layout.layout, offset + field_layout.offset)?;
          self.path.pop();
          values.push((field.name.clone(), v));
        }
        HostValue::Struct(values)
      }
      // layouts always mirror their descriptor
      _ => HostValue::zeroed(ty),
    })
  }
}

/// Inverse of [`encode`]. A runtime-sized array decodes as many whole
/// elements as the buffer holds past its start.
pub fn decode(buffer: &[u8], ty: &TypeDescriptor, byte_offset: usize) -> Result<HostValue, DecodeError> {
  let layout = compute_layout(ty)?;
  decode_with_layout(buffer, ty, &layout, byte_offset)
}

pub fn decode_with_layout(
  buffer: &[u8],
  ty: &TypeDescriptor,
  layout: &TypeLayout,
  byte_offset: usize,
) -> Result<HostValue, DecodeError> {
  let mut reader = Reader {
    buffer,
    path: ValuePath::root(),
  };
  reader.read(ty, layout, byte_offset)
}

fn vector_component_index(name: &str) -> Option<usize> {
  match name {
    "x" | "r" => Some(0),
    "y" | "g" => Some(1),
    "z" | "b" => Some(2),
    "w" | "a" => Some(3),
    _ => None,
  }
}

/// Descriptor, layout and absolute offset addressed by `path`.
fn locate(
  ty: &TypeDescriptor,
  layout: &Arc<TypeLayout>,
  byte_offset: usize,
  path: &ValuePath,
) -> Result<(TypeDescriptor, Arc<TypeLayout>, usize), EncodeError> {
  let mut ty = ty.clone();
  let mut layout = layout.clone();
  let mut offset = byte_offset;
  let mut visited = ValuePath::root();

  for segment in path.segments() {
    let invalid = |visited: &ValuePath, reason: String| EncodeError::InvalidPath {
      path: visited.clone(),
      reason,
    };

    let index = match segment {
      PathSegment::Field(name) => {
        let member = match (&ty, layout.field(name)) {
          (TypeDescriptor::Struct(s), Some(field_layout)) => s
            .field(name)
            .map(|(_, f)| (f.ty.clone(), field_layout.layout.clone(), field_layout.offset)),
          _ => None,
        };
        if let Some((next_ty, next_layout, field_offset)) = member {
          ty = next_ty;
          layout = next_layout;
          offset += field_offset;
          visited.push_field(name);
          continue;
        }
        match (&ty, vector_component_index(name)) {
          (TypeDescriptor::Vector { .. }, Some(index)) => index,
          _ => return Err(invalid(&visited, format!("`{ty}` has no member `{name}`"))),
        }
      }
      PathSegment::Index(index) => *index,
    };

    let (next_ty, next_layout, step) = match (&ty, &layout.children) {
      (TypeDescriptor::Array(array), ChildLayout::Array { stride, element }) => {
        if let ArrayLength::Fixed(count) = array.length {
          if index >= count {
            return Err(invalid(&visited, format!("index {index} out of bounds for length {count}")));
          }
        }
        (array.element.clone(), element.clone(), index * stride)
      }
      (TypeDescriptor::Matrix { kind, columns, rows }, ChildLayout::Matrix { column_stride }) => {
        if index >= columns.count() {
          return Err(invalid(&visited, format!("column {index} out of bounds")));
        }
        let column = vec(*kind, *rows);
        let column_layout = compute_layout(&column)?;
        (column, column_layout, index * column_stride)
      }
      (TypeDescriptor::Vector { kind, width }, _) => {
        if index >= width.count() {
          return Err(invalid(&visited, format!("component {index} out of bounds")));
        }
        let component = scalar(*kind);
        let component_layout = compute_layout(&component)?;
        (component, component_layout, index * scalar_size(*kind))
      }
      _ => return Err(invalid(&visited, format!("`{ty}` is not indexable"))),
    };
    ty = next_ty;
    layout = next_layout;
    offset += step;
    visited.push_index(index);
  }

  Ok((ty, layout, offset))
}

/// Applies `partial` in order and returns the touched byte ranges, sorted and
/// merged, for uploading only what changed.
pub fn encode_partial(
  partial: &PartialValue,
  ty: &TypeDescriptor,
  buffer: &mut [u8],
  byte_offset: usize,
) -> Result<Vec<Range<usize>>, EncodeError> {
  let layout = compute_layout(ty)?;
  encode_partial_with_layout(partial, ty, &layout, buffer, byte_offset)
}

pub fn encode_partial_with_layout(
  partial: &PartialValue,
  ty: &TypeDescriptor,
  layout: &Arc<TypeLayout>,
  buffer: &mut [u8],
  byte_offset: usize,
) -> Result<Vec<Range<usize>>, EncodeError> {
  // every update is checked before the first byte is written
  let mut targets = Vec::with_capacity(partial.updates.len());
  for update in &partial.updates {
    let (target_ty, target_layout, offset) = locate(ty, layout, byte_offset, &update.path)?;
    let len = encoded_len(&update.value, &target_ty, &target_layout);
    if offset + len > buffer.len() {
      return Err(EncodeError::OutOfBounds {
        path: update.path.clone(),
        offset,
        needed: len,
        available: buffer.len(),
      });
    }
    let mut writer = Writer {
      buffer: &mut *buffer,
      path: update.path.clone(),
      commit: false,
    };
    writer.write(&update.value, &target_ty, &target_layout, offset)?;
    targets.push((update, target_ty, target_layout, offset, len));
  }

  let mut ranges = Vec::with_capacity(targets.len());
  for (update, target_ty, target_layout, offset, len) in targets {
    let mut writer = Writer {
      buffer: &mut *buffer,
      path: update.path.clone(),
      commit: true,
    };
    writer.write(&update.value, &target_ty, &target_layout, offset)?;
    ranges.push(offset..offset + len);
  }

  Ok(merge_ranges(ranges))
}

fn merge_ranges(mut ranges: Vec<Range<usize>>) -> Vec<Range<usize>> {
  ranges.sort_by_key(|r| r.start);
  let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
  for range in ranges {
    match merged.last_mut() {
      Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
      _ => merged.push(range),
    }
  }
  merged
}
