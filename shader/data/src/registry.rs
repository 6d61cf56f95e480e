use crate::*;

pub const BOOL: TypeDescriptor = TypeDescriptor::Scalar(ScalarKind::Bool);
pub const F16: TypeDescriptor = TypeDescriptor::Scalar(ScalarKind::F16);
pub const F32: TypeDescriptor = TypeDescriptor::Scalar(ScalarKind::F32);
pub const I32: TypeDescriptor = TypeDescriptor::Scalar(ScalarKind::I32);
pub const U32: TypeDescriptor = TypeDescriptor::Scalar(ScalarKind::U32);

pub const ATOMIC_I32: TypeDescriptor = TypeDescriptor::Atomic(ScalarKind::I32);
pub const ATOMIC_U32: TypeDescriptor = TypeDescriptor::Atomic(ScalarKind::U32);

macro_rules! vector_consts {
  ($kind: ident, $two: ident, $three: ident, $four: ident) => {
    pub const $two: TypeDescriptor = vec(ScalarKind::$kind, VectorWidth::Two);
    pub const $three: TypeDescriptor = vec(ScalarKind::$kind, VectorWidth::Three);
    pub const $four: TypeDescriptor = vec(ScalarKind::$kind, VectorWidth::Four);
  };
}

vector_consts!(Bool, VEC2B, VEC3B, VEC4B);
vector_consts!(F16, VEC2H, VEC3H, VEC4H);
vector_consts!(F32, VEC2F, VEC3F, VEC4F);
vector_consts!(I32, VEC2I, VEC3I, VEC4I);
vector_consts!(U32, VEC2U, VEC3U, VEC4U);

macro_rules! matrix_consts {
  ($kind: ident, $($name: ident: $c: ident x $r: ident),*) => {
    $(
      pub const $name: TypeDescriptor = TypeDescriptor::Matrix {
        kind: ScalarKind::$kind,
        columns: VectorWidth::$c,
        rows: VectorWidth::$r,
      };
    )*
  };
}

matrix_consts!(F32,
  MAT2X2F: Two x Two, MAT2X3F: Two x Three, MAT2X4F: Two x Four,
  MAT3X2F: Three x Two, MAT3X3F: Three x Three, MAT3X4F: Three x Four,
  MAT4X2F: Four x Two, MAT4X3F: Four x Three, MAT4X4F: Four x Four
);

matrix_consts!(F16,
  MAT2X2H: Two x Two, MAT2X3H: Two x Three, MAT2X4H: Two x Four,
  MAT3X2H: Three x Two, MAT3X3H: Three x Three, MAT3X4H: Three x Four,
  MAT4X2H: Four x Two, MAT4X3H: Four x Three, MAT4X4H: Four x Four
);

pub const fn scalar(kind: ScalarKind) -> TypeDescriptor {
  TypeDescriptor::Scalar(kind)
}

pub const fn vec(kind: ScalarKind, width: VectorWidth) -> TypeDescriptor {
  TypeDescriptor::Vector { kind, width }
}

pub fn mat(
  kind: ScalarKind,
  columns: VectorWidth,
  rows: VectorWidth,
) -> Result<TypeDescriptor, SchemaError> {
  if !kind.is_float() {
    return Err(SchemaError::InvalidMatrixComponent(kind));
  }
  Ok(TypeDescriptor::Matrix {
    kind,
    columns,
    rows,
  })
}

pub fn atomic(kind: ScalarKind) -> Result<TypeDescriptor, SchemaError> {
  if !kind.is_integer() {
    return Err(SchemaError::InvalidAtomicComponent(kind));
  }
  Ok(TypeDescriptor::Atomic(kind))
}

/// A zero count marks a runtime-sized array.
impl From<usize> for ArrayLength {
  fn from(count: usize) -> Self {
    match count {
      0 => ArrayLength::Runtime,
      n => ArrayLength::Fixed(n),
    }
  }
}

impl From<u32> for ArrayLength {
  fn from(count: u32) -> Self {
    (count as usize).into()
  }
}

impl TryFrom<i64> for ArrayLength {
  type Error = SchemaError;

  fn try_from(count: i64) -> Result<Self, Self::Error> {
    usize::try_from(count)
      .map(Into::into)
      .map_err(|_| SchemaError::InvalidElementCount(count))
  }
}

impl TryFrom<i32> for ArrayLength {
  type Error = SchemaError;

  fn try_from(count: i32) -> Result<Self, Self::Error> {
    ArrayLength::try_from(count as i64)
  }
}

/// `array<element, count>`, or `array<element>` when `count` is
/// [`ArrayLength::Runtime`] (or zero).
pub fn array_of<L>(element: TypeDescriptor, count: L) -> Result<TypeDescriptor, SchemaError>
where
  L: TryInto<ArrayLength>,
  SchemaError: From<L::Error>,
{
  let length = count.try_into()?;
  if !element.is_sized() {
    return Err(SchemaError::NestedRuntimeArray(element.to_string()));
  }
  let array = TypeDescriptor::Array(Arc::new(ArrayDescriptor { element, length }));
  if let (Err(LayoutError::SizeOverflow { .. }), ArrayLength::Fixed(n)) = (compute_layout(&array), length) {
    return Err(SchemaError::InvalidElementCount(
      i64::try_from(n).unwrap_or(i64::MAX),
    ));
  }
  Ok(array)
}

/// Curried [`array_of`], the element is checked when the count arrives.
pub fn array_of_lazy(element: TypeDescriptor) -> ArrayConstructor {
  ArrayConstructor { element }
}

#[derive(Clone, Debug)]
pub struct ArrayConstructor {
  element: TypeDescriptor,
}

impl ArrayConstructor {
  pub fn count<L>(&self, count: L) -> Result<TypeDescriptor, SchemaError>
  where
    L: TryInto<ArrayLength>,
    SchemaError: From<L::Error>,
  {
    array_of(self.element.clone(), count)
  }
}

/// Starts a struct member definition.
pub fn field(name: impl Into<String>, ty: TypeDescriptor) -> StructField {
  StructField {
    name: name.into(),
    ty,
    attributes: Default::default(),
  }
}

impl StructField {
  #[must_use]
  pub fn align(mut self, align: u32) -> Self {
    self.attributes.align = Some(align);
    self
  }

  #[must_use]
  pub fn size(mut self, size: u32) -> Self {
    self.attributes.size = Some(size);
    self
  }

  #[must_use]
  pub fn location(mut self, location: u32) -> Self {
    self.attributes.io = Some(IoAttribute::Location(location));
    self
  }

  #[must_use]
  pub fn builtin(mut self, builtin: Builtin) -> Self {
    self.attributes.io = Some(IoAttribute::Builtin(builtin));
    self
  }
}

pub fn struct_of(fields: impl IntoIterator<Item = StructField>) -> Result<TypeDescriptor, SchemaError> {
  build_struct(None, fields.into_iter().collect())
}

/// Same as [`struct_of`], the label names the emitted WGSL struct and takes
/// part in equality.
pub fn named_struct_of(
  label: impl Into<String>,
  fields: impl IntoIterator<Item = StructField>,
) -> Result<TypeDescriptor, SchemaError> {
  build_struct(Some(label.into()), fields.into_iter().collect())
}

fn build_struct(label: Option<String>, fields: Vec<StructField>) -> Result<TypeDescriptor, SchemaError> {
  check_fields(&fields)?;

  let descriptor = TypeDescriptor::Struct(Arc::new(StructDescriptor { label, fields }));
  if let Err(LayoutError::SizeOverflow { .. }) = compute_layout(&descriptor) {
    return Err(SchemaError::StructTooLarge(descriptor.to_string()));
  }
  Ok(descriptor)
}

fn check_fields(fields: &[StructField]) -> Result<(), SchemaError> {
  if fields.is_empty() {
    return Err(SchemaError::EmptyStruct);
  }

  let mut names = FastHashSet::default();
  let last = fields.len() - 1;
  for (index, field) in fields.iter().enumerate() {
    if !is_valid_identifier(&field.name) {
      return Err(SchemaError::InvalidIdentifier(field.name.clone()));
    }
    if !names.insert(field.name.as_str()) {
      return Err(SchemaError::DuplicateField(field.name.clone()));
    }

    if !field.ty.is_sized() {
      if index != last {
        return Err(SchemaError::NonFinalRuntimeField(field.name.clone()));
      }
      // a runtime array may end a struct, a struct ending in one may not
      if !field.ty.is_runtime_sized_array() {
        return Err(SchemaError::NestedRuntimeArray(field.ty.to_string()));
      }
    }

    check_field_attributes(field)?;
  }
  Ok(())
}

fn check_field_attributes(field: &StructField) -> Result<(), SchemaError> {
  let natural = natural_layout(&field.ty);

  if let Some(align) = field.attributes.align {
    if !align.is_power_of_two() || (align as usize) < natural.alignment {
      return Err(SchemaError::InvalidAlign {
        field: field.name.clone(),
        align,
        natural: natural.alignment,
      });
    }
  }

  if let Some(size) = field.attributes.size {
    // @size needs a fixed natural size to compare against
    let natural_size = natural.size.unwrap_or(usize::MAX);
    if (size as usize) < natural_size {
      return Err(SchemaError::InvalidSize {
        field: field.name.clone(),
        size,
        natural: natural_size,
      });
    }
  }

  if let Some(IoAttribute::Builtin(builtin)) = field.attributes.io {
    let expected = builtin.ty();
    if expected != field.ty {
      return Err(SchemaError::BuiltinTypeMismatch {
        field: field.name.clone(),
        builtin: builtin.wgsl_name(),
        expected: expected.to_string(),
        found: field.ty.to_string(),
      });
    }
  }

  Ok(())
}

struct NaturalLayout {
  size: Option<usize>,
  alignment: usize,
}

/// Layout facts of an already validated descriptor. Everything nested in a
/// field went through the registry, so the layout cannot fail here.
fn natural_layout(ty: &TypeDescriptor) -> NaturalLayout {
  match compute_layout(ty) {
    Ok(layout) => NaturalLayout {
      size: layout.size,
      alignment: layout.alignment,
    },
    Err(_) => NaturalLayout {
      size: None,
      alignment: 1,
    },
  }
}
