use parking_lot::RwLock;

use crate::*;

/// Exact WGSL memory layout of a descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeLayout {
  /// `None` for runtime-sized arrays and structs ending in one.
  pub size: Option<usize>,
  pub alignment: usize,
  pub children: ChildLayout,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChildLayout {
  None,
  Matrix {
    column_stride: usize,
  },
  Array {
    stride: usize,
    element: Arc<TypeLayout>,
  },
  Struct(Vec<FieldLayout>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldLayout {
  pub name: String,
  pub offset: usize,
  /// Bytes reserved for the member, `@size` included.
  pub span: Option<usize>,
  pub layout: Arc<TypeLayout>,
}

impl TypeLayout {
  pub fn field(&self, name: &str) -> Option<&FieldLayout> {
    match &self.children {
      ChildLayout::Struct(fields) => fields.iter().find(|f| f.name == name),
      _ => None,
    }
  }

  /// Distance between consecutive values of this type in an array.
  pub fn stride(&self) -> Option<usize> {
    self.size.map(|size| round_up(self.alignment, size))
  }
}

/// Round `n` up to the nearest alignment boundary.
pub const fn round_up(k: usize, n: usize) -> usize {
  // equivalent to:
  // match n % k {
  //     0 => n,
  //     rem => n + (k - rem),
  // }
  let mask = k - 1;
  (n + mask) & !mask
}

/// [`round_up`] that reports overflow instead of wrapping.
pub const fn checked_round_up(k: usize, n: usize) -> Option<usize> {
  let mask = k - 1;
  match n.checked_add(mask) {
    Some(v) => Some(v & !mask),
    None => None,
  }
}

pub const fn scalar_size(kind: ScalarKind) -> usize {
  match kind {
    ScalarKind::F16 => 2,
    ScalarKind::Bool | ScalarKind::F32 | ScalarKind::I32 | ScalarKind::U32 => 4,
  }
}

/// vec3 is aligned like vec4.
const fn vector_align_factor(width: VectorWidth) -> usize {
  match width {
    VectorWidth::Two => 2,
    VectorWidth::Three | VectorWidth::Four => 4,
  }
}

/// (size, alignment)
pub const fn vector_size_align(kind: ScalarKind, width: VectorWidth) -> (usize, usize) {
  let s = scalar_size(kind);
  (width.count() * s, vector_align_factor(width) * s)
}

/// (size, alignment, column stride)
pub const fn matrix_size_align(
  kind: ScalarKind,
  columns: VectorWidth,
  rows: VectorWidth,
) -> (usize, usize, usize) {
  let (column_size, column_align) = vector_size_align(kind, rows);
  let column_stride = round_up(column_align, column_size);
  (columns.count() * column_stride, column_align, column_stride)
}

fn leaf(size: usize, alignment: usize) -> TypeLayout {
  TypeLayout {
    size: Some(size),
    alignment,
    children: ChildLayout::None,
  }
}

fn display_path(path: &str) -> String {
  if path.is_empty() {
    String::from("<root>")
  } else {
    path.to_string()
  }
}

fn size_overflow(path: &str) -> LayoutError {
  LayoutError::SizeOverflow {
    path: display_path(path),
  }
}

pub fn compute_layout(ty: &TypeDescriptor) -> Result<Arc<TypeLayout>, LayoutError> {
  compute(ty, "")
}

fn compute(ty: &TypeDescriptor, path: &str) -> Result<Arc<TypeLayout>, LayoutError> {
  let layout = match ty {
    TypeDescriptor::Scalar(kind) | TypeDescriptor::Atomic(kind) => {
      let s = scalar_size(*kind);
      leaf(s, s)
    }
    TypeDescriptor::Vector { kind, width } => {
      let (size, align) = vector_size_align(*kind, *width);
      leaf(size, align)
    }
    TypeDescriptor::Matrix {
      kind,
      columns,
      rows,
    } => {
      let (size, alignment, column_stride) = matrix_size_align(*kind, *columns, *rows);
      TypeLayout {
        size: Some(size),
        alignment,
        children: ChildLayout::Matrix { column_stride },
      }
    }
    TypeDescriptor::Array(array) => {
      let element = compute(&array.element, &format!("{path}[]"))?;
      let stride = element.stride().ok_or_else(|| LayoutError::UnsizedElement {
        path: display_path(path),
      })?;
      let size = match array.length {
        ArrayLength::Fixed(count) => Some(count.checked_mul(stride).ok_or_else(|| size_overflow(path))?),
        ArrayLength::Runtime => None,
      };
      TypeLayout {
        size,
        alignment: element.alignment,
        children: ChildLayout::Array { stride, element },
      }
    }
    TypeDescriptor::Struct(s) => compute_struct(s, path)?,
  };
  Ok(Arc::new(layout))
}

fn compute_struct(s: &StructDescriptor, path: &str) -> Result<TypeLayout, LayoutError> {
  if s.fields.is_empty() {
    return Err(LayoutError::EmptyStruct {
      path: display_path(path),
    });
  }

  let last = s.fields.len() - 1;
  let mut offset = 0;
  let mut alignment = 1;
  let mut sized = true;
  let mut fields = Vec::with_capacity(s.fields.len());

  for (index, field) in s.fields.iter().enumerate() {
    let field_path = format!("{path}.{}", field.name);
    let layout = compute(&field.ty, &field_path)?;

    if layout.size.is_none() && (index != last || !field.ty.is_runtime_sized_array()) {
      return Err(LayoutError::NonFinalRuntimeField { path: field_path });
    }

    let field_align = match field.attributes.align {
      Some(align) => {
        let align = align as usize;
        if !align.is_power_of_two() || align < layout.alignment {
          return Err(LayoutError::InvalidAttribute {
            path: field_path,
            reason: format!(
              "@align({align}) must be a power of two of at least {}",
              layout.alignment
            ),
          });
        }
        align
      }
      None => layout.alignment,
    };

    let span = match (field.attributes.size, layout.size) {
      (Some(size), Some(natural)) if (size as usize) >= natural => Some(size as usize),
      (Some(size), Some(natural)) => {
        return Err(LayoutError::InvalidAttribute {
          path: field_path,
          reason: format!("@size({size}) is smaller than the natural size {natural}"),
        })
      }
      (Some(size), None) => {
        return Err(LayoutError::InvalidAttribute {
          path: field_path,
          reason: format!("@size({size}) on a runtime-sized member"),
        })
      }
      (None, natural) => natural,
    };

    offset = checked_round_up(field_align, offset).ok_or_else(|| size_overflow(&field_path))?;
    alignment = alignment.max(field_align);
    fields.push(FieldLayout {
      name: field.name.clone(),
      offset,
      span,
      layout,
    });

    match span {
      Some(span) => {
        offset = offset
          .checked_add(span)
          .ok_or_else(|| size_overflow(&field_path))?
      }
      None => sized = false,
    }
  }

  let size = if sized {
    Some(checked_round_up(alignment, offset).ok_or_else(|| size_overflow(path))?)
  } else {
    None
  };

  Ok(TypeLayout {
    size,
    alignment,
    children: ChildLayout::Struct(fields),
  })
}

pub fn size_of(ty: &TypeDescriptor) -> Result<Option<usize>, LayoutError> {
  Ok(compute_layout(ty)?.size)
}

pub fn align_of(ty: &TypeDescriptor) -> Result<usize, LayoutError> {
  Ok(compute_layout(ty)?.alignment)
}

/// Byte offset of a direct member, `None` when `ty` has no such member.
pub fn offset_of(ty: &TypeDescriptor, field: &str) -> Result<Option<usize>, LayoutError> {
  Ok(compute_layout(ty)?.field(field).map(|f| f.offset))
}

/// Checks the extra constraints of the uniform address space:
/// https://www.w3.org/TR/WGSL/#address-space-layout-constraints
pub fn check_uniform_layout(ty: &TypeDescriptor) -> Result<(), LayoutError> {
  let layout = compute_layout(ty)?;
  check_uniform(ty, &layout, "")
}

fn uniform_error(path: &str, reason: impl Into<String>) -> LayoutError {
  LayoutError::UniformIncompatible {
    path: display_path(path),
    reason: reason.into(),
  }
}

fn check_uniform(ty: &TypeDescriptor, layout: &TypeLayout, path: &str) -> Result<(), LayoutError> {
  match (ty, &layout.children) {
    (TypeDescriptor::Scalar(ScalarKind::Bool), _) | (TypeDescriptor::Vector { kind: ScalarKind::Bool, .. }, _) => {
      Err(uniform_error(path, "bool is not host-shareable"))
    }
    (TypeDescriptor::Atomic(_), _) => Err(uniform_error(
      path,
      "atomics are only valid in the storage and workgroup address spaces",
    )),
    (TypeDescriptor::Array(array), ChildLayout::Array { stride, element }) => {
      if array.length == ArrayLength::Runtime {
        return Err(uniform_error(path, "runtime-sized array"));
      }
      if stride % 16 != 0 {
        return Err(uniform_error(
          path,
          format!("array stride {stride} is not a multiple of 16"),
        ));
      }
      check_uniform(&array.element, element, &format!("{path}[]"))
    }
    (TypeDescriptor::Struct(s), ChildLayout::Struct(fields)) => {
      for (index, (field, field_layout)) in s.fields.iter().zip(fields).enumerate() {
        let field_path = format!("{path}.{}", field.name);
        let composite = matches!(
          field.ty,
          TypeDescriptor::Struct(_) | TypeDescriptor::Array(_)
        );
        if composite && field_layout.offset % 16 != 0 {
          return Err(uniform_error(
            &field_path,
            format!(
              "member of struct or array type at offset {} is not aligned to 16",
              field_layout.offset
            ),
          ));
        }
        if let (TypeDescriptor::Struct(_), Some(next)) = (&field.ty, fields.get(index + 1)) {
          let size = field_layout.layout.size.unwrap_or(0);
          if next.offset - field_layout.offset < round_up(16, size) {
            return Err(uniform_error(
              &format!("{path}.{}", next.name),
              format!(
                "must start at least {} bytes after struct member `{}`",
                round_up(16, size),
                field.name
              ),
            ));
          }
        }
        check_uniform(&field.ty, &field_layout.layout, &field_path)?;
      }
      Ok(())
    }
    _ => Ok(()),
  }
}

/// Memoizes layouts by structural descriptor identity.
///
/// Readers never observe a partially built entry: the layout is computed
/// outside the lock and published whole.
#[derive(Default)]
pub struct LayoutCache {
  layouts: RwLock<FastHashMap<TypeDescriptor, Arc<TypeLayout>>>,
}

impl LayoutCache {
  pub fn get_or_compute(&self, ty: &TypeDescriptor) -> Result<Arc<TypeLayout>, LayoutError> {
    if let Some(layout) = self.layouts.read().get(ty) {
      return Ok(layout.clone());
    }
    let layout = compute_layout(ty)?;
    let mut layouts = self.layouts.write();
    Ok(layouts.entry(ty.clone()).or_insert(layout).clone())
  }

  pub fn len(&self) -> usize {
    self.layouts.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.layouts.read().is_empty()
  }

  pub fn clear(&self) {
    self.layouts.write().clear();
  }
}
