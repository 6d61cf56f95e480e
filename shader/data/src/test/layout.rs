use crate::*;

fn layout(ty: &TypeDescriptor) -> Arc<TypeLayout> {
  compute_layout(ty).unwrap()
}

#[test]
fn scalar_and_vector_table() {
  assert_eq!(size_of(&F32).unwrap(), Some(4));
  assert_eq!(size_of(&F16).unwrap(), Some(2));
  assert_eq!(align_of(&BOOL).unwrap(), 4);
  assert_eq!(align_of(&ATOMIC_U32).unwrap(), 4);

  let vec3f = layout(&VEC3F);
  assert_eq!((vec3f.size, vec3f.alignment), (Some(12), 16));
  let vec2f = layout(&VEC2F);
  assert_eq!((vec2f.size, vec2f.alignment), (Some(8), 8));
  let vec2h = layout(&VEC2H);
  assert_eq!((vec2h.size, vec2h.alignment), (Some(4), 4));
  let vec3h = layout(&VEC3H);
  assert_eq!((vec3h.size, vec3h.alignment), (Some(6), 8));
  let vec4u = layout(&VEC4U);
  assert_eq!((vec4u.size, vec4u.alignment), (Some(16), 16));
}

#[test]
fn matrix_table() {
  let check = |ty: &TypeDescriptor, size, align, stride| {
    let l = layout(ty);
    assert_eq!(l.size, Some(size), "{ty}");
    assert_eq!(l.alignment, align, "{ty}");
    assert_eq!(l.children, ChildLayout::Matrix { column_stride: stride }, "{ty}");
  };
  check(&MAT2X2F, 16, 8, 8);
  check(&MAT3X3F, 48, 16, 16);
  check(&MAT4X4F, 64, 16, 16);
  check(&MAT4X2F, 32, 8, 8);
  check(&MAT2X3F, 32, 16, 16);
  check(&MAT3X2H, 12, 4, 4);
  check(&MAT4X3H, 32, 8, 8);
  check(&MAT2X4H, 16, 8, 8);
}

#[test]
fn struct_packs_scalar_after_vec3() {
  let ty = struct_of([field("a", VEC3F), field("b", F32)]).unwrap();
  let l = layout(&ty);
  assert_eq!(l.size, Some(16));
  assert_eq!(l.alignment, 16);
  assert_eq!(offset_of(&ty, "b").unwrap(), Some(12));
  assert_eq!(offset_of(&ty, "c").unwrap(), None);
}

#[test]
fn struct_pads_to_alignment() {
  let ty = struct_of([field("a", F32), field("b", VEC3F), field("arr", array_of(U32, 3usize).unwrap())]).unwrap();
  let l = layout(&ty);
  assert_eq!(l.field("a").unwrap().offset, 0);
  assert_eq!(l.field("b").unwrap().offset, 16);
  assert_eq!(l.field("arr").unwrap().offset, 28);
  assert_eq!(l.size, Some(48));
}

#[test]
fn array_stride_rounds_element_size() {
  let ty = array_of(VEC3F, 4usize).unwrap();
  let l = layout(&ty);
  assert_eq!(l.size, Some(64));
  assert_eq!(l.alignment, 16);
  match &l.children {
    ChildLayout::Array { stride, element } => {
      assert_eq!(*stride, 16);
      assert_eq!(element.size, Some(12));
    }
    other => panic!("unexpected children {other:?}"),
  }

  let nested = array_of(struct_of([field("a", VEC3F), field("b", F32)]).unwrap(), 2usize).unwrap();
  assert_eq!(size_of(&nested).unwrap(), Some(32));
}

#[test]
fn align_and_size_attributes() {
  let ty = struct_of([field("a", F32).size(16), field("b", F32).align(16), field("c", VEC2F)]).unwrap();
  let l = layout(&ty);
  assert_eq!(l.field("a").unwrap().span, Some(16));
  assert_eq!(l.field("b").unwrap().offset, 16);
  assert_eq!(l.field("c").unwrap().offset, 24);
  assert_eq!(l.alignment, 16);
  assert_eq!(l.size, Some(32));
}

#[test]
fn runtime_sized_tail() {
  let ty = struct_of([field("count", U32), field("data", array_of(VEC4F, ArrayLength::Runtime).unwrap())]).unwrap();
  let l = layout(&ty);
  assert_eq!(l.size, None);
  assert_eq!(l.alignment, 16);
  assert_eq!(l.field("data").unwrap().offset, 16);
  assert_eq!(l.field("data").unwrap().span, None);
}

#[test]
fn malformed_descriptors_name_their_path() {
  let runtime = array_of(U32, ArrayLength::Runtime).unwrap();
  let ty = TypeDescriptor::Struct(Arc::new(StructDescriptor {
    label: None,
    fields: vec![field("inner", runtime.clone()), field("b", F32)],
  }));
  assert_eq!(
    compute_layout(&ty),
    Err(LayoutError::NonFinalRuntimeField {
      path: ".inner".into()
    })
  );

  let nested = TypeDescriptor::Array(Arc::new(ArrayDescriptor {
    element: runtime,
    length: ArrayLength::Fixed(4),
  }));
  assert_eq!(
    compute_layout(&nested),
    Err(LayoutError::UnsizedElement {
      path: "<root>".into()
    })
  );

  let empty = TypeDescriptor::Struct(Arc::new(StructDescriptor {
    label: None,
    fields: vec![],
  }));
  let outer = TypeDescriptor::Struct(Arc::new(StructDescriptor {
    label: None,
    fields: vec![field("e", empty)],
  }));
  assert_eq!(
    compute_layout(&outer),
    Err(LayoutError::EmptyStruct { path: ".e".into() })
  );
}

#[test]
fn oversized_descriptors_report_overflow() {
  let huge = TypeDescriptor::Array(Arc::new(ArrayDescriptor {
    element: VEC4F,
    length: ArrayLength::Fixed(usize::MAX / 2),
  }));
  assert_eq!(
    compute_layout(&huge),
    Err(LayoutError::SizeOverflow {
      path: "<root>".into()
    })
  );

  // each member spans half of the address range
  let half = array_of(VEC4F, 1usize << 59).unwrap();
  assert_eq!(size_of(&half), Ok(Some(1usize << 63)));
  let ty = TypeDescriptor::Struct(Arc::new(StructDescriptor {
    label: None,
    fields: vec![field("a", half.clone()), field("b", half)],
  }));
  assert_eq!(
    compute_layout(&ty),
    Err(LayoutError::SizeOverflow { path: ".b".into() })
  );
}

#[test]
fn invalid_attribute_on_raw_descriptor() {
  let ty = TypeDescriptor::Struct(Arc::new(StructDescriptor {
    label: None,
    fields: vec![field("a", VEC4F).align(4)],
  }));
  assert!(matches!(
    compute_layout(&ty),
    Err(LayoutError::InvalidAttribute { path, .. }) if path == ".a"
  ));
}

#[test]
fn layout_is_deterministic() {
  let a = struct_of([field("a", VEC3F), field("b", MAT3X3F)]).unwrap();
  let b = struct_of([field("a", VEC3F), field("b", MAT3X3F)]).unwrap();
  assert_eq!(layout(&a), layout(&b));
}

#[test]
fn cache_shares_structurally_equal_descriptors() {
  let cache = LayoutCache::default();
  let a = struct_of([field("a", VEC3F), field("b", F32)]).unwrap();
  let b = struct_of([field("a", VEC3F), field("b", F32)]).unwrap();

  let first = cache.get_or_compute(&a).unwrap();
  let second = cache.get_or_compute(&b).unwrap();
  assert!(Arc::ptr_eq(&first, &second));
  assert_eq!(cache.len(), 1);

  cache.get_or_compute(&VEC3F).unwrap();
  assert_eq!(cache.len(), 2);
  cache.clear();
  assert!(cache.is_empty());
}

#[test]
fn uniform_constraints() {
  assert!(check_uniform_layout(&array_of(VEC4F, 4usize).unwrap()).is_ok());
  assert!(check_uniform_layout(&F32).is_ok());
  assert!(check_uniform_layout(&MAT4X4F).is_ok());

  assert!(matches!(
    check_uniform_layout(&array_of(F32, 4usize).unwrap()),
    Err(LayoutError::UniformIncompatible { .. })
  ));
  assert!(check_uniform_layout(&array_of(U32, ArrayLength::Runtime).unwrap()).is_err());
  assert!(check_uniform_layout(&BOOL).is_err());
  assert!(check_uniform_layout(&ATOMIC_U32).is_err());

  let small = struct_of([field("x", F32)]).unwrap();
  let misaligned = struct_of([field("a", F32), field("b", small.clone())]).unwrap();
  assert!(matches!(
    check_uniform_layout(&misaligned),
    Err(LayoutError::UniformIncompatible { path, .. }) if path == ".b"
  ));

  let aligned = struct_of([field("a", F32), field("b", small).align(16), field("c", F32).align(32)]).unwrap();
  assert!(check_uniform_layout(&aligned).is_ok());

  let wide = struct_of([field("x", VEC4F)]).unwrap();
  let ok = struct_of([field("a", F32), field("b", wide)]).unwrap();
  assert!(check_uniform_layout(&ok).is_ok());
}

#[test]
fn uniform_requires_gap_after_nested_struct() {
  let small = struct_of([field("x", F32)]).unwrap();
  let ty = struct_of([field("s", small).align(16), field("after", F32)]).unwrap();
  assert!(matches!(
    check_uniform_layout(&ty),
    Err(LayoutError::UniformIncompatible { path, .. }) if path == ".after"
  ));
}
