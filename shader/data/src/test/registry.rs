use crate::*;

#[test]
fn nested_runtime_array_is_rejected() {
  let runtime = array_of(U32, ArrayLength::Runtime).unwrap();
  assert!(matches!(
    array_of(runtime, 4usize),
    Err(SchemaError::NestedRuntimeArray(_))
  ));

  let tail = struct_of([field("len", U32), field("items", array_of(F32, 0usize).unwrap())]).unwrap();
  assert!(matches!(
    array_of(tail.clone(), 2usize),
    Err(SchemaError::NestedRuntimeArray(_))
  ));
  assert!(matches!(
    struct_of([field("a", F32), field("nested", tail)]),
    Err(SchemaError::NestedRuntimeArray(_))
  ));
}

#[test]
fn element_counts() {
  assert_eq!(
    array_of(F32, -1i64),
    Err(SchemaError::InvalidElementCount(-1))
  );
  assert_eq!(
    array_of(F32, -3i32),
    Err(SchemaError::InvalidElementCount(-3))
  );
  assert!(array_of(F32, 0usize).unwrap().is_runtime_sized_array());
  assert_eq!(array_of(F32, 4u32).unwrap(), array_of(F32, 4i64).unwrap());

  assert!(matches!(
    array_of(VEC4F, usize::MAX / 2),
    Err(SchemaError::InvalidElementCount(_))
  ));
  let half = array_of(VEC4F, 1usize << 59).unwrap();
  assert!(matches!(
    struct_of([field("a", half.clone()), field("b", half)]),
    Err(SchemaError::StructTooLarge(_))
  ));

  let make = array_of_lazy(VEC3F);
  assert_eq!(make.count(4usize).unwrap(), array_of(VEC3F, 4usize).unwrap());
  assert_eq!(
    make.count(-2i64),
    Err(SchemaError::InvalidElementCount(-2))
  );
}

#[test]
fn component_kinds() {
  assert_eq!(
    mat(ScalarKind::I32, VectorWidth::Two, VectorWidth::Two),
    Err(SchemaError::InvalidMatrixComponent(ScalarKind::I32))
  );
  assert_eq!(
    mat(ScalarKind::F32, VectorWidth::Four, VectorWidth::Four).unwrap(),
    MAT4X4F
  );
  assert_eq!(
    atomic(ScalarKind::F32),
    Err(SchemaError::InvalidAtomicComponent(ScalarKind::F32))
  );
  assert_eq!(atomic(ScalarKind::U32).unwrap(), ATOMIC_U32);
}

#[test]
fn struct_validation() {
  assert_eq!(struct_of(Vec::new()), Err(SchemaError::EmptyStruct));
  assert_eq!(
    struct_of([field("a", F32), field("a", U32)]),
    Err(SchemaError::DuplicateField("a".into()))
  );
  assert_eq!(
    struct_of([field("fn", F32)]),
    Err(SchemaError::InvalidIdentifier("fn".into()))
  );
  assert_eq!(
    struct_of([field("1st", F32)]),
    Err(SchemaError::InvalidIdentifier("1st".into()))
  );
  assert_eq!(
    struct_of([field("vec3f", F32)]),
    Err(SchemaError::InvalidIdentifier("vec3f".into()))
  );
  assert_eq!(
    struct_of([field("data", array_of(U32, ArrayLength::Runtime).unwrap()), field("b", F32)]),
    Err(SchemaError::NonFinalRuntimeField("data".into()))
  );
}

#[test]
fn attribute_validation() {
  assert_eq!(
    struct_of([field("a", VEC3F).align(8)]),
    Err(SchemaError::InvalidAlign {
      field: "a".into(),
      align: 8,
      natural: 16
    })
  );
  assert!(matches!(
    struct_of([field("a", F32).align(24)]),
    Err(SchemaError::InvalidAlign { .. })
  ));
  assert_eq!(
    struct_of([field("a", VEC3F).size(8)]),
    Err(SchemaError::InvalidSize {
      field: "a".into(),
      size: 8,
      natural: 12
    })
  );
  assert!(matches!(
    struct_of([field("pos", VEC3F).builtin(Builtin::Position)]),
    Err(SchemaError::BuiltinTypeMismatch { builtin: "position", .. })
  ));
  assert!(struct_of([field("pos", VEC4F).builtin(Builtin::Position), field("uv", VEC2F).location(0)]).is_ok());
}

#[test]
fn structural_identity() {
  let a = struct_of([field("a", VEC3F), field("b", F32)]).unwrap();
  let b = struct_of([field("a", VEC3F), field("b", F32)]).unwrap();
  assert_eq!(a, b);

  let named = named_struct_of("Light", [field("a", VEC3F), field("b", F32)]).unwrap();
  assert_ne!(a, named);
  assert_eq!(named.to_string(), "Light");
  assert_eq!(a.to_string(), "struct { a: vec3f, b: f32 }");
}

#[test]
fn display_uses_wgsl_spelling() {
  assert_eq!(array_of(VEC3F, 4usize).unwrap().to_string(), "array<vec3f, 4>");
  assert_eq!(array_of(U32, ArrayLength::Runtime).unwrap().to_string(), "array<u32>");
  assert_eq!(VEC3B.to_string(), "vec3<bool>");
  assert_eq!(MAT2X3H.to_string(), "mat2x3h");
  assert_eq!(ATOMIC_I32.to_string(), "atomic<i32>");
}

#[test]
fn identifiers() {
  assert!(is_valid_identifier("color"));
  assert!(is_valid_identifier("_private"));
  assert!(!is_valid_identifier("_"));
  assert!(!is_valid_identifier("__reserved"));
  assert!(!is_valid_identifier("loop"));
  assert!(!is_valid_identifier("mat4x4h"));
  assert!(!is_valid_identifier("has space"));
  assert_eq!(sanitize_identifier("my shader-fn"), "my_shader_fn");
  assert_eq!(sanitize_identifier("2d"), "_2d");
  assert_eq!(sanitize_identifier(""), "item");
}
