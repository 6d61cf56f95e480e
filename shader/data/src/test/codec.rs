use super::sample_struct;
use crate::*;

fn sample_value(a: f32, b: [f32; 3], arr: [u32; 3]) -> HostValue {
  HostValue::structure([
    ("a", a.into()),
    ("b", HostValue::vector(b)),
    ("arr", HostValue::array(arr.map(HostValue::from))),
  ])
}

fn f32_at(buffer: &[u8], offset: usize) -> f32 {
  f32::from_le_bytes(buffer[offset..offset + 4].try_into().unwrap())
}

#[test]
fn round_trip() {
  let ty = sample_struct();
  let value = sample_value(1.5, [1., 2., 3.], [7, 8, 9]);
  let bytes = encode_to_vec(&value, &ty).unwrap();
  assert_eq!(bytes.len(), 48);
  assert_eq!(f32_at(&bytes, 0), 1.5);
  assert_eq!(f32_at(&bytes, 20), 2.);
  assert_eq!(u32::from_le_bytes(bytes[36..40].try_into().unwrap()), 9);
  assert_eq!(decode(&bytes, &ty, 0).unwrap(), value);
}

#[test]
fn padding_is_left_untouched() {
  let ty = struct_of([field("a", F32), field("b", VEC4F)]).unwrap();
  let value = HostValue::structure([("a", 1f32.into()), ("b", HostValue::vector([0f32; 4]))]);
  let mut buffer = vec![0xAA; 40];
  encode(&value, &ty, &mut buffer, 8).unwrap();
  assert!(buffer[..8].iter().all(|b| *b == 0xAA));
  assert_eq!(f32_at(&buffer, 8), 1.);
  assert!(buffer[12..24].iter().all(|b| *b == 0xAA));
  assert!(buffer[24..40].iter().all(|b| *b == 0));
}

#[test]
fn matrix_columns_use_column_stride() {
  let value = HostValue::matrix([[1f32, 2., 3.], [4., 5., 6.], [7., 8., 9.]]);
  let mut buffer = vec![0xFF; 48];
  encode(&value, &MAT3X3F, &mut buffer, 0).unwrap();
  assert_eq!(f32_at(&buffer, 16), 4.);
  assert_eq!(f32_at(&buffer, 40), 9.);
  assert!(buffer[12..16].iter().all(|b| *b == 0xFF));
  assert_eq!(decode(&buffer, &MAT3X3F, 0).unwrap(), value);
}

#[test]
fn scalar_representations() {
  let bytes = encode_to_vec(&HostValue::vector([true, false]), &VEC2B).unwrap();
  assert_eq!(bytes, [1, 0, 0, 0, 0, 0, 0, 0]);

  let half_value = HostValue::vector([half::f16::from_f32(1.), half::f16::from_f32(-2.)]);
  let bytes = encode_to_vec(&half_value, &VEC2H).unwrap();
  assert_eq!(bytes.len(), 4);
  assert_eq!(&bytes[..2], &half::f16::from_f32(1.).to_le_bytes());
  assert_eq!(decode(&bytes, &VEC2H, 0).unwrap(), half_value);

  let bytes = encode_to_vec(&(-2i32).into(), &I32).unwrap();
  assert_eq!(bytes, (-2i32).to_le_bytes());

  let mut truthy = vec![0; 4];
  truthy[1] = 3;
  assert_eq!(decode(&truthy, &BOOL, 0).unwrap(), HostValue::from(true));
}

#[test]
fn runtime_arrays_follow_the_buffer() {
  let ty = array_of(U32, ArrayLength::Runtime).unwrap();
  let buffer = vec![0u8; 50];
  match decode(&buffer, &ty, 8).unwrap() {
    HostValue::Array(elements) => assert_eq!(elements.len(), 10),
    other => panic!("unexpected {other:?}"),
  }

  let tail = struct_of([field("count", U32), field("data", array_of(VEC4F, ArrayLength::Runtime).unwrap())]).unwrap();
  let value = HostValue::structure([
    ("count", 2u32.into()),
    (
      "data",
      HostValue::array([HostValue::vector([1f32; 4]), HostValue::vector([2f32; 4])]),
    ),
  ]);
  let bytes = encode_to_vec(&value, &tail).unwrap();
  assert_eq!(bytes.len(), 48);
  assert_eq!(decode(&bytes, &tail, 0).unwrap(), value);
}

#[test]
fn partial_update_matches_full_encode() {
  let ty = sample_struct();
  let mut buffer = encode_to_vec(&sample_value(1., [1., 2., 3.], [1, 2, 3]), &ty).unwrap();

  let partial = PartialValue::new()
    .set(ValuePath::root().field("b").field("y"), 5f32)
    .set(ValuePath::root().field("arr").index(2), 9u32)
    .set(ValuePath::root().field("a"), 2f32);
  let ranges = encode_partial(&partial, &ty, &mut buffer, 0).unwrap();
  assert_eq!(ranges, vec![0..4, 20..24, 36..40]);

  let expected = encode_to_vec(&sample_value(2., [1., 5., 3.], [1, 2, 9]), &ty).unwrap();
  assert_eq!(buffer, expected);
}

#[test]
fn partial_ranges_merge() {
  let ty = sample_struct();
  let mut buffer = vec![0; 64];
  let partial = PartialValue::new()
    .set(ValuePath::root().field("arr").index(1), 1u32)
    .set(ValuePath::root().field("arr").index(0), 1u32)
    .set(ValuePath::root().field("b"), HostValue::vector([1f32, 1., 1.]))
    .set(ValuePath::root().field("b").index(1), 3f32);
  let ranges = encode_partial(&partial, &ty, &mut buffer, 16).unwrap();
  assert_eq!(ranges, vec![32..52]);
  assert_eq!(f32_at(&buffer, 36), 3.);
  assert!(buffer[..32].iter().all(|b| *b == 0));
}

#[test]
fn failed_partial_update_writes_nothing() {
  let ty = sample_struct();
  let original = encode_to_vec(&sample_value(1., [1., 2., 3.], [1, 2, 3]), &ty).unwrap();

  let bad_path = PartialValue::new()
    .set(ValuePath::root().field("a"), 4f32)
    .set(ValuePath::root().field("nope"), 2f32);
  let bad_shape = PartialValue::new()
    .set(ValuePath::root().field("a"), 4f32)
    .set(ValuePath::root().field("b"), 2f32);
  let too_far = PartialValue::new()
    .set(ValuePath::root().field("a"), 4f32)
    .set(ValuePath::root().field("arr").index(2), 7u32);

  let mut buffer = original.clone();
  assert!(matches!(
    encode_partial(&bad_path, &ty, &mut buffer, 0),
    Err(EncodeError::InvalidPath { .. })
  ));
  assert_eq!(buffer, original);

  assert!(matches!(
    encode_partial(&bad_shape, &ty, &mut buffer, 0),
    Err(EncodeError::ShapeMismatch { .. })
  ));
  assert_eq!(buffer, original);

  let mut short = original[..36].to_vec();
  assert!(matches!(
    encode_partial(&too_far, &ty, &mut short, 0),
    Err(EncodeError::OutOfBounds { .. })
  ));
  assert_eq!(short, original[..36]);
}

#[test]
fn partial_matrix_column() {
  let mut buffer = vec![0; 64];
  let partial = PartialValue::new().set(ValuePath::root().index(3), HostValue::vector([1f32, 2., 3., 4.]));
  let ranges = encode_partial(&partial, &MAT4X4F, &mut buffer, 0).unwrap();
  assert_eq!(ranges, vec![48..64]);
}

#[test]
fn encode_errors_name_the_path() {
  let ty = sample_struct();

  let missing = HostValue::structure([("a", 1f32.into()), ("b", HostValue::vector([0f32; 3]))]);
  assert_eq!(
    encode_to_vec(&missing, &ty),
    Err(EncodeError::MissingField {
      path: ValuePath::root(),
      field: "arr".into()
    })
  );

  let mut unknown = sample_value(0., [0.; 3], [0; 3]);
  if let HostValue::Struct(fields) = &mut unknown {
    fields.push(("extra".into(), 1u32.into()));
  }
  assert!(matches!(
    encode_to_vec(&unknown, &ty),
    Err(EncodeError::UnknownField { field, .. }) if field == "extra"
  ));

  let short = HostValue::structure([
    ("a", 1f32.into()),
    ("b", HostValue::vector([0f32; 3])),
    ("arr", HostValue::array([HostValue::from(1u32)])),
  ]);
  assert_eq!(
    encode_to_vec(&short, &ty),
    Err(EncodeError::ArrayLength {
      path: ValuePath::root().field("arr"),
      expected: 3,
      found: 1
    })
  );

  let mut wrong_kind = sample_value(0., [0.; 3], [0; 3]);
  if let Some(HostValue::Vector(c)) = wrong_kind.field_mut("b") {
    c[2] = 1u32.into();
  }
  let err = encode_to_vec(&wrong_kind, &ty).unwrap_err();
  assert!(matches!(&err, EncodeError::ShapeMismatch { path, .. } if *path == ValuePath::root().field("b").index(2)));
  assert_eq!(err.to_string(), "`.b[2]`: expected f32, found u32");
}

#[test]
fn out_of_bounds() {
  let mut small = vec![0; 8];
  assert!(matches!(
    encode(&HostValue::vector([0f32; 4]), &VEC4F, &mut small, 0),
    Err(EncodeError::OutOfBounds { needed: 16, available: 8, .. })
  ));
  assert!(matches!(
    decode(&small, &VEC4F, 0),
    Err(DecodeError::OutOfBounds { .. })
  ));

  let partial = PartialValue::new().set(ValuePath::root().field("missing"), 1f32);
  assert!(matches!(
    encode_partial(&partial, &sample_struct(), &mut vec![0; 48], 0),
    Err(EncodeError::InvalidPath { .. })
  ));
  let partial = PartialValue::new().set(ValuePath::root().field("arr").index(3), 1u32);
  assert!(matches!(
    encode_partial(&partial, &sample_struct(), &mut vec![0; 48], 0),
    Err(EncodeError::InvalidPath { .. })
  ));
}

#[test]
fn zeroed_values_encode() {
  let ty = sample_struct();
  let zero = HostValue::zeroed(&ty);
  assert_eq!(encode_to_vec(&zero, &ty).unwrap(), vec![0; 48]);
}
