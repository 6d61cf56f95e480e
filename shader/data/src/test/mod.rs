mod codec;
mod layout;
mod registry;

use crate::*;

fn sample_struct() -> TypeDescriptor {
  struct_of([field("a", F32), field("b", VEC3F), field("arr", array_of(U32, 3usize).unwrap())]).unwrap()
}
