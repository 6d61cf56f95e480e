mod graph;

use crate::*;

fn time_binding() -> BindingEntry {
  BindingEntry::uniform(0, 0, F32).with_label("time")
}

fn offset_binding() -> BindingEntry {
  BindingEntry::uniform(0, 1, VEC2F).with_label("offset")
}

fn noise_fn() -> ShaderFn {
  ShaderFn::new("noise", &[("p", VEC2F)], Some(F32), |b, args| {
    let seed = b.named_constant("NOISE_SEED", HostValue::vector([12.9898f32, 78.233]), &VEC2F)?;
    let d = b.std(BuiltinFunction::Dot, &[args[0], seed])?;
    let s = b.std(BuiltinFunction::Sin, &[d])?;
    let scaled = b.mul(s, 43758.5453f32)?;
    let r = b.std(BuiltinFunction::Fract, &[scaled])?;
    Ok(Some(r))
  })
  .unwrap()
}

fn fbm_fn(noise: &ShaderFn) -> ShaderFn {
  let noise = noise.clone();
  ShaderFn::new("fbm", &[("p", VEC2F)], Some(F32), move |b, args| {
    let total = b.var_named("total", 0.0f32)?;
    let amplitude = b.var_named("amplitude", 0.5f32)?;
    let position = b.var_named("position", args[0])?;
    b.for_by(0u32, 4u32, |b, _| {
      let p = b.load(position)?;
      let n = b.call(&noise, &[p])?;
      let a = b.load(amplitude)?;
      let contribution = b.mul(n, a)?;
      let t = b.load(total)?;
      let sum = b.add(t, contribution)?;
      b.store(total, sum)?;
      let halved = b.mul(a, 0.5f32)?;
      b.store(amplitude, halved)?;
      let doubled = b.mul(p, 2.0f32)?;
      b.store(position, doubled)
    })?;
    let result = b.load(total)?;
    Ok(Some(result))
  })
  .unwrap()
}

fn vertex_output() -> TypeDescriptor {
  named_struct_of(
    "VertexOutput",
    [
      field("position", VEC4F).builtin(Builtin::Position),
      field("uv", VEC2F),
    ],
  )
  .unwrap()
}

fn vertex_main(fbm: &ShaderFn) -> ShaderFn {
  let input = named_struct_of(
    "VertexInput",
    [field("vertex_index", U32).builtin(Builtin::VertexIndex)],
  )
  .unwrap();
  let fbm = fbm.clone();
  let time = time_binding();
  ShaderFn::vertex("vertexMain", Some(input), vertex_output(), move |b, args| {
    let index = b.field(args[0], "vertex_index")?;
    let x = b.convert(index, &F32)?;
    let uv = b.construct(&VEC2F, &[x, x])?;
    let height = b.call(&fbm, &[uv])?;
    let time = b.binding(&time)?;
    let scaled = b.mul(uv, time)?;
    let one = b.lit(1.0f32)?;
    let position = b.construct(&VEC4F, &[scaled, height, one])?;
    let output = b.return_type().cloned().unwrap();
    let result = b.construct(&output, &[position, uv])?;
    Ok(Some(result))
  })
  .unwrap()
}

fn fragment_main(fbm: &ShaderFn) -> ShaderFn {
  let fbm = fbm.clone();
  let offset = offset_binding();
  ShaderFn::fragment("fragmentMain", Some(vertex_output()), VEC4F, move |b, args| {
    let uv = b.field(args[0], "uv")?;
    let offset = b.binding(&offset)?;
    let p = b.add(uv, offset)?;
    let n = b.call(&fbm, &[p])?;
    let one = b.lit(1.0f32)?;
    let color = b.construct(&VEC4F, &[n, n, n, one])?;
    Ok(Some(color))
  })
  .unwrap()
}

struct Scene {
  noise: ShaderFn,
  fbm: ShaderFn,
  vertex: ShaderFn,
  fragment: ShaderFn,
  bindings: BindingTable,
}

fn scene() -> Scene {
  let noise = noise_fn();
  let fbm = fbm_fn(&noise);
  let vertex = vertex_main(&fbm);
  let fragment = fragment_main(&fbm);
  Scene {
    noise,
    fbm,
    vertex,
    fragment,
    bindings: BindingTable::new([time_binding(), offset_binding()]),
  }
}

/// Parses and validates `code` with naga, printing the module on failure.
fn validate_wgsl(code: &str) {
  let module = match naga::front::wgsl::parse_str(code) {
    Ok(module) => module,
    Err(e) => {
      e.emit_to_stderr(code);
      panic!("generated wgsl does not parse:\n{code}");
    }
  };
  if let Err(e) = naga::valid::Validator::new(
    naga::valid::ValidationFlags::all(),
    naga::valid::Capabilities::all(),
  )
  .validate(&module)
  {
    panic!("generated wgsl is invalid: {e:?}\n{code}");
  }
}

fn count(code: &str, pattern: &str) -> usize {
  code.matches(pattern).count()
}
