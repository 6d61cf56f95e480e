use once_cell::sync::OnceCell;

use super::*;

fn trace_error(function: &ShaderFn) -> ShaderError {
  TraceContext::new().trace(function).unwrap_err()
}

fn is_unsupported(err: &ShaderError) -> bool {
  matches!(err, ShaderError::Unsupported(_))
}

#[test]
fn callees_complete_before_callers() {
  let s = scene();
  let mut ctx = TraceContext::new();
  let traced = ctx.trace(&s.fragment).unwrap();
  assert_eq!(traced.callees, vec![s.fbm.id()]);
  assert!(format!("{traced:?}").contains("fragmentMain"));
  assert_eq!(ctx.order(), &[s.noise.id(), s.fbm.id(), s.fragment.id()]);

  // a second trace in the same context is served from the cache
  let again = ctx.trace(&s.fbm).unwrap();
  assert!(Arc::ptr_eq(&again, ctx.get(s.fbm.id()).unwrap()));
  assert_eq!(ctx.order().len(), 3);
}

#[test]
fn direct_recursion() {
  let slot: Arc<OnceCell<ShaderFn>> = Default::default();
  let me = slot.clone();
  let countdown = ShaderFn::new("countdown", &[("n", U32)], Some(U32), move |b, args| {
    let r = b.call(me.get().unwrap(), &[args[0]])?;
    Ok(Some(r))
  })
  .unwrap();
  slot.set(countdown.clone()).unwrap();

  assert_eq!(
    trace_error(&countdown),
    ShaderError::Graph(GraphError::RecursiveCall {
      chain: vec![String::from("countdown"), String::from("countdown")]
    })
  );
}

#[test]
fn transitive_recursion() {
  let slot: Arc<OnceCell<ShaderFn>> = Default::default();
  let ping_ref = slot.clone();
  let pong = ShaderFn::new("pong", &[("x", F32)], Some(F32), move |b, args| {
    let r = b.call(ping_ref.get().unwrap(), &[args[0]])?;
    Ok(Some(r))
  })
  .unwrap();
  let pong_ref = pong.clone();
  let ping = ShaderFn::new("ping", &[("x", F32)], Some(F32), move |b, args| {
    let r = b.call(&pong_ref, &[args[0]])?;
    Ok(Some(r))
  })
  .unwrap();
  slot.set(ping.clone()).unwrap();

  let ShaderError::Graph(GraphError::RecursiveCall { chain }) = trace_error(&ping) else {
    panic!("expected a recursion error");
  };
  assert_eq!(chain, ["ping", "pong", "ping"]);

  // the failure is not cached as a success
  let mut ctx = TraceContext::new();
  assert!(ctx.trace(&pong).is_err());
  assert!(ctx.get(pong.id()).is_none());
}

#[test]
fn call_arguments_are_checked() {
  let noise = noise_fn();
  let n = noise.clone();
  let too_many = ShaderFn::new("too_many", &[("p", VEC2F)], Some(F32), move |b, args| {
    let r = b.call(&n, &[args[0], args[0]])?;
    Ok(Some(r))
  })
  .unwrap();
  assert_eq!(
    trace_error(&too_many),
    ShaderError::Graph(GraphError::ArgumentCount {
      function: String::from("noise"),
      expected: 1,
      found: 2,
    })
  );

  let n = noise.clone();
  let wrong_type = ShaderFn::new("wrong_type", &[("x", F32)], Some(F32), move |b, args| {
    let r = b.call(&n, &[args[0]])?;
    Ok(Some(r))
  })
  .unwrap();
  assert_eq!(
    trace_error(&wrong_type),
    ShaderError::Graph(GraphError::ArgumentType {
      function: String::from("noise"),
      parameter: String::from("p"),
      expected: String::from("vec2f"),
      found: String::from("f32"),
    })
  );
}

#[test]
fn return_type_is_checked() {
  let missing = ShaderFn::new("missing", &[], Some(F32), |_, _| Ok(None)).unwrap();
  assert!(matches!(
    trace_error(&missing),
    ShaderError::Graph(GraphError::ReturnType { found, .. }) if found == "nothing"
  ));

  let wrong = ShaderFn::new("wrong", &[], Some(F32), |b, _| Ok(Some(b.lit(1u32)?))).unwrap();
  assert!(matches!(
    trace_error(&wrong),
    ShaderError::Graph(GraphError::ReturnType { found, .. }) if found == "u32"
  ));

  // both branches return, nothing has to follow the if
  let branches = ShaderFn::new("branches", &[("x", F32)], Some(F32), |b, args| {
    let positive = b.gt(args[0], 0.0f32)?;
    b.if_by_else(
      positive,
      |b| b.return_by(Some(args[0])),
      |b| {
        let negated = b.neg(args[0])?;
        b.return_by(Some(negated))
      },
    )?;
    Ok(None)
  })
  .unwrap();
  assert!(TraceContext::new().trace(&branches).is_ok());

  // a loop without a break of its own only exits through a return
  let endless = ShaderFn::new("endless", &[("x", F32)], Some(F32), |b, args| {
    b.loop_by(|b| b.return_by(Some(args[0])))?;
    Ok(None)
  })
  .unwrap();
  assert!(TraceContext::new().trace(&endless).is_ok());

  let inner_break = ShaderFn::new("inner_break", &[("x", F32)], Some(F32), |b, args| {
    b.loop_by(|b| {
      b.loop_by(|b| b.break_by())?;
      b.return_by(Some(args[0]))
    })?;
    Ok(None)
  })
  .unwrap();
  assert!(TraceContext::new().trace(&inner_break).is_ok());

  let leaves = ShaderFn::new("leaves", &[("x", F32)], Some(F32), |b, args| {
    b.loop_by(|b| {
      let done = b.gt(args[0], 1.0f32)?;
      b.if_by(done, |b| b.break_by())?;
      b.return_by(Some(args[0]))
    })?;
    Ok(None)
  })
  .unwrap();
  assert!(matches!(
    trace_error(&leaves),
    ShaderError::Graph(GraphError::ReturnType { found, .. }) if found == "nothing"
  ));
}

#[test]
fn operand_types_are_checked() {
  let mismatched = ShaderFn::new("mismatched", &[("a", VEC2F), ("b", VEC3F)], Some(VEC2F), |b, args| {
    Ok(Some(b.add(args[0], args[1])?))
  })
  .unwrap();
  let err = trace_error(&mismatched);
  assert!(is_unsupported(&err));
  assert!(err.to_string().contains("mismatched"));

  let shift = ShaderFn::new("shift", &[("a", I32)], Some(I32), |b, args| {
    Ok(Some(b.shl(args[0], 1i32)?))
  })
  .unwrap();
  assert!(is_unsupported(&trace_error(&shift)));

  let condition = ShaderFn::new("condition", &[("a", F32)], None, |b, args| {
    b.if_by(args[0], |_| Ok(()))?;
    Ok(None)
  })
  .unwrap();
  assert!(is_unsupported(&trace_error(&condition)));
}

#[test]
fn non_finite_values_are_rejected() {
  let literal = ShaderFn::new("literal", &[], Some(F32), |b, _| Ok(Some(b.lit(f32::NAN)?))).unwrap();
  assert!(is_unsupported(&trace_error(&literal)));

  let constant = ShaderFn::new("constant_inf", &[], Some(VEC2F), |b, _| {
    Ok(Some(b.constant(HostValue::vector([1.0f32, f32::INFINITY]), &VEC2F)?))
  })
  .unwrap();
  assert!(is_unsupported(&trace_error(&constant)));
}

#[test]
fn control_flow_placement() {
  let stray_break = ShaderFn::new("stray_break", &[], None, |b, _| {
    b.break_by()?;
    Ok(None)
  })
  .unwrap();
  assert!(is_unsupported(&trace_error(&stray_break)));

  let stray_continue = ShaderFn::new("stray_continue", &[], None, |b, _| {
    let t = b.lit(true)?;
    b.if_by(t, |b| b.continue_by())?;
    Ok(None)
  })
  .unwrap();
  assert!(is_unsupported(&trace_error(&stray_continue)));

  let looped = ShaderFn::new("looped", &[], None, |b, _| {
    b.loop_by(|b| {
      let t = b.lit(true)?;
      b.if_by(t, |b| b.break_by())?;
      b.continue_by()
    })?;
    Ok(None)
  })
  .unwrap();
  assert!(TraceContext::new().trace(&looped).is_ok());

  let discard = ShaderFn::new("not_fragment", &[], None, |b, _| {
    b.discard()?;
    Ok(None)
  })
  .unwrap();
  assert!(is_unsupported(&trace_error(&discard)));
}

#[test]
fn values_do_not_escape_their_block() {
  let leak = ShaderFn::new("leak", &[("x", F32)], Some(F32), |b, args| {
    let mut inner = None;
    let t = b.lit(true)?;
    b.if_by(t, |b| {
      inner = Some(b.add(args[0], 1.0f32)?);
      Ok(())
    })?;
    let Some(inner) = inner else {
      return Ok(Some(args[0]));
    };
    Ok(Some(b.add(inner, 1.0f32)?))
  })
  .unwrap();
  assert!(is_unsupported(&trace_error(&leak)));

  // parameters and literals are visible everywhere
  let visible = ShaderFn::new("visible", &[("x", F32)], Some(F32), |b, args| {
    let one = b.lit(1.0f32)?;
    let result = b.var(args[0])?;
    b.for_by(0u32, 2u32, |b, _| {
      let current = b.load(result)?;
      let sum = b.add(current, one)?;
      b.store(result, sum)
    })?;
    Ok(Some(b.load(result)?))
  })
  .unwrap();
  assert!(TraceContext::new().trace(&visible).is_ok());
}

#[test]
fn access_checks() {
  let swizzle = ShaderFn::new("swizzle", &[("v", VEC2F)], Some(VEC3F), |b, args| {
    Ok(Some(b.swizzle(args[0], "xyz")?))
  })
  .unwrap();
  assert!(is_unsupported(&trace_error(&swizzle)));

  let array = array_of(F32, 3usize).unwrap();
  let out_of_bounds = ShaderFn::new("out_of_bounds", &[("a", array.clone())], Some(F32), |b, args| {
    Ok(Some(b.index(args[0], 3u32)?))
  })
  .unwrap();
  assert!(is_unsupported(&trace_error(&out_of_bounds)));

  let dynamic = ShaderFn::new("dynamic", &[("a", array.clone()), ("i", U32)], Some(F32), |b, args| {
    Ok(Some(b.index(args[0], args[1])?))
  })
  .unwrap();
  assert!(is_unsupported(&trace_error(&dynamic)));

  // through a local the index may be dynamic
  let through_local = ShaderFn::new("through_local", &[("a", array), ("i", U32)], Some(F32), |b, args| {
    let local = b.var(args[0])?;
    let element = b.index(local, args[1])?;
    Ok(Some(b.load(element)?))
  })
  .unwrap();
  assert!(TraceContext::new().trace(&through_local).is_ok());

  let unknown_member = ShaderFn::new("unknown_member", &[("o", vertex_output())], Some(F32), |b, args| {
    Ok(Some(b.field(args[0], "depth")?))
  })
  .unwrap();
  assert!(is_unsupported(&trace_error(&unknown_member)));
}

#[test]
fn read_only_references_reject_stores() {
  let time = time_binding();
  let write_uniform = ShaderFn::new("write_uniform", &[], None, move |b, _| {
    let time = b.binding(&time)?;
    b.store(time, 1.0f32)?;
    Ok(None)
  })
  .unwrap();
  assert!(is_unsupported(&trace_error(&write_uniform)));
}

#[test]
fn entry_points_are_not_callable() {
  let vertex = scene().vertex;
  let caller = ShaderFn::new("caller", &[], None, move |b, _| {
    b.call_void(&vertex, &[])?;
    Ok(None)
  })
  .unwrap();
  assert!(is_unsupported(&trace_error(&caller)));
}

#[test]
fn entry_io_is_prepared() {
  let output = scene().vertex.return_ty().cloned().unwrap();
  let fields = &output.as_struct().unwrap().fields;
  assert_eq!(fields[0].attributes.io, Some(IoAttribute::Builtin(Builtin::Position)));
  assert_eq!(fields[1].attributes.io, Some(IoAttribute::Location(0)));

  let explicit = struct_of([
    field("a", VEC4F).location(0),
    field("b", F32),
    field("c", F32).location(1),
    field("position", VEC4F).builtin(Builtin::Position),
  ])
  .unwrap();
  let vertex = ShaderFn::vertex("v", None, explicit, |b, _| {
    let output = b.return_type().cloned().unwrap();
    Ok(Some(b.zeroed(&output)?))
  })
  .unwrap();
  let locations: Vec<_> = vertex.return_ty().unwrap().as_struct().unwrap().fields[..3]
    .iter()
    .map(|f| f.attributes.io)
    .collect();
  assert_eq!(
    locations,
    [
      Some(IoAttribute::Location(0)),
      Some(IoAttribute::Location(2)),
      Some(IoAttribute::Location(1)),
    ]
  );

  let no_position = struct_of([field("uv", VEC2F)]).unwrap();
  assert!(matches!(
    ShaderFn::vertex("v", None, no_position, |_, _| Ok(None)),
    Err(SchemaError::InvalidEntryIo(_))
  ));

  let compute_input = struct_of([field("value", U32)]).unwrap();
  assert!(matches!(
    ShaderFn::compute("c", Some(compute_input), [64, 1, 1], |_, _| Ok(None)),
    Err(SchemaError::InvalidEntryIo(_))
  ));
  assert!(matches!(
    ShaderFn::compute("c", None, [0, 1, 1], |_, _| Ok(None)),
    Err(SchemaError::InvalidEntryIo(_))
  ));
}

#[test]
fn invalid_parameters() {
  assert!(matches!(
    ShaderFn::new("f", &[("loop", F32)], None, |_, _| Ok(None)),
    Err(SchemaError::InvalidIdentifier(_))
  ));
  assert!(matches!(
    ShaderFn::new("f", &[("a", F32), ("a", U32)], None, |_, _| Ok(None)),
    Err(SchemaError::DuplicateField(_))
  ));
  let runtime = array_of(F32, 0usize).unwrap();
  assert!(ShaderFn::new("f", &[("a", runtime)], None, |_, _| Ok(None)).is_err());
}

#[test]
fn constants_are_interned_across_functions() {
  let first = ShaderFn::new("first", &[], Some(VEC2F), |b, _| {
    Ok(Some(b.named_constant("HALF", HostValue::vector([0.5f32, 0.5]), &VEC2F)?))
  })
  .unwrap();
  let first_ref = first.clone();
  let second = ShaderFn::new("second", &[], Some(VEC2F), move |b, _| {
    let shared = b.constant(HostValue::vector([0.5f32, 0.5]), &VEC2F)?;
    let other = b.constant(HostValue::vector([0.5f32, 0.25]), &VEC2F)?;
    let called = b.call(&first_ref, &[])?;
    let sum = b.add(shared, other)?;
    Ok(Some(b.add(sum, called)?))
  })
  .unwrap();
  let by_kind = ShaderFn::new("by_kind", &[], Some(I32), |b, _| {
    let unsigned = b.constant(1u32, &U32)?;
    let signed = b.constant(1i32, &I32)?;
    let converted = b.convert(unsigned, &I32)?;
    Ok(Some(b.add(signed, converted)?))
  })
  .unwrap();

  let mut ctx = TraceContext::new();
  ctx.trace(&first).unwrap();
  ctx.trace(&second).unwrap();
  ctx.trace(&by_kind).unwrap();
  let constants = ctx.constants();
  assert_eq!(constants.len(), 4);
  // the first label seen wins
  assert_eq!(constants[0].label.as_deref(), Some("HALF"));
  assert_eq!(ctx.get(second.id()).unwrap().constants.len(), 2);
}
