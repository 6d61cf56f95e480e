use crate::*;

/// WGSL keywords plus the reserved words of
/// https://www.w3.org/TR/WGSL/#reserved-words
pub const WGSL_KEYWORDS: &[&str] = &[
  "alias",
  "break",
  "case",
  "const",
  "const_assert",
  "continue",
  "continuing",
  "default",
  "diagnostic",
  "discard",
  "else",
  "enable",
  "false",
  "fn",
  "for",
  "if",
  "let",
  "loop",
  "override",
  "requires",
  "return",
  "struct",
  "switch",
  "true",
  "var",
  "while",
  // reserved
  "NULL",
  "Self",
  "abstract",
  "active",
  "alignas",
  "alignof",
  "as",
  "asm",
  "asm_fragment",
  "async",
  "attribute",
  "auto",
  "await",
  "become",
  "cast",
  "catch",
  "class",
  "co_await",
  "co_return",
  "co_yield",
  "coherent",
  "column_major",
  "common",
  "compile",
  "compile_fragment",
  "concept",
  "const_cast",
  "consteval",
  "constexpr",
  "constinit",
  "crate",
  "debugger",
  "decltype",
  "delete",
  "demote",
  "demote_to_helper",
  "do",
  "dynamic_cast",
  "enum",
  "explicit",
  "export",
  "extends",
  "extern",
  "external",
  "fallthrough",
  "filter",
  "final",
  "finally",
  "friend",
  "from",
  "fxgroup",
  "get",
  "goto",
  "groupshared",
  "highp",
  "impl",
  "implements",
  "import",
  "inline",
  "instanceof",
  "interface",
  "layout",
  "lowp",
  "macro",
  "macro_rules",
  "match",
  "mediump",
  "meta",
  "mod",
  "module",
  "move",
  "mut",
  "mutable",
  "namespace",
  "new",
  "nil",
  "noexcept",
  "noinline",
  "nointerpolation",
  "noperspective",
  "null",
  "nullptr",
  "of",
  "operator",
  "package",
  "packoffset",
  "partition",
  "pass",
  "patch",
  "pixelfragment",
  "precise",
  "precision",
  "premerge",
  "priv",
  "protected",
  "pub",
  "public",
  "readonly",
  "ref",
  "regardless",
  "register",
  "reinterpret_cast",
  "require",
  "resource",
  "restrict",
  "self",
  "set",
  "shared",
  "sizeof",
  "smooth",
  "snorm",
  "static",
  "static_assert",
  "static_cast",
  "std",
  "subroutine",
  "super",
  "target",
  "template",
  "this",
  "thread_local",
  "throw",
  "trait",
  "try",
  "type",
  "typedef",
  "typeid",
  "typename",
  "typeof",
  "union",
  "unless",
  "unorm",
  "unsafe",
  "unsized",
  "use",
  "using",
  "varying",
  "virtual",
  "volatile",
  "wgsl",
  "where",
  "with",
  "writeonly",
  "yield",
];

/// Predeclared type generators. Generated names never shadow them.
pub const WGSL_PREDECLARED_TYPES: &[&str] = &[
  "bool",
  "f16",
  "f32",
  "i32",
  "u32",
  "vec2",
  "vec3",
  "vec4",
  "mat2x2",
  "mat2x3",
  "mat2x4",
  "mat3x2",
  "mat3x3",
  "mat3x4",
  "mat4x2",
  "mat4x3",
  "mat4x4",
  "array",
  "atomic",
  "ptr",
  "sampler",
  "sampler_comparison",
];

static RESERVED: once_cell::sync::Lazy<FastHashSet<&'static str>> = once_cell::sync::Lazy::new(|| {
  WGSL_KEYWORDS
    .iter()
    .chain(WGSL_PREDECLARED_TYPES)
    .copied()
    .collect()
});

/// Keyword, reserved word or predeclared type name, including the
/// `vec3f`/`mat4x4h` style aliases.
pub fn is_reserved_identifier(name: &str) -> bool {
  if RESERVED.contains(name) {
    return true;
  }
  let alias_base = name
    .strip_suffix(['f', 'h', 'i', 'u'])
    .filter(|base| RESERVED.contains(*base) && (base.starts_with("vec") || base.starts_with("mat")));
  alias_base.is_some()
}

/// Syntactically valid WGSL identifier that is not reserved.
///
/// Identifiers starting with two underscores are reserved for the
/// implementation, a lone `_` is the phony assignment target.
pub fn is_valid_identifier(name: &str) -> bool {
  let mut chars = name.chars();
  let Some(first) = chars.next() else {
    return false;
  };
  if !(first.is_ascii_alphabetic() || first == '_') {
    return false;
  }
  if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
    return false;
  }
  if name == "_" || name.starts_with("__") {
    return false;
  }
  !is_reserved_identifier(name)
}

/// Rewrites an arbitrary label into something [`is_valid_identifier`] accepts
/// modulo reserved words, which callers resolve with a suffix.
pub fn sanitize_identifier(label: &str) -> String {
  let mut out: String = label
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
    .collect();
  while out.starts_with("__") {
    out.remove(0);
  }
  if out.is_empty() || out == "_" {
    return String::from("item");
  }
  if out.starts_with(|c: char| c.is_ascii_digit()) {
    out.insert(0, '_');
  }
  out
}
