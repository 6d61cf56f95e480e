use crate::*;

/// Handle to a recorded expression of one traced function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Node {
  pub(crate) owner: FnId,
  pub(crate) index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LocalId(pub(crate) usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
  Neg,
  Not,
  BitNot,
}

impl UnaryOperator {
  pub fn wgsl_token(self) -> &'static str {
    match self {
      UnaryOperator::Neg => "-",
      UnaryOperator::Not => "!",
      UnaryOperator::BitNot => "~",
    }
  }

  pub fn result_type(self, operand: &TypeDescriptor) -> Option<TypeDescriptor> {
    let kind = match operand {
      TypeDescriptor::Scalar(kind) | TypeDescriptor::Vector { kind, .. } => *kind,
      _ => return None,
    };
    let valid = match self {
      UnaryOperator::Neg => kind.is_signed(),
      UnaryOperator::Not => kind == ScalarKind::Bool,
      UnaryOperator::BitNot => kind.is_integer(),
    };
    valid.then(|| operand.clone())
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
  Add,
  Sub,
  Mul,
  Div,
  Rem,
  Equal,
  NotEqual,
  Less,
  LessEqual,
  Greater,
  GreaterEqual,
  LogicalAnd,
  LogicalOr,
  BitAnd,
  BitOr,
  BitXor,
  ShiftLeft,
  ShiftRight,
}

impl BinaryOperator {
  pub fn wgsl_token(self) -> &'static str {
    match self {
      BinaryOperator::Add => "+",
      BinaryOperator::Sub => "-",
      BinaryOperator::Mul => "*",
      BinaryOperator::Div => "/",
      BinaryOperator::Rem => "%",
      BinaryOperator::Equal => "==",
      BinaryOperator::NotEqual => "!=",
      BinaryOperator::Less => "<",
      BinaryOperator::LessEqual => "<=",
      BinaryOperator::Greater => ">",
      BinaryOperator::GreaterEqual => ">=",
      BinaryOperator::LogicalAnd => "&&",
      BinaryOperator::LogicalOr => "||",
      BinaryOperator::BitAnd => "&",
      BinaryOperator::BitOr => "|",
      BinaryOperator::BitXor => "^",
      BinaryOperator::ShiftLeft => "<<",
      BinaryOperator::ShiftRight => ">>",
    }
  }

  /// WGSL typing of `left op right`, `None` when the operand types are not
  /// accepted by the operator.
  pub fn result_type(self, left: &TypeDescriptor, right: &TypeDescriptor) -> Option<TypeDescriptor> {
    use TypeDescriptor as T;
    match self {
      BinaryOperator::Add | BinaryOperator::Sub | BinaryOperator::Div | BinaryOperator::Rem => {
        if let (T::Matrix { .. }, T::Matrix { .. }) = (left, right) {
          return (left == right && matches!(self, BinaryOperator::Add | BinaryOperator::Sub))
            .then(|| left.clone());
        }
        numeric_broadcast(left, right)
      }
      BinaryOperator::Mul => match (left, right) {
        (
          T::Matrix {
            kind,
            columns,
            rows,
          },
          T::Matrix {
            kind: right_kind,
            columns: right_columns,
            rows: right_rows,
          },
        ) => (kind == right_kind && columns == right_rows).then(|| T::Matrix {
          kind: *kind,
          columns: *right_columns,
          rows: *rows,
        }),
        (
          T::Matrix {
            kind,
            columns,
            rows,
          },
          T::Vector { kind: vk, width },
        ) => (kind == vk && columns == width).then(|| vec(*kind, *rows)),
        (
          T::Vector { kind: vk, width },
          T::Matrix {
            kind,
            columns,
            rows,
          },
        ) => (kind == vk && rows == width).then(|| vec(*kind, *columns)),
        (T::Matrix { kind, .. }, T::Scalar(sk)) => (kind == sk).then(|| left.clone()),
        (T::Scalar(sk), T::Matrix { kind, .. }) => (kind == sk).then(|| right.clone()),
        _ => numeric_broadcast(left, right),
      },
      BinaryOperator::Equal | BinaryOperator::NotEqual => {
        (left == right).then(|| comparison_result(left)).flatten()
      }
      BinaryOperator::Less
      | BinaryOperator::LessEqual
      | BinaryOperator::Greater
      | BinaryOperator::GreaterEqual => (left == right && left.scalar_kind().is_some_and(|k| k.is_numeric()))
        .then(|| comparison_result(left))
        .flatten(),
      BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr => {
        (left == &BOOL && right == &BOOL).then_some(BOOL)
      }
      BinaryOperator::BitAnd | BinaryOperator::BitOr | BinaryOperator::BitXor => {
        let kind = left.scalar_kind()?;
        let bitwise = kind.is_integer() || (kind == ScalarKind::Bool && self != BinaryOperator::BitXor);
        (left == right && bitwise && !matches!(left, T::Matrix { .. } | T::Atomic(_))).then(|| left.clone())
      }
      BinaryOperator::ShiftLeft | BinaryOperator::ShiftRight => match (left, right) {
        (T::Scalar(k), T::Scalar(ScalarKind::U32)) if k.is_integer() => Some(left.clone()),
        (T::Vector { kind, width }, T::Vector { kind: ScalarKind::U32, width: rw })
          if kind.is_integer() && width == rw =>
        {
          Some(left.clone())
        }
        _ => None,
      },
    }
  }
}

fn comparison_result(operand: &TypeDescriptor) -> Option<TypeDescriptor> {
  match operand {
    TypeDescriptor::Scalar(_) => Some(BOOL),
    TypeDescriptor::Vector { width, .. } => Some(vec(ScalarKind::Bool, *width)),
    _ => None,
  }
}

/// Same typed numeric operands, or a vector mixed with a scalar of its
/// component type.
fn numeric_broadcast(left: &TypeDescriptor, right: &TypeDescriptor) -> Option<TypeDescriptor> {
  use TypeDescriptor as T;
  match (left, right) {
    (T::Scalar(a), T::Scalar(b)) if a == b && a.is_numeric() => Some(left.clone()),
    (T::Vector { kind: a, width: wa }, T::Vector { kind: b, width: wb })
      if a == b && wa == wb && a.is_numeric() =>
    {
      Some(left.clone())
    }
    (T::Vector { kind, .. }, T::Scalar(s)) if kind == s && s.is_numeric() => Some(left.clone()),
    (T::Scalar(s), T::Vector { kind, .. }) if kind == s && s.is_numeric() => Some(right.clone()),
    _ => None,
  }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ShaderNodeExpr {
  Parameter(usize),
  Literal(ScalarValue),
  /// Module scope constant, by id in the [`TraceContext`].
  Constant(usize),
  Binding {
    group: u32,
    binding: u32,
  },
  Local(LocalId),
  Load(Node),
  Compose {
    parameters: Vec<Node>,
  },
  Zeroed,
  Unary {
    op: UnaryOperator,
    operand: Node,
  },
  Binary {
    op: BinaryOperator,
    left: Node,
    right: Node,
  },
  FieldGet {
    base: Node,
    field_index: usize,
  },
  IndexGet {
    base: Node,
    index: Node,
  },
  Swizzle {
    source: Node,
    components: SmallVec<[u8; 4]>,
  },
  FunctionCall {
    callee: FnId,
    parameters: Vec<Node>,
  },
  BuiltinCall {
    function: BuiltinFunction,
    parameters: Vec<Node>,
  },
  HelperCall {
    helper: Helper,
    parameters: Vec<Node>,
  },
  Convert {
    source: Node,
  },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceAccess {
  Read,
  ReadWrite,
}

/// Where a reference expression ultimately points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceRoot {
  Local,
  Binding,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Reference {
  pub access: ReferenceAccess,
  pub root: ReferenceRoot,
}

#[derive(Clone, Debug)]
pub struct ExprEntry {
  pub expr: ShaderNodeExpr,
  /// Value type, the store type for references.
  pub ty: TypeDescriptor,
  pub reference: Option<Reference>,
  pub(crate) scope: usize,
}

impl ShaderNodeExpr {
  /// Expressions spelled at their use site instead of being bound to a `let`.
  pub fn is_inlined(&self, reference: Option<Reference>) -> bool {
    match self {
      ShaderNodeExpr::Parameter(_)
      | ShaderNodeExpr::Literal(_)
      | ShaderNodeExpr::Constant(_)
      | ShaderNodeExpr::Binding { .. }
      | ShaderNodeExpr::Local(_) => true,
      ShaderNodeExpr::FieldGet { .. }
      | ShaderNodeExpr::IndexGet { .. }
      | ShaderNodeExpr::Swizzle { .. } => reference.is_some(),
      _ => false,
    }
  }
}

#[derive(Clone, Debug)]
pub struct LocalVar {
  pub name: Option<String>,
  pub ty: TypeDescriptor,
}

pub type Block = Vec<Statement>;

#[derive(Clone, Debug)]
pub enum Statement {
  /// Binds the value of a non inlined expression.
  Emit(Node),
  Declare {
    local: LocalId,
    init: Option<Node>,
  },
  Store {
    target: Node,
    value: Node,
  },
  CallVoid {
    callee: FnId,
    parameters: Vec<Node>,
  },
  If {
    condition: Node,
    accept: Block,
    reject: Block,
  },
  Loop {
    body: Block,
  },
  /// `for (var counter = start; counter < end; counter++)`
  ForRange {
    counter: LocalId,
    start: Node,
    end: Node,
    body: Block,
  },
  Break,
  Continue,
  Return(Option<Node>),
  Discard,
}

/// Everything recorded while tracing one function.
#[derive(Debug)]
pub struct TracedFn {
  pub function: ShaderFn,
  pub exprs: Vec<ExprEntry>,
  pub locals: Vec<LocalVar>,
  pub body: TracedBody,
  /// Direct callees in first call order.
  pub callees: Vec<FnId>,
  pub constants: Vec<usize>,
  pub bindings: Vec<BindingEntry>,
  pub helpers: Vec<Helper>,
}

#[derive(Debug)]
pub enum TracedBody {
  Recorded(Block),
  Wgsl(String),
}

impl TracedFn {
  pub fn expr(&self, node: Node) -> &ExprEntry {
    &self.exprs[node.index]
  }

  /// Every type the function mentions: signature, locals and expressions.
  pub fn referenced_types(&self) -> impl Iterator<Item = &TypeDescriptor> {
    let function = &self.function;
    function
      .params()
      .iter()
      .map(|p| &p.ty)
      .chain(function.return_ty())
      .chain(self.locals.iter().map(|l| &l.ty))
      .chain(self.exprs.iter().map(|e| &e.ty))
  }
}
