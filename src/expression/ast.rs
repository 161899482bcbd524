use serde_json::Value;

/// A parsed preset function: `(p0, p1) => body`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FunctionDef {
    pub(crate) params: Vec<String>,
    pub(crate) body: Block,
}

/// `{ let a = ...; return ...; }`, or a bare expression body (no lets).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Block {
    pub(crate) lets: Vec<Let>,
    pub(crate) ret: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Let {
    pub(crate) name: String,
    /// Frame slot, assigned by the binder.
    pub(crate) slot: Option<SlotId>,
    pub(crate) value: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct SlotId(pub(crate) u32);

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    /// JSON scalar literal.
    Lit(Value),
    Array(Vec<ArrayItem>),
    Object(Vec<ObjectEntry>),
    /// Unbound identifier, as produced by the parser.
    Ident(String),
    /// Identifier resolved to a frame slot.
    Slot(SlotId),
    Member {
        base: Box<Expr>,
        name: String,
        optional: bool,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// Unresolved call, as produced by the parser.
    Call {
        func: String,
        args: Vec<Expr>,
    },
    /// Call resolved to a builtin.
    Builtin {
        id: BuiltinId,
        args: Vec<Expr>,
    },
    Lambda {
        params: Vec<String>,
        /// One slot per param, assigned by the binder.
        slots: Vec<SlotId>,
        body: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ArrayItem {
    Item(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ObjectEntry {
    Field(String, Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum BuiltinId {
    Len,
    Min,
    Max,
    Abs,
    Floor,
    Ceil,
    Round,
    Clamp,
    Str,
    Num,
    Keys,
    Concat,
    Merge,
    Range,
    Slice,
    Join,
    Map,
    Filter,
    Fetch,
}

impl BuiltinId {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "len" => Self::Len,
            "min" => Self::Min,
            "max" => Self::Max,
            "abs" => Self::Abs,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "round" => Self::Round,
            "clamp" => Self::Clamp,
            "str" => Self::Str,
            "num" => Self::Num,
            "keys" => Self::Keys,
            "concat" => Self::Concat,
            "merge" => Self::Merge,
            "range" => Self::Range,
            "slice" => Self::Slice,
            "join" => Self::Join,
            "map" => Self::Map,
            "filter" => Self::Filter,
            "fetch" => Self::Fetch,
            _ => return None,
        })
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Len => "len",
            Self::Min => "min",
            Self::Max => "max",
            Self::Abs => "abs",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Round => "round",
            Self::Clamp => "clamp",
            Self::Str => "str",
            Self::Num => "num",
            Self::Keys => "keys",
            Self::Concat => "concat",
            Self::Merge => "merge",
            Self::Range => "range",
            Self::Slice => "slice",
            Self::Join => "join",
            Self::Map => "map",
            Self::Filter => "filter",
            Self::Fetch => "fetch",
        }
    }

    /// `(min, max)` argument count; `None` max means variadic.
    pub(crate) fn arity(self) -> (usize, Option<usize>) {
        match self {
            Self::Len | Self::Abs | Self::Floor | Self::Ceil | Self::Round | Self::Str => {
                (1, Some(1))
            }
            Self::Num | Self::Keys => (1, Some(1)),
            Self::Min | Self::Max => (1, None),
            Self::Clamp => (3, Some(3)),
            Self::Concat | Self::Merge => (1, None),
            Self::Range => (1, Some(2)),
            Self::Slice => (2, Some(3)),
            Self::Join => (1, Some(2)),
            Self::Map | Self::Filter => (2, Some(2)),
            Self::Fetch => (1, Some(2)),
        }
    }

    /// Builtins whose second argument must be an arrow function.
    pub(crate) fn takes_callback(self) -> bool {
        matches!(self, Self::Map | Self::Filter)
    }
}
