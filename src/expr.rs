//! Expression tree model shared by the analyzer and the code generator.
//!
//! The planner hands the compiler a bound expression tree: every node
//! carries its result type and collation, so eligibility can be decided
//! without re-resolving catalog state. The tree is immutable; both passes
//! walk it read-only.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Relation identifier within one compilation scope.
pub type RelId = u32;

/// Column (attribute) number. Positive numbers are user columns, numbered
/// from 1 in catalog order; negative numbers are the host's system columns.
pub type AttrId = i32;

/// Collation attached to an expression node.
///
/// `Default` is the database default collation; `Other` is any explicitly
/// assigned collation, identified by the host's collation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Collation {
    /// No collation (non-collatable type).
    #[default]
    None,
    /// The database default collation.
    Default,
    /// A non-default collation.
    Other(u32),
}

/// Scalar types the compiler understands.
///
/// `DynamicBlob` is the key-value blob column type used in schemaless mode;
/// `FillOption` is the gap-fill mode enumeration consumed by
/// `fill_option()`; `Unknown` is any host type outside this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarType {
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Numeric,
    Char,
    VarChar,
    Text,
    Name,
    Bool,
    Bit,
    Binary,
    Time,
    Timestamp,
    TimestampTz,
    Interval,
    DynamicBlob,
    FillOption,
    Unknown,
}

impl ScalarType {
    /// Whether this is one of the time types subject to the remote
    /// dialect's time-comparison restrictions.
    pub fn is_time(self) -> bool {
        matches!(
            self,
            ScalarType::Time | ScalarType::Timestamp | ScalarType::TimestampTz
        )
    }

    /// Whether this is a character-string type.
    pub fn is_string(self) -> bool {
        matches!(
            self,
            ScalarType::Char | ScalarType::VarChar | ScalarType::Text | ScalarType::Name
        )
    }

    /// Whether a value of this type can be represented in the remote
    /// dialect at all. Nodes that are exempt from this check (fill-option
    /// literals, regex literals) say so explicitly during analysis.
    pub fn is_remote_representable(self) -> bool {
        !matches!(self, ScalarType::FillOption | ScalarType::Unknown)
    }

    /// The small allowlist of types an external parameter may carry.
    pub fn is_valid_param_type(self) -> bool {
        matches!(
            self,
            ScalarType::SmallInt
                | ScalarType::Int
                | ScalarType::BigInt
                | ScalarType::Float
                | ScalarType::Double
                | ScalarType::Numeric
                | ScalarType::VarChar
                | ScalarType::Text
                | ScalarType::Time
                | ScalarType::Timestamp
                | ScalarType::TimestampTz
        )
    }
}

/// An interval quantity, already broken out of the host's representation.
///
/// The remote dialect has no calendar-relative durations, so any interval
/// with a non-zero month component is rejected by the analyzer before it
/// can reach the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntervalValue {
    /// Calendar months (includes years folded in).
    pub months: i32,
    /// Whole days.
    pub days: i32,
    /// Sub-day remainder in microseconds.
    pub micros: i64,
}

/// A constant value carried by a [`Expr::Literal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    /// Arbitrary-precision numeric, kept in its decimal text form.
    Numeric(String),
    Text(String),
    Bool(bool),
    /// Bit string, as a sequence of `0`/`1` characters.
    Bit(String),
    Binary(Vec<u8>),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
    Interval(IntervalValue),
    /// Elements of an array constant, used by `IN`-list right-hand sides.
    Array(Vec<Value>),
}

/// Pattern-matching operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternKind {
    Like,
    NotLike,
    ILike,
    NotILike,
    Regex,
    NotRegex,
    RegexCi,
    NotRegexCi,
}

impl PatternKind {
    /// The remote dialect's spelling: all positive matches become `=~`,
    /// all negative matches `!~`; case-insensitivity moves into the
    /// pattern itself as a `(?i)` prefix.
    pub fn remote_operator(self) -> &'static str {
        if self.is_negated() { "!~" } else { "=~" }
    }

    pub fn is_negated(self) -> bool {
        matches!(
            self,
            PatternKind::NotLike
                | PatternKind::NotILike
                | PatternKind::NotRegex
                | PatternKind::NotRegexCi
        )
    }

    pub fn is_case_insensitive(self) -> bool {
        matches!(
            self,
            PatternKind::ILike
                | PatternKind::NotILike
                | PatternKind::RegexCi
                | PatternKind::NotRegexCi
        )
    }

    /// Whether this is one of the LIKE spellings (wildcard translation
    /// applies) rather than a raw regex match.
    pub fn is_like(self) -> bool {
        matches!(
            self,
            PatternKind::Like | PatternKind::NotLike | PatternKind::ILike | PatternKind::NotILike
        )
    }
}

/// Boolean combinator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
    Not,
}

/// One argument of an [`Expr::Aggregate`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggArg {
    pub expr: Expr,
    /// Junk arguments (ordering columns and the like) are carried for
    /// fidelity with the plan but never emitted.
    pub resjunk: bool,
}

/// Right-hand side of an [`Expr::InList`] membership test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InListRhs {
    /// A constant array. The boundary hands over structured element
    /// values, not a re-escaped text form.
    Const {
        elem_ty: ScalarType,
        /// `None` is a NULL array constant (nothing is emitted for it).
        values: Option<Vec<Value>>,
    },
    /// A non-constant array constructor.
    Array(Box<Expr>),
}

/// A bound expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A column reference. References outside the compilation's relation
    /// set are treated as external parameters, not errors.
    ColumnRef {
        rel: RelId,
        attr: AttrId,
        ty: ScalarType,
        collation: Collation,
    },
    /// A constant. `value: None` is SQL NULL.
    Literal {
        ty: ScalarType,
        value: Option<Value>,
        collation: Collation,
    },
    /// An external query parameter with a positional index assigned at
    /// deparse time.
    Placeholder {
        ty: ScalarType,
        index: u32,
        collation: Collation,
    },
    /// A function call: `func(args...)`.
    FunctionCall {
        name: String,
        args: Vec<Expr>,
        result_ty: ScalarType,
        input_collation: Collation,
        collation: Collation,
    },
    /// A unary operation: `op arg`.
    UnaryOp {
        op: String,
        arg: Box<Expr>,
        result_ty: ScalarType,
        input_collation: Collation,
        collation: Collation,
    },
    /// A binary operation: `left op right`.
    BinaryOp {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
        result_ty: ScalarType,
        input_collation: Collation,
        collation: Collation,
    },
    /// A pattern match (`LIKE` family or regex family).
    PatternMatch {
        kind: PatternKind,
        subject: Box<Expr>,
        pattern: Box<Expr>,
    },
    /// AND/OR/NOT over boolean arguments.
    BoolExpr { op: BoolOp, args: Vec<Expr> },
    /// `arg IS [NOT] NULL`.
    NullTest { arg: Box<Expr>, negated: bool },
    /// An array constructor: `ARRAY[...]`.
    ArrayLiteral {
        elem_ty: ScalarType,
        elements: Vec<Expr>,
        collation: Collation,
    },
    /// A scalar-vs-array membership test (`IN` / `= ANY`). `use_or`
    /// selects the `OR` expansion (ANY) over the `AND` expansion (ALL).
    InList {
        op: String,
        use_or: bool,
        left: Box<Expr>,
        rhs: InListRhs,
        input_collation: Collation,
    },
    /// An aggregate call.
    Aggregate {
        name: String,
        args: Vec<AggArg>,
        distinct: bool,
        star: bool,
        has_order: bool,
        has_filter: bool,
        /// False for partial/split aggregation modes, which are never
        /// pushed down.
        split_simple: bool,
        variadic: bool,
        result_ty: ScalarType,
        input_collation: Collation,
        collation: Collation,
    },
    /// An I/O coercion to `result_ty`.
    Cast {
        arg: Box<Expr>,
        result_ty: ScalarType,
    },
    /// Schemaless key-value extraction: `blob ->> 'key'`. `base` is a
    /// [`Expr::ColumnRef`] to a dynamic blob column, or a
    /// [`Expr::Placeholder`] for the parameter-fetch form.
    DynamicFieldAccess {
        base: Box<Expr>,
        key: String,
        result_ty: ScalarType,
        collation: Collation,
    },
}

impl Expr {
    /// The static result type of this node.
    pub fn result_type(&self) -> ScalarType {
        match self {
            Expr::ColumnRef { ty, .. } => *ty,
            Expr::Literal { ty, .. } => *ty,
            Expr::Placeholder { ty, .. } => *ty,
            Expr::FunctionCall { result_ty, .. } => *result_ty,
            Expr::UnaryOp { result_ty, .. } => *result_ty,
            Expr::BinaryOp { result_ty, .. } => *result_ty,
            Expr::PatternMatch { .. } => ScalarType::Bool,
            Expr::BoolExpr { .. } => ScalarType::Bool,
            Expr::NullTest { .. } => ScalarType::Bool,
            Expr::ArrayLiteral { elem_ty, .. } => *elem_ty,
            Expr::InList { .. } => ScalarType::Bool,
            Expr::Aggregate { result_ty, .. } => *result_ty,
            Expr::Cast { result_ty, .. } => *result_ty,
            Expr::DynamicFieldAccess { result_ty, .. } => *result_ty,
        }
    }

    /// Immediate children, in argument order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::ColumnRef { .. } | Expr::Literal { .. } | Expr::Placeholder { .. } => Vec::new(),
            Expr::FunctionCall { args, .. } => args.iter().collect(),
            Expr::UnaryOp { arg, .. } => vec![arg],
            Expr::BinaryOp { left, right, .. } => vec![left, right],
            Expr::PatternMatch {
                subject, pattern, ..
            } => vec![subject, pattern],
            Expr::BoolExpr { args, .. } => args.iter().collect(),
            Expr::NullTest { arg, .. } => vec![arg],
            Expr::ArrayLiteral { elements, .. } => elements.iter().collect(),
            Expr::InList { left, rhs, .. } => {
                let mut out = vec![left.as_ref()];
                if let InListRhs::Array(arr) = rhs {
                    out.push(arr.as_ref());
                }
                out
            }
            Expr::Aggregate { args, .. } => args.iter().map(|a| &a.expr).collect(),
            Expr::Cast { arg, .. } => vec![arg],
            Expr::DynamicFieldAccess { base, .. } => vec![base],
        }
    }

    /// Short node-kind name, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::ColumnRef { .. } => "ColumnRef",
            Expr::Literal { .. } => "Literal",
            Expr::Placeholder { .. } => "Placeholder",
            Expr::FunctionCall { .. } => "FunctionCall",
            Expr::UnaryOp { .. } => "UnaryOp",
            Expr::BinaryOp { .. } => "BinaryOp",
            Expr::PatternMatch { .. } => "PatternMatch",
            Expr::BoolExpr { .. } => "BoolExpr",
            Expr::NullTest { .. } => "NullTest",
            Expr::ArrayLiteral { .. } => "ArrayLiteral",
            Expr::InList { .. } => "InList",
            Expr::Aggregate { .. } => "Aggregate",
            Expr::Cast { .. } => "Cast",
            Expr::DynamicFieldAccess { .. } => "DynamicFieldAccess",
        }
    }
}

// ── Tree inspection helpers ──────────────────────────────────────────────

/// Whether `expr` is itself a time-typed column operand: a time-typed
/// column reference, or a dynamic field access coerced to a time type.
pub(crate) fn expr_is_time_column(expr: &Expr) -> bool {
    match expr {
        Expr::ColumnRef { ty, .. } => ty.is_time(),
        Expr::Cast { arg, result_ty } => is_dynamic_fetch(arg) && result_ty.is_time(),
        _ => false,
    }
}

/// Whether any node anywhere in the subtree is a time-typed column
/// operand. Used for the conservative `OR`-over-time rejection and the
/// aggregate `first`/`last` exception.
pub(crate) fn subtree_contains_time_column(expr: &Expr) -> bool {
    expr_is_time_column(expr)
        || expr
            .children()
            .into_iter()
            .any(subtree_contains_time_column)
}

/// Whether any of `args` is a time-typed expression of a kind other than
/// a column, constant, parameter, or function call.
pub(crate) fn args_contain_time_expr(args: &[&Expr]) -> bool {
    args.iter().any(|e| {
        !matches!(
            e,
            Expr::ColumnRef { .. }
                | Expr::Literal { .. }
                | Expr::Placeholder { .. }
                | Expr::FunctionCall { .. }
        ) && e.result_type().is_time()
    })
}

/// Whether any of `args` is a function call returning a time type.
pub(crate) fn args_contain_time_function(args: &[&Expr]) -> bool {
    args.iter()
        .any(|e| matches!(e, Expr::FunctionCall { result_ty, .. } if result_ty.is_time()))
}

/// Whether any of `args` is a time-typed parameter.
pub(crate) fn args_contain_time_param(args: &[&Expr]) -> bool {
    args.iter()
        .any(|e| matches!(e, Expr::Placeholder { ty, .. } if ty.is_time()))
}

/// Whether any of `args` is a time-typed constant.
pub(crate) fn args_contain_time_const(args: &[&Expr]) -> bool {
    args.iter()
        .any(|e| matches!(e, Expr::Literal { ty, .. } if ty.is_time()))
}

/// Whether the expression is string-typed. Column references, constants,
/// and dynamic field accesses answer from their own type; everything else
/// answers if any descendant does.
pub(crate) fn is_string_type(expr: &Expr) -> bool {
    match expr {
        Expr::ColumnRef { ty, .. } => ty.is_string(),
        Expr::Literal { ty, .. } => ty.is_string(),
        Expr::DynamicFieldAccess { result_ty, .. } => result_ty.is_string(),
        Expr::Cast { arg, result_ty } if is_dynamic_fetch(arg) => result_ty.is_string(),
        other => other.children().into_iter().any(is_string_type),
    }
}

/// Whether the subtree contains any function call.
pub(crate) fn contains_function_call(expr: &Expr) -> bool {
    matches!(expr, Expr::FunctionCall { .. })
        || expr.children().into_iter().any(contains_function_call)
}

/// Whether `expr` is a schemaless column fetch: a [`Expr::DynamicFieldAccess`]
/// whose base is a dynamic blob column reference, optionally wrapped in a
/// coercion to the access's declared type.
pub(crate) fn is_dynamic_fetch(expr: &Expr) -> bool {
    let inner = match expr {
        Expr::Cast { arg, .. } => arg.as_ref(),
        other => other,
    };
    matches!(
        inner,
        Expr::DynamicFieldAccess { base, .. } if matches!(base.as_ref(), Expr::ColumnRef { .. })
    )
}

/// Whether `expr` is the parameter-fetch form of a schemaless access: a
/// key lookup applied to an external parameter instead of a column.
pub(crate) fn is_dynamic_param_fetch(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::DynamicFieldAccess { base, .. } if matches!(base.as_ref(), Expr::Placeholder { .. })
    )
}

/// The dynamic key a schemaless column fetch extracts, if `expr` is one.
pub(crate) fn dynamic_key_of(expr: &Expr) -> Option<&str> {
    let inner = match expr {
        Expr::Cast { arg, .. } => arg.as_ref(),
        other => other,
    };
    match inner {
        Expr::DynamicFieldAccess { base, key, .. }
            if matches!(base.as_ref(), Expr::ColumnRef { .. }) =>
        {
            Some(key.as_str())
        }
        _ => None,
    }
}

/// Collect the distinct user-column attribute numbers of `rel` referenced
/// anywhere in the expression, in first-appearance order.
pub(crate) fn collect_columns(expr: &Expr, rel: RelId, out: &mut Vec<AttrId>) {
    if let Expr::ColumnRef {
        rel: r, attr: a, ..
    } = expr
        && *r == rel
        && !out.contains(a)
    {
        out.push(*a);
    }
    for child in expr.children() {
        collect_columns(child, rel, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time_col(attr: AttrId) -> Expr {
        Expr::ColumnRef {
            rel: 1,
            attr,
            ty: ScalarType::TimestampTz,
            collation: Collation::None,
        }
    }

    fn int_col(attr: AttrId) -> Expr {
        Expr::ColumnRef {
            rel: 1,
            attr,
            ty: ScalarType::BigInt,
            collation: Collation::None,
        }
    }

    #[test]
    fn test_time_type_classification() {
        assert!(ScalarType::Timestamp.is_time());
        assert!(ScalarType::TimestampTz.is_time());
        assert!(ScalarType::Time.is_time());
        assert!(!ScalarType::Interval.is_time());
        assert!(!ScalarType::Text.is_time());
    }

    #[test]
    fn test_remote_representability() {
        assert!(ScalarType::BigInt.is_remote_representable());
        assert!(ScalarType::DynamicBlob.is_remote_representable());
        assert!(!ScalarType::FillOption.is_remote_representable());
        assert!(!ScalarType::Unknown.is_remote_representable());
    }

    #[test]
    fn test_subtree_time_column_search_descends() {
        let deep = Expr::BinaryOp {
            op: "+".into(),
            left: Box::new(int_col(2)),
            right: Box::new(Expr::BinaryOp {
                op: "-".into(),
                left: Box::new(time_col(1)),
                right: Box::new(int_col(3)),
                result_ty: ScalarType::TimestampTz,
                input_collation: Collation::None,
                collation: Collation::None,
            }),
            result_ty: ScalarType::TimestampTz,
            input_collation: Collation::None,
            collation: Collation::None,
        };
        assert!(subtree_contains_time_column(&deep));
        assert!(!subtree_contains_time_column(&int_col(2)));
    }

    #[test]
    fn test_string_type_walks_through_operators() {
        let concat = Expr::BinaryOp {
            op: "+".into(),
            left: Box::new(int_col(2)),
            right: Box::new(Expr::Literal {
                ty: ScalarType::Text,
                value: Some(Value::Text("x".into())),
                collation: Collation::Default,
            }),
            result_ty: ScalarType::Text,
            input_collation: Collation::Default,
            collation: Collation::Default,
        };
        assert!(is_string_type(&concat));
        assert!(!is_string_type(&int_col(2)));
    }

    #[test]
    fn test_dynamic_fetch_detection() {
        let fetch = Expr::DynamicFieldAccess {
            base: Box::new(Expr::ColumnRef {
                rel: 1,
                attr: 2,
                ty: ScalarType::DynamicBlob,
                collation: Collation::None,
            }),
            key: "cpu".into(),
            result_ty: ScalarType::Text,
            collation: Collation::Default,
        };
        assert!(is_dynamic_fetch(&fetch));
        assert_eq!(dynamic_key_of(&fetch), Some("cpu"));

        let coerced = Expr::Cast {
            arg: Box::new(fetch.clone()),
            result_ty: ScalarType::Double,
        };
        assert!(is_dynamic_fetch(&coerced));
        assert_eq!(dynamic_key_of(&coerced), Some("cpu"));

        let param_fetch = Expr::DynamicFieldAccess {
            base: Box::new(Expr::Placeholder {
                ty: ScalarType::DynamicBlob,
                index: 1,
                collation: Collation::None,
            }),
            key: "cpu".into(),
            result_ty: ScalarType::Text,
            collation: Collation::Default,
        };
        assert!(!is_dynamic_fetch(&param_fetch));
        assert!(is_dynamic_param_fetch(&param_fetch));
    }

    #[test]
    fn test_collect_columns_dedups_in_order() {
        let e = Expr::BinaryOp {
            op: "+".into(),
            left: Box::new(int_col(3)),
            right: Box::new(Expr::BinaryOp {
                op: "*".into(),
                left: Box::new(int_col(1)),
                right: Box::new(int_col(3)),
                result_ty: ScalarType::BigInt,
                input_collation: Collation::None,
                collation: Collation::None,
            }),
            result_ty: ScalarType::BigInt,
            input_collation: Collation::None,
            collation: Collation::None,
        };
        let mut cols = Vec::new();
        collect_columns(&e, 1, &mut cols);
        assert_eq!(cols, vec![3, 1]);
    }
}
