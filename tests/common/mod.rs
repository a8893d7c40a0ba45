//! Shared fixtures and expression builders for the integration suites.

#![allow(dead_code)]

use tspush::{
    AggArg, AttrId, BoolOp, Catalog, Collation, ColumnDef, ColumnRole, Expr, IntervalValue,
    PatternKind, RelId, RelationDef, ScalarType, Value,
};

/// The declared-schema test relation.
pub const CPU: RelId = 1;
/// The schemaless test relation.
pub const METRICS: RelId = 2;

pub const CPU_TS: AttrId = 1;
pub const CPU_DEVICE: AttrId = 2;
pub const CPU_VALUE: AttrId = 3;
pub const CPU_ACTIVE: AttrId = 4;
pub const CPU_NOTE: AttrId = 5;
pub const CPU_CREATED: AttrId = 6;

pub const METRICS_TIME: AttrId = 1;
pub const METRICS_TAGS: AttrId = 2;
pub const METRICS_FIELDS: AttrId = 3;

/// A catalog with one declared relation (`cpu`) and one schemaless
/// relation (`metrics`, dynamic tag key `device`).
pub fn catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog
        .insert(
            CPU,
            RelationDef::new(
                "cpu",
                vec![
                    ColumnDef::new("ts", ColumnRole::TimeKey, ScalarType::TimestampTz),
                    ColumnDef::new("device", ColumnRole::TagKey, ScalarType::Text),
                    ColumnDef::new("value", ColumnRole::FieldKey, ScalarType::Double),
                    ColumnDef::new("active", ColumnRole::FieldKey, ScalarType::Bool),
                    ColumnDef::new("note", ColumnRole::FieldKey, ScalarType::Text),
                    ColumnDef::new("created", ColumnRole::FieldKey, ScalarType::TimestampTz),
                ],
            ),
        )
        .unwrap();

    let mut metrics = RelationDef::new(
        "metrics",
        vec![
            ColumnDef::new("time", ColumnRole::TimeKey, ScalarType::TimestampTz),
            ColumnDef::new("tags", ColumnRole::DynamicTags, ScalarType::DynamicBlob),
            ColumnDef::new("fields", ColumnRole::DynamicFields, ScalarType::DynamicBlob),
        ],
    );
    metrics.schemaless = true;
    metrics.tags = vec!["device".into()];
    catalog.insert(METRICS, metrics).unwrap();

    catalog
}

// ── Column builders ──────────────────────────────────────────────────────

fn column(rel: RelId, attr: AttrId, ty: ScalarType, collation: Collation) -> Expr {
    Expr::ColumnRef {
        rel,
        attr,
        ty,
        collation,
    }
}

pub fn ts_col() -> Expr {
    column(CPU, CPU_TS, ScalarType::TimestampTz, Collation::None)
}

pub fn device_col() -> Expr {
    column(CPU, CPU_DEVICE, ScalarType::Text, Collation::Default)
}

pub fn value_col() -> Expr {
    column(CPU, CPU_VALUE, ScalarType::Double, Collation::None)
}

pub fn active_col() -> Expr {
    column(CPU, CPU_ACTIVE, ScalarType::Bool, Collation::None)
}

pub fn note_col() -> Expr {
    column(CPU, CPU_NOTE, ScalarType::Text, Collation::Default)
}

pub fn created_col() -> Expr {
    column(CPU, CPU_CREATED, ScalarType::TimestampTz, Collation::None)
}

// ── Literal builders ─────────────────────────────────────────────────────

pub fn int_lit(v: i64) -> Expr {
    Expr::Literal {
        ty: ScalarType::BigInt,
        value: Some(Value::Int(v)),
        collation: Collation::None,
    }
}

pub fn float_lit(v: f64) -> Expr {
    Expr::Literal {
        ty: ScalarType::Double,
        value: Some(Value::Float(v)),
        collation: Collation::None,
    }
}

pub fn text_lit(s: &str) -> Expr {
    Expr::Literal {
        ty: ScalarType::Text,
        value: Some(Value::Text(s.into())),
        collation: Collation::Default,
    }
}

pub fn bool_lit(v: bool) -> Expr {
    Expr::Literal {
        ty: ScalarType::Bool,
        value: Some(Value::Bool(v)),
        collation: Collation::None,
    }
}

pub fn interval_lit(days: i32, micros: i64) -> Expr {
    Expr::Literal {
        ty: ScalarType::Interval,
        value: Some(Value::Interval(IntervalValue {
            months: 0,
            days,
            micros,
        })),
        collation: Collation::None,
    }
}

pub fn month_interval_lit(months: i32) -> Expr {
    Expr::Literal {
        ty: ScalarType::Interval,
        value: Some(Value::Interval(IntervalValue {
            months,
            days: 0,
            micros: 0,
        })),
        collation: Collation::None,
    }
}

// ── Operator builders ────────────────────────────────────────────────────

pub fn binop(op: &str, left: Expr, right: Expr, result_ty: ScalarType) -> Expr {
    let input_collation = if left.result_type().is_string() {
        Collation::Default
    } else {
        Collation::None
    };
    Expr::BinaryOp {
        op: op.into(),
        left: Box::new(left),
        right: Box::new(right),
        result_ty,
        input_collation,
        collation: Collation::None,
    }
}

/// A comparison (boolean result).
pub fn cmp(op: &str, left: Expr, right: Expr) -> Expr {
    binop(op, left, right, ScalarType::Bool)
}

pub fn and(args: Vec<Expr>) -> Expr {
    Expr::BoolExpr {
        op: BoolOp::And,
        args,
    }
}

pub fn or(args: Vec<Expr>) -> Expr {
    Expr::BoolExpr {
        op: BoolOp::Or,
        args,
    }
}

pub fn not(arg: Expr) -> Expr {
    Expr::BoolExpr {
        op: BoolOp::Not,
        args: vec![arg],
    }
}

pub fn like(kind: PatternKind, subject: Expr, pattern: &str) -> Expr {
    Expr::PatternMatch {
        kind,
        subject: Box::new(subject),
        pattern: Box::new(text_lit(pattern)),
    }
}

// ── Function and aggregate builders ──────────────────────────────────────

pub fn func(name: &str, args: Vec<Expr>, result_ty: ScalarType) -> Expr {
    Expr::FunctionCall {
        name: name.into(),
        args,
        result_ty,
        input_collation: Collation::None,
        collation: Collation::None,
    }
}

pub fn agg(name: &str, args: Vec<Expr>, result_ty: ScalarType) -> Expr {
    Expr::Aggregate {
        name: name.into(),
        args: args
            .into_iter()
            .map(|expr| AggArg {
                expr,
                resjunk: false,
            })
            .collect(),
        distinct: false,
        star: false,
        has_order: false,
        has_filter: false,
        split_simple: true,
        variadic: false,
        result_ty,
        input_collation: Collation::None,
        collation: Collation::None,
    }
}

pub fn count_star() -> Expr {
    Expr::Aggregate {
        name: "count".into(),
        args: Vec::new(),
        distinct: false,
        star: true,
        has_order: false,
        has_filter: false,
        split_simple: true,
        variadic: false,
        result_ty: ScalarType::BigInt,
        input_collation: Collation::None,
        collation: Collation::None,
    }
}

/// `bucket(ts, <interval>[, fill])` — the time-bucketing call.
pub fn bucket(interval_micros: i64, fill: Option<Expr>) -> Expr {
    let mut args = vec![ts_col(), interval_lit(0, interval_micros)];
    if let Some(fill) = fill {
        args.push(fill);
    }
    func("bucket", args, ScalarType::TimestampTz)
}

pub fn fill_numeric(v: i64) -> Expr {
    func("fill_numeric", vec![int_lit(v)], ScalarType::Double)
}

// ── Schemaless builders ──────────────────────────────────────────────────

pub fn dynamic_access(blob_attr: AttrId, key: &str, result_ty: ScalarType) -> Expr {
    Expr::DynamicFieldAccess {
        base: Box::new(column(
            METRICS,
            blob_attr,
            ScalarType::DynamicBlob,
            Collation::None,
        )),
        key: key.into(),
        result_ty,
        collation: Collation::Default,
    }
}

/// A typed schemaless fetch: `(fields ->> 'key')::<ty>`.
pub fn dynamic_field(key: &str, ty: ScalarType) -> Expr {
    Expr::Cast {
        arg: Box::new(dynamic_access(METRICS_FIELDS, key, ScalarType::Text)),
        result_ty: ty,
    }
}

pub fn dynamic_tag(key: &str) -> Expr {
    dynamic_access(METRICS_TAGS, key, ScalarType::Text)
}
