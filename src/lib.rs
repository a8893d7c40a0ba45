//! tspush — query-pushdown compiler for schema-flexible time-series
//! foreign tables.
//!
//! Given a fragment of a relational query plan evaluated against a table
//! whose rows live in a remote time-series store, this crate decides
//! which parts of the plan can be evaluated remotely without changing
//! query semantics, and emits a textually correct, semantically
//! equivalent query in the remote store's dialect for the safe portion.
//! The remainder is left for local evaluation.
//!
//! # Architecture
//!
//! - [`expr`] — the bound expression tree both passes walk.
//! - [`catalog`] — the schema classifier: time key, tag keys, field
//!   keys, and the schemaless dynamic blob columns.
//! - [`functions`] — the function classification table (wildcard,
//!   unique-remote, remote-builtin) and operator sets.
//! - [`pushdown`] — the eligibility analyzer and the code generator,
//!   fronted by [`CompileContext`].
//!
//! The compiler performs no I/O and owns no connection: it consumes a
//! read-only catalog snapshot and produces query text plus a
//! retrieved-column list for an external transport to execute.
//!
//! # Failure model
//!
//! Ineligibility is not an error — an uncertifiable clause simply stays
//! local. [`TsPushError`] is reserved for invariant violations: malformed
//! plans (a fill call outside the bucket function, a catalog miss) and
//! constructs the dialect cannot express (nulls-first ordering).

pub mod catalog;
pub mod error;
pub mod expr;
pub mod functions;
pub mod pushdown;

pub use catalog::{
    is_time_column_name, pull_dynamic_columns, Catalog, ColumnDef, ColumnRole, RelationDef,
    TableOptions,
};
pub use error::TsPushError;
pub use expr::{
    AggArg, AttrId, BoolOp, Collation, Expr, InListRhs, IntervalValue, PatternKind, RelId,
    ScalarType, Value,
};
pub use functions::FunctionTable;
pub use pushdown::{
    CompileContext, PushdownVerdict, SelectPlan, SortKey, TargetEntry, TargetListVerdict,
};
