//! The pushdown compiler: eligibility analysis plus code generation.
//!
//! Two tightly coupled passes over the shared expression tree:
//!
//! - the **analyzer** ([`analyze`]) certifies a clause as safe to
//!   evaluate remotely, threading collation state and ancestor context
//!   through an immutable scope;
//! - the **deparser** ([`deparse`], [`select`]) renders a clause already
//!   known to be eligible into the remote dialect's text, with the
//!   dialect rewrites (pattern operators, wildcard star injection,
//!   timestamp normalization, fill-clause hoisting).
//!
//! [`CompileContext`] binds both passes to a catalog snapshot and one
//! scanned relation. The compiler is purely functional: each call builds
//! its own scratch state (output buffer, parameter list, pending fill
//! slot) and discards it, so independent compilations may run
//! concurrently against the same catalog.
//!
//! # Usage
//! ```
//! use tspush::{Catalog, ColumnDef, ColumnRole, CompileContext, FunctionTable};
//! use tspush::{Collation, Expr, RelationDef, ScalarType, Value};
//!
//! let mut catalog = Catalog::new();
//! catalog
//!     .insert(
//!         1,
//!         RelationDef::new(
//!             "cpu",
//!             vec![
//!                 ColumnDef::new("ts", ColumnRole::TimeKey, ScalarType::TimestampTz),
//!                 ColumnDef::new("usage", ColumnRole::FieldKey, ScalarType::Double),
//!             ],
//!         ),
//!     )
//!     .unwrap();
//! let functions = FunctionTable::default();
//! let cx = CompileContext::new(&catalog, &functions, 1);
//!
//! let filter = Expr::BinaryOp {
//!     op: ">".into(),
//!     left: Box::new(Expr::ColumnRef {
//!         rel: 1,
//!         attr: 2,
//!         ty: ScalarType::Double,
//!         collation: Collation::None,
//!     }),
//!     right: Box::new(Expr::Literal {
//!         ty: ScalarType::Double,
//!         value: Some(Value::Float(0.5)),
//!         collation: Collation::None,
//!     }),
//!     result_ty: ScalarType::Bool,
//!     input_collation: Collation::None,
//!     collation: Collation::None,
//! };
//! let verdict = cx.compile_filter(&filter).unwrap();
//! assert!(verdict.eligible);
//! assert_eq!(verdict.remote_text, "((\"usage\" > 0.5))");
//! ```

pub(crate) mod analyze;
pub(crate) mod deparse;
pub(crate) mod pattern;
pub(crate) mod select;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::TsPushError;
use crate::expr::{collect_columns, AttrId, Expr, RelId};
use crate::functions::FunctionTable;

use analyze::Analyzer;
use deparse::DeparseContext;

pub use analyze::TargetListVerdict;

/// One projection entry of a select plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEntry {
    pub expr: Expr,
    /// Sort/group reference linking GROUP BY / ORDER BY clauses to this
    /// target; 0 means none.
    #[serde(default)]
    pub sort_group_ref: u32,
}

impl TargetEntry {
    pub fn new(expr: Expr) -> Self {
        TargetEntry {
            expr,
            sort_group_ref: 0,
        }
    }

    pub fn with_sort_group_ref(mut self, sort_group_ref: u32) -> Self {
        self.sort_group_ref = sort_group_ref;
        self
    }
}

/// One ORDER BY key. Direction derives from the plan's sort strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub expr: Expr,
    pub ascending: bool,
    /// Nulls-first ordering has no remote equivalent and is fatal.
    #[serde(default)]
    pub nulls_first: bool,
}

/// The plan fragment `compile_select` renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectPlan {
    pub relation: RelId,
    /// Explicit projection, used when `explicit_targets` is set
    /// (aggregate and function pushdown).
    pub targets: Vec<TargetEntry>,
    pub explicit_targets: bool,
    /// The whole target list is pushed-down functions, which relaxes
    /// grouping-target detection for plain column targets.
    pub function_pushdown: bool,
    /// Columns a base scan retrieves.
    pub attrs_used: BTreeSet<AttrId>,
    /// A whole-row reference forces every column into the scan.
    pub whole_row: bool,
    /// Remote WHERE conditions, AND-joined.
    pub quals: Vec<Expr>,
    /// GROUP BY keys, as sort/group references into `targets`.
    pub group_refs: Vec<u32>,
    pub order_by: Vec<SortKey>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
    /// Schemaless: the projection selects every dynamic field.
    pub all_dynamic: bool,
    /// Schemaless: dynamic keys referenced by the query.
    pub dynamic_columns: Vec<String>,
}

impl SelectPlan {
    /// An empty plan over one relation; callers fill in the clauses.
    pub fn new(relation: RelId) -> Self {
        SelectPlan {
            relation,
            targets: Vec::new(),
            explicit_targets: false,
            function_pushdown: false,
            attrs_used: BTreeSet::new(),
            whole_row: false,
            quals: Vec::new(),
            group_refs: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            all_dynamic: false,
            dynamic_columns: Vec::new(),
        }
    }
}

/// The verdict for one top-level clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushdownVerdict {
    /// Whether the clause may be evaluated remotely.
    pub eligible: bool,
    /// Remote-dialect text for the clause; empty when ineligible.
    pub remote_text: String,
    /// Columns of the scanned relation the clause reads.
    pub retrieved_columns: Vec<AttrId>,
}

impl PushdownVerdict {
    fn ineligible() -> Self {
        PushdownVerdict {
            eligible: false,
            remote_text: String::new(),
            retrieved_columns: Vec::new(),
        }
    }
}

/// Compilation façade bound to a catalog snapshot and one scanned
/// relation. Cheap to construct; holds no mutable state.
pub struct CompileContext<'a> {
    pub catalog: &'a Catalog,
    pub functions: &'a FunctionTable,
    pub relation: RelId,
    /// The in-scope relation set. Column references outside it are
    /// treated as external parameters.
    pub in_scope: Vec<RelId>,
}

impl<'a> CompileContext<'a> {
    pub fn new(catalog: &'a Catalog, functions: &'a FunctionTable, relation: RelId) -> Self {
        CompileContext {
            catalog,
            functions,
            relation,
            in_scope: vec![relation],
        }
    }

    /// Whether one expression is safe to evaluate remotely.
    ///
    /// `for_target_list` relaxes the nested-function guard the way
    /// projection analysis does; `grouping` permits aggregate calls
    /// (legal only when compiling a grouped relation).
    pub fn is_pushdown_safe(
        &self,
        expr: &Expr,
        for_target_list: bool,
        grouping: bool,
    ) -> Result<bool, TsPushError> {
        let mut analyzer = Analyzer::new(
            self.catalog,
            self.functions,
            self.relation,
            &self.in_scope,
            for_target_list,
            grouping,
        );
        analyzer.analyze(expr)
    }

    /// Whether a whole target list of function expressions can be pushed
    /// down, and whether it selects every dynamic field.
    pub fn is_pushdown_safe_target_list(
        &self,
        targets: &[TargetEntry],
    ) -> Result<TargetListVerdict, TsPushError> {
        analyze::analyze_target_list(
            self.catalog,
            self.functions,
            self.relation,
            &self.in_scope,
            targets,
        )
    }

    /// Compile one filter clause: analyze, then (when eligible) render
    /// the parenthesized condition and collect the columns it reads.
    pub fn compile_filter(&self, expr: &Expr) -> Result<PushdownVerdict, TsPushError> {
        if !self.is_pushdown_safe(expr, false, false)? {
            return Ok(PushdownVerdict::ineligible());
        }

        let mut cx = DeparseContext::new(
            self.catalog,
            self.functions,
            self.relation,
            &self.in_scope,
            true,
        );
        cx.has_bool_cmp = select::qual_needs_bool_equality(expr);
        cx.buf.push('(');
        cx.deparse_expr(expr)?;
        cx.buf.push(')');

        let mut retrieved = Vec::new();
        collect_columns(expr, self.relation, &mut retrieved);

        debug!(clause = %cx.buf, "compiled filter clause");
        Ok(PushdownVerdict {
            eligible: true,
            remote_text: cx.buf,
            retrieved_columns: retrieved,
        })
    }

    /// Render a full SELECT statement for a plan fragment whose clauses
    /// were already certified eligible. Returns the statement text and
    /// the retrieved-column list.
    pub fn compile_select(&self, plan: &SelectPlan) -> Result<(String, Vec<AttrId>), TsPushError> {
        select::deparse_select(plan, self.catalog, self.functions)
    }

    /// Render a DELETE keyed on the given attributes, with positional
    /// parameters in attribute order.
    pub fn compile_delete(&self, key_attrs: &[AttrId]) -> Result<String, TsPushError> {
        select::deparse_delete(self.catalog, self.relation, key_attrs)
    }
}
