//! Eligibility analysis: which expressions may be evaluated remotely.
//!
//! The analyzer walks an expression tree bottom-up and certifies each
//! subtree as safe or unsafe to push down. Ancestor context that changes a
//! node's verdict — is this under a comparison? does an ancestor add or
//! subtract against the time key? is a fill slot open? — travels downward
//! in an immutable [`Scope`] value passed by value into every recursive
//! call. Collation information travels back up as a return value and is
//! folded over siblings with a pure merge function; nothing is threaded
//! through shared mutable state.
//!
//! Two ways out: a **soft** rejection (`Ok(None)` from the walker,
//! `Ok(false)` at the entry points) sends the clause back for local
//! evaluation; a **fatal** error (`Err`) means the plan itself is broken —
//! a fill call outside the bucket function, or a catalog miss.

use tracing::{debug, warn};

use crate::catalog::{Catalog, ColumnRole};
use crate::error::TsPushError;
use crate::expr::{
    args_contain_time_const, args_contain_time_expr, args_contain_time_function,
    args_contain_time_param, contains_function_call, dynamic_key_of, expr_is_time_column,
    is_dynamic_fetch, is_dynamic_param_fetch, is_string_type, subtree_contains_time_column,
    BoolOp, Collation, Expr, InListRhs, RelId, ScalarType, Value,
};
use crate::functions::FunctionTable;
use crate::pushdown::pattern::regex_literal;
use crate::pushdown::TargetEntry;

// Bits tracking whether a subtree touches bare columns, aggregates, or
// both. Mixing the two under one operator cannot be pushed down.
const MARK_COLUMN: u32 = 1 << 0;
const MARK_AGGREF: u32 = 1 << 1;
const MIXING_UNSAFE: u32 = MARK_COLUMN | MARK_AGGREF;

/// Collation safety, ordered so that a worse state dominates a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum CollationSafety {
    /// No collation seen, or only defaults that cannot change semantics.
    None,
    /// A collation derived from a remote column; safe as long as every
    /// sibling agrees.
    Safe,
    /// A collation the remote store cannot reproduce.
    Unsafe,
}

/// The collation verdict a node returns to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CollationState {
    pub collation: Collation,
    pub safety: CollationSafety,
}

impl CollationState {
    pub(crate) const NONE: CollationState = CollationState {
        collation: Collation::None,
        safety: CollationSafety::None,
    };
}

/// Fold a child's collation verdict into the accumulated sibling state.
///
/// `Unsafe` dominates. Two `Safe` states with different collations merge
/// to `Unsafe`, except that the default collation yields to a specific
/// one. Once `Unsafe` is reached it is never downgraded.
pub(crate) fn merge_collations(outer: CollationState, node: CollationState) -> CollationState {
    if node.safety > outer.safety {
        return node;
    }
    if node.safety == outer.safety
        && node.safety == CollationSafety::Safe
        && node.collation != outer.collation
    {
        if outer.collation == Collation::Default {
            return CollationState {
                collation: node.collation,
                safety: CollationSafety::Safe,
            };
        }
        if node.collation != Collation::Default {
            return CollationState {
                collation: outer.collation,
                safety: CollationSafety::Unsafe,
            };
        }
    }
    outer
}

/// Node output for operators: the node's own collation must match what
/// its inputs produced, or the state degrades.
fn strict_output(collation: Collation, inner: CollationState) -> CollationState {
    if collation == Collation::None {
        CollationState::NONE
    } else if inner.safety == CollationSafety::Safe && collation == inner.collation {
        CollationState {
            collation,
            safety: CollationSafety::Safe,
        }
    } else {
        CollationState {
            collation,
            safety: CollationSafety::Unsafe,
        }
    }
}

/// Node output for functions, aggregates, and array constructors: like
/// [`strict_output`], but a default collation that did not come from the
/// inputs is harmless rather than unsafe.
fn lenient_output(collation: Collation, inner: CollationState) -> CollationState {
    if collation == Collation::None {
        CollationState::NONE
    } else if inner.safety == CollationSafety::Safe && collation == inner.collation {
        CollationState {
            collation,
            safety: CollationSafety::Safe,
        }
    } else if collation == Collation::Default {
        CollationState::NONE
    } else {
        CollationState {
            collation,
            safety: CollationSafety::Unsafe,
        }
    }
}

/// Ancestor context threaded down the walk, by value. Fresh (all-false)
/// scopes are created wherever the surrounding context does not flow into
/// a child; specific node arms copy through exactly the fields that do.
#[derive(Debug, Clone, Copy, Default)]
struct Scope {
    can_skip_cast: bool,
    fill_enabled: bool,
    has_time_key: bool,
    has_add_sub: bool,
    is_comparison: bool,
}

/// Soft rejection: log the reason and report "not pushable".
fn soft(reason: &str) -> Result<Option<CollationState>, TsPushError> {
    debug!(reason, "expression not safe to push down");
    Ok(None)
}

/// Whether any of `args` is a column reference whose catalog role is the
/// time key (or its text shadow). A tag or field column that merely has a
/// time type does not count.
pub(crate) fn args_contain_time_key(catalog: &Catalog, args: &[&Expr]) -> bool {
    args.iter().any(|e| match e {
        Expr::ColumnRef { rel, attr, ty, .. } if ty.is_time() => catalog
            .column_role(*rel, *attr)
            .map(|role| role.is_time())
            .unwrap_or(false),
        _ => false,
    })
}

/// One eligibility analysis over one expression.
pub(crate) struct Analyzer<'a> {
    catalog: &'a Catalog,
    functions: &'a FunctionTable,
    /// The scanned relation, used for catalog lookups.
    rel: RelId,
    /// The in-scope relation set; references outside it are parameters.
    relids: &'a [RelId],
    /// Target-list analysis relaxes the nested-function guard.
    for_target_list: bool,
    /// Aggregates are only pushable when compiling a grouping relation.
    aggregates_allowed: bool,
    is_inner_func: bool,
    mixing: u32,
    /// A wildcard function or regex argument was seen somewhere in the
    /// expression.
    pub(crate) saw_wildcard: bool,
    /// A unique or builtin remote function was seen, which licenses
    /// volatile expressions.
    pub(crate) saw_remote_function: bool,
    /// A function other than the time-bucket function was seen.
    pub(crate) saw_bucketless_function: bool,
}

impl<'a> Analyzer<'a> {
    pub(crate) fn new(
        catalog: &'a Catalog,
        functions: &'a FunctionTable,
        rel: RelId,
        relids: &'a [RelId],
        for_target_list: bool,
        aggregates_allowed: bool,
    ) -> Self {
        Analyzer {
            catalog,
            functions,
            rel,
            relids,
            for_target_list,
            aggregates_allowed,
            is_inner_func: false,
            mixing: 0,
            saw_wildcard: false,
            saw_remote_function: false,
            saw_bucketless_function: false,
        }
    }

    /// Whether the whole expression is safe to evaluate remotely.
    pub(crate) fn analyze(&mut self, expr: &Expr) -> Result<bool, TsPushError> {
        match self.walk(expr, Scope::default())? {
            None => Ok(false),
            Some(out) => Ok(out.safety != CollationSafety::Unsafe),
        }
    }

    fn args_contain_time_key(&self, args: &[&Expr]) -> bool {
        args_contain_time_key(self.catalog, args)
    }

    fn walk(
        &mut self,
        node: &Expr,
        outer: Scope,
    ) -> Result<Option<CollationState>, TsPushError> {
        let mut check_type = true;
        let out: CollationState;

        match node {
            Expr::ColumnRef {
                rel,
                attr,
                ty,
                collation,
            } => {
                if self.relids.contains(rel) {
                    if *attr < 0 {
                        return soft("system column reference");
                    }
                    // A time operand under a comparison whose other side
                    // does interval arithmetic against the time key has no
                    // remote equivalent.
                    if ty.is_time()
                        && outer.is_comparison
                        && outer.has_add_sub
                        && outer.has_time_key
                    {
                        return soft("time operand under time-key arithmetic comparison");
                    }
                    self.mixing |= MARK_COLUMN;
                    out = CollationState {
                        collation: *collation,
                        safety: if *collation == Collation::None {
                            CollationSafety::None
                        } else {
                            CollationSafety::Safe
                        },
                    };
                } else {
                    // Out of scope: becomes an external parameter.
                    out = CollationState {
                        collation: *collation,
                        safety: match collation {
                            Collation::None | Collation::Default => CollationSafety::None,
                            Collation::Other(_) => CollationSafety::Unsafe,
                        },
                    };
                }
            }

            Expr::Literal {
                ty,
                value,
                collation,
            } => {
                if *ty == ScalarType::Interval
                    && let Some(Value::Interval(iv)) = value
                    && iv.months != 0
                {
                    return soft("calendar-relative interval literal");
                }
                if *ty == ScalarType::FillOption {
                    check_type = false;
                }
                if matches!(collation, Collation::Other(_)) {
                    return soft("literal with non-default collation");
                }
                out = CollationState::NONE;
            }

            Expr::Placeholder { ty, collation, .. } => {
                if !ty.is_valid_param_type() {
                    return soft("parameter of unsupported type");
                }
                if ty.is_time() && outer.is_comparison && outer.has_add_sub && outer.has_time_key
                {
                    return soft("time parameter under time-key arithmetic comparison");
                }
                out = CollationState {
                    collation: *collation,
                    safety: match collation {
                        Collation::None | Collation::Default => CollationSafety::None,
                        Collation::Other(_) => CollationSafety::Unsafe,
                    },
                };
            }

            Expr::FunctionCall {
                name,
                args,
                result_ty,
                input_collation,
                collation,
            } => {
                // A time-typed call under a comparison is only meaningful
                // as now() against the time key.
                if result_ty.is_time() && outer.is_comparison {
                    if name != "now" {
                        return soft("time-typed function under comparison");
                    }
                    if !outer.has_time_key {
                        return soft("now() compared against a non-key operand");
                    }
                }

                let is_cast_func = self.functions.is_cast_function(name);
                let mut is_star_func = false;
                let mut can_pushdown_func = false;
                let mut scope = Scope::default();

                if self.functions.is_wildcard_function(name) {
                    is_star_func = true;
                    self.saw_wildcard = true;
                }
                if self.functions.is_unique_remote_function(name)
                    || self.functions.is_remote_builtin(name)
                {
                    can_pushdown_func = true;
                    scope.can_skip_cast = true;
                    self.saw_remote_function = true;
                }
                if !(is_star_func || can_pushdown_func || is_cast_func) {
                    return soft("function is not classified for pushdown");
                }

                // A misplaced fill call is a malformed plan, not a mere
                // ineligibility.
                if self.functions.is_fill_function(name) && !outer.fill_enabled {
                    return Err(TsPushError::MisplacedFill);
                }

                if is_cast_func {
                    if !outer.can_skip_cast {
                        return soft("cast function without a cast-skipping call site");
                    }
                } else {
                    if !self.for_target_list && self.is_inner_func {
                        return soft("nested function call");
                    }
                    self.is_inner_func = true;
                }

                if self.functions.is_bucket_function(name) {
                    scope.fill_enabled = true;
                } else {
                    self.saw_bucketless_function = true;
                }

                let mut inner = CollationState::NONE;
                for arg in args {
                    let Some(c) = self.walk(arg, scope)? else {
                        return Ok(None);
                    };
                    inner = merge_collations(inner, c);
                }
                if !is_cast_func {
                    self.is_inner_func = false;
                }

                let is_regex = args.first().map(|a| regex_literal(a).is_some()).unwrap_or(false);
                if is_regex {
                    out = CollationState::NONE;
                    check_type = false;
                    self.saw_wildcard = true;
                } else {
                    if *input_collation != Collation::None
                        && (inner.safety != CollationSafety::Safe
                            || *input_collation != inner.collation)
                    {
                        return soft("function input collation mismatch");
                    }
                    out = lenient_output(*collation, inner);
                }
                if self.functions.is_fill_function(name) {
                    check_type = false;
                }
            }

            Expr::UnaryOp {
                op,
                arg,
                result_ty: _,
                input_collation,
                collation,
            } => {
                if !self.functions.is_builtin_operator(op) {
                    return soft("operator is not builtin");
                }
                let mut scope = Scope::default();
                if op == "+" || op == "-" {
                    scope.has_time_key = outer.has_time_key;
                    scope.is_comparison = outer.is_comparison;
                    scope.has_add_sub = true;
                } else {
                    scope.has_time_key = self.args_contain_time_key(&[arg.as_ref()]);
                }
                let Some(inner) = self.walk(arg, scope)? else {
                    return Ok(None);
                };
                if self.mixing & MIXING_UNSAFE == MIXING_UNSAFE {
                    return soft("aggregate mixed with bare columns");
                }
                if *input_collation != Collation::None
                    && (inner.safety != CollationSafety::Safe
                        || *input_collation != inner.collation)
                {
                    return soft("operator input collation mismatch");
                }
                out = strict_output(*collation, inner);
            }

            Expr::BinaryOp {
                op,
                left,
                right,
                result_ty: _,
                input_collation,
                collation,
            } => {
                if !self.functions.is_builtin_operator(op) {
                    return soft("operator is not builtin");
                }
                let args: [&Expr; 2] = [left.as_ref(), right.as_ref()];
                let mut scope = Scope {
                    is_comparison: self.functions.is_comparison_operator(op),
                    ..Scope::default()
                };

                if scope.is_comparison
                    && left.result_type() == ScalarType::Interval
                    && right.result_type() == ScalarType::Interval
                {
                    return soft("comparison of two intervals");
                }

                let has_time_key = self.args_contain_time_key(&args);

                if scope.is_comparison && !has_time_key && args_contain_time_expr(&args) {
                    return soft("time-typed expression compared without the time key");
                }
                if (op == "!=" || op == "<>") && has_time_key {
                    return soft("not-equal against the time key");
                }

                let has_time_column = args.iter().any(|a| expr_is_time_column(a));
                let has_time_tags_or_fields = has_time_column && !has_time_key;

                if scope.is_comparison
                    && has_time_tags_or_fields
                    && args_contain_time_function(&args)
                {
                    return soft("non-key time column compared against a time function");
                }

                if matches!(op.as_str(), "<" | ">" | "<=" | ">=" | "=") {
                    let both_time_columns =
                        expr_is_time_column(left) && expr_is_time_column(right);
                    if has_time_key && both_time_columns {
                        return soft("time key compared against another time column");
                    }
                    if op != "=" {
                        let left_key = self.args_contain_time_key(&[left.as_ref()]);
                        let right_key = self.args_contain_time_key(&[right.as_ref()]);
                        if both_time_columns && !left_key && !right_key {
                            return soft("ordered comparison of two non-key time columns");
                        }
                        if has_time_tags_or_fields
                            && (args_contain_time_const(&args) || args_contain_time_param(&args))
                        {
                            return soft("non-key time column in an ordered comparison");
                        }
                        if is_string_type(left) {
                            return soft("ordered comparison on a string operand");
                        }
                    }
                }

                if op == "+" || op == "-" {
                    scope.has_time_key = outer.has_time_key;
                    scope.is_comparison = outer.is_comparison;
                    scope.has_add_sub = true;
                } else {
                    scope.has_time_key = has_time_key;
                }

                let mut inner = CollationState::NONE;
                for arg in args {
                    let Some(c) = self.walk(arg, scope)? else {
                        return Ok(None);
                    };
                    inner = merge_collations(inner, c);
                }
                if self.mixing & MIXING_UNSAFE == MIXING_UNSAFE {
                    return soft("aggregate mixed with bare columns");
                }
                if *input_collation != Collation::None
                    && (inner.safety != CollationSafety::Safe
                        || *input_collation != inner.collation)
                {
                    return soft("operator input collation mismatch");
                }
                out = strict_output(*collation, inner);
            }

            Expr::PatternMatch {
                subject, pattern, ..
            } => {
                let pattern_is_text_const = matches!(
                    pattern.as_ref(),
                    Expr::Literal {
                        ty,
                        value: Some(Value::Text(_)),
                        ..
                    } if ty.is_string()
                );
                if !pattern_is_text_const {
                    return soft("pattern operand is not a text constant");
                }
                let mut inner = CollationState::NONE;
                for arg in [subject.as_ref(), pattern.as_ref()] {
                    let Some(c) = self.walk(arg, Scope::default())? else {
                        return Ok(None);
                    };
                    inner = merge_collations(inner, c);
                }
                if inner.safety == CollationSafety::Unsafe {
                    return soft("pattern match over unsafe collation");
                }
                out = CollationState::NONE;
            }

            Expr::BoolExpr { op, args } => {
                if *op == BoolOp::Not {
                    return soft("NOT has no remote translation");
                }
                let mut inner = CollationState::NONE;
                for arg in args {
                    let Some(c) = self.walk(arg, Scope::default())? else {
                        return Ok(None);
                    };
                    inner = merge_collations(inner, c);
                }
                // A disjunction over any time column defeats the remote
                // engine's time-range pruning. Conservative by design.
                if *op == BoolOp::Or && args.iter().any(subtree_contains_time_column) {
                    return soft("OR over a time column");
                }
                out = CollationState::NONE;
            }

            Expr::NullTest { arg, .. } => {
                // Only dynamic tag keys: the remote store renders a
                // missing tag as an empty string, not a true null.
                let Some(key) = dynamic_key_of(arg) else {
                    return soft("null test on a non-tag operand");
                };
                if !self.catalog.is_tag_key(self.rel, key) {
                    return soft("null test on a non-tag dynamic key");
                }
                out = CollationState::NONE;
            }

            Expr::ArrayLiteral {
                elements,
                collation,
                ..
            } => {
                let mut inner = CollationState::NONE;
                for e in elements {
                    let Some(c) = self.walk(e, Scope::default())? else {
                        return Ok(None);
                    };
                    inner = merge_collations(inner, c);
                }
                out = lenient_output(*collation, inner);
            }

            Expr::InList {
                op,
                left,
                rhs,
                input_collation,
                ..
            } => {
                if is_string_type(left) && self.functions.is_ordering_operator(op) {
                    return soft("ordered membership test on a string operand");
                }
                if !self.functions.is_builtin_operator(op) {
                    return soft("operator is not builtin");
                }
                if expr_is_time_column(left) {
                    return soft("membership test over a time column");
                }
                let mut inner = CollationState::NONE;
                let Some(c) = self.walk(left, Scope::default())? else {
                    return Ok(None);
                };
                inner = merge_collations(inner, c);
                if let InListRhs::Array(arr) = rhs {
                    let Some(c) = self.walk(arr, Scope::default())? else {
                        return Ok(None);
                    };
                    inner = merge_collations(inner, c);
                }
                if *input_collation != Collation::None
                    && (inner.safety != CollationSafety::Safe
                        || *input_collation != inner.collation)
                {
                    return soft("membership input collation mismatch");
                }
                out = CollationState::NONE;
            }

            Expr::Aggregate {
                name,
                args,
                distinct,
                star: _,
                has_order,
                has_filter,
                split_simple,
                variadic: _,
                result_ty: _,
                input_collation,
                collation,
            } => {
                let is_star_func = self.functions.is_wildcard_function(name);
                let is_plain_agg = self.functions.is_pushdown_aggregate(name);
                if !(is_star_func || is_plain_agg) {
                    return soft("aggregate is not classified for pushdown");
                }
                let index_const: i64 = if name == "sample" || name == "integral" {
                    1
                } else {
                    -1
                };
                if !self.aggregates_allowed {
                    return soft("aggregate outside a grouping relation");
                }
                if !*split_simple {
                    return soft("partial aggregation mode");
                }
                self.mixing |= MARK_AGGREF;

                let schemaless = self.catalog.relation(self.rel)?.schemaless;
                let mut agg_input_collation = *input_collation;
                let mut is_regex = false;
                let mut inner = CollationState::NONE;

                for (index, arg) in args.iter().enumerate() {
                    let n = &arg.expr;
                    let mut is_dynamic = false;

                    match n {
                        Expr::ColumnRef { .. } => {}
                        Expr::Literal { .. } if index as i64 == index_const => {}
                        Expr::Literal { ty, .. } if ty.is_string() => {
                            if regex_literal(n).is_some() {
                                is_regex = true;
                            } else {
                                return soft("constant aggregate argument");
                            }
                        }
                        Expr::Literal { .. } => {
                            return soft("constant aggregate argument");
                        }
                        Expr::Cast { .. } | Expr::DynamicFieldAccess { .. } if schemaless => {
                            if is_dynamic_fetch(n) {
                                is_dynamic = true;
                            } else {
                                return soft("unsupported aggregate argument");
                            }
                        }
                        _ if is_star_func => {}
                        _ => return soft("unsupported aggregate argument"),
                    }

                    if let Expr::ColumnRef { rel, attr, ty, .. } = n {
                        let colname = self.catalog.remote_column_name(*rel, *attr)?;
                        if self.catalog.is_tag_key(self.rel, colname) {
                            return soft("tag key as aggregate argument");
                        }
                        if (name == "max" || name == "min")
                            && matches!(ty, ScalarType::Text | ScalarType::Unknown)
                        {
                            return soft("max/min over text");
                        }
                    } else if is_dynamic {
                        let fetch = match n {
                            Expr::Cast { arg, .. } => arg.as_ref(),
                            other => other,
                        };
                        if let Expr::DynamicFieldAccess { base, .. } = fetch
                            && let Expr::ColumnRef { collation, .. } = base.as_ref()
                        {
                            agg_input_collation = *collation;
                        }
                        let key = dynamic_key_of(n).unwrap_or_default();
                        if self.catalog.is_tag_key(self.rel, key) {
                            return soft("tag key as aggregate argument");
                        }
                        if (name == "max" || name == "min")
                            && matches!(
                                n.result_type(),
                                ScalarType::Text | ScalarType::Unknown
                            )
                        {
                            return soft("max/min over text");
                        }
                    }

                    let Some(c) = self.walk(n, Scope::default())? else {
                        return Ok(None);
                    };
                    inner = merge_collations(inner, c);

                    // A time column is a legal aggregate argument only for
                    // first() and last().
                    if subtree_contains_time_column(n) && !(name == "first" || name == "last") {
                        return soft("time column as aggregate argument");
                    }
                }

                if *has_order || *has_filter {
                    return soft("aggregate with internal ordering or filter");
                }
                if *distinct && name != "count" {
                    return soft("DISTINCT on a non-count aggregate");
                }

                if is_regex {
                    check_type = false;
                } else if agg_input_collation != Collation::None
                    && (inner.safety != CollationSafety::Safe
                        || agg_input_collation != inner.collation)
                {
                    return soft("aggregate input collation mismatch");
                }
                out = lenient_output(*collation, inner);
            }

            Expr::Cast { arg, result_ty } => {
                if is_dynamic_fetch(arg)
                    && result_ty.is_time()
                    && outer.is_comparison
                    && outer.has_add_sub
                    && outer.has_time_key
                {
                    return soft("time-typed dynamic access under time-key arithmetic comparison");
                }
                if is_dynamic_fetch(arg) || is_dynamic_param_fetch(arg) {
                    if self.walk(arg, Scope::default())?.is_none() {
                        return Ok(None);
                    }
                } else {
                    return soft("coercion of a non-dynamic operand");
                }
                out = CollationState::NONE;
            }

            Expr::DynamicFieldAccess {
                base, collation, ..
            } => match base.as_ref() {
                Expr::ColumnRef { .. } | Expr::Placeholder { .. } => {
                    check_type = false;
                    out = CollationState {
                        collation: *collation,
                        safety: CollationSafety::Safe,
                    };
                }
                _ => return soft("dynamic access base is not a column or parameter"),
            },
        }

        // Whatever the per-node verdicts said, a result type the remote
        // store cannot represent disqualifies the whole expression.
        if check_type && !node.result_type().is_remote_representable() {
            return soft("result type is not remote-representable");
        }
        Ok(Some(out))
    }
}

/// Result of target-list eligibility analysis.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetListVerdict {
    /// Whether the whole target list may be evaluated remotely.
    pub safe: bool,
    /// Whether the projection selects every dynamic field (renders `*`).
    pub select_all_dynamic: bool,
}

/// Whether a whole target list of function expressions can be pushed down.
///
/// Requires at least one function call; rejects multiple targets when a
/// wildcard or regex function is present, unsafe collations, and volatile
/// expressions outside a remote-function context.
pub(crate) fn analyze_target_list(
    catalog: &Catalog,
    functions: &FunctionTable,
    rel: RelId,
    relids: &[RelId],
    targets: &[TargetEntry],
) -> Result<TargetListVerdict, TsPushError> {
    const NOT_SAFE: TargetListVerdict = TargetListVerdict {
        safe: false,
        select_all_dynamic: false,
    };

    if !targets.iter().any(|t| contains_function_call(&t.expr)) {
        return Ok(NOT_SAFE);
    }

    let mut have_dynamic_fields = false;
    let mut saw_bucketless = false;

    for target in targets {
        let mut analyzer = Analyzer::new(catalog, functions, rel, relids, true, false);
        let Some(out) = analyzer.walk(&target.expr, Scope::default())? else {
            return Ok(NOT_SAFE);
        };
        saw_bucketless |= analyzer.saw_bucketless_function;

        if targets.len() > 1 && analyzer.saw_wildcard {
            warn!(
                "selecting multiple targets alongside a wildcard or regex function; \
                 the target list is not pushed down"
            );
            return Ok(NOT_SAFE);
        }
        if out.safety == CollationSafety::Unsafe {
            return Ok(NOT_SAFE);
        }
        if !analyzer.saw_remote_function && contains_volatile_function(&target.expr, functions) {
            return Ok(NOT_SAFE);
        }

        if let Expr::ColumnRef { rel: r, attr, .. } = &target.expr
            && *r == rel
            && catalog
                .column_role(*r, *attr)
                .map(|role| role == ColumnRole::DynamicFields)
                .unwrap_or(false)
        {
            have_dynamic_fields = true;
        }
    }

    let mut select_all_dynamic = false;
    if have_dynamic_fields {
        if saw_bucketless {
            return Ok(NOT_SAFE);
        }
        select_all_dynamic = true;
    }

    Ok(TargetListVerdict {
        safe: true,
        select_all_dynamic,
    })
}

fn contains_volatile_function(expr: &Expr, functions: &FunctionTable) -> bool {
    if let Expr::FunctionCall { name, .. } = expr
        && functions.is_volatile(name)
    {
        return true;
    }
    expr.children()
        .into_iter()
        .any(|c| contains_volatile_function(c, functions))
}
