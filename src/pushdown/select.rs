//! Statement assembly: SELECT (and DELETE) text for the remote dialect.
//!
//! Clause order is `SELECT <targets> FROM <relation> [WHERE ...]
//! [GROUP BY ... [fill(...)]] [ORDER BY ... ASC|DESC] [LIMIT n]
//! [OFFSET n]`. Three target-list forms exist: the base-scan form driven
//! by the used-column set, the explicit form for aggregate/function
//! pushdown, and the schemaless form driven by the referenced dynamic
//! keys. All three guarantee the remote engine sees at least one
//! field-key column (or `*`), because a projection of tags alone returns
//! no rows for some table kinds.

use tracing::debug;

use crate::catalog::{is_time_column_name, Catalog};
use crate::error::TsPushError;
use crate::expr::{is_dynamic_fetch, AttrId, Expr, RelId, ScalarType};
use crate::functions::FunctionTable;
use crate::pushdown::deparse::{quote_identifier, DeparseContext};
use crate::pushdown::SelectPlan;

/// Whether a WHERE qual must render bare boolean operands as explicit
/// equality tests: a lone boolean column, or a boolean-typed dynamic
/// field access.
pub(crate) fn qual_needs_bool_equality(qual: &Expr) -> bool {
    match qual {
        Expr::ColumnRef { ty, .. } => *ty == ScalarType::Bool,
        Expr::Cast { result_ty, .. } => {
            is_dynamic_fetch(qual) && *result_ty == ScalarType::Bool
        }
        _ => false,
    }
}

/// Render a full SELECT statement for the plan fragment. Returns the
/// statement text and the retrieved-column list (attribute numbers for
/// base scans, 1-based positions for explicit target lists).
pub(crate) fn deparse_select(
    plan: &SelectPlan,
    catalog: &Catalog,
    functions: &FunctionTable,
) -> Result<(String, Vec<AttrId>), TsPushError> {
    let relids = [plan.relation];
    let mut cx = DeparseContext::new(catalog, functions, plan.relation, &relids, true);

    cx.buf.push_str("SELECT ");
    let retrieved = if plan.explicit_targets {
        deparse_explicit_target_list(&mut cx, plan)?
    } else if catalog.relation(plan.relation)?.schemaless {
        deparse_target_list_schemaless(&mut cx, plan)?
    } else {
        deparse_target_list(&mut cx, plan)?
    };

    cx.buf.push_str(" FROM ");
    let relname = quote_identifier(catalog.remote_relation_name(plan.relation)?);
    cx.buf.push_str(&relname);

    if !plan.quals.is_empty() {
        cx.buf.push_str(" WHERE ");
        for (i, qual) in plan.quals.iter().enumerate() {
            if i > 0 {
                cx.buf.push_str(" AND ");
            }
            cx.has_bool_cmp = qual_needs_bool_equality(qual);
            cx.buf.push('(');
            cx.deparse_expr(qual)?;
            cx.buf.push(')');
            cx.has_bool_cmp = false;
        }
    }

    append_group_by_clause(&mut cx, plan)?;

    if !plan.order_by.is_empty() {
        append_order_by_clause(&mut cx, plan)?;
    }
    if let Some(limit) = &plan.limit {
        cx.buf.push_str(" LIMIT ");
        cx.deparse_expr(limit)?;
    }
    if let Some(offset) = &plan.offset {
        cx.buf.push_str(" OFFSET ");
        cx.deparse_expr(offset)?;
    }

    debug!(query = %cx.buf, "generated remote select");
    Ok((cx.buf, retrieved))
}

/// Base-scan target list: walk the catalog's column order, emit every
/// used column except the time key (which the remote engine returns
/// implicitly but which still counts as retrieved), and guarantee a
/// field-key column when only tags were selected.
fn deparse_target_list(
    cx: &mut DeparseContext<'_>,
    plan: &SelectPlan,
) -> Result<Vec<AttrId>, TsPushError> {
    let def = cx.catalog.relation(plan.relation)?;
    let mut retrieved = Vec::new();
    let mut first = true;
    let mut need_field_key = true;

    for (i, col) in def.columns.iter().enumerate() {
        let attr = (i + 1) as AttrId;
        if plan.whole_row || plan.attrs_used.contains(&attr) {
            if !col.role.is_time() {
                if !cx.catalog.is_tag_key(plan.relation, col.remote_name()) {
                    need_field_key = false;
                }
                if !first {
                    cx.buf.push_str(", ");
                }
                first = false;
                cx.column_ref(plan.relation, attr, col.ty, false)?;
            }
            retrieved.push(attr);
        }
    }

    if first {
        cx.buf.push('*');
        return Ok(retrieved);
    }
    if need_field_key {
        append_field_key(cx, first)?;
    }
    Ok(retrieved)
}

/// Explicit target list for aggregate/function pushdown. Bucket and fill
/// calls never render inline here; grouping-target columns are left to
/// the GROUP BY clause; positions are recorded 1-based.
fn deparse_explicit_target_list(
    cx: &mut DeparseContext<'_>,
    plan: &SelectPlan,
) -> Result<Vec<AttrId>, TsPushError> {
    let mut retrieved = Vec::new();
    cx.in_target_list = true;

    let mut first = true;
    let mut need_field_key = true;
    let mut is_need_comma = false;
    let mut selected_all_dynamic = false;

    for (i, tle) in plan.targets.iter().enumerate() {
        let is_dynamic = is_dynamic_fetch(&tle.expr);

        let mut is_grouping_target = false;
        if (!plan.function_pushdown && matches!(tle.expr, Expr::ColumnRef { .. })) || is_dynamic {
            is_grouping_target =
                tle.sort_group_ref != 0 && plan.group_refs.contains(&tle.sort_group_ref);
        }

        let emit = matches!(tle.expr, Expr::Aggregate { .. })
            || (matches!(tle.expr, Expr::BinaryOp { .. } | Expr::UnaryOp { .. }) && !is_dynamic)
            || matches!(tle.expr, Expr::FunctionCall { .. })
            || ((matches!(tle.expr, Expr::ColumnRef { .. }) || is_dynamic)
                && !is_grouping_target);

        if emit {
            let mut is_skip = false;
            if let Expr::FunctionCall { name, .. } = &tle.expr
                && (cx.functions.is_bucket_function(name) || cx.functions.is_fill_function(name))
            {
                is_skip = true;
            }
            if is_need_comma && !is_skip {
                cx.buf.push_str(", ");
            }
            need_field_key = false;
            if !is_skip {
                if plan.function_pushdown && plan.all_dynamic {
                    selected_all_dynamic = true;
                } else {
                    first = false;
                    cx.deparse_expr(&tle.expr)?;
                    is_need_comma = true;
                }
            }
        }

        if need_field_key
            && let Expr::ColumnRef { rel, attr, .. } = &tle.expr
        {
            let name = cx.catalog.remote_column_name(*rel, *attr)?;
            if !cx.catalog.is_tag_key(plan.relation, name) {
                need_field_key = false;
            }
        }

        retrieved.push((i + 1) as AttrId);
    }
    cx.in_target_list = false;

    if retrieved.is_empty() || selected_all_dynamic {
        cx.buf.push('*');
        return Ok(retrieved);
    }
    if need_field_key {
        append_field_key(cx, first)?;
    }
    Ok(retrieved)
}

/// Schemaless target list: `*` when every dynamic field is wanted or when
/// no field key is referenced at all; otherwise the referenced dynamic
/// keys, quoted, skipping time columns.
fn deparse_target_list_schemaless(
    cx: &mut DeparseContext<'_>,
    plan: &SelectPlan,
) -> Result<Vec<AttrId>, TsPushError> {
    let def = cx.catalog.relation(plan.relation)?;
    let no_field_key = plan
        .dynamic_columns
        .iter()
        .all(|name| is_time_column_name(name) || cx.catalog.is_tag_key(plan.relation, name));

    let mut retrieved = Vec::new();
    for i in 1..=def.columns.len() {
        let attr = i as AttrId;
        if plan.all_dynamic || no_field_key || plan.attrs_used.contains(&attr) {
            retrieved.push(attr);
        }
    }

    if plan.all_dynamic || no_field_key {
        cx.buf.push('*');
        return Ok(retrieved);
    }

    let mut first = true;
    for name in &plan.dynamic_columns {
        if !is_time_column_name(name) {
            if !first {
                cx.buf.push_str(", ");
            }
            first = false;
            let quoted = quote_identifier(name);
            cx.buf.push_str(&quoted);
        }
    }
    Ok(retrieved)
}

/// Append the first field-key column, so the projection never consists of
/// tag columns alone.
fn append_field_key(cx: &mut DeparseContext<'_>, first: bool) -> Result<(), TsPushError> {
    if let Some((attr, col)) = cx.catalog.first_field_key(cx.rel) {
        if !first {
            cx.buf.push_str(", ");
        }
        cx.column_ref(cx.rel, attr, col.ty, false)?;
    }
    Ok(())
}

fn append_group_by_clause(
    cx: &mut DeparseContext<'_>,
    plan: &SelectPlan,
) -> Result<(), TsPushError> {
    if plan.group_refs.is_empty() {
        return Ok(());
    }
    cx.buf.push_str(" GROUP BY ");
    cx.pending_fill = None;

    let mut first = true;
    for gref in &plan.group_refs {
        if !first {
            cx.buf.push_str(", ");
        }
        first = false;
        deparse_sort_group_target(cx, plan, *gref)?;
    }

    // A fill call stashed while rendering the bucket key attaches here.
    if let Some(fill) = cx.pending_fill.take() {
        cx.buf.push_str(" fill(");
        if let Expr::FunctionCall { args, .. } = &fill {
            for arg in args {
                cx.deparse_expr(arg)?;
            }
        }
        cx.buf.push(')');
    }
    Ok(())
}

/// Render one sort/group key by its target-list reference. Constants and
/// plain columns render bare, function calls render as calls, anything
/// else is parenthesized.
fn deparse_sort_group_target(
    cx: &mut DeparseContext<'_>,
    plan: &SelectPlan,
    gref: u32,
) -> Result<(), TsPushError> {
    let tle = plan
        .targets
        .iter()
        .find(|t| t.sort_group_ref == gref)
        .ok_or(TsPushError::SortGroupRefNotFound(gref))?;
    match &tle.expr {
        e @ (Expr::Literal { .. } | Expr::ColumnRef { .. } | Expr::FunctionCall { .. }) => {
            cx.deparse_expr(e)
        }
        e => {
            cx.buf.push('(');
            cx.deparse_expr(e)?;
            cx.buf.push(')');
            Ok(())
        }
    }
}

fn append_order_by_clause(
    cx: &mut DeparseContext<'_>,
    plan: &SelectPlan,
) -> Result<(), TsPushError> {
    cx.buf.push_str(" ORDER BY");
    let mut delim = " ";
    for key in &plan.order_by {
        if key.nulls_first {
            return Err(TsPushError::NullsFirstOrdering);
        }
        cx.buf.push_str(delim);
        cx.deparse_expr(&key.expr)?;
        cx.buf.push_str(if key.ascending { " ASC" } else { " DESC" });
        delim = ", ";
    }
    Ok(())
}

/// Render a DELETE keyed on the given attributes, with positional
/// parameters in attribute order.
pub(crate) fn deparse_delete(
    catalog: &Catalog,
    rel: RelId,
    key_attrs: &[AttrId],
) -> Result<String, TsPushError> {
    let mut buf = String::from("DELETE FROM ");
    buf.push_str(&quote_identifier(catalog.remote_relation_name(rel)?));

    for (i, attr) in key_attrs.iter().enumerate() {
        buf.push_str(if i == 0 { " WHERE " } else { " AND " });
        let role = catalog.column_role(rel, *attr)?;
        if role.is_time() {
            buf.push_str("time");
        } else {
            buf.push_str(&quote_identifier(catalog.remote_column_name(rel, *attr)?));
        }
        buf.push_str(&format!("=${}", i + 1));
    }

    debug!(query = %buf, "generated remote delete");
    Ok(buf)
}
