//! Expression code generation for the remote dialect.
//!
//! The deparser assumes the subtree was already judged eligible; it never
//! re-derives eligibility. Dispatch mirrors the analyzer's node kinds but
//! emits text into an append-only buffer, performing the dialect rewrites
//! on the way: the time key renders as the literal identifier `time`, the
//! time-bucket call becomes `time(...)` with its fill argument hoisted
//! into a pending slot, LIKE patterns become delimited regexes, and
//! membership tests expand into comparison chains.

use chrono::Timelike;

use crate::catalog::Catalog;
use crate::error::TsPushError;
use crate::expr::{
    is_dynamic_fetch, is_dynamic_param_fetch, AttrId, BoolOp, Expr, InListRhs, IntervalValue,
    PatternKind, RelId, ScalarType, Value,
};
use crate::functions::FunctionTable;
use crate::pushdown::analyze::args_contain_time_key;
use crate::pushdown::pattern::{append_like_pattern, append_regex_pattern, regex_literal};

/// Double-quote an identifier, doubling embedded quotes.
pub(crate) fn quote_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// Per-statement code generation state.
///
/// One context lives for one compilation pass; the pending-fill slot and
/// the parameter list are scratch state discarded with it.
pub(crate) struct DeparseContext<'a> {
    pub catalog: &'a Catalog,
    pub functions: &'a FunctionTable,
    /// The scanned relation.
    pub rel: RelId,
    /// In-scope relations; references outside become parameters.
    pub relids: &'a [RelId],
    /// The output buffer. Append-only except for the fill separator
    /// rollback.
    pub buf: String,
    /// Parameter expressions in positional order. `None` renders inert
    /// placeholders instead of `$n` references.
    pub params: Option<Vec<Expr>>,
    /// Pattern operator in effect for the right-hand constant.
    pattern_kind: Option<PatternKind>,
    /// Target-list mode: bucket and fill calls are not rendered inline.
    pub in_target_list: bool,
    can_skip_cast: bool,
    /// Render bare boolean columns as an explicit equality test.
    pub has_bool_cmp: bool,
    /// Normalize zone-aware timestamps to UTC (set when the expression is
    /// compared against the time key).
    convert_to_timestamp: bool,
    /// A fill call waiting to be attached to the GROUP BY clause.
    pub pending_fill: Option<Expr>,
}

impl<'a> DeparseContext<'a> {
    pub(crate) fn new(
        catalog: &'a Catalog,
        functions: &'a FunctionTable,
        rel: RelId,
        relids: &'a [RelId],
        collect_params: bool,
    ) -> Self {
        DeparseContext {
            catalog,
            functions,
            rel,
            relids,
            buf: String::new(),
            params: if collect_params { Some(Vec::new()) } else { None },
            pattern_kind: None,
            in_target_list: false,
            can_skip_cast: false,
            has_bool_cmp: false,
            convert_to_timestamp: false,
            pending_fill: None,
        }
    }

    /// Emit one expression. The flags that only flow into specific child
    /// kinds are reset here and selectively restored per node kind.
    pub(crate) fn deparse_expr(&mut self, node: &Expr) -> Result<(), TsPushError> {
        let outer_can_skip_cast = self.can_skip_cast;
        let outer_convert = self.convert_to_timestamp;
        self.can_skip_cast = false;
        self.convert_to_timestamp = false;

        match node {
            Expr::ColumnRef { rel, attr, ty, .. } => {
                self.convert_to_timestamp = outer_convert;
                if self.relids.contains(rel) {
                    let convert = self.has_bool_cmp;
                    self.column_ref(*rel, *attr, *ty, convert)?;
                } else {
                    self.param_ref(node);
                }
            }
            Expr::Literal { .. } => {
                self.convert_to_timestamp = outer_convert;
                self.deparse_literal(node)?;
            }
            Expr::Placeholder { .. } => self.param_ref(node),
            Expr::FunctionCall { .. } => {
                self.can_skip_cast = outer_can_skip_cast;
                self.deparse_function(node)?;
            }
            Expr::UnaryOp { .. } | Expr::BinaryOp { .. } => {
                self.convert_to_timestamp = outer_convert;
                self.deparse_op(node)?;
            }
            Expr::PatternMatch { .. } => self.deparse_pattern_match(node)?,
            Expr::BoolExpr { .. } => self.deparse_bool(node)?,
            Expr::NullTest { .. } => self.deparse_null_test(node)?,
            Expr::ArrayLiteral { .. } => self.deparse_array(node)?,
            Expr::InList { .. } => self.deparse_in_list(node)?,
            Expr::Aggregate { .. } => self.deparse_aggregate(node)?,
            Expr::Cast { .. } => self.deparse_cast(node)?,
            Expr::DynamicFieldAccess { .. } => self.deparse_dynamic(node)?,
        }
        Ok(())
    }

    /// Emit a column of the scanned relation. The time key always renders
    /// as `time`; a boolean column under the boolean-equality flag renders
    /// as an explicit test.
    pub(crate) fn column_ref(
        &mut self,
        rel: RelId,
        attr: AttrId,
        ty: ScalarType,
        convert: bool,
    ) -> Result<(), TsPushError> {
        let role = self.catalog.column_role(rel, attr)?;
        let name = self.catalog.remote_column_name(rel, attr)?;
        if convert && ty == ScalarType::Bool {
            let quoted = quote_identifier(name);
            self.buf.push('(');
            self.buf.push_str(&quoted);
            self.buf.push_str(" = true)");
        } else if role.is_time() {
            self.buf.push_str("time");
        } else {
            let quoted = quote_identifier(name);
            self.buf.push_str(&quoted);
        }
        Ok(())
    }

    /// Emit a positional parameter reference, assigning the next index on
    /// first sight; without a parameter list, an inert placeholder.
    fn param_ref(&mut self, node: &Expr) {
        match &mut self.params {
            Some(params) => {
                let index = match params.iter().position(|p| p == node) {
                    Some(i) => i + 1,
                    None => {
                        params.push(node.clone());
                        params.len()
                    }
                };
                self.buf.push('$');
                self.buf.push_str(&index.to_string());
            }
            None => self.buf.push_str("(SELECT null)"),
        }
    }

    // ── Constants ────────────────────────────────────────────────────────

    fn deparse_literal(&mut self, node: &Expr) -> Result<(), TsPushError> {
        let Expr::Literal { ty, value, .. } = node else {
            return Err(TsPushError::UnsupportedExpression(node.kind_name().into()));
        };
        let Some(value) = value else {
            self.buf.push_str("NULL");
            return Ok(());
        };

        match value {
            Value::Int(i) => self.append_numeric(&i.to_string()),
            Value::Float(f) => self.append_numeric(&f.to_string()),
            Value::Numeric(text) => self.append_numeric(text),
            Value::Bool(b) => self.buf.push_str(if *b { "true" } else { "false" }),
            Value::Bit(bits) => {
                self.buf.push_str("B'");
                self.buf.push_str(bits);
                self.buf.push('\'');
            }
            Value::Binary(bytes) => {
                self.buf.push_str("X'");
                for b in bytes {
                    self.buf.push_str(&format!("{b:02x}"));
                }
                self.buf.push('\'');
            }
            Value::Timestamp(ts) => {
                self.buf.push('\'');
                self.buf.push_str(&format_timestamp_text(ts));
                self.buf.push('\'');
            }
            Value::TimestampTz(dt) => {
                self.buf.push('\'');
                if self.convert_to_timestamp {
                    self.buf.push_str(&format_timestamp_text(&dt.naive_utc()));
                } else {
                    let fmt = if dt.nanosecond() == 0 {
                        "%Y-%m-%d %H:%M:%S%:z"
                    } else {
                        "%Y-%m-%d %H:%M:%S%.6f%:z"
                    };
                    self.buf.push_str(&dt.format(fmt).to_string());
                }
                self.buf.push('\'');
            }
            Value::Interval(iv) => {
                let text = format_interval(iv);
                self.buf.push_str(&text);
            }
            Value::Text(text) => {
                if *ty == ScalarType::FillOption {
                    // Fill options pass through unquoted.
                    self.buf.push_str(text);
                } else if let Some(kind) = self.pattern_kind {
                    if kind.is_like() {
                        append_like_pattern(&mut self.buf, text, kind)?;
                    } else {
                        append_regex_pattern(&mut self.buf, text, kind);
                    }
                } else {
                    append_string_literal(&mut self.buf, text);
                }
            }
            Value::Array(_) => {
                return Err(TsPushError::UnsupportedExpression(
                    "array constant outside a membership test".into(),
                ));
            }
        }
        Ok(())
    }

    /// Numeric output: bare when the text is purely numeric (sign-leading
    /// values parenthesized so they cannot fuse with an operator), quoted
    /// otherwise (NaN and friends).
    fn append_numeric(&mut self, text: &str) {
        let numeric_chars = !text.is_empty()
            && text
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | 'e' | 'E' | '.'));
        if numeric_chars {
            if text.starts_with('+') || text.starts_with('-') {
                self.buf.push('(');
                self.buf.push_str(text);
                self.buf.push(')');
            } else {
                self.buf.push_str(text);
            }
        } else {
            self.buf.push('\'');
            self.buf.push_str(text);
            self.buf.push('\'');
        }
    }

    // ── Functions ────────────────────────────────────────────────────────

    fn deparse_function(&mut self, node: &Expr) -> Result<(), TsPushError> {
        let Expr::FunctionCall { name, args, .. } = node else {
            return Err(TsPushError::UnsupportedExpression(node.kind_name().into()));
        };

        // Fill calls never render inline: stash the call for the GROUP BY
        // clause, rolling back the argument separator the enclosing
        // bucket call just wrote.
        if self.functions.is_fill_function(name) {
            if self.in_target_list {
                return Ok(());
            }
            let rollback = self.buf.len().saturating_sub(2);
            self.buf.truncate(rollback);
            self.pending_fill = Some(node.clone());
            return Ok(());
        }

        // The bucket call renders as time(...), dropping the time-column
        // first argument (the remote dialect implies it).
        if self.functions.is_bucket_function(name) {
            if self.in_target_list {
                return Ok(());
            }
            self.buf.push_str("time(");
            for (idx, arg) in args.iter().enumerate() {
                if idx == 0 {
                    continue;
                }
                if idx >= 2 {
                    self.buf.push_str(", ");
                }
                self.deparse_expr(arg)?;
            }
            self.buf.push(')');
            return Ok(());
        }

        // An elidable cast: emit the bare argument.
        if self.can_skip_cast && self.functions.is_cast_function(name) {
            self.can_skip_cast = false;
            let Some(first) = args.first() else {
                return Err(TsPushError::UnsupportedExpression(
                    "cast call without arguments".into(),
                ));
            };
            return self.deparse_expr(first);
        }

        let arg_swap = self.functions.swaps_arguments(name);
        let can_skip_cast = self.functions.is_unique_remote_function(name)
            || self.functions.is_remote_builtin(name);
        let is_star_func = self.functions.is_wildcard_function(name);
        let remote_name = self.functions.remote_name_for(name);

        self.buf.push_str(&remote_name);
        self.buf.push('(');

        let ordered: Vec<&Expr> = if arg_swap && args.len() == 2 {
            vec![&args[1], &args[0]]
        } else {
            args.iter().collect()
        };

        let mut first = true;
        if is_star_func {
            self.buf.push('*');
            first = false;
        }
        for arg in ordered {
            if !first {
                self.buf.push_str(", ");
            }
            // Delimited regex constants pass through raw.
            if let Some(raw) = regex_literal(arg) {
                self.buf.push_str(raw);
                first = false;
                continue;
            }
            if can_skip_cast {
                self.can_skip_cast = true;
            }
            self.deparse_expr(arg)?;
            first = false;
        }
        self.buf.push(')');
        Ok(())
    }

    // ── Operators ────────────────────────────────────────────────────────

    fn deparse_op(&mut self, node: &Expr) -> Result<(), TsPushError> {
        match node {
            Expr::BinaryOp {
                op, left, right, ..
            } => {
                // Constants compared against the time key are normalized
                // to UTC before rendering.
                if args_contain_time_key(self.catalog, &[left.as_ref(), right.as_ref()]) {
                    self.convert_to_timestamp = true;
                }
                self.buf.push('(');
                self.deparse_expr(left)?;
                self.buf.push(' ');
                self.buf.push_str(op);
                self.buf.push(' ');
                self.deparse_expr(right)?;
                self.buf.push(')');
                Ok(())
            }
            Expr::UnaryOp { op, arg, .. } => {
                self.buf.push('(');
                self.buf.push_str(op);
                self.buf.push(' ');
                self.deparse_expr(arg)?;
                self.buf.push(')');
                Ok(())
            }
            other => Err(TsPushError::UnsupportedExpression(other.kind_name().into())),
        }
    }

    fn deparse_pattern_match(&mut self, node: &Expr) -> Result<(), TsPushError> {
        let Expr::PatternMatch {
            kind,
            subject,
            pattern,
        } = node
        else {
            return Err(TsPushError::UnsupportedExpression(node.kind_name().into()));
        };
        self.buf.push('(');
        self.deparse_expr(subject)?;
        self.buf.push(' ');
        self.buf.push_str(kind.remote_operator());
        self.buf.push(' ');
        self.pattern_kind = Some(*kind);
        self.deparse_expr(pattern)?;
        self.pattern_kind = None;
        self.buf.push(')');
        Ok(())
    }

    fn deparse_bool(&mut self, node: &Expr) -> Result<(), TsPushError> {
        let Expr::BoolExpr { op, args } = node else {
            return Err(TsPushError::UnsupportedExpression(node.kind_name().into()));
        };
        let joiner = match op {
            BoolOp::And => " AND ",
            BoolOp::Or => " OR ",
            BoolOp::Not => {
                self.buf.push_str("(NOT ");
                if let Some(arg) = args.first() {
                    self.deparse_expr(arg)?;
                }
                self.buf.push(')');
                return Ok(());
            }
        };
        self.buf.push('(');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.buf.push_str(joiner);
            }
            self.deparse_expr(arg)?;
        }
        self.buf.push(')');
        Ok(())
    }

    fn deparse_null_test(&mut self, node: &Expr) -> Result<(), TsPushError> {
        let Expr::NullTest { arg, negated } = node else {
            return Err(TsPushError::UnsupportedExpression(node.kind_name().into()));
        };
        // The remote store renders an absent tag as the empty string.
        self.buf.push('(');
        self.deparse_expr(arg)?;
        if *negated {
            self.buf.push_str(" <> '')");
        } else {
            self.buf.push_str(" = '')");
        }
        Ok(())
    }

    fn deparse_array(&mut self, node: &Expr) -> Result<(), TsPushError> {
        let Expr::ArrayLiteral { elements, .. } = node else {
            return Err(TsPushError::UnsupportedExpression(node.kind_name().into()));
        };
        self.buf.push_str("ARRAY[");
        for (i, e) in elements.iter().enumerate() {
            if i > 0 {
                self.buf.push_str(", ");
            }
            self.deparse_expr(e)?;
        }
        self.buf.push(']');
        Ok(())
    }

    // ── Membership tests ─────────────────────────────────────────────────

    fn deparse_in_list(&mut self, node: &Expr) -> Result<(), TsPushError> {
        let Expr::InList {
            op,
            use_or,
            left,
            rhs,
            ..
        } = node
        else {
            return Err(TsPushError::UnsupportedExpression(node.kind_name().into()));
        };
        let joiner = if *use_or { " OR " } else { " AND " };

        match rhs {
            InListRhs::Const { elem_ty, values } => {
                // A NULL array produces nothing.
                let Some(values) = values else {
                    return Ok(());
                };
                let is_str = !matches!(
                    elem_ty,
                    ScalarType::Bool | ScalarType::SmallInt | ScalarType::Int | ScalarType::BigInt
                );
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.buf.push_str(joiner);
                    }
                    if *elem_ty == ScalarType::Bool {
                        // The left side must not pick up the
                        // boolean-equality rewrite here.
                        match left.as_ref() {
                            Expr::ColumnRef { rel, attr, ty, .. } => {
                                self.column_ref(*rel, *attr, *ty, false)?;
                            }
                            other => {
                                let saved = self.has_bool_cmp;
                                self.has_bool_cmp = false;
                                self.deparse_expr(other)?;
                                self.has_bool_cmp = saved;
                            }
                        }
                    } else {
                        self.deparse_expr(left)?;
                    }
                    self.buf.push(' ');
                    self.buf.push_str(op);
                    self.buf.push(' ');
                    self.append_array_element(value, is_str)?;
                }
                Ok(())
            }
            InListRhs::Array(arr) => {
                let Expr::ArrayLiteral { elements, .. } = arr.as_ref() else {
                    return Err(TsPushError::UnsupportedExpression(
                        "membership test against a non-array expression".into(),
                    ));
                };
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.buf.push_str(joiner);
                    }
                    self.buf.push('(');
                    self.deparse_expr(left)?;
                    self.buf.push(' ');
                    self.buf.push_str(op);
                    self.buf.push(' ');
                    self.deparse_expr(element)?;
                    self.buf.push(')');
                }
                Ok(())
            }
        }
    }

    fn append_array_element(&mut self, value: &Value, is_str: bool) -> Result<(), TsPushError> {
        match value {
            Value::Bool(b) => {
                self.buf.push_str(if *b { "true" } else { "false" });
                Ok(())
            }
            other if is_str => {
                self.buf.push('\'');
                let text = plain_value_text(other)?;
                for ch in text.chars() {
                    if ch == '\'' {
                        self.buf.push('\'');
                    }
                    self.buf.push(ch);
                }
                self.buf.push('\'');
                Ok(())
            }
            other => {
                let text = plain_value_text(other)?;
                self.buf.push_str(&text);
                Ok(())
            }
        }
    }

    // ── Aggregates ───────────────────────────────────────────────────────

    fn deparse_aggregate(&mut self, node: &Expr) -> Result<(), TsPushError> {
        let Expr::Aggregate {
            name,
            args,
            distinct,
            star,
            variadic,
            ..
        } = node
        else {
            return Err(TsPushError::UnsupportedExpression(node.kind_name().into()));
        };

        // Two-argument first()/last() collapse to their value argument.
        if !*star && (name == "last" || name == "first") && args.len() == 2 {
            self.buf.push_str(name);
            self.buf.push('(');
            self.deparse_expr(&args[1].expr)?;
            self.buf.push(')');
            return Ok(());
        }

        let is_star_func = self.functions.is_wildcard_function(name);
        let remote_name = self.functions.remote_name_for(name);
        self.buf.push_str(&remote_name);
        self.buf.push('(');
        if *distinct {
            self.buf.push_str("DISTINCT ");
        }

        if *star {
            self.buf.push('*');
        } else {
            let mut first = true;
            if is_star_func {
                self.buf.push('*');
                first = false;
            }
            for (i, arg) in args.iter().enumerate() {
                // Delimited regex arguments pass through raw.
                if let Some(raw) = regex_literal(&arg.expr) {
                    self.buf.push_str(raw);
                    first = false;
                    continue;
                }
                if arg.resjunk {
                    continue;
                }
                if !first {
                    self.buf.push_str(", ");
                }
                first = false;
                if *variadic && i == args.len() - 1 {
                    self.buf.push_str("VARIADIC ");
                }
                self.deparse_expr(&arg.expr)?;
            }
        }
        self.buf.push(')');
        Ok(())
    }

    // ── Schemaless access ────────────────────────────────────────────────

    fn deparse_cast(&mut self, node: &Expr) -> Result<(), TsPushError> {
        let Expr::Cast { arg, result_ty } = node else {
            return Err(TsPushError::UnsupportedExpression(node.kind_name().into()));
        };
        if is_dynamic_fetch(node) {
            self.deparse_dynamic(node)?;
        } else if is_dynamic_param_fetch(arg) {
            self.param_ref(node);
        } else {
            return Err(TsPushError::UnsupportedExpression(
                "coercion of a non-dynamic operand".into(),
            ));
        }
        if *result_ty == ScalarType::Bool && self.has_bool_cmp {
            self.buf.push_str(" = true");
        }
        Ok(())
    }

    fn deparse_dynamic(&mut self, node: &Expr) -> Result<(), TsPushError> {
        let inner = match node {
            Expr::Cast { arg, .. } => arg.as_ref(),
            other => other,
        };
        let Expr::DynamicFieldAccess { base, key, .. } = inner else {
            return Err(TsPushError::UnsupportedExpression(node.kind_name().into()));
        };
        match base.as_ref() {
            Expr::ColumnRef { rel, .. } if self.relids.contains(rel) => {
                let quoted = quote_identifier(key);
                self.buf.push_str(&quoted);
                Ok(())
            }
            Expr::ColumnRef { .. } | Expr::Placeholder { .. } => {
                self.param_ref(node);
                Ok(())
            }
            other => Err(TsPushError::UnsupportedExpression(other.kind_name().into())),
        }
    }
}

// ── Value formatting ─────────────────────────────────────────────────────

fn format_timestamp_text(ts: &chrono::NaiveDateTime) -> String {
    if ts.nanosecond() == 0 {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}

/// Compact duration form: days/hours/minutes/seconds/microseconds, zero
/// units suppressed. Calendar months never reach this point.
fn format_interval(iv: &IntervalValue) -> String {
    let mut micros = iv.micros;
    let hours = micros / 3_600_000_000;
    micros %= 3_600_000_000;
    let minutes = micros / 60_000_000;
    micros %= 60_000_000;
    let seconds = micros / 1_000_000;
    let microseconds = micros % 1_000_000;

    let mut out = String::new();
    if iv.days != 0 {
        out.push_str(&format!("{}d", iv.days));
    }
    if hours != 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes != 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds != 0 {
        out.push_str(&format!("{seconds}s"));
    }
    if microseconds != 0 {
        out.push_str(&format!("{microseconds}u"));
    }
    if out.is_empty() {
        out.push_str("0s");
    }
    out
}

/// The unquoted text form of an array element.
fn plain_value_text(value: &Value) -> Result<String, TsPushError> {
    Ok(match value {
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Numeric(s) => s.clone(),
        Value::Text(s) => s.clone(),
        Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        Value::Bit(s) => s.clone(),
        Value::Timestamp(ts) => format_timestamp_text(ts),
        Value::TimestampTz(dt) => dt.format("%Y-%m-%d %H:%M:%S%:z").to_string(),
        Value::Interval(iv) => format_interval(iv),
        Value::Binary(_) | Value::Array(_) => {
            return Err(TsPushError::UnsupportedExpression(
                "unsupported array element".into(),
            ));
        }
    })
}

fn append_string_literal(buf: &mut String, text: &str) {
    buf.push('\'');
    for ch in text.chars() {
        if ch == '\'' || ch == '\\' {
            buf.push(ch);
        }
        buf.push(ch);
    }
    buf.push('\'');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier_doubles_quotes() {
        assert_eq!(quote_identifier("value"), "\"value\"");
        assert_eq!(quote_identifier("va\"lue"), "\"va\"\"lue\"");
    }

    #[test]
    fn test_interval_rendering_suppresses_zero_units() {
        let five_minutes = IntervalValue {
            months: 0,
            days: 0,
            micros: 5 * 60_000_000,
        };
        assert_eq!(format_interval(&five_minutes), "5m");

        let mixed = IntervalValue {
            months: 0,
            days: 2,
            micros: 3 * 3_600_000_000 + 30 * 60_000_000 + 15_000_000 + 250,
        };
        assert_eq!(format_interval(&mixed), "2d3h30m15s250u");

        let zero = IntervalValue::default();
        assert_eq!(format_interval(&zero), "0s");
    }

    #[test]
    fn test_string_literal_escaping() {
        let mut buf = String::new();
        append_string_literal(&mut buf, "it's");
        assert_eq!(buf, "'it''s'");

        let mut buf = String::new();
        append_string_literal(&mut buf, "a\\b");
        assert_eq!(buf, "'a\\\\b'");
    }
}
