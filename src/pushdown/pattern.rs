//! Pattern translation for the remote dialect's regex-match operators.
//!
//! The remote dialect has no LIKE; both LIKE and regex matches are
//! expressed through `=~` / `!~` against a `/.../` delimited pattern.
//! LIKE wildcards are rewritten (`%` → `(.*)`, `_` → `(.{1})`), every
//! other regex metacharacter is backslash-escaped, and anchors are added
//! unless the pattern is open-ended on that side: a leading `%` suppresses
//! `^`, a trailing unescaped `%` suppresses `$`.

use crate::error::TsPushError;
use crate::expr::{Expr, PatternKind, ScalarType, Value};

/// Regex metacharacters that need escaping when they appear literally in
/// a LIKE pattern.
const REGEX_SPECIAL: &str = "\\^$.|?*+()[{%";

fn push_escaped(buf: &mut String, ch: char) {
    if REGEX_SPECIAL.contains(ch) {
        buf.push('\\');
    }
    buf.push(ch);
}

/// Whether the translated pattern needs a trailing `$` anchor.
///
/// A pattern ending in an unescaped `%` is an open suffix and stays
/// unanchored; a trailing escaped `%` is a literal character and anchors.
fn needs_end_anchor(val: &str) -> bool {
    let chars: Vec<char> = val.chars().collect();
    let Some((&last, rest)) = chars.split_last() else {
        return true;
    };
    if last != '%' {
        return true;
    }
    let backslashes = rest.iter().rev().take_while(|&&c| c == '\\').count();
    backslashes % 2 == 1
}

/// Append the `/.../` translation of a LIKE pattern to `buf`.
pub(crate) fn append_like_pattern(
    buf: &mut String,
    val: &str,
    kind: PatternKind,
) -> Result<(), TsPushError> {
    buf.push('/');
    if kind.is_case_insensitive() {
        buf.push_str("(?i)");
    }
    if !val.starts_with('%') {
        buf.push('^');
    }

    let mut chars = val.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '%' => buf.push_str("(.*)"),
            '_' => buf.push_str("(.{1})"),
            '\\' => match chars.next() {
                None => return Err(TsPushError::InvalidPattern(val.to_string())),
                Some(escaped) => push_escaped(buf, escaped),
            },
            other => push_escaped(buf, other),
        }
    }

    if needs_end_anchor(val) {
        buf.push('$');
    }
    buf.push('/');
    Ok(())
}

/// Append the `/.../` form of a regex pattern to `buf`. The pattern body
/// passes through untouched; only the case-insensitivity marker is added.
pub(crate) fn append_regex_pattern(buf: &mut String, val: &str, kind: PatternKind) {
    buf.push('/');
    if kind.is_case_insensitive() {
        buf.push_str("(?i)");
    }
    buf.push_str(val);
    buf.push('/');
}

/// If `expr` is a text constant carrying a `/.../` delimited pattern,
/// return its raw text (delimiters included — it is emitted verbatim).
pub(crate) fn regex_literal(expr: &Expr) -> Option<&str> {
    if let Expr::Literal {
        ty,
        value: Some(Value::Text(text)),
        ..
    } = expr
        && matches!(ty, ScalarType::Text | ScalarType::VarChar)
        && text.len() >= 2
        && text.starts_with('/')
        && text.ends_with('/')
    {
        return Some(text.as_str());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Collation;

    fn like(val: &str) -> String {
        let mut buf = String::new();
        append_like_pattern(&mut buf, val, PatternKind::Like).unwrap();
        buf
    }

    #[test]
    fn test_anchor_placement() {
        assert_eq!(like("abc%"), "/^abc(.*)/");
        assert_eq!(like("%abc"), "/(.*)abc$/");
        assert_eq!(like("abc"), "/^abc$/");
        assert_eq!(like("%abc%"), "/(.*)abc(.*)/");
    }

    #[test]
    fn test_escaped_trailing_percent_still_anchors() {
        // `\%` is a literal percent sign, not an open suffix.
        assert_eq!(like("abc\\%"), "/^abc\\%$/");
        // `\\%` is a literal backslash followed by a wildcard.
        assert_eq!(like("abc\\\\%"), "/^abc\\\\(.*)/");
    }

    #[test]
    fn test_wildcard_and_metacharacter_rewrites() {
        assert_eq!(like("a_c"), "/^a(.{1})c$/");
        assert_eq!(like("a.c"), "/^a\\.c$/");
        assert_eq!(like("a+b(c)"), "/^a\\+b\\(c\\)$/");
        assert_eq!(like("50$"), "/^50\\$$/");
    }

    #[test]
    fn test_dangling_escape_is_fatal() {
        let mut buf = String::new();
        assert!(matches!(
            append_like_pattern(&mut buf, "abc\\", PatternKind::Like),
            Err(TsPushError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_case_insensitive_prefix() {
        let mut buf = String::new();
        append_like_pattern(&mut buf, "abc", PatternKind::ILike).unwrap();
        assert_eq!(buf, "/(?i)^abc$/");

        let mut buf = String::new();
        append_regex_pattern(&mut buf, "^a.c$", PatternKind::RegexCi);
        assert_eq!(buf, "/(?i)^a.c$/");
    }

    #[test]
    fn test_regex_literal_detection() {
        let lit = |s: &str| Expr::Literal {
            ty: ScalarType::Text,
            value: Some(Value::Text(s.into())),
            collation: Collation::Default,
        };
        assert_eq!(regex_literal(&lit("/^cpu[0-9]/")), Some("/^cpu[0-9]/"));
        assert_eq!(regex_literal(&lit("cpu")), None);
        assert_eq!(regex_literal(&lit("/")), None);
    }
}
