//! Function and operator classification for the remote dialect.
//!
//! Three disjoint name lists drive pushdown eligibility:
//!
//! - **wildcard** functions take an implicit `*` as their first argument
//!   (they aggregate over every field of a measurement); their local names
//!   carry an `_all` suffix that the name mapping strips;
//! - **unique** functions exist only in the remote dialect and are exposed
//!   locally under the same names;
//! - **builtins** are remote-native functions whose local spellings
//!   coincide with the remote ones.
//!
//! The table also knows the handful of special cases the generator needs:
//! the cast functions it may elide, the time-bucket function (rendered as
//! `time(...)` with its fill argument hoisted), and the one function whose
//! argument order must be swapped (`log`, logarithm-with-base).

/// Functions that implicitly push `*` as their first remote argument.
const WILDCARD_FUNCTIONS: &[&str] = &["count_all", "mode_all", "max_all", "min_all", "sum_all"];

/// Functions unique to the remote dialect.
const UNIQUE_FUNCTIONS: &[&str] = &[
    "bottom",
    "percentile",
    "top",
    "cumulative_sum",
    "derivative",
    "difference",
    "elapsed",
    "log2",
    "log10",
    "bucket",
    "fill_numeric",
    "fill_option",
];

/// Remote-native builtins whose local names coincide.
const BUILTIN_FUNCTIONS: &[&str] = &[
    "now", "sqrt", "abs", "acos", "asin", "atan", "atan2", "ceil", "cos", "exp", "floor", "ln",
    "log", "pow", "round", "sin", "tan",
];

/// Aggregate functions the remote engine can evaluate.
const AGGREGATE_FUNCTIONS: &[&str] = &[
    "sum", "max", "min", "count", "distinct", "spread", "sample", "first", "last", "integral",
    "mean", "median", "mode", "stddev",
];

/// Built-in operators the remote dialect understands, spelled as in the
/// source dialect. Pattern-matching operators are classified separately.
const OPERATORS: &[&str] = &[
    "=", "<", ">", "<=", ">=", "!=", "<>", "+", "-", "*", "/", "%",
];

const COMPARISON_OPERATORS: &[&str] = &["=", "<", ">", "<=", ">=", "!=", "<>"];

/// Cast functions the generator may elide when the call site allows it.
const CAST_FUNCTIONS: &[&str] = &["float8", "numeric"];

/// Classification table for functions and operators.
///
/// The default table carries the lists above; a host may extend it when
/// its remote server version exposes more functions.
#[derive(Debug, Clone)]
pub struct FunctionTable {
    wildcard: Vec<String>,
    unique: Vec<String>,
    builtin: Vec<String>,
    aggregates: Vec<String>,
}

impl Default for FunctionTable {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        FunctionTable {
            wildcard: owned(WILDCARD_FUNCTIONS),
            unique: owned(UNIQUE_FUNCTIONS),
            builtin: owned(BUILTIN_FUNCTIONS),
            aggregates: owned(AGGREGATE_FUNCTIONS),
        }
    }
}

impl FunctionTable {
    /// Whether `name` is a wildcard function. The `_all` suffix is part of
    /// the contract: a listed name without it never qualifies.
    pub fn is_wildcard_function(&self, name: &str) -> bool {
        name.len() > "_all".len()
            && name.ends_with("_all")
            && self.wildcard.iter().any(|f| f == name)
    }

    /// Whether `name` is a function unique to the remote dialect.
    pub fn is_unique_remote_function(&self, name: &str) -> bool {
        self.unique.iter().any(|f| f == name)
    }

    /// Whether `name` is a remote-native builtin.
    pub fn is_remote_builtin(&self, name: &str) -> bool {
        self.builtin.iter().any(|f| f == name)
    }

    /// Whether `name` is an aggregate the remote engine can evaluate.
    pub fn is_pushdown_aggregate(&self, name: &str) -> bool {
        self.aggregates.iter().any(|f| f == name)
    }

    /// Whether `name` is a plain type-cast function, eligible only when
    /// the call site explicitly allows eliding the cast.
    pub fn is_cast_function(&self, name: &str) -> bool {
        CAST_FUNCTIONS.contains(&name)
    }

    /// Whether `name` is the time-bucket function.
    pub fn is_bucket_function(&self, name: &str) -> bool {
        name == "bucket"
    }

    /// Whether `name` is one of the gap-fill functions, legal only inside
    /// the time-bucket function's argument list.
    pub fn is_fill_function(&self, name: &str) -> bool {
        name == "fill_numeric" || name == "fill_option"
    }

    /// Whether the function's two arguments must be swapped before
    /// emission (the remote `log` takes base first).
    pub fn swaps_arguments(&self, name: &str) -> bool {
        name == "log"
    }

    /// Whether `name` is volatile. Everything else in the table is
    /// immutable; unclassified functions never reach a volatility check
    /// because they are rejected during analysis.
    pub fn is_volatile(&self, name: &str) -> bool {
        name == "now"
    }

    /// Map a local function name to its remote spelling.
    pub fn remote_name_for(&self, name: &str) -> String {
        if self.is_bucket_function(name) {
            return "time".to_string();
        }
        match name.strip_suffix("_all") {
            Some(stem) if self.is_wildcard_function(name) => stem.to_string(),
            _ => name.to_string(),
        }
    }

    /// Whether `op` is a built-in operator of the source dialect that the
    /// remote dialect understands.
    pub fn is_builtin_operator(&self, op: &str) -> bool {
        OPERATORS.contains(&op)
    }

    /// Whether `op` is a comparison operator.
    pub fn is_comparison_operator(&self, op: &str) -> bool {
        COMPARISON_OPERATORS.contains(&op)
    }

    /// Whether `op` orders its operands (everything comparing except
    /// equality tests).
    pub fn is_ordering_operator(&self, op: &str) -> bool {
        matches!(op, "<" | ">" | "<=" | ">=")
    }
}
