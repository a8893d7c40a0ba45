//! Error types for the pushdown compiler.
//!
//! All fatal conditions are represented by [`TsPushError`] and propagated
//! via `Result<T, TsPushError>` throughout the crate.
//!
//! # Error Classification
//!
//! The compiler distinguishes two failure classes, and only one of them is
//! an error:
//!
//! - **Ineligibility** (soft) — the analyzer cannot certify an expression
//!   as safe to push down. This is reported as `Ok(false)` (or an
//!   ineligible [`crate::PushdownVerdict`]); the caller falls back to
//!   local evaluation for that clause. It never constructs `TsPushError`.
//! - **Invariant violation** (fatal) — a malformed plan reached the
//!   compiler: a catalog lookup miss, a `fill` call outside the
//!   time-bucket function, a nulls-first ordering request, or an
//!   expression the generator has no case for (unreachable if eligibility
//!   checking ran first). These abort the compilation and are not retried.

/// Primary error type for the compiler.
#[derive(Debug, thiserror::Error)]
pub enum TsPushError {
    // ── Plan defects — the upstream planner handed us a broken plan ──────
    /// A referenced relation, column, function, or operator is missing
    /// from the catalog snapshot.
    #[error("catalog lookup failed for {0}")]
    CatalogLookup(String),

    /// `fill_numeric()` / `fill_option()` appeared outside the argument
    /// list of the time-bucket function.
    #[error("fill_numeric() or fill_option() must be embedded inside bucket()")]
    MisplacedFill,

    /// An ORDER BY / GROUP BY clause references a target-list position
    /// that does not exist.
    #[error("ORDER BY/GROUP BY expression not found in target list (ref {0})")]
    SortGroupRefNotFound(u32),

    /// An expression kind with no generator case reached code generation.
    #[error("unsupported expression type for deparse: {0}")]
    UnsupportedExpression(String),

    /// A relation definition violates the catalog invariants (e.g. a
    /// mis-typed time column in schemaless mode).
    #[error("invalid relation definition: {0}")]
    InvalidCatalog(String),

    // ── Dialect limits — constructs the remote store cannot express ──────
    /// The remote dialect has no control over null ordering.
    #[error("NULLS FIRST ordering is not supported")]
    NullsFirstOrdering,

    /// A LIKE pattern ends in a dangling escape character.
    #[error("invalid pattern matching: {0}")]
    InvalidPattern(String),
}

impl TsPushError {
    /// Whether this error indicates a defect in the plan or catalog handed
    /// to the compiler, as opposed to a construct the remote dialect
    /// simply cannot express.
    ///
    /// Plan defects point at a bug upstream: the analyzer should have
    /// excluded the clause, or the catalog snapshot is inconsistent.
    pub fn is_plan_defect(&self) -> bool {
        matches!(
            self,
            TsPushError::CatalogLookup(_)
                | TsPushError::MisplacedFill
                | TsPushError::SortGroupRefNotFound(_)
                | TsPushError::UnsupportedExpression(_)
                | TsPushError::InvalidCatalog(_)
        )
    }
}
