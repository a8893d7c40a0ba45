//! Relation catalog: the schema classifier the compiler consumes.
//!
//! Every column of a foreign relation is classified into a role — the
//! distinguished time key (plus an optional text-typed shadow), tag keys
//! (low-cardinality dimensions), field keys (measured values), or, in
//! schemaless mode, the dynamic key-value blob columns whose individual
//! keys are reached through the lookup operator.
//!
//! The catalog is a read-only snapshot built once per planning pass.
//! Lookup misses are invariant violations, not ineligibility: a plan that
//! references a column the snapshot does not know is broken upstream.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TsPushError;
use crate::expr::{AttrId, Expr, RelId, ScalarType};

/// The remote name of the time key column. The generator always renders
/// the time key under this identifier, whatever the local column is
/// called.
pub const TIME_COLUMN_NAME: &str = "time";

/// The text-typed shadow of the time key in schemaless mode.
pub const TIME_TEXT_COLUMN_NAME: &str = "time_text";

/// Whether a remote column name denotes the time key or its shadow.
pub fn is_time_column_name(name: &str) -> bool {
    name == TIME_COLUMN_NAME || name == TIME_TEXT_COLUMN_NAME
}

/// Classification of a column within its relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnRole {
    /// The distinguished timestamp column anchoring each row.
    TimeKey,
    /// Text-typed shadow of the time key (schemaless mode).
    TimeText,
    /// A low-cardinality descriptive dimension.
    TagKey,
    /// A measured value.
    FieldKey,
    /// The dynamic tags blob (schemaless mode only).
    DynamicTags,
    /// The dynamic fields blob (schemaless mode only).
    DynamicFields,
}

impl ColumnRole {
    pub fn is_time(self) -> bool {
        matches!(self, ColumnRole::TimeKey | ColumnRole::TimeText)
    }

    pub fn is_dynamic(self) -> bool {
        matches!(self, ColumnRole::DynamicTags | ColumnRole::DynamicFields)
    }
}

/// One column of a relation definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Local column name.
    pub name: String,
    /// Remote column name, when it differs from the local one.
    #[serde(default)]
    pub remote_name: Option<String>,
    pub role: ColumnRole,
    pub ty: ScalarType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, role: ColumnRole, ty: ScalarType) -> Self {
        ColumnDef {
            name: name.into(),
            remote_name: None,
            role,
            ty,
        }
    }

    /// The name used in generated text.
    pub fn remote_name(&self) -> &str {
        self.remote_name.as_deref().unwrap_or(&self.name)
    }
}

/// Per-table options, as supplied by the host's foreign-table definition:
/// an optional remote table name override, the list of dynamic keys that
/// are tags rather than fields, and the schemaless flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableOptions {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub schemaless: bool,
}

/// A relation definition: the classified column list plus table options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationDef {
    /// Local relation name.
    pub name: String,
    /// Remote table name override.
    #[serde(default)]
    pub remote_name: Option<String>,
    /// Dynamic keys declared as tags (schemaless mode).
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub schemaless: bool,
    /// Columns in attribute order; attribute `n` is `columns[n - 1]`.
    pub columns: Vec<ColumnDef>,
}

impl RelationDef {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        RelationDef {
            name: name.into(),
            remote_name: None,
            tags: Vec::new(),
            schemaless: false,
            columns,
        }
    }

    /// Apply foreign-table options to this definition.
    pub fn with_options(mut self, options: TableOptions) -> Self {
        self.remote_name = options.table.or(self.remote_name);
        self.tags = options.tags;
        self.schemaless = options.schemaless;
        self
    }

    /// The table name used in generated text.
    pub fn remote_name(&self) -> &str {
        self.remote_name.as_deref().unwrap_or(&self.name)
    }

    fn column(&self, attr: AttrId) -> Option<&ColumnDef> {
        if attr < 1 {
            return None;
        }
        self.columns.get(attr as usize - 1)
    }

    /// Validate the catalog invariants for this relation.
    ///
    /// Schemaless relations accept only the time key (timestamp-typed),
    /// its text shadow, and blob-typed dynamic tags/fields columns.
    /// Declared-schema relations must not carry dynamic blob columns, and
    /// every relation has exactly one time key.
    fn validate(&self) -> Result<(), TsPushError> {
        let time_keys = self
            .columns
            .iter()
            .filter(|c| c.role == ColumnRole::TimeKey)
            .count();
        if time_keys != 1 {
            return Err(TsPushError::InvalidCatalog(format!(
                "relation {} must declare exactly one time key column, found {}",
                self.name, time_keys
            )));
        }

        for col in &self.columns {
            match col.role {
                ColumnRole::TimeKey => {
                    if !matches!(col.ty, ScalarType::Timestamp | ScalarType::TimestampTz) {
                        return Err(TsPushError::InvalidCatalog(format!(
                            "invalid data type for time column {}",
                            col.name
                        )));
                    }
                }
                ColumnRole::TimeText => {
                    if col.ty != ScalarType::Text {
                        return Err(TsPushError::InvalidCatalog(format!(
                            "invalid data type for time text column {}",
                            col.name
                        )));
                    }
                }
                ColumnRole::DynamicTags | ColumnRole::DynamicFields => {
                    if !self.schemaless {
                        return Err(TsPushError::InvalidCatalog(format!(
                            "dynamic column {} outside schemaless mode",
                            col.name
                        )));
                    }
                    if col.ty != ScalarType::DynamicBlob {
                        return Err(TsPushError::InvalidCatalog(format!(
                            "invalid data type for tags/fields column {}",
                            col.name
                        )));
                    }
                }
                ColumnRole::TagKey | ColumnRole::FieldKey => {
                    if self.schemaless {
                        return Err(TsPushError::InvalidCatalog(format!(
                            "invalid column {} in schemaless mode; only time, time_text, \
                             tags and fields columns are accepted",
                            col.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// A read-only catalog snapshot for one compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    relations: BTreeMap<RelId, RelationDef>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog::default()
    }

    /// Register a relation, validating its invariants.
    pub fn insert(&mut self, rel: RelId, def: RelationDef) -> Result<(), TsPushError> {
        def.validate()?;
        debug!(rel, name = %def.name, schemaless = def.schemaless, "catalog relation registered");
        self.relations.insert(rel, def);
        Ok(())
    }

    /// Build a catalog from its JSON form, validating every relation.
    pub fn from_json(json: &str) -> Result<Self, TsPushError> {
        let relations: BTreeMap<RelId, RelationDef> = serde_json::from_str(json)
            .map_err(|e| TsPushError::InvalidCatalog(e.to_string()))?;
        let mut catalog = Catalog::new();
        for (rel, def) in relations {
            catalog.insert(rel, def)?;
        }
        Ok(catalog)
    }

    pub fn relation(&self, rel: RelId) -> Result<&RelationDef, TsPushError> {
        self.relations
            .get(&rel)
            .ok_or_else(|| TsPushError::CatalogLookup(format!("relation {rel}")))
    }

    pub fn column(&self, rel: RelId, attr: AttrId) -> Result<&ColumnDef, TsPushError> {
        self.relation(rel)?
            .column(attr)
            .ok_or_else(|| TsPushError::CatalogLookup(format!("column {attr} of relation {rel}")))
    }

    /// The role of a column.
    pub fn column_role(&self, rel: RelId, attr: AttrId) -> Result<ColumnRole, TsPushError> {
        Ok(self.column(rel, attr)?.role)
    }

    /// The remote name of a column.
    pub fn remote_column_name(&self, rel: RelId, attr: AttrId) -> Result<&str, TsPushError> {
        Ok(self.column(rel, attr)?.remote_name())
    }

    /// The remote name of a relation.
    pub fn remote_relation_name(&self, rel: RelId) -> Result<&str, TsPushError> {
        Ok(self.relation(rel)?.remote_name())
    }

    /// Whether `name` is a tag key of the relation: either a declared
    /// tag-role column with that remote name, or a dynamic key listed in
    /// the table's `tags` option.
    pub fn is_tag_key(&self, rel: RelId, name: &str) -> bool {
        let Ok(def) = self.relation(rel) else {
            return false;
        };
        if def.tags.iter().any(|t| t == name) {
            return true;
        }
        def.columns
            .iter()
            .any(|c| c.role == ColumnRole::TagKey && c.remote_name() == name)
    }

    /// The attribute number of the relation's time key.
    pub fn time_key_attr(&self, rel: RelId) -> Result<AttrId, TsPushError> {
        let def = self.relation(rel)?;
        def.columns
            .iter()
            .position(|c| c.role == ColumnRole::TimeKey)
            .map(|i| (i + 1) as AttrId)
            .ok_or_else(|| TsPushError::CatalogLookup(format!("time key of relation {rel}")))
    }

    /// The first field-key column, used when a projection would otherwise
    /// select only tag/time columns (the remote engine needs at least one
    /// field in the projection to return rows).
    pub fn first_field_key(&self, rel: RelId) -> Option<(AttrId, &ColumnDef)> {
        let def = self.relation(rel).ok()?;
        def.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.role == ColumnRole::FieldKey)
            .map(|(i, c)| ((i + 1) as AttrId, c))
    }
}

/// Collect the distinct dynamic keys referenced by `expr` against
/// relation `rel`, in first-appearance order, into `columns`.
pub fn pull_dynamic_columns(expr: &Expr, rel: RelId, columns: &mut Vec<String>) {
    if let Expr::DynamicFieldAccess { base, key, .. } = expr
        && let Expr::ColumnRef { rel: r, .. } = base.as_ref()
        && *r == rel
        && !columns.iter().any(|c| c == key)
    {
        columns.push(key.clone());
    }
    for child in expr.children() {
        pull_dynamic_columns(child, rel, columns);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Collation;

    fn declared_relation() -> RelationDef {
        RelationDef::new(
            "measurements",
            vec![
                ColumnDef::new("ts", ColumnRole::TimeKey, ScalarType::TimestampTz),
                ColumnDef::new("device", ColumnRole::TagKey, ScalarType::Text),
                ColumnDef::new("value", ColumnRole::FieldKey, ScalarType::Double),
            ],
        )
    }

    fn schemaless_relation() -> RelationDef {
        let mut def = RelationDef::new(
            "metrics",
            vec![
                ColumnDef::new("time", ColumnRole::TimeKey, ScalarType::TimestampTz),
                ColumnDef::new("tags", ColumnRole::DynamicTags, ScalarType::DynamicBlob),
                ColumnDef::new("fields", ColumnRole::DynamicFields, ScalarType::DynamicBlob),
            ],
        );
        def.schemaless = true;
        def.tags = vec!["device".into()];
        def
    }

    #[test]
    fn test_lookup_and_roles() {
        let mut catalog = Catalog::new();
        catalog.insert(1, declared_relation()).unwrap();

        assert_eq!(catalog.column_role(1, 1).unwrap(), ColumnRole::TimeKey);
        assert_eq!(catalog.remote_column_name(1, 2).unwrap(), "device");
        assert_eq!(catalog.remote_relation_name(1).unwrap(), "measurements");
        assert_eq!(catalog.time_key_attr(1).unwrap(), 1);
        assert!(catalog.is_tag_key(1, "device"));
        assert!(!catalog.is_tag_key(1, "value"));
        let (attr, col) = catalog.first_field_key(1).unwrap();
        assert_eq!(attr, 3);
        assert_eq!(col.remote_name(), "value");
    }

    #[test]
    fn test_lookup_miss_is_fatal() {
        let catalog = Catalog::new();
        assert!(matches!(
            catalog.relation(9),
            Err(TsPushError::CatalogLookup(_))
        ));

        let mut catalog = Catalog::new();
        catalog.insert(1, declared_relation()).unwrap();
        assert!(matches!(
            catalog.column(1, 7),
            Err(TsPushError::CatalogLookup(_))
        ));
        assert!(matches!(
            catalog.column(1, -1),
            Err(TsPushError::CatalogLookup(_))
        ));
    }

    #[test]
    fn test_remote_name_override() {
        let mut def = declared_relation();
        def = def.with_options(TableOptions {
            table: Some("m0".into()),
            tags: Vec::new(),
            schemaless: false,
        });
        def.columns[2].remote_name = Some("val".into());

        let mut catalog = Catalog::new();
        catalog.insert(1, def).unwrap();
        assert_eq!(catalog.remote_relation_name(1).unwrap(), "m0");
        assert_eq!(catalog.remote_column_name(1, 3).unwrap(), "val");
    }

    #[test]
    fn test_schemaless_validation() {
        let mut catalog = Catalog::new();
        catalog.insert(1, schemaless_relation()).unwrap();
        assert!(catalog.is_tag_key(1, "device"));
        assert!(!catalog.is_tag_key(1, "cpu"));

        // mis-typed time column
        let mut bad = schemaless_relation();
        bad.columns[0].ty = ScalarType::Text;
        assert!(matches!(
            Catalog::new().insert(2, bad),
            Err(TsPushError::InvalidCatalog(_))
        ));

        // mis-typed blob column
        let mut bad = schemaless_relation();
        bad.columns[2].ty = ScalarType::Text;
        assert!(matches!(
            Catalog::new().insert(2, bad),
            Err(TsPushError::InvalidCatalog(_))
        ));

        // declared columns are not allowed in schemaless mode
        let mut bad = schemaless_relation();
        bad.columns
            .push(ColumnDef::new("extra", ColumnRole::FieldKey, ScalarType::Double));
        assert!(matches!(
            Catalog::new().insert(2, bad),
            Err(TsPushError::InvalidCatalog(_))
        ));
    }

    #[test]
    fn test_dynamic_columns_never_coexist_with_declared() {
        let mut bad = declared_relation();
        bad.columns.push(ColumnDef::new(
            "tags",
            ColumnRole::DynamicTags,
            ScalarType::DynamicBlob,
        ));
        assert!(matches!(
            Catalog::new().insert(1, bad),
            Err(TsPushError::InvalidCatalog(_))
        ));
    }

    #[test]
    fn test_exactly_one_time_key() {
        let mut bad = declared_relation();
        bad.columns
            .push(ColumnDef::new("ts2", ColumnRole::TimeKey, ScalarType::Timestamp));
        assert!(matches!(
            Catalog::new().insert(1, bad),
            Err(TsPushError::InvalidCatalog(_))
        ));

        let bad = RelationDef::new(
            "no_time",
            vec![ColumnDef::new("v", ColumnRole::FieldKey, ScalarType::Double)],
        );
        assert!(matches!(
            Catalog::new().insert(1, bad),
            Err(TsPushError::InvalidCatalog(_))
        ));
    }

    #[test]
    fn test_from_json_round_trip() {
        let mut catalog = Catalog::new();
        catalog.insert(1, declared_relation()).unwrap();
        let json = serde_json::to_string(&catalog.relations).unwrap();
        let rebuilt = Catalog::from_json(&json).unwrap();
        assert_eq!(rebuilt.remote_relation_name(1).unwrap(), "measurements");
    }

    #[test]
    fn test_pull_dynamic_columns_dedups() {
        let access = |key: &str| Expr::DynamicFieldAccess {
            base: Box::new(Expr::ColumnRef {
                rel: 1,
                attr: 3,
                ty: ScalarType::DynamicBlob,
                collation: Collation::None,
            }),
            key: key.into(),
            result_ty: ScalarType::Text,
            collation: Collation::Default,
        };
        let e = Expr::BoolExpr {
            op: crate::expr::BoolOp::And,
            args: vec![access("cpu"), access("mem"), access("cpu")],
        };
        let mut cols = Vec::new();
        pull_dynamic_columns(&e, 1, &mut cols);
        assert_eq!(cols, vec!["cpu".to_string(), "mem".to_string()]);
    }
}
