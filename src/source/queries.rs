//! Named, versioned extraction queries against the `sys` catalog views
//!
//! Each query has a fixed result shape (its required columns). The built-in
//! T-SQL text can be replaced from a directory of `NN_name.sql` files, which
//! is how the original ETL kept its scripts; the version tag always tracks
//! the text actually in use.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ExtractError;
use crate::model::EntityKind;
use crate::util::{read_file_with_encoding_fallback, short_sha256};

/// `NN_name.sql` as used for query script files
static QUERY_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[0-9]{2}_)?([a-z_]+)\.sql$").unwrap());

/// One extraction step's source query
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Databases,
    Schemas,
    Objects,
    Tables,
    Columns,
    KeyConstraints,
    CheckConstraints,
    DefaultConstraints,
    ForeignKeys,
    Indexes,
    IndexColumns,
    Views,
    ViewColumns,
    Procedures,
    Functions,
    RoutineParameters,
    ExtendedProperties,
}

impl QueryKind {
    /// All queries, in script order
    pub const ALL: [QueryKind; 17] = [
        QueryKind::Databases,
        QueryKind::Schemas,
        QueryKind::Objects,
        QueryKind::Tables,
        QueryKind::Columns,
        QueryKind::KeyConstraints,
        QueryKind::CheckConstraints,
        QueryKind::DefaultConstraints,
        QueryKind::ForeignKeys,
        QueryKind::Indexes,
        QueryKind::IndexColumns,
        QueryKind::Views,
        QueryKind::ViewColumns,
        QueryKind::Procedures,
        QueryKind::Functions,
        QueryKind::RoutineParameters,
        QueryKind::ExtendedProperties,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            QueryKind::Databases => "databases",
            QueryKind::Schemas => "schemas",
            QueryKind::Objects => "objects",
            QueryKind::Tables => "tables",
            QueryKind::Columns => "columns",
            QueryKind::KeyConstraints => "key_constraints",
            QueryKind::CheckConstraints => "check_constraints",
            QueryKind::DefaultConstraints => "default_constraints",
            QueryKind::ForeignKeys => "foreign_keys",
            QueryKind::Indexes => "indexes",
            QueryKind::IndexColumns => "index_columns",
            QueryKind::Views => "views",
            QueryKind::ViewColumns => "view_columns",
            QueryKind::Procedures => "procedures",
            QueryKind::Functions => "functions",
            QueryKind::RoutineParameters => "routine_parameters",
            QueryKind::ExtendedProperties => "extended_properties",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Step identifier used in logs and the run audit
    pub fn step_key(&self) -> String {
        format!("extract.sys.{}", self.name())
    }

    /// Script file name, e.g. `03_objects.sql`
    pub fn file_name(&self) -> String {
        let ordinal = Self::ALL
            .iter()
            .position(|k| k == self)
            .map_or(0, |i| i + 1);
        format!("{:02}_{}.sql", ordinal, self.name())
    }

    /// Columns every returned row must carry
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            QueryKind::Databases => &[
                "database_id",
                "name",
                "collation_name",
                "compatibility_level",
                "recovery_model",
                "owner_name",
                "create_date",
                "last_backup_date",
                "default_file_group",
                "is_primary",
            ],
            QueryKind::Schemas => &["database_id", "schema_id", "name", "owner_name"],
            QueryKind::Objects => &[
                "database_id",
                "object_id",
                "schema_id",
                "name",
                "type",
                "definition",
                "create_date",
                "modify_date",
                "is_ms_shipped",
                "is_enabled",
            ],
            QueryKind::Tables => &[
                "object_id",
                "row_count",
                "is_system_versioned",
                "history_table_id",
                "is_external",
                "file_group",
                "is_partitioned",
                "partition_scheme",
                "partition_function",
            ],
            QueryKind::Columns => &[
                "table_id",
                "column_id",
                "name",
                "ordinal_position",
                "data_type",
                "max_length",
                "precision",
                "scale",
                "is_nullable",
                "default_definition",
                "computed_definition",
                "is_identity",
                "identity_seed",
                "identity_increment",
                "is_sparse",
                "is_hidden",
                "is_rowguidcol",
            ],
            QueryKind::KeyConstraints => &[
                "constraint_id",
                "table_id",
                "name",
                "type",
                "is_disabled",
                "column_id",
                "key_ordinal",
            ],
            QueryKind::CheckConstraints => &[
                "constraint_id",
                "table_id",
                "name",
                "definition",
                "is_disabled",
                "is_not_trusted",
                "column_id",
            ],
            QueryKind::DefaultConstraints => {
                &["constraint_id", "table_id", "name", "definition", "column_id"]
            }
            QueryKind::ForeignKeys => &[
                "constraint_id",
                "table_id",
                "name",
                "referenced_table_id",
                "update_referential_action",
                "delete_referential_action",
                "is_disabled",
                "is_not_trusted",
                "constraint_column_id",
                "column_id",
                "referenced_column_id",
            ],
            QueryKind::Indexes => &[
                "table_id",
                "index_id",
                "name",
                "type",
                "is_primary_key",
                "is_unique",
                "has_filter",
                "filter_definition",
                "is_full_text",
                "file_group",
                "fill_factor",
                "data_compression",
            ],
            QueryKind::IndexColumns => &[
                "table_id",
                "index_id",
                "column_id",
                "key_ordinal",
                "is_descending_key",
                "is_included_column",
            ],
            QueryKind::Views => &[
                "object_id",
                "is_indexed",
                "is_schema_bound",
                "with_check_option",
            ],
            QueryKind::ViewColumns => &["view_id", "ordinal_position", "column_name", "data_type"],
            QueryKind::Procedures => &["object_id", "is_encrypted", "execute_as"],
            QueryKind::Functions => &["object_id", "type", "is_schema_bound", "is_deterministic"],
            QueryKind::RoutineParameters => &[
                "routine_id",
                "parameter_id",
                "name",
                "data_type",
                "max_length",
                "precision",
                "scale",
                "is_output",
                "has_default_value",
                "default_value",
            ],
            QueryKind::ExtendedProperties => &[
                "database_id",
                "class",
                "class_desc",
                "major_id",
                "minor_id",
                "name",
                "value",
            ],
        }
    }

    /// Canonical entity kinds this query feeds
    pub fn produces(&self) -> &'static [EntityKind] {
        match self {
            QueryKind::Databases => &[EntityKind::Database],
            QueryKind::Schemas => &[EntityKind::Schema],
            QueryKind::Objects => &[EntityKind::Object],
            QueryKind::Tables => &[EntityKind::Table],
            QueryKind::Columns => &[EntityKind::Column],
            QueryKind::KeyConstraints
            | QueryKind::CheckConstraints
            | QueryKind::DefaultConstraints => {
                &[EntityKind::Constraint, EntityKind::ConstraintColumn]
            }
            QueryKind::ForeignKeys => &[
                EntityKind::Constraint,
                EntityKind::ConstraintColumn,
                EntityKind::ForeignKey,
                EntityKind::ForeignKeyColumn,
            ],
            QueryKind::Indexes => &[EntityKind::Index],
            QueryKind::IndexColumns => &[EntityKind::IndexColumn, EntityKind::IndexIncludedColumn],
            QueryKind::Views => &[EntityKind::View],
            QueryKind::ViewColumns => &[EntityKind::ViewColumn],
            QueryKind::Procedures => &[EntityKind::Procedure, EntityKind::RoutineResultColumn],
            QueryKind::Functions => &[EntityKind::Function, EntityKind::RoutineResultColumn],
            QueryKind::RoutineParameters => &[EntityKind::RoutineParameter],
            QueryKind::ExtendedProperties => &[EntityKind::ExtendedProperty],
        }
    }

    fn builtin_sql(&self) -> &'static str {
        match self {
            QueryKind::Databases => DATABASES_SQL,
            QueryKind::Schemas => SCHEMAS_SQL,
            QueryKind::Objects => OBJECTS_SQL,
            QueryKind::Tables => TABLES_SQL,
            QueryKind::Columns => COLUMNS_SQL,
            QueryKind::KeyConstraints => KEY_CONSTRAINTS_SQL,
            QueryKind::CheckConstraints => CHECK_CONSTRAINTS_SQL,
            QueryKind::DefaultConstraints => DEFAULT_CONSTRAINTS_SQL,
            QueryKind::ForeignKeys => FOREIGN_KEYS_SQL,
            QueryKind::Indexes => INDEXES_SQL,
            QueryKind::IndexColumns => INDEX_COLUMNS_SQL,
            QueryKind::Views => VIEWS_SQL,
            QueryKind::ViewColumns => VIEW_COLUMNS_SQL,
            QueryKind::Procedures => PROCEDURES_SQL,
            QueryKind::Functions => FUNCTIONS_SQL,
            QueryKind::RoutineParameters => ROUTINE_PARAMETERS_SQL,
            QueryKind::ExtendedProperties => EXTENDED_PROPERTIES_SQL,
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A query ready to hand to a catalog source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDefinition {
    pub kind: QueryKind,
    pub sql: String,
    /// Short content hash of `sql`
    pub version: String,
}

impl QueryDefinition {
    pub fn new(kind: QueryKind, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let version = short_sha256(&sql);
        Self { kind, sql, version }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn required_columns(&self) -> &'static [&'static str] {
        self.kind.required_columns()
    }
}

/// The full set of extraction queries for one run
#[derive(Debug, Clone)]
pub struct QueryCatalog {
    queries: BTreeMap<QueryKind, QueryDefinition>,
}

impl Default for QueryCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl QueryCatalog {
    pub fn builtin() -> Self {
        let queries = QueryKind::ALL
            .into_iter()
            .map(|kind| (kind, QueryDefinition::new(kind, kind.builtin_sql())))
            .collect();
        Self { queries }
    }

    /// Built-in queries with any `*.sql` files in `dir` replacing them by name
    pub fn with_overrides(dir: &Path) -> Result<Self, ExtractError> {
        let mut catalog = Self::builtin();

        let pattern = dir.join("*.sql");
        let pattern = pattern.to_string_lossy();
        let paths = glob::glob(&pattern).map_err(|e| ExtractError::QueryOverridePattern {
            message: e.to_string(),
        })?;

        for path in paths.filter_map(|p| p.ok()) {
            let kind = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| {
                    QUERY_FILE_RE
                        .captures(&n.to_ascii_lowercase())
                        .map(|c| c[1].to_string())
                })
                .and_then(|name| QueryKind::from_name(&name))
                .ok_or_else(|| ExtractError::UnknownQueryOverride { path: path.clone() })?;

            let sql = read_file_with_encoding_fallback(&path).map_err(|e| {
                ExtractError::QueryOverrideRead {
                    path: path.clone(),
                    source: e,
                }
            })?;
            catalog.queries.insert(kind, QueryDefinition::new(kind, sql));
        }

        Ok(catalog)
    }

    pub fn get(&self, kind: QueryKind) -> &QueryDefinition {
        // Every kind is inserted by builtin(); overrides only replace.
        &self.queries[&kind]
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryDefinition> {
        self.queries.values()
    }
}

const DATABASES_SQL: &str = r#"
SELECT d.database_id,
       d.name,
       d.collation_name,
       d.compatibility_level,
       d.recovery_model,
       SUSER_SNAME(d.owner_sid) AS owner_name,
       CONVERT(varchar(33), d.create_date, 126) AS create_date,
       CONVERT(varchar(33), b.last_backup_date, 126) AS last_backup_date,
       CASE WHEN d.database_id = DB_ID() THEN fg.name END AS default_file_group,
       CAST(CASE WHEN d.database_id = DB_ID() THEN 1 ELSE 0 END AS bit) AS is_primary
FROM sys.databases AS d
OUTER APPLY (SELECT MAX(bs.backup_finish_date) AS last_backup_date
             FROM msdb.dbo.backupset AS bs
             WHERE bs.database_name = d.name) AS b
LEFT JOIN sys.filegroups AS fg ON fg.is_default = 1
"#;

const SCHEMAS_SQL: &str = r#"
SELECT DB_ID() AS database_id,
       s.schema_id,
       s.name,
       USER_NAME(s.principal_id) AS owner_name
FROM sys.schemas AS s
"#;

const OBJECTS_SQL: &str = r#"
SELECT DB_ID() AS database_id,
       o.object_id,
       o.schema_id,
       o.name,
       RTRIM(o.type) AS type,
       m.definition,
       CONVERT(varchar(33), o.create_date, 126) AS create_date,
       CONVERT(varchar(33), o.modify_date, 126) AS modify_date,
       o.is_ms_shipped,
       CAST(CASE WHEN tr.is_disabled = 1 THEN 0 ELSE 1 END AS bit) AS is_enabled
FROM sys.objects AS o
LEFT JOIN sys.sql_modules AS m ON m.object_id = o.object_id
LEFT JOIN sys.triggers AS tr ON tr.object_id = o.object_id
WHERE o.parent_object_id = 0 OR o.type IN ('TR', 'TA')
"#;

const TABLES_SQL: &str = r#"
SELECT t.object_id,
       (SELECT SUM(p.rows) FROM sys.partitions AS p
        WHERE p.object_id = t.object_id AND p.index_id IN (0, 1)) AS row_count,
       CAST(CASE WHEN t.temporal_type = 2 THEN 1 ELSE 0 END AS bit) AS is_system_versioned,
       t.history_table_id,
       t.is_external,
       fg.name AS file_group,
       CAST(CASE WHEN ps.data_space_id IS NULL THEN 0 ELSE 1 END AS bit) AS is_partitioned,
       ps.name AS partition_scheme,
       pf.name AS partition_function
FROM sys.tables AS t
JOIN sys.indexes AS i ON i.object_id = t.object_id AND i.index_id IN (0, 1)
LEFT JOIN sys.filegroups AS fg ON fg.data_space_id = i.data_space_id
LEFT JOIN sys.partition_schemes AS ps ON ps.data_space_id = i.data_space_id
LEFT JOIN sys.partition_functions AS pf ON pf.function_id = ps.function_id
"#;

const COLUMNS_SQL: &str = r#"
SELECT c.object_id AS table_id,
       c.column_id,
       c.name,
       ROW_NUMBER() OVER (PARTITION BY c.object_id ORDER BY c.column_id) AS ordinal_position,
       TYPE_NAME(c.user_type_id) AS data_type,
       c.max_length,
       c.precision,
       c.scale,
       c.is_nullable,
       dc.definition AS default_definition,
       cc.definition AS computed_definition,
       c.is_identity,
       CAST(ic.seed_value AS bigint) AS identity_seed,
       CAST(ic.increment_value AS bigint) AS identity_increment,
       c.is_sparse,
       c.is_hidden,
       c.is_rowguidcol
FROM sys.columns AS c
JOIN sys.tables AS t ON t.object_id = c.object_id
LEFT JOIN sys.default_constraints AS dc ON dc.object_id = c.default_object_id
LEFT JOIN sys.computed_columns AS cc
       ON cc.object_id = c.object_id AND cc.column_id = c.column_id
LEFT JOIN sys.identity_columns AS ic
       ON ic.object_id = c.object_id AND ic.column_id = c.column_id
"#;

const KEY_CONSTRAINTS_SQL: &str = r#"
SELECT kc.object_id AS constraint_id,
       kc.parent_object_id AS table_id,
       kc.name,
       RTRIM(kc.type) AS type,
       i.is_disabled,
       ic.column_id,
       ic.key_ordinal
FROM sys.key_constraints AS kc
JOIN sys.indexes AS i
  ON i.object_id = kc.parent_object_id AND i.index_id = kc.unique_index_id
JOIN sys.index_columns AS ic
  ON ic.object_id = i.object_id AND ic.index_id = i.index_id AND ic.key_ordinal > 0
"#;

const CHECK_CONSTRAINTS_SQL: &str = r#"
SELECT cc.object_id AS constraint_id,
       cc.parent_object_id AS table_id,
       cc.name,
       cc.definition,
       cc.is_disabled,
       cc.is_not_trusted,
       cc.parent_column_id AS column_id
FROM sys.check_constraints AS cc
"#;

const DEFAULT_CONSTRAINTS_SQL: &str = r#"
SELECT dc.object_id AS constraint_id,
       dc.parent_object_id AS table_id,
       dc.name,
       dc.definition,
       dc.parent_column_id AS column_id
FROM sys.default_constraints AS dc
"#;

const FOREIGN_KEYS_SQL: &str = r#"
SELECT fk.object_id AS constraint_id,
       fk.parent_object_id AS table_id,
       fk.name,
       fk.referenced_object_id AS referenced_table_id,
       fk.update_referential_action,
       fk.delete_referential_action,
       fk.is_disabled,
       fk.is_not_trusted,
       fkc.constraint_column_id,
       fkc.parent_column_id AS column_id,
       fkc.referenced_column_id
FROM sys.foreign_keys AS fk
JOIN sys.foreign_key_columns AS fkc ON fkc.constraint_object_id = fk.object_id
"#;

const INDEXES_SQL: &str = r#"
SELECT i.object_id AS table_id,
       i.index_id,
       i.name,
       i.type,
       i.is_primary_key,
       i.is_unique,
       i.has_filter,
       i.filter_definition,
       CAST(CASE WHEN fti.unique_index_id = i.index_id THEN 1 ELSE 0 END AS bit) AS is_full_text,
       ds.name AS file_group,
       NULLIF(i.fill_factor, 0) AS fill_factor,
       (SELECT TOP (1) p.data_compression_desc FROM sys.partitions AS p
        WHERE p.object_id = i.object_id AND p.index_id = i.index_id
        ORDER BY p.partition_number) AS data_compression
FROM sys.indexes AS i
JOIN sys.objects AS o ON o.object_id = i.object_id AND o.type IN ('U', 'V')
LEFT JOIN sys.data_spaces AS ds ON ds.data_space_id = i.data_space_id
LEFT JOIN sys.fulltext_indexes AS fti ON fti.object_id = i.object_id
"#;

const INDEX_COLUMNS_SQL: &str = r#"
SELECT ic.object_id AS table_id,
       ic.index_id,
       ic.column_id,
       ic.key_ordinal,
       ic.is_descending_key,
       ic.is_included_column
FROM sys.index_columns AS ic
JOIN sys.objects AS o ON o.object_id = ic.object_id AND o.type IN ('U', 'V')
"#;

const VIEWS_SQL: &str = r#"
SELECT v.object_id,
       CAST(CASE WHEN EXISTS (SELECT 1 FROM sys.indexes AS i
                              WHERE i.object_id = v.object_id AND i.index_id = 1)
                 THEN 1 ELSE 0 END AS bit) AS is_indexed,
       m.is_schema_bound,
       v.with_check_option
FROM sys.views AS v
JOIN sys.sql_modules AS m ON m.object_id = v.object_id
"#;

const VIEW_COLUMNS_SQL: &str = r#"
SELECT c.object_id AS view_id,
       c.column_id AS ordinal_position,
       c.name AS column_name,
       TYPE_NAME(c.user_type_id) AS data_type
FROM sys.columns AS c
JOIN sys.views AS v ON v.object_id = c.object_id
"#;

const PROCEDURES_SQL: &str = r#"
SELECT p.object_id,
       CAST(CASE WHEN m.definition IS NULL THEN 1 ELSE 0 END AS bit) AS is_encrypted,
       CASE WHEN m.execute_as_principal_id IS NULL THEN NULL
            WHEN m.execute_as_principal_id = -2 THEN 'OWNER'
            ELSE USER_NAME(m.execute_as_principal_id)
       END AS execute_as
FROM sys.procedures AS p
LEFT JOIN sys.sql_modules AS m ON m.object_id = p.object_id
"#;

const FUNCTIONS_SQL: &str = r#"
SELECT o.object_id,
       RTRIM(o.type) AS type,
       COALESCE(m.is_schema_bound, 0) AS is_schema_bound,
       CAST(OBJECTPROPERTY(o.object_id, 'IsDeterministic') AS bit) AS is_deterministic
FROM sys.objects AS o
LEFT JOIN sys.sql_modules AS m ON m.object_id = o.object_id
WHERE o.type IN ('FN', 'IF', 'TF', 'FS', 'FT', 'AF')
"#;

const ROUTINE_PARAMETERS_SQL: &str = r#"
SELECT p.object_id AS routine_id,
       p.parameter_id,
       p.name,
       TYPE_NAME(p.user_type_id) AS data_type,
       p.max_length,
       p.precision,
       p.scale,
       p.is_output,
       p.has_default_value,
       CAST(p.default_value AS nvarchar(4000)) AS default_value
FROM sys.parameters AS p
JOIN sys.objects AS o ON o.object_id = p.object_id
WHERE o.type IN ('P', 'PC', 'X', 'FN', 'IF', 'TF', 'FS', 'FT', 'AF')
"#;

const EXTENDED_PROPERTIES_SQL: &str = r#"
SELECT DB_ID() AS database_id,
       ep.class,
       ep.class_desc,
       ep.major_id,
       ep.minor_id,
       ep.name,
       CAST(ep.value AS nvarchar(4000)) AS value
FROM sys.extended_properties AS ep
"#;
