//! Closed enumerations and the catalog code tables that feed them
//!
//! Every `from_code` returns `None` only for codes nobody has mapped; callers
//! record an unmapped-code warning and fall back to the `Other` variant.
//! Codes that are known but have no dedicated variant map to `Other` silently.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a schema-scoped catalog object (`sys.objects.type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    Table,
    View,
    Procedure,
    Function,
    Sequence,
    Type,
    Trigger,
    Other,
}

impl ObjectType {
    pub fn from_code(code: &str) -> Option<Self> {
        let mapped = match code.trim().to_ascii_uppercase().as_str() {
            "U" => ObjectType::Table,
            "V" => ObjectType::View,
            "P" | "PC" | "X" | "RF" => ObjectType::Procedure,
            "FN" | "IF" | "TF" | "FS" | "FT" | "AF" => ObjectType::Function,
            "SO" => ObjectType::Sequence,
            "TT" => ObjectType::Type,
            "TR" | "TA" => ObjectType::Trigger,
            // Constraints, internal/system tables, queues, synonyms, plan guides
            "PK" | "UQ" | "C" | "D" | "F" | "EC" | "ET" | "IT" | "S" | "SQ" | "SN" | "PG"
            | "R" => ObjectType::Other,
            _ => return None,
        };
        Some(mapped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Table => "TABLE",
            ObjectType::View => "VIEW",
            ObjectType::Procedure => "PROCEDURE",
            ObjectType::Function => "FUNCTION",
            ObjectType::Sequence => "SEQUENCE",
            ObjectType::Type => "TYPE",
            ObjectType::Trigger => "TRIGGER",
            ObjectType::Other => "OTHER",
        }
    }
}

/// Physical kind of an index (`sys.indexes.type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexType {
    Clustered,
    Nonclustered,
    ColumnStore,
    Other,
}

/// `sys.indexes.type` value of a heap, which is not an index at all
pub const HEAP_INDEX_TYPE: i64 = 0;

impl IndexType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(IndexType::Clustered),
            2 => Some(IndexType::Nonclustered),
            5 | 6 => Some(IndexType::ColumnStore),
            // XML, spatial, memory-optimized hash
            3 | 4 | 7 => Some(IndexType::Other),
            _ => None,
        }
    }

    /// Clustered rowstore (1) and clustered columnstore (5)
    pub fn code_is_clustered(code: i64) -> bool {
        matches!(code, 1 | 5)
    }

    pub fn code_is_column_store(code: i64) -> bool {
        matches!(code, 5 | 6)
    }
}

/// Kind of a user-defined function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunctionType {
    Scalar,
    InlineTvf,
    MultiTvf,
    Other,
}

impl FunctionType {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "FN" | "FS" => Some(FunctionType::Scalar),
            "IF" => Some(FunctionType::InlineTvf),
            "TF" | "FT" => Some(FunctionType::MultiTvf),
            "AF" => Some(FunctionType::Other),
            _ => None,
        }
    }

    pub fn is_table_valued(&self) -> bool {
        matches!(self, FunctionType::InlineTvf | FunctionType::MultiTvf)
    }
}

/// Discriminant of the unified constraint family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintType {
    Check,
    Default,
    PrimaryKey,
    Unique,
    ForeignKey,
}

impl ConstraintType {
    /// Whether member columns carry a positional ordinal within the key
    pub fn has_positional_columns(&self) -> bool {
        matches!(
            self,
            ConstraintType::PrimaryKey | ConstraintType::Unique | ConstraintType::ForeignKey
        )
    }
}

/// Foreign key ON UPDATE / ON DELETE behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferentialAction {
    NoAction,
    Cascade,
    SetNull,
    SetDefault,
    Other,
}

impl ReferentialAction {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ReferentialAction::NoAction),
            1 => Some(ReferentialAction::Cascade),
            2 => Some(ReferentialAction::SetNull),
            3 => Some(ReferentialAction::SetDefault),
            _ => None,
        }
    }
}

/// Database recovery model (`sys.databases.recovery_model`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryModel {
    Full,
    BulkLogged,
    Simple,
    Other,
}

impl RecoveryModel {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(RecoveryModel::Full),
            2 => Some(RecoveryModel::BulkLogged),
            3 => Some(RecoveryModel::Simple),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterMode {
    In,
    Out,
}

/// Scope level of an extended property.
///
/// `Other` carries the raw class discriminant through for scope kinds that
/// are not modelled (index, parameter, type, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LevelType {
    Database,
    Schema,
    Object,
    Column,
    Other(String),
}

impl LevelType {
    pub fn as_str(&self) -> &str {
        match self {
            LevelType::Database => "DATABASE",
            LevelType::Schema => "SCHEMA",
            LevelType::Object => "OBJECT",
            LevelType::Column => "COLUMN",
            LevelType::Other(raw) => raw,
        }
    }
}

impl From<String> for LevelType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "DATABASE" => LevelType::Database,
            "SCHEMA" => LevelType::Schema,
            "OBJECT" => LevelType::Object,
            "COLUMN" => LevelType::Column,
            _ => LevelType::Other(s),
        }
    }
}

impl From<LevelType> for String {
    fn from(level: LevelType) -> Self {
        level.as_str().to_string()
    }
}

impl fmt::Display for LevelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
