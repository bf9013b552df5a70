//! The constraint family: key, check, default and foreign-key constraints
//!
//! Four sources are projected into [`ConstraintFragment`]s (one per source
//! row) and folded into a [`ConstraintArena`] keyed by constraint id. The
//! arena stores each constraint once; the foreign-key entities are read off
//! the same entry, so `foreign_key_id` is always the constraint's own id.
//!
//! Member ordinals follow the constraint type:
//! PRIMARY_KEY, UNIQUE and FOREIGN_KEY members are numbered 1..N by their
//! position in the key; CHECK and DEFAULT members always get ordinal 1.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::diagnostics::{IntegrityRule, IntegrityWarning, UnmappedCode};
use crate::error::SourceError;
use crate::model::{
    ColumnId, ConstraintColumn, ConstraintId, ConstraintInfo, ConstraintType, EntityKind,
    ForeignKey, ForeignKeyColumn, NaturalKey, ObjectId, ReferentialAction,
};
use crate::projection::{project_rows, unmapped};
use crate::source::RawRow;

/// Ordinal given to the single member of a CHECK or DEFAULT constraint
const SINGLE_COLUMN_ORDINAL: i64 = 1;

/// A member column as the source reported it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberColumn {
    pub column_id: ColumnId,
    /// Position reported by the source; only meaningful for positional types
    pub source_ordinal: i64,
    pub referenced_column_id: Option<ColumnId>,
}

/// Foreign-key specific attributes of a FOREIGN_KEY fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKeyFragment {
    pub referenced_table_id: ObjectId,
    pub on_update_action: ReferentialAction,
    pub on_delete_action: ReferentialAction,
    pub is_disabled: bool,
    pub is_not_trusted: bool,
}

/// One source row of the constraint family
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintFragment {
    pub info: ConstraintInfo,
    pub member: Option<MemberColumn>,
    pub foreign_key: Option<ForeignKeyFragment>,
}

pub fn project_key_constraints(
    rows: &[RawRow],
    warnings: &mut Vec<UnmappedCode>,
) -> Result<Vec<ConstraintFragment>, SourceError> {
    project_rows(rows, EntityKind::Constraint, &["constraint_id", "column_id"], |row| {
        let constraint_id = row.int("constraint_id")?;
        let type_code = row.text("type")?;
        let constraint_type = match type_code.trim().to_ascii_uppercase().as_str() {
            "PK" => ConstraintType::PrimaryKey,
            "UQ" => ConstraintType::Unique,
            _ => {
                // Any other key constraint is unique by definition
                unmapped(
                    warnings,
                    EntityKind::Constraint,
                    "constraint_type",
                    type_code.trim(),
                    NaturalKey::ids(&[constraint_id]),
                );
                ConstraintType::Unique
            }
        };

        Ok(ConstraintFragment {
            info: ConstraintInfo {
                constraint_id,
                table_id: row.int("table_id")?,
                name: row.text("name")?,
                constraint_type,
                definition: None,
                is_disabled: row.flag("is_disabled")?,
                is_not_trusted: None,
            },
            member: Some(MemberColumn {
                column_id: row.int("column_id")?,
                source_ordinal: row.int("key_ordinal")?,
                referenced_column_id: None,
            }),
            foreign_key: None,
        })
    })
}

/// Table-level checks (column 0) have no member column
pub fn project_check_constraints(rows: &[RawRow]) -> Result<Vec<ConstraintFragment>, SourceError> {
    project_rows(rows, EntityKind::Constraint, &["constraint_id"], |row| {
        Ok(ConstraintFragment {
            info: ConstraintInfo {
                constraint_id: row.int("constraint_id")?,
                table_id: row.int("table_id")?,
                name: row.text("name")?,
                constraint_type: ConstraintType::Check,
                definition: row.opt_text("definition")?,
                is_disabled: row.flag("is_disabled")?,
                is_not_trusted: row.opt_flag("is_not_trusted")?,
            },
            member: single_member(row)?,
            foreign_key: None,
        })
    })
}

pub fn project_default_constraints(
    rows: &[RawRow],
) -> Result<Vec<ConstraintFragment>, SourceError> {
    project_rows(rows, EntityKind::Constraint, &["constraint_id"], |row| {
        Ok(ConstraintFragment {
            info: ConstraintInfo {
                constraint_id: row.int("constraint_id")?,
                table_id: row.int("table_id")?,
                name: row.text("name")?,
                constraint_type: ConstraintType::Default,
                definition: row.opt_text("definition")?,
                is_disabled: false,
                is_not_trusted: None,
            },
            member: single_member(row)?,
            foreign_key: None,
        })
    })
}

pub fn project_foreign_keys(
    rows: &[RawRow],
    warnings: &mut Vec<UnmappedCode>,
) -> Result<Vec<ConstraintFragment>, SourceError> {
    project_rows(rows, EntityKind::ForeignKey, &["constraint_id", "column_id"], |row| {
        let constraint_id = row.int("constraint_id")?;
        let is_disabled = row.flag("is_disabled")?;
        let is_not_trusted = row.flag("is_not_trusted")?;
        let mut action = |column: &str| -> Result<ReferentialAction, SourceError> {
            let code = row.opt_int(column)?.unwrap_or(0);
            Ok(ReferentialAction::from_code(code).unwrap_or_else(|| {
                unmapped(
                    warnings,
                    EntityKind::ForeignKey,
                    column,
                    code,
                    NaturalKey::ids(&[constraint_id]),
                );
                ReferentialAction::Other
            }))
        };
        let on_update_action = action("update_referential_action")?;
        let on_delete_action = action("delete_referential_action")?;

        Ok(ConstraintFragment {
            info: ConstraintInfo {
                constraint_id,
                table_id: row.int("table_id")?,
                name: row.text("name")?,
                constraint_type: ConstraintType::ForeignKey,
                definition: None,
                is_disabled,
                is_not_trusted: Some(is_not_trusted),
            },
            member: Some(MemberColumn {
                column_id: row.int("column_id")?,
                source_ordinal: row.int("constraint_column_id")?,
                referenced_column_id: Some(row.int("referenced_column_id")?),
            }),
            foreign_key: Some(ForeignKeyFragment {
                referenced_table_id: row.int("referenced_table_id")?,
                on_update_action,
                on_delete_action,
                is_disabled,
                is_not_trusted,
            }),
        })
    })
}

fn single_member(row: &RawRow) -> Result<Option<MemberColumn>, SourceError> {
    Ok(row
        .opt_int("column_id")?
        .filter(|id| *id != 0)
        .map(|column_id| MemberColumn {
            column_id,
            source_ordinal: SINGLE_COLUMN_ORDINAL,
            referenced_column_id: None,
        }))
}

#[derive(Debug, Clone)]
struct ConstraintEntry {
    info: ConstraintInfo,
    members: Vec<MemberColumn>,
    foreign_key: Option<ForeignKeyFragment>,
}

/// Constraints stored once, keyed by id
#[derive(Debug, Clone, Default)]
pub struct ConstraintArena {
    entries: BTreeMap<ConstraintId, ConstraintEntry>,
    conflicts: Vec<IntegrityWarning>,
}

/// Flat entity sets read off a finished arena
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnifiedConstraints {
    pub constraints: Vec<ConstraintInfo>,
    pub constraint_columns: Vec<ConstraintColumn>,
    pub foreign_keys: Vec<ForeignKey>,
    pub foreign_key_columns: Vec<ForeignKeyColumn>,
    /// Ids reported by more than one source with different shapes
    pub conflicts: Vec<IntegrityWarning>,
}

impl ConstraintArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold fragments in; fragments of one constraint are grouped by id
    pub fn absorb(&mut self, fragments: impl IntoIterator<Item = ConstraintFragment>) {
        for fragment in fragments {
            let id = fragment.info.constraint_id;
            match self.entries.entry(id) {
                Entry::Vacant(slot) => {
                    slot.insert(ConstraintEntry {
                        members: fragment.member.into_iter().collect(),
                        foreign_key: fragment.foreign_key,
                        info: fragment.info,
                    });
                }
                Entry::Occupied(mut slot) => {
                    let entry = slot.get_mut();
                    if entry.info.constraint_type != fragment.info.constraint_type
                        || entry.info.table_id != fragment.info.table_id
                    {
                        self.conflicts.push(IntegrityWarning {
                            entity: EntityKind::Constraint,
                            natural_key: NaturalKey::ids(&[id]),
                            rule: IntegrityRule::DuplicateKey,
                            target: EntityKind::Constraint,
                            detail: format!(
                                "constraint id reported as {:?} on table {} \
                                 and as {:?} on table {}",
                                entry.info.constraint_type,
                                entry.info.table_id,
                                fragment.info.constraint_type,
                                fragment.info.table_id
                            ),
                        });
                        continue;
                    }
                    entry.members.extend(fragment.member);
                }
            }
        }
    }

    pub fn get(&self, constraint_id: ConstraintId) -> Option<&ConstraintInfo> {
        self.entries.get(&constraint_id).map(|e| &e.info)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply the per-type ordinal policy and flatten into entity sets
    pub fn finish(self) -> UnifiedConstraints {
        let mut out = UnifiedConstraints {
            conflicts: self.conflicts,
            ..Default::default()
        };

        for (id, mut entry) in self.entries {
            let positional = entry.info.constraint_type.has_positional_columns();
            if positional {
                entry
                    .members
                    .sort_by_key(|m| (m.source_ordinal, m.column_id));
            }
            let mut seen = Vec::with_capacity(entry.members.len());
            entry.members.retain(|m| {
                let fresh = !seen.contains(&m.column_id);
                seen.push(m.column_id);
                fresh
            });

            for (position, member) in entry.members.iter().enumerate() {
                let ordinal_position = if positional {
                    position as i64 + 1
                } else {
                    SINGLE_COLUMN_ORDINAL
                };

                out.constraint_columns.push(ConstraintColumn {
                    constraint_id: id,
                    column_id: member.column_id,
                    ordinal_position,
                });

                if let (Some(_), Some(referenced_column_id)) =
                    (&entry.foreign_key, member.referenced_column_id)
                {
                    out.foreign_key_columns.push(ForeignKeyColumn {
                        foreign_key_id: id,
                        column_id: member.column_id,
                        referenced_column_id,
                        ordinal_position,
                    });
                }
            }

            if let Some(fk) = entry.foreign_key {
                out.foreign_keys.push(ForeignKey {
                    foreign_key_id: id,
                    referenced_table_id: fk.referenced_table_id,
                    on_update_action: fk.on_update_action,
                    on_delete_action: fk.on_delete_action,
                    is_disabled: fk.is_disabled,
                    is_not_trusted: fk.is_not_trusted,
                });
            }

            out.constraints.push(entry.info);
        }

        out
    }
}
