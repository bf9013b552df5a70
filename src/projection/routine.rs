//! Procedure, function and parameter projection

use std::collections::BTreeMap;

use crate::diagnostics::UnmappedCode;
use crate::error::SourceError;
use crate::introspect::ProbeBatch;
use crate::model::{
    EntityKind, FunctionInfo, FunctionType, NaturalKey, ObjectId, ParameterMode, ProcedureInfo,
    RoutineParameter, RoutineResultColumn,
};
use crate::source::RawRow;

use super::{for_each_row, project_rows, unmapped};

/// `sys.parameters.parameter_id` of a function's return value
const RETURN_VALUE_SLOT: i64 = 0;

/// Ordinary parameters plus the return types found in the ordinal-0 slot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectedParameters {
    pub parameters: Vec<RoutineParameter>,
    pub return_types: BTreeMap<ObjectId, String>,
}

/// `has_result_set` reflects whether the probe for that procedure succeeded,
/// not whether it produced columns
pub fn project_procedures(
    rows: &[RawRow],
    probes: &ProbeBatch,
) -> Result<Vec<ProcedureInfo>, SourceError> {
    project_rows(rows, EntityKind::Procedure, &["object_id"], |row| {
        let object_id = row.int("object_id")?;
        Ok(ProcedureInfo {
            object_id,
            is_encrypted: row.flag("is_encrypted")?,
            execute_as: row.opt_text("execute_as")?,
            has_result_set: probes.succeeded(object_id),
        })
    })
}

/// Return types are attached later from the parameter source
pub fn project_functions(
    rows: &[RawRow],
    warnings: &mut Vec<UnmappedCode>,
) -> Result<Vec<FunctionInfo>, SourceError> {
    project_rows(rows, EntityKind::Function, &["object_id"], |row| {
        let object_id = row.int("object_id")?;
        let type_code = row.text("type")?;
        let function_type = FunctionType::from_code(&type_code).unwrap_or_else(|| {
            unmapped(
                warnings,
                EntityKind::Function,
                "function_type",
                type_code.trim(),
                NaturalKey::ids(&[object_id]),
            );
            FunctionType::Other
        });

        Ok(FunctionInfo {
            object_id,
            function_type,
            return_data_type: None,
            is_schema_bound: row.flag("is_schema_bound")?,
            is_deterministic: row.flag("is_deterministic")?,
        })
    })
}

pub fn project_routine_parameters(rows: &[RawRow]) -> Result<ProjectedParameters, SourceError> {
    let mut projected = ProjectedParameters::default();

    let key_columns = ["routine_id", "parameter_id"];
    for_each_row(rows, EntityKind::RoutineParameter, &key_columns, |row| {
        let routine_id = row.int("routine_id")?;
        let ordinal_position = row.int("parameter_id")?;
        let data_type = row.text("data_type")?;

        if ordinal_position == RETURN_VALUE_SLOT {
            projected.return_types.insert(routine_id, data_type);
            return Ok(());
        }

        let has_default_value = row.flag("has_default_value")?;
        projected.parameters.push(RoutineParameter {
            routine_id,
            ordinal_position,
            parameter_name: row.opt_text("name")?.unwrap_or_default(),
            data_type,
            max_length: row.opt_int("max_length")?,
            precision: row.opt_int("precision")?,
            scale: row.opt_int("scale")?,
            parameter_mode: if row.flag("is_output")? {
                ParameterMode::Out
            } else {
                ParameterMode::In
            },
            has_default_value,
            default_value: row.opt_text("default_value")?.filter(|_| has_default_value),
        });
        Ok(())
    })?;

    Ok(projected)
}

/// Rows of one routine's result-set description
pub fn project_result_columns(
    routine_id: ObjectId,
    rows: &[RawRow],
) -> Result<Vec<RoutineResultColumn>, SourceError> {
    rows.iter()
        .map(|row| {
            Ok(RoutineResultColumn {
                routine_id,
                ordinal_position: row.int("column_ordinal")?,
                column_name: row.opt_text("name")?,
                data_type: row.text("system_type_name")?,
                source_object_id: row.opt_int("source_object_id")?,
            })
        })
        .collect()
}
