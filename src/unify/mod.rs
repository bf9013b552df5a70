//! Polymorphic unification of structurally different catalog sources

mod constraint;
mod extended_property;

pub use constraint::{
    project_check_constraints, project_default_constraints, project_foreign_keys,
    project_key_constraints, ConstraintArena, ConstraintFragment, ForeignKeyFragment,
    MemberColumn, UnifiedConstraints,
};
pub use extended_property::{project_extended_properties, resolve_scope, PropertyScope};
