//! Schema configuration: field contracts, hierarchical resolution, row validation

pub mod resolver;
pub mod types;
pub mod validator;

pub use resolver::{resolve, resolve_json};
pub use types::{
    Direction, FieldDef, FieldType, GlobalSchemaConfig, ResolvedSchema, TenantSchemaOverride,
};
pub use validator::{as_i64, validate_headers, validate_row, ValidationReport};
