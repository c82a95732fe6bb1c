use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::model::MaskConfig;

/// Emit the JSON Schema for descriptor registry files.
pub fn config_json_schema() -> RootSchema {
    schema_for!(MaskConfig)
}
