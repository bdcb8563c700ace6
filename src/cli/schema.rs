use crate::config::Config;
use schemars::schema_for;

/// Print the config JSON Schema so editors can validate `followctl.yaml`.
pub fn execute() -> anyhow::Result<()> {
    let mut schema = schema_for!(Config);
    schema.schema.metadata().title = Some("followctl configuration".to_string());
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
