use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Error};
use custom_node::{NodeRequest, NodeResponse};
use schemars::schema_for;
use tracing::info;

pub const REQUEST_SCHEMA_FILE: &str = "node-request.schema.json";
pub const RESPONSE_SCHEMA_FILE: &str = "node-response.schema.json";

/// Write the JSON Schemas of the wire types into `out_dir`, returning the files written.
pub fn write_schema(out_dir: &Path) -> Result<Vec<PathBuf>, Error> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("could not create {}", out_dir.display()))?;

    let schemas = [
        (REQUEST_SCHEMA_FILE, serde_json::to_string_pretty(&schema_for!(NodeRequest))?),
        (RESPONSE_SCHEMA_FILE, serde_json::to_string_pretty(&schema_for!(NodeResponse))?),
    ];

    let mut written = Vec::with_capacity(schemas.len());
    for (name, json) in schemas {
        let path = out_dir.join(name);
        fs::write(&path, json).with_context(|| format!("could not write {}", path.display()))?;
        info!("wrote {}", path.display());
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::TempDir;

    #[test]
    fn writes_both_schemas() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("schemas");

        let written = write_schema(&out).unwrap();
        assert_eq!(written, vec![out.join(REQUEST_SCHEMA_FILE), out.join(RESPONSE_SCHEMA_FILE)]);

        let request: Value = serde_json::from_str(&fs::read_to_string(&written[0]).unwrap()).unwrap();
        assert_eq!(request["title"], "NodeRequest");
        assert!(request["properties"]["node"].is_object());
        assert!(request["properties"].get("input").is_some());

        let response: Value = serde_json::from_str(&fs::read_to_string(&written[1]).unwrap()).unwrap();
        assert_eq!(response["title"], "NodeResponse");
        assert!(response["properties"].get("traceData").is_some());
        assert!(response["properties"].get("trace_data").is_none());
    }
}
