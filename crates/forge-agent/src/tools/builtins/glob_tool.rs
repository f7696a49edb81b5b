use crate::tools::context::{Tool, ToolContext, ToolError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

pub struct Glob;

#[async_trait]
impl Tool for Glob {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Lists paths under the session's working directory matching a glob pattern."
    }

    fn parameters(&self) -> forge_provider::ParametersSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "pattern".into(),
            forge_provider::ParameterProperty {
                property_type: "string".into(),
                description: Some("glob pattern, e.g. \"src/**/*.rs\"".into()),
                items: None,
                enum_list: None,
            },
        );
        forge_provider::ParametersSchema {
            schema_type: "object".into(),
            properties,
            required: vec!["pattern".into()],
        }
    }

    // Read-only directory listing: no permission round-trip.

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<String, ToolError> {
        let pattern = arguments
            .get("pattern")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("missing pattern".into()))?;
        let base = ctx.cwd.clone().unwrap_or_else(|| ".".into());
        let full_pattern = base.join(pattern);
        let full_pattern = full_pattern.to_string_lossy().into_owned();

        let paths = tokio::task::spawn_blocking(move || -> Result<Vec<String>, String> {
            let mut matches = Vec::new();
            for entry in glob::glob(&full_pattern).map_err(|e| e.to_string())? {
                if let Ok(path) = entry {
                    matches.push(path.to_string_lossy().into_owned());
                }
            }
            matches.sort();
            Ok(matches)
        })
        .await
        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?
        .map_err(ToolError::ExecutionFailed)?;

        Ok(paths.join("\n"))
    }
}
