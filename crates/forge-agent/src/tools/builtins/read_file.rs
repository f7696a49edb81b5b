use crate::tools::context::{CapabilityRequirement, Tool, ToolContext, ToolError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

pub struct ReadFile;

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Reads a UTF-8 text file, optionally a line range, from the session's working directory."
    }

    fn parameters(&self) -> forge_provider::ParametersSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "path".into(),
            forge_provider::ParameterProperty {
                property_type: "string".into(),
                description: Some("path to read, relative to the session cwd".into()),
                items: None,
                enum_list: None,
            },
        );
        forge_provider::ParametersSchema {
            schema_type: "object".into(),
            properties,
            required: vec!["path".into()],
        }
    }

    fn required_capability(&self, arguments: &Value) -> Option<CapabilityRequirement> {
        let path = arguments.get("path")?.as_str()?.to_string();
        Some(CapabilityRequirement {
            action: "read".into(),
            path,
            description: "read a file".into(),
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<String, ToolError> {
        let path = arguments
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("missing path".into()))?;
        let resolved = ctx
            .cwd
            .as_deref()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|| path.into());
        tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}
