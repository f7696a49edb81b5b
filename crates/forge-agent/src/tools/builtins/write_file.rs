use crate::tools::context::{CapabilityRequirement, Tool, ToolContext, ToolError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

pub struct WriteFile;

#[async_trait]
impl Tool for WriteFile {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Writes a UTF-8 text file, creating parent directories as needed."
    }

    fn parameters(&self) -> forge_provider::ParametersSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "path".into(),
            forge_provider::ParameterProperty {
                property_type: "string".into(),
                description: Some("path to write, relative to the session cwd".into()),
                items: None,
                enum_list: None,
            },
        );
        properties.insert(
            "content".into(),
            forge_provider::ParameterProperty {
                property_type: "string".into(),
                description: Some("full file contents".into()),
                items: None,
                enum_list: None,
            },
        );
        forge_provider::ParametersSchema {
            schema_type: "object".into(),
            properties,
            required: vec!["path".into(), "content".into()],
        }
    }

    fn required_capability(&self, arguments: &Value) -> Option<CapabilityRequirement> {
        let path = arguments.get("path")?.as_str()?.to_string();
        Some(CapabilityRequirement {
            action: "write".into(),
            path,
            description: "write a file".into(),
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<String, ToolError> {
        let path = arguments
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("missing path".into()))?;
        let content = arguments
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("missing content".into()))?;
        let resolved = ctx
            .cwd
            .as_deref()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|| path.into());
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        }
        tokio::fs::write(&resolved, content)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        Ok(format!("wrote {} bytes to {}", content.len(), path))
    }
}
