use crate::tools::context::{CapabilityRequirement, Tool, ToolContext, ToolError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Exact single-occurrence find/replace, mirroring the contract editors in
/// this space converge on: fails closed rather than guessing on an ambiguous
/// or absent match.
pub struct Edit;

#[async_trait]
impl Tool for Edit {
    fn name(&self) -> &str {
        "edit"
    }

    fn description(&self) -> &str {
        "Replaces one exact, unique occurrence of old_string with new_string in a file."
    }

    fn parameters(&self) -> forge_provider::ParametersSchema {
        let mut properties = HashMap::new();
        for (key, desc) in [
            ("path", "file to edit, relative to the session cwd"),
            ("old_string", "exact text to replace"),
            ("new_string", "replacement text"),
        ] {
            properties.insert(
                key.into(),
                forge_provider::ParameterProperty {
                    property_type: "string".into(),
                    description: Some(desc.into()),
                    items: None,
                    enum_list: None,
                },
            );
        }
        forge_provider::ParametersSchema {
            schema_type: "object".into(),
            properties,
            required: vec!["path".into(), "old_string".into(), "new_string".into()],
        }
    }

    fn required_capability(&self, arguments: &Value) -> Option<CapabilityRequirement> {
        let path = arguments.get("path")?.as_str()?.to_string();
        Some(CapabilityRequirement {
            action: "write".into(),
            path,
            description: "edit a file".into(),
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<String, ToolError> {
        let path = arguments
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("missing path".into()))?;
        let old_string = arguments
            .get("old_string")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("missing old_string".into()))?;
        let new_string = arguments
            .get("new_string")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("missing new_string".into()))?;

        let resolved = ctx
            .cwd
            .as_deref()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|| path.into());
        let original = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        let occurrences = original.matches(old_string).count();
        if occurrences == 0 {
            return Err(ToolError::ExecutionFailed("old_string not found".into()));
        }
        if occurrences > 1 {
            return Err(ToolError::ExecutionFailed(format!(
                "old_string is not unique ({occurrences} occurrences)"
            )));
        }

        let updated = original.replacen(old_string, new_string, 1);
        tokio::fs::write(&resolved, updated)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        Ok(format!("edited {path}"))
    }
}
