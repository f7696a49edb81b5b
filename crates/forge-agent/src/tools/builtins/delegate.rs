use crate::tools::context::{Tool, ToolContext, ToolError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// The call site for sub-agent dispatch: a model invokes this like any
/// other tool, and it drives a full child `AgentCore::run` to completion
/// before returning the child's final assistant text as the tool result.
pub struct Delegate;

#[async_trait]
impl Tool for Delegate {
    fn name(&self) -> &str {
        "delegate"
    }

    fn description(&self) -> &str {
        "Dispatches a task to a child sub-agent session sharing this session's models, \
         tools, and permissions, and returns its final response."
    }

    fn parameters(&self) -> forge_provider::ParametersSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "task".into(),
            forge_provider::ParameterProperty {
                property_type: "string".into(),
                description: Some("the task for the sub-agent to carry out".into()),
                items: None,
                enum_list: None,
            },
        );
        properties.insert(
            "title".into(),
            forge_provider::ParameterProperty {
                property_type: "string".into(),
                description: Some("optional title for the child session".into()),
                items: None,
                enum_list: None,
            },
        );
        forge_provider::ParametersSchema {
            schema_type: "object".into(),
            properties,
            required: vec!["task".into()],
        }
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<String, ToolError> {
        let task = arguments
            .get("task")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("missing task".into()))?
            .to_string();
        let title = arguments
            .get("title")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        crate::delegation::delegate(
            ctx.core.clone(),
            &ctx.session_id,
            &ctx.tool_call_id,
            task,
            title,
            ctx.cancel_rx.clone(),
        )
        .await
        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}
