use crate::tools::context::{CapabilityRequirement, Tool, ToolContext, ToolError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

const MAX_BODY_BYTES: usize = 256 * 1024;

pub struct WebFetch;

#[async_trait]
impl Tool for WebFetch {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetches a URL over HTTP(S) and returns up to 256KiB of the response body."
    }

    fn parameters(&self) -> forge_provider::ParametersSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "url".into(),
            forge_provider::ParameterProperty {
                property_type: "string".into(),
                description: Some("absolute http(s) URL".into()),
                items: None,
                enum_list: None,
            },
        );
        forge_provider::ParametersSchema {
            schema_type: "object".into(),
            properties,
            required: vec!["url".into()],
        }
    }

    fn required_capability(&self, arguments: &Value) -> Option<CapabilityRequirement> {
        let url = arguments.get("url")?.as_str()?.to_string();
        Some(CapabilityRequirement {
            action: "fetch".into(),
            path: url,
            description: "fetch a URL".into(),
        })
    }

    async fn execute(&self, _ctx: &ToolContext, arguments: Value) -> Result<String, ToolError> {
        let url = arguments
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("missing url".into()))?;

        let response = reqwest::get(url)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        let truncated = &bytes[..bytes.len().min(MAX_BODY_BYTES)];
        Ok(String::from_utf8_lossy(truncated).into_owned())
    }
}
