use crate::tools::context::{Tool, ToolContext, ToolError};
use async_trait::async_trait;
use grep_regex::RegexMatcher;
use grep_searcher::sinks::UTF8;
use grep_searcher::Searcher;
use ignore::WalkBuilder;
use serde_json::Value;
use std::collections::HashMap;

pub struct SearchText;

#[async_trait]
impl Tool for SearchText {
    fn name(&self) -> &str {
        "search_text"
    }

    fn description(&self) -> &str {
        "Searches files under the working directory for a regex pattern, honoring .gitignore."
    }

    fn parameters(&self) -> forge_provider::ParametersSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "pattern".into(),
            forge_provider::ParameterProperty {
                property_type: "string".into(),
                description: Some("regular expression to search for".into()),
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

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<String, ToolError> {
        let pattern = arguments
            .get("pattern")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("missing pattern".into()))?
            .to_string();
        let base = ctx.cwd.clone().unwrap_or_else(|| ".".into());

        tokio::task::spawn_blocking(move || -> Result<String, ToolError> {
            let matcher = RegexMatcher::new(&pattern)
                .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
            let mut results = Vec::new();

            for entry in WalkBuilder::new(&base).hidden(false).build() {
                let entry = match entry {
                    Ok(e) => e,
                    Err(_) => continue,
                };
                if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    continue;
                }
                let path = entry.path().to_path_buf();
                let display = path.to_string_lossy().into_owned();
                let _ = Searcher::new().search_path(
                    &matcher,
                    &path,
                    UTF8(|line_number, line| {
                        results.push(format!("{display}:{line_number}:{}", line.trim_end()));
                        Ok(true)
                    }),
                );
                if results.len() >= 500 {
                    break;
                }
            }
            Ok(results.join("\n"))
        })
        .await
        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?
    }
}
