//! Tool registry: the set of tools offered to the provider on each turn,
//! plus the content hash the state machine uses to decide whether
//! `ToolsAvailable` needs to be re-published.

use super::context::Tool;
use std::collections::HashMap;
use std::sync::Arc;

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Definitions handed to the provider as function-calling schemas.
    pub fn definitions(&self) -> Vec<forge_provider::Tool> {
        let mut names: Vec<_> = self.tools.keys().cloned().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let tool = &self.tools[&name];
                forge_provider::Tool {
                    tool_type: "function".into(),
                    function: forge_provider::FunctionTool {
                        name: tool.name().to_string(),
                        description: tool.description().to_string(),
                        parameters: tool.parameters(),
                    },
                }
            })
            .collect()
    }

    /// Stable content hash over the registered tool set, used to decide
    /// whether `ToolsAvailable` needs to be re-sent this turn.
    pub fn tools_hash(&self) -> String {
        let mut names: Vec<_> = self.tools.keys().cloned().collect();
        names.sort();
        let joined = names.join(",");
        format!("{:016x}", rapidhash::rapidhash(joined.as_bytes()))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
