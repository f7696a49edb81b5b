mod delegate;
mod edit;
mod glob_tool;
mod read_file;
mod search_text;
mod shell;
mod web_fetch;
mod write_file;

use super::registry::ToolRegistry;
use std::sync::Arc;

/// Registers the curated builtin set into a `ToolRegistry`. This covers the
/// in-process filesystem/process/search/network primitives plus `delegate`,
/// the sub-agent dispatch tool.
pub fn register_builtins(registry: &mut ToolRegistry) {
    registry.register(Arc::new(read_file::ReadFile));
    registry.register(Arc::new(write_file::WriteFile));
    registry.register(Arc::new(edit::Edit));
    registry.register(Arc::new(shell::Shell));
    registry.register(Arc::new(glob_tool::Glob));
    registry.register(Arc::new(search_text::SearchText));
    registry.register(Arc::new(web_fetch::WebFetch));
    registry.register(Arc::new(delegate::Delegate));
}
