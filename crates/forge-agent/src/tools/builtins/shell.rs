use crate::tools::context::{CapabilityRequirement, Tool, ToolContext, ToolError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct Shell;

#[async_trait]
impl Tool for Shell {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Runs a shell command in the session's working directory and returns combined stdout/stderr."
    }

    fn parameters(&self) -> forge_provider::ParametersSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "command".into(),
            forge_provider::ParameterProperty {
                property_type: "string".into(),
                description: Some("command line to run via the system shell".into()),
                items: None,
                enum_list: None,
            },
        );
        forge_provider::ParametersSchema {
            schema_type: "object".into(),
            properties,
            required: vec!["command".into()],
        }
    }

    fn required_capability(&self, arguments: &Value) -> Option<CapabilityRequirement> {
        let command = arguments.get("command")?.as_str()?.to_string();
        Some(CapabilityRequirement {
            action: "execute".into(),
            path: command,
            description: "run a shell command".into(),
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<String, ToolError> {
        let command = arguments
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("missing command".into()))?;

        let mut cmd = build_command(command, ctx);
        let child = cmd
            .spawn()
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        let output = tokio::time::timeout(DEFAULT_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| ToolError::ExecutionFailed("command timed out".into()))?
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        if !output.status.success() {
            return Err(ToolError::ExecutionFailed(format!(
                "exit status {}: {combined}",
                output.status
            )));
        }
        Ok(combined)
    }
}

#[cfg(unix)]
fn build_command(command: &str, ctx: &ToolContext) -> tokio::process::Command {
    use std::os::unix::process::CommandExt;
    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c").arg(command);
    if let Some(cwd) = &ctx.cwd {
        cmd.current_dir(cwd);
    }
    // New process group so a cancelled turn can kill the whole tree, not
    // just the shell's immediate pid.
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }
    cmd.kill_on_drop(true);
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd
}

#[cfg(not(unix))]
fn build_command(command: &str, ctx: &ToolContext) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("cmd");
    cmd.arg("/C").arg(command);
    if let Some(cwd) = &ctx.cwd {
        cmd.current_dir(cwd);
    }
    cmd.kill_on_drop(true);
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd
}
