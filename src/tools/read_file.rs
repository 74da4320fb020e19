use serde_json::json;
use std::path::Path;

use crate::engine::{Engine, EngineConfig};
use crate::fsread::FsReadOptions;
use crate::{ToolDefinition, ToolParam, ToolProvider, ToolResult};

use super::{require_str, run_blocking};

/// Read a file with hashline-prefixed output, respecting `.gitignore` and
/// the built-in deny-list. Use `ls`-style directory listing separately —
/// this tool is text-file only.
pub struct ReadFile {
    project_root: std::path::PathBuf,
}

impl ReadFile {
    pub fn new(project_root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }
}

#[async_trait::async_trait]
impl ToolProvider for ReadFile {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "read_file".into(),
            description: "Read a file (default: up to 2000 lines). Returns hashline-prefixed \
                           content — each line numbered and tagged with a short content hash \
                           to use as an edit_file anchor."
                .into(),
            params: vec![
                ToolParam::typed("path", "str"),
                ToolParam {
                    name: "offset".into(),
                    r#type: "int".into(),
                    description: "Line offset to start reading from (1-based)".into(),
                    required: false,
                },
                ToolParam {
                    name: "limit".into(),
                    r#type: "int".into(),
                    description: "Max lines to read (default 2000)".into(),
                    required: false,
                },
                ToolParam {
                    name: "around_line".into(),
                    r#type: "int".into(),
                    description: "Center the window on this line instead of offset".into(),
                    required: false,
                },
            ],
            returns: "str".into(),
            hidden: false,
        }]
    }

    async fn execute(&self, _name: &str, args: &serde_json::Value) -> ToolResult {
        let path_str = match require_str(args, "path") {
            Ok(s) => s.to_string(),
            Err(e) => return e,
        };

        let opts = FsReadOptions {
            limit: args.get("limit").and_then(|v| v.as_u64()).map(|v| v as usize),
            offset: args.get("offset").and_then(|v| v.as_u64()).map(|v| v as usize),
            around_line: args
                .get("around_line")
                .and_then(|v| v.as_u64())
                .map(|v| v as usize),
            before: args.get("before").and_then(|v| v.as_u64()).map(|v| v as usize),
            after: args.get("after").and_then(|v| v.as_u64()).map(|v| v as usize),
            ..FsReadOptions::default()
        };

        let project_root = self.project_root.clone();
        run_blocking(move || {
            let engine = Engine::new(EngineConfig::new(project_root));
            match engine.read_file_hashlined(Path::new(&path_str), &opts) {
                Ok(result) => {
                    let mut formatted = result.numbered_content;
                    if result.truncated {
                        formatted.push_str(&format!(
                            "\n[Showing lines {}-{} of {}. Use offset={} to continue.]",
                            result.start_line,
                            result.end_line,
                            result.total_lines,
                            result.end_line + 1,
                        ));
                    }
                    formatted.push_str(&format!("\n[file_hash={}]", result.file_hash));
                    ToolResult::ok(json!(formatted))
                }
                Err(e) => ToolResult::err_fmt(format_args!("{e}")),
            }
        })
        .await
    }
}
