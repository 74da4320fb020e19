use serde_json::json;
use std::path::Path;

use crate::engine::{Action, EditOutcome, Engine, EngineConfig};
use crate::{ToolDefinition, ToolParam, ToolProvider, ToolResult};

use super::{require_str, run_blocking};

/// Hashline-aware file editing tool. Edits are `{"op": "replace"|"append"|
/// "prepend", "pos": "L#HH", "end": "L#HH", "lines": [...]}` batches applied
/// atomically against anchors observed from a prior `read_file` call.
pub struct EditFile {
    project_root: std::path::PathBuf,
}

impl EditFile {
    pub fn new(project_root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    fn engine(&self) -> Engine {
        Engine::new(EngineConfig::new(self.project_root.clone()))
    }
}

#[async_trait::async_trait]
impl ToolProvider for EditFile {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "edit_file".into(),
            description: concat!(
                "Edit a file using hashline anchors captured from read_file output. Each edit is ",
                "{\"op\": \"replace\"|\"append\"|\"prepend\", \"pos\": \"L#HH\", \"end\": \"L#HH\", \"lines\": [...]}. ",
                "`pos`/`end` name the anchor(s) you last observed; `lines` is absent for an insertion at EOF/BOF.",
            ).into(),
            params: vec![
                ToolParam::typed("path", "str"),
                ToolParam {
                    name: "edits".into(),
                    r#type: "list".into(),
                    description: "List of edit operations".into(),
                    required: true,
                },
                ToolParam::optional("expected_file_hash", "str"),
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

        let edits = match args.get("edits").and_then(|v| v.as_array()) {
            Some(arr) => arr.clone(),
            None => {
                return ToolResult::err(json!(
                    "Missing or invalid 'edits' parameter: expected a list"
                ));
            }
        };
        let expected_hash = args
            .get("expected_file_hash")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let project_root = self.project_root.clone();
        run_blocking(move || {
            let engine = Engine::new(EngineConfig::new(project_root));
            match engine.execute_edit(Path::new(&path_str), edits, expected_hash.as_deref()) {
                Ok(EditOutcome::Applied(summary)) => {
                    let verb = match summary.action {
                        Action::Created => "Created",
                        Action::Updated => "Updated",
                    };
                    let mut msg = format!(
                        "{verb} {path_str}: {} edit(s) applied, {} line(s)",
                        summary.edits_applied, summary.line_delta
                    );
                    for w in &summary.warnings {
                        msg.push_str(&format!("\nwarning: {w}"));
                    }
                    ToolResult::ok(json!(msg))
                }
                Ok(EditOutcome::SoftReject(msg)) => ToolResult::err(json!(msg)),
                Err(e) => ToolResult::err_fmt(format_args!("{e}")),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::compute_line_hash;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_replace_line() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("test.txt"), "line1\nline2\nline3\n").unwrap();
        let hash = compute_line_hash(2, "line2");
        let tool = EditFile::new(dir.path());
        let result = tool
            .execute(
                "edit_file",
                &json!({
                    "path": "test.txt",
                    "edits": [{"op": "replace", "pos": format!("2#{hash}"), "lines": ["replaced"]}]
                }),
            )
            .await;
        assert!(result.success, "{:?}", result.result);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("test.txt")).unwrap(),
            "line1\nreplaced\nline3\n"
        );
    }

    #[tokio::test]
    async fn test_append_after_anchor() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("test.txt"), "line1\nline2\nline3").unwrap();
        let hash = compute_line_hash(1, "line1");
        let tool = EditFile::new(dir.path());
        let result = tool
            .execute(
                "edit_file",
                &json!({
                    "path": "test.txt",
                    "edits": [{"op": "append", "pos": format!("1#{hash}"), "lines": ["inserted"]}]
                }),
            )
            .await;
        assert!(result.success, "{:?}", result.result);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("test.txt")).unwrap(),
            "line1\ninserted\nline2\nline3"
        );
    }

    #[tokio::test]
    async fn test_range_replace() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("test.txt"), "a\nb\nc\nd\ne").unwrap();
        let hash_b = compute_line_hash(2, "b");
        let hash_d = compute_line_hash(4, "d");
        let tool = EditFile::new(dir.path());
        let result = tool
            .execute(
                "edit_file",
                &json!({
                    "path": "test.txt",
                    "edits": [{"op": "replace", "pos": format!("2#{hash_b}"), "end": format!("4#{hash_d}"), "lines": ["X", "Y"]}]
                }),
            )
            .await;
        assert!(result.success, "{:?}", result.result);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("test.txt")).unwrap(),
            "a\nX\nY\ne"
        );
    }

    #[tokio::test]
    async fn test_stale_anchor_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("test.txt"), "line1\nline2\nline3").unwrap();
        let tool = EditFile::new(dir.path());
        let result = tool
            .execute(
                "edit_file",
                &json!({
                    "path": "test.txt",
                    "edits": [{"op": "replace", "pos": "2#ZZ", "lines": ["replaced"]}]
                }),
            )
            .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_missing_edits_param() {
        let dir = TempDir::new().unwrap();
        let tool = EditFile::new(dir.path());
        let result = tool
            .execute("edit_file", &json!({"path": "test.txt"}))
            .await;
        assert!(!result.success);
    }
}
