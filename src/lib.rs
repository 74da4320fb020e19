//! Deterministic, stale-safe, line-anchored text editing engine.
//!
//! Every edit a caller proposes must name an anchor it just observed — a
//! line number paired with a short content-derived token. If the file has
//! drifted since that anchor was read, the engine refuses the edit and
//! reports what changed rather than silently clobbering it.
//!
//! The crate is organized around the pipeline in [`engine::Engine`]:
//! a path is resolved safely ([`pathsafety`]), the file is read and
//! canonicalized ([`envelope`]), submitted edits are repaired
//! ([`repair`]) and normalized ([`edit`]), anchors are validated
//! ([`anchor`]) against the content hashed by [`hash`] and rendered by
//! [`format`]/[`stream`], the batch is ordered and applied
//! ([`edit::order`], [`edit::apply`]), and the result is atomically
//! written back. Repeated failures are tracked by a process-wide
//! [`ledger`] that escalates into a non-throwing soft-reject.

pub mod anchor;
pub mod edit;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod format;
pub mod fsread;
pub mod hash;
pub mod ledger;
pub mod pathsafety;
pub mod repair;
pub mod stream;
pub mod tools;

pub use edit::{Edit, Lines, OpKind, RawEdit};
pub use engine::{Action, EditOutcome, Engine, EngineConfig, Summary};
pub use error::EngineError;
pub use fsread::{FsReadError, FsReadOptions, FsReadResult};

/// A typed parameter for a tool definition.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ToolParam {
    pub name: String,
    /// Python type: "str", "int", "float", "bool", "list", "dict", "any"
    #[serde(default = "ToolParam::default_type")]
    pub r#type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default = "ToolParam::default_required")]
    pub required: bool,
}

impl ToolParam {
    fn default_type() -> String {
        "any".into()
    }
    fn default_required() -> bool {
        true
    }

    pub fn typed(name: &str, ty: &str) -> Self {
        Self {
            name: name.into(),
            r#type: ty.into(),
            description: String::new(),
            required: true,
        }
    }
    pub fn optional(name: &str, ty: &str) -> Self {
        Self {
            name: name.into(),
            r#type: ty.into(),
            description: String::new(),
            required: false,
        }
    }
}

/// A tool definition exposed to whatever calls into this crate's
/// [`ToolProvider`] impls (a REPL, an agent loop, a test harness).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ToolParam>,
    /// Python-ish return type: "str", "int", "float", "bool", "list", "dict", "any", "None"
    #[serde(
        default = "ToolDefinition::default_returns",
        skip_serializing_if = "String::is_empty"
    )]
    pub returns: String,
    /// Hidden tools are callable directly but don't appear in a generated prompt/namespace.
    #[serde(default)]
    pub hidden: bool,
}

impl ToolDefinition {
    fn default_returns() -> String {
        "any".into()
    }

    /// Format as a typed Python-ish signature: `name(param: type, ...) -> ret`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                let mut s = format!("{}: {}", p.name, p.r#type);
                if !p.required {
                    s.push_str(" = None");
                }
                s
            })
            .collect();
        let ret = if self.returns.is_empty() {
            "any"
        } else {
            &self.returns
        };
        format!("{}({}) -> {}", self.name, params.join(", "), ret)
    }

    /// Format all tools as a documentation block for a model prompt.
    pub fn format_tool_docs(tools: &[ToolDefinition]) -> String {
        tools
            .iter()
            .map(|t| {
                let mut lines = format!("- `{}`", t.signature());
                if !t.description.is_empty() {
                    lines.push_str(&format!(" — {}", t.description));
                }
                for p in &t.params {
                    if !p.description.is_empty() {
                        lines.push_str(&format!("\n    - `{}`: {}", p.name, p.description));
                    }
                }
                lines
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Result of executing a tool.
#[derive(Clone, Debug)]
pub struct ToolResult {
    pub success: bool,
    pub result: serde_json::Value,
}

impl ToolResult {
    pub fn ok(result: serde_json::Value) -> Self {
        Self {
            success: true,
            result,
        }
    }
    pub fn err(result: serde_json::Value) -> Self {
        Self {
            success: false,
            result,
        }
    }
    pub fn err_fmt(args: std::fmt::Arguments<'_>) -> Self {
        Self::err(serde_json::Value::String(args.to_string()))
    }
}

/// Trait for exposing engine operations as callable tools. Implement this
/// per host surface (REPL, agent loop, CLI).
#[async_trait::async_trait]
pub trait ToolProvider: Send + Sync + 'static {
    fn definitions(&self) -> Vec<ToolDefinition>;
    async fn execute(&self, name: &str, args: &serde_json::Value) -> ToolResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_param_typed() {
        let p = ToolParam::typed("name", "str");
        assert_eq!(p.name, "name");
        assert_eq!(p.r#type, "str");
        assert!(p.required);
    }

    #[test]
    fn tool_param_optional() {
        let p = ToolParam::optional("name", "int");
        assert_eq!(p.name, "name");
        assert_eq!(p.r#type, "int");
        assert!(!p.required);
    }

    #[test]
    fn signature_required_params() {
        let td = ToolDefinition {
            name: "foo".into(),
            description: String::new(),
            params: vec![ToolParam::typed("x", "int"), ToolParam::typed("y", "str")],
            returns: "bool".into(),
            hidden: false,
        };
        assert_eq!(td.signature(), "foo(x: int, y: str) -> bool");
    }

    #[test]
    fn signature_optional_params() {
        let td = ToolDefinition {
            name: "bar".into(),
            description: String::new(),
            params: vec![ToolParam::optional("limit", "int")],
            returns: "list".into(),
            hidden: false,
        };
        assert_eq!(td.signature(), "bar(limit: int = None) -> list");
    }

    #[test]
    fn signature_empty_returns_defaults_to_any() {
        let td = ToolDefinition {
            name: "f".into(),
            description: String::new(),
            params: vec![],
            returns: String::new(),
            hidden: false,
        };
        assert_eq!(td.signature(), "f() -> any");
    }

    #[test]
    fn format_tool_docs_with_descriptions() {
        let tools = vec![ToolDefinition {
            name: "read".into(),
            description: "Read a file".into(),
            params: vec![ToolParam {
                name: "path".into(),
                r#type: "str".into(),
                description: "File path".into(),
                required: true,
            }],
            returns: "str".into(),
            hidden: false,
        }];
        let docs = ToolDefinition::format_tool_docs(&tools);
        assert!(docs.contains("- `read(path: str) -> str`"));
        assert!(docs.contains("— Read a file"));
        assert!(docs.contains("- `path`: File path"));
    }

    #[test]
    fn format_tool_docs_empty() {
        let docs = ToolDefinition::format_tool_docs(&[]);
        assert!(docs.is_empty());
    }
}
