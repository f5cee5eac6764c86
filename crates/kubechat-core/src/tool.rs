use crate::protocol::ToolCallRequest;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// The tools the model is allowed to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolId {
    ExecuteKubectlCommand,
}

impl ToolId {
    /// Every known tool, in the order they are offered to the model
    pub const ALL: [ToolId; 1] = [ToolId::ExecuteKubectlCommand];

    /// The function name used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExecuteKubectlCommand => "execute_kubectl_command",
        }
    }

    /// Resolve a function name produced by the model
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.name() == name)
    }

    /// The static description presented to the model
    pub fn descriptor(&self) -> ToolDescriptor {
        match self {
            Self::ExecuteKubectlCommand => ToolDescriptor {
                name: self.name().to_string(),
                description: "Executes the kubectl command against the current Kubernetes cluster"
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "command": {
                            "type": "string",
                            "description": "The kubectl command to execute",
                        },
                    },
                    "required": ["command"],
                }),
            },
        }
    }
}

/// Name, description and parameter schema of a callable tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,

    /// JSON schema of the arguments object
    pub parameters: Value,
}

/// A capability the model can invoke
///
/// Implementations never fail: whatever happens is rendered as text so the
/// model can reason about it.
pub trait Tool {
    fn id(&self) -> ToolId;

    fn execute(&self, arguments: &Map<String, Value>) -> String;
}

/// Errors raised when dispatching a tool call
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ToolError {
    #[error("the model requested unknown tool '{0}'")]
    UnknownTool(String),
    #[error("no capability registered for tool '{}'", .0.name())]
    NotRegistered(ToolId),
}

/// Maps tool identifiers to the capabilities that execute them
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool, replacing any previous capability with the same id
    pub fn register(mut self, tool: Box<dyn Tool>) -> Self {
        self.tools.retain(|existing| existing.id() != tool.id());
        self.tools.push(tool);
        self
    }

    /// Descriptors for every registered tool, in registration order
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|tool| tool.id().descriptor()).collect()
    }

    /// Run the tool named by a call and return its textual result
    pub fn dispatch(&self, call: &ToolCallRequest) -> Result<String, ToolError> {
        let id = ToolId::from_name(&call.function_name)
            .ok_or_else(|| ToolError::UnknownTool(call.function_name.clone()))?;

        let tool = self
            .tools
            .iter()
            .find(|tool| tool.id() == id)
            .ok_or(ToolError::NotRegistered(id))?;

        Ok(tool.execute(&call.arguments))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;
    impl Tool for Echo {
        fn id(&self) -> ToolId {
            ToolId::ExecuteKubectlCommand
        }

        fn execute(&self, arguments: &Map<String, Value>) -> String {
            arguments
                .get("command")
                .and_then(Value::as_str)
                .unwrap_or("<none>")
                .to_string()
        }
    }

    fn call(name: &str, command: &str) -> ToolCallRequest {
        let mut arguments = Map::new();
        arguments.insert("command".to_string(), Value::from(command));
        ToolCallRequest {
            id: "call_1".to_string(),
            function_name: name.to_string(),
            arguments,
        }
    }

    #[test]
    fn test_tool_id_round_trips_through_name() {
        assert_eq!(
            ToolId::from_name("execute_kubectl_command"),
            Some(ToolId::ExecuteKubectlCommand)
        );
        assert_eq!(ToolId::from_name("execute_shell"), None);
    }

    #[test]
    fn test_kubectl_descriptor_requires_command() {
        let descriptor = ToolId::ExecuteKubectlCommand.descriptor();
        assert_eq!(descriptor.name, "execute_kubectl_command");
        assert_eq!(descriptor.parameters["required"], json!(["command"]));
        assert_eq!(
            descriptor.parameters["properties"]["command"]["type"],
            json!("string")
        );
    }

    #[test]
    fn test_dispatch_known_tool() {
        let registry = ToolRegistry::new().register(Box::new(Echo));
        let output = registry
            .dispatch(&call("execute_kubectl_command", "get pods"))
            .unwrap();
        assert_eq!(output, "get pods");
    }

    #[test]
    fn test_dispatch_unknown_tool() {
        let registry = ToolRegistry::new().register(Box::new(Echo));
        let err = registry.dispatch(&call("rm_rf", "/")).unwrap_err();
        assert_eq!(err, ToolError::UnknownTool("rm_rf".to_string()));
    }

    #[test]
    fn test_dispatch_known_but_unregistered() {
        let registry = ToolRegistry::new();
        let err = registry
            .dispatch(&call("execute_kubectl_command", "get pods"))
            .unwrap_err();
        assert_eq!(err, ToolError::NotRegistered(ToolId::ExecuteKubectlCommand));
    }

    #[test]
    fn test_register_replaces_same_id() {
        let registry = ToolRegistry::new()
            .register(Box::new(Echo))
            .register(Box::new(Echo));
        assert_eq!(registry.descriptors(), vec![ToolId::ExecuteKubectlCommand.descriptor()]);
    }
}
