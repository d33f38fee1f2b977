use crate::tool::{Tool, ToolContext, ToolDefinition, ToolOrigin};
use crate::tools::{
    FetchUrlTool, ListDirectoryTool, ReadFileTool, RunCommandTool, WriteFileTool,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Manages available tools, their schemas, and lookup.
///
/// Names are unique across every origin. Registration order is kept so the
/// declarations sent to the provider are stable from round to round.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Registry preloaded with the five built-in tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for tool in builtin_tools() {
            // Built-in names are distinct, so this never collides.
            let _ = registry.register_arc(tool);
        }
        registry
    }

    /// Built-ins usable in `context`. `run_command` needs a pack directory
    /// and is left out without one.
    pub fn for_context(context: &ToolContext) -> Self {
        let mut registry = Self::new();
        for tool in builtin_tools() {
            if context.pack_directory.is_none() && tool.definition().name == RunCommandTool::NAME {
                continue;
            }
            let _ = registry.register_arc(tool);
        }
        registry
    }

    /// Register a tool. Returns error if name already registered.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let def = tool.definition();
        if let Some(&idx) = self.by_name.get(&def.name) {
            return Err(RegistryError::DuplicateName {
                name: def.name,
                existing: self.tools[idx].definition().origin,
                incoming: def.origin,
            });
        }
        self.by_name.insert(def.name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.by_name.get(name).map(|&idx| self.tools[idx].clone())
    }

    /// List all registered tool definitions (for sending to the provider).
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// True if any registered tool comes from a remote server.
    pub fn has_remote_tools(&self) -> bool {
        self.tools
            .iter()
            .any(|t| matches!(t.definition().origin, ToolOrigin::Mcp(_)))
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The fixed local tool set, in declaration order.
pub fn builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(WriteFileTool),
        Arc::new(ReadFileTool),
        Arc::new(ListDirectoryTool),
        Arc::new(FetchUrlTool),
        Arc::new(RunCommandTool),
    ]
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Tool '{name}' from {incoming} collides with the {existing} tool of the same name")]
    DuplicateName {
        name: String,
        existing: ToolOrigin,
        incoming: ToolOrigin,
    },
}
