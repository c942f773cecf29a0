//! Explicit tool registry, populated at orchestrator startup.

use super::tool::Tool;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn descriptions(&self) -> Vec<(&'static str, &'static str)> {
        self.tools.values().map(|t| (t.name(), t.description())).collect()
    }

    pub async fn invoke(&self, name: &str, args: serde_json::Value) -> anyhow::Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("unknown tool {name}"))?;
        tool.invoke(args).await
    }
}
