//! Common types for model backend interactions

use crate::history::Turn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Request handed to a model backend
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Text the user just typed; empty when the model is reacting to tool results
    pub prompt: String,
    /// The whole conversation so far, including the prompt turn
    pub messages: Vec<Turn>,
    pub tools: Vec<ToolDescriptor>,
    pub max_tokens: Option<u32>,
}

/// Tool as advertised to the model, under its namespaced name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One assistant turn as produced by a backend
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
}

#[cfg(test)]
impl LlmResponse {
    /// Plain text answer with no tool calls
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn with_tool_call(mut self, id: &str, name: &str, arguments: Value) -> Self {
        self.tool_calls.push(ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        });
        self
    }

    pub fn with_usage(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.usage = Some(Usage {
            input_tokens,
            output_tokens,
        });
        self
    }
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn total(self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn is_zero(self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0
    }

    pub fn add(&mut self, other: Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Vendor APIs restrict tool names to `[a-zA-Z0-9_-]`, so the namespace
/// separator is rewritten on the way out and mapped back on the way in.
///
/// `fs::read__file` and `fs__read::file` encode to the same string; the later
/// catalog entry gets a numeric suffix so every wire name stays unique.
#[derive(Debug, Default)]
pub struct ToolNameMap {
    canonical_to_wire: HashMap<String, String>,
    wire_to_canonical: HashMap<String, String>,
}

impl ToolNameMap {
    pub fn new(tools: &[ToolDescriptor]) -> Self {
        let mut map = Self::default();
        for tool in tools {
            if map.canonical_to_wire.contains_key(&tool.name) {
                continue;
            }
            let base = encode_name(&tool.name);
            let mut wire = base.clone();
            let mut suffix = 2;
            while map.wire_to_canonical.contains_key(&wire) {
                wire = format!("{base}_{suffix}");
                suffix += 1;
            }
            map.canonical_to_wire.insert(tool.name.clone(), wire.clone());
            map.wire_to_canonical.insert(wire, tool.name.clone());
        }
        map
    }

    /// Names outside the catalog (e.g. from older turns) use the plain encoding
    pub fn to_wire(&self, name: &str) -> String {
        self.canonical_to_wire
            .get(name)
            .cloned()
            .unwrap_or_else(|| encode_name(name))
    }

    /// Names the model invents that are not in the catalog pass through as-is
    pub fn to_canonical(&self, wire_name: &str) -> String {
        self.wire_to_canonical
            .get(wire_name)
            .cloned()
            .unwrap_or_else(|| wire_name.to_string())
    }
}

fn encode_name(name: &str) -> String {
    name.replace(crate::mcp::SEPARATOR, "__")
}
