//! Conversation state and history
//!
//! A conversation is an append-only sequence of [`Turn`]s. Each turn carries a
//! role and an ordered list of [`ContentBlock`]s. The same types are the JSON
//! wire format returned by the HTTP API.

#[cfg(test)]
mod proptests;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One item of a tool's structured result.
///
/// Tool servers return heterogeneous content (`text`, `image`, `resource`,
/// ...). Only `text` matters for flattening; everything else is kept verbatim
/// in `extra` so the raw result survives a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: Some(text.into()),
            extra: Map::new(),
        }
    }

    /// Build an item from an arbitrary JSON value without failing.
    ///
    /// Non-string `text` fields are stringified; non-object values are wrapped
    /// as `{"type": "unknown", "value": ...}`.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            let mut extra = Map::new();
            extra.insert("value".to_string(), value);
            return Self {
                kind: "unknown".to_string(),
                text: None,
                extra,
            };
        };

        let kind = match fields.remove("type") {
            Some(Value::String(kind)) => kind,
            Some(other) => other.to_string(),
            None => "unknown".to_string(),
        };
        let text = match fields.remove("text") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text),
            Some(other) => Some(other.to_string()),
        };

        Self {
            kind,
            text,
            extra: fields,
        }
    }
}

/// Concatenate the `text` of every item that has one, space separated and
/// trimmed.
pub fn flatten_text(items: &[ResultItem]) -> String {
    items
        .iter()
        .filter_map(|item| item.text.as_deref())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Content block in a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        /// Raw structured result from the tool server
        content: Vec<ResultItem>,
        /// Flattened text of `content`
        #[serde(default)]
        text: String,
        #[serde(default, skip_serializing_if = "is_false")]
        is_error: bool,
    },
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde skip_serializing_if signature
fn is_false(value: &bool) -> bool {
    !*value
}

impl ContentBlock {
    pub fn text(s: impl Into<String>) -> Self {
        ContentBlock::Text { text: s.into() }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Successful tool result; `text` is derived from `content`
    pub fn tool_result(tool_use_id: impl Into<String>, content: Vec<ResultItem>) -> Self {
        let text = flatten_text(&content);
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content,
            text,
            is_error: false,
        }
    }

    /// Synthetic result carrying an error message back to the model
    pub fn tool_error(tool_use_id: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: vec![ResultItem::text(message.clone())],
            text: message,
            is_error: true,
        }
    }
}

/// A role-tagged, ordered set of content blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Turn {
    pub fn user(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// A user turn holding a single text block
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![ContentBlock::text(text)])
    }
}

/// Append-only log of turns.
///
/// Everything appended is retained for the life of the process; only a
/// trailing window is exposed through [`History::recent_window`].
#[derive(Debug, Clone, Default)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turns: impl IntoIterator<Item = Turn>) {
        self.turns.extend(turns);
    }

    /// The last `n` turns in their original order, or everything if fewer
    /// than `n` exist.
    pub fn recent_window(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[allow(dead_code)] // Required next to len() by clippy::len_without_is_empty
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
