//! Conversation runtime executor
//!
//! Drives one prompt resolution: query the model, run the tools it asked
//! for, feed results back, and repeat until the model stops asking.

use super::traits::ToolExecutor;
use super::RuntimeError;
use crate::history::{ContentBlock, Turn};
use crate::llm::{LlmRequest, LlmResponse, LlmService, ToolDescriptor, Usage};
use crate::mcp::split_namespaced;
use std::sync::Arc;

/// Where a resolution currently is
#[derive(Debug)]
enum Phase {
    /// Before the prompt has been recorded
    AwaitingUser { prompt: String },
    /// About to ask the model; `prompt` is empty when reacting to tool results
    ModelQuery { prompt: String },
    /// The model answered; run the tools it requested
    ToolDispatch { response: LlmResponse },
    Done,
}

/// Outcome of a finished resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Every turn produced, from the user prompt to the final assistant turn
    pub turns: Vec<Turn>,
    pub usage: Usage,
    /// Number of model queries made
    pub rounds: usize,
}

/// Runs one resolution against a model and a tool executor.
///
/// The conversation is local to this value; the caller merges
/// [`Resolution::turns`] into long-lived history once it completes.
pub struct ConversationRuntime<T: ToolExecutor> {
    llm: Arc<dyn LlmService>,
    tools: T,
    catalog: Arc<[ToolDescriptor]>,
    max_rounds: usize,
    turns: Vec<Turn>,
    usage: Usage,
    rounds: usize,
}

impl<T: ToolExecutor> ConversationRuntime<T> {
    pub fn new(
        llm: Arc<dyn LlmService>,
        tools: T,
        catalog: Arc<[ToolDescriptor]>,
        max_rounds: usize,
    ) -> Self {
        Self {
            llm,
            tools,
            catalog,
            max_rounds,
            turns: Vec::new(),
            usage: Usage::default(),
            rounds: 0,
        }
    }

    pub async fn run(mut self, prompt: &str) -> Result<Resolution, RuntimeError> {
        let mut phase = Phase::AwaitingUser {
            prompt: prompt.to_string(),
        };

        loop {
            phase = match phase {
                Phase::AwaitingUser { prompt } => {
                    if !prompt.is_empty() {
                        tracing::info!(prompt = %prompt, "User prompt");
                        self.turns.push(Turn::user_text(prompt.clone()));
                    }
                    Phase::ModelQuery { prompt }
                }
                Phase::ModelQuery { prompt } => {
                    if self.rounds >= self.max_rounds {
                        tracing::warn!(
                            max_rounds = self.max_rounds,
                            "Round limit reached, ending resolution"
                        );
                        Phase::Done
                    } else {
                        let response = self.query_model(prompt).await?;
                        Phase::ToolDispatch { response }
                    }
                }
                Phase::ToolDispatch { response } => {
                    if self.dispatch(response).await {
                        Phase::ModelQuery {
                            prompt: String::new(),
                        }
                    } else {
                        Phase::Done
                    }
                }
                Phase::Done => break,
            };
        }

        Ok(Resolution {
            turns: self.turns,
            usage: self.usage,
            rounds: self.rounds,
        })
    }

    async fn query_model(&mut self, prompt: String) -> Result<LlmResponse, RuntimeError> {
        self.rounds += 1;
        let request = LlmRequest {
            prompt,
            messages: self.turns.clone(),
            tools: self.catalog.to_vec(),
            max_tokens: None,
        };

        let response = self.llm.create_message(&request).await?;

        if let Some(usage) = response.usage {
            self.usage.add(usage);
            tracing::info!(
                round = self.rounds,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Round usage"
            );
        }
        Ok(response)
    }

    /// Run requested tools in order and record the round.
    ///
    /// Appends one assistant turn, plus one user turn holding the successful
    /// results if there were any. Returns whether the model should be asked
    /// to react to results.
    async fn dispatch(&mut self, response: LlmResponse) -> bool {
        let mut assistant = Vec::new();
        let mut results = Vec::new();

        if let Some(text) = response.text.filter(|t| !t.is_empty()) {
            tracing::info!(text = %text, "Assistant");
            assistant.push(ContentBlock::text(text));
        }

        for call in response.tool_calls {
            tracing::info!(tool = %call.name, id = %call.id, "Tool use");

            match self.tools.invoke(&call.name, call.arguments.clone()).await {
                Ok(items) => {
                    assistant.push(ContentBlock::tool_use(&call.id, &call.name, call.arguments));
                    results.push(ContentBlock::tool_result(call.id, items));
                }
                Err(e) if e.is_routing() => {
                    tracing::warn!(tool = %call.name, error = %e, "Skipping tool call");
                }
                Err(e) => {
                    tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                    let local = split_namespaced(&call.name).map_or(call.name.as_str(), |(_, local)| local);
                    let message = format!("Error calling tool {local}: {e}");
                    assistant.push(ContentBlock::tool_use(&call.id, &call.name, call.arguments));
                    assistant.push(ContentBlock::tool_error(call.id, message));
                }
            }
        }

        self.turns.push(Turn::assistant(assistant));

        if results.is_empty() {
            false
        } else {
            self.turns.push(Turn::user(results));
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{ResultItem, Role};
    use crate::llm::LlmError;
    use crate::runtime::testing::{MockLlmService, MockToolExecutor};
    use serde_json::json;

    fn runtime(llm: &Arc<MockLlmService>, tools: &Arc<MockToolExecutor>) -> ConversationRuntime<Arc<MockToolExecutor>> {
        ConversationRuntime::new(llm.clone(), tools.clone(), tools.catalog().into(), 20)
    }

    fn tool_results(turn: &Turn) -> usize {
        turn.content
            .iter()
            .filter(|b| matches!(b, ContentBlock::ToolResult { .. }))
            .count()
    }

    #[tokio::test]
    async fn test_no_tool_calls_single_round() {
        let llm = Arc::new(MockLlmService::new());
        llm.queue_response(LlmResponse::text("Hello!").with_usage(10, 3));
        let tools = Arc::new(MockToolExecutor::new());

        let resolution = runtime(&llm, &tools).run("hi").await.unwrap();
        assert_eq!(resolution.rounds, 1);
        assert_eq!(resolution.turns.len(), 2);
        assert_eq!(resolution.turns[0], Turn::user_text("hi"));
        assert_eq!(resolution.turns[1], Turn::assistant(vec![ContentBlock::text("Hello!")]));
        assert_eq!(resolution.usage.total(), 13);
        assert!(tools.recorded_invocations().is_empty());
    }

    #[tokio::test]
    async fn test_list_dir_end_to_end() {
        let llm = Arc::new(MockLlmService::new());
        llm.queue_response(
            LlmResponse::default().with_tool_call("toolu_1", "fs::list_dir", json!({"path": "/tmp"})),
        );
        llm.queue_response(LlmResponse::text("/tmp holds a.txt and b.txt"));
        let tools = Arc::new(MockToolExecutor::new().with_tool(
            "fs::list_dir",
            vec![
                ResultItem::text("a.txt"),
                ResultItem::from_value(json!({"type": "resource", "resource": {"uri": "file:///tmp"}})),
                ResultItem::text("b.txt"),
            ],
        ));

        let resolution = runtime(&llm, &tools).run("What files are in /tmp?").await.unwrap();
        let turns = &resolution.turns;
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0], Turn::user_text("What files are in /tmp?"));
        assert_eq!(
            turns[1],
            Turn::assistant(vec![ContentBlock::tool_use("toolu_1", "fs::list_dir", json!({"path": "/tmp"}))])
        );
        assert_eq!(turns[2].role, Role::User);
        match &turns[2].content[..] {
            [ContentBlock::ToolResult { tool_use_id, content, text, is_error }] => {
                assert_eq!(tool_use_id, "toolu_1");
                assert_eq!(content.len(), 3);
                assert_eq!(text, "a.txt b.txt");
                assert!(!is_error);
            }
            other => panic!("unexpected content: {other:?}"),
        }
        assert_eq!(turns[3], Turn::assistant(vec![ContentBlock::text("/tmp holds a.txt and b.txt")]));

        assert_eq!(
            tools.recorded_invocations(),
            vec![("fs::list_dir".to_string(), json!({"path": "/tmp"}))]
        );

        // Second query sees the results and an empty prompt
        let requests = llm.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].prompt, "What files are in /tmp?");
        assert_eq!(requests[1].prompt, "");
        assert_eq!(requests[1].messages.len(), 3);
        assert_eq!(requests[1].tools.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_server_skipped() {
        let llm = Arc::new(MockLlmService::new());
        llm.queue_response(
            LlmResponse::text("Trying a tool").with_tool_call("toolu_1", "ghost::tool", json!({})),
        );
        let tools = Arc::new(MockToolExecutor::new());

        let resolution = runtime(&llm, &tools).run("do something").await.unwrap();
        assert_eq!(resolution.rounds, 1);
        assert_eq!(resolution.turns.len(), 2);
        assert_eq!(
            resolution.turns[1],
            Turn::assistant(vec![ContentBlock::text("Trying a tool")])
        );
    }

    #[tokio::test]
    async fn test_mixed_outcomes_in_one_round() {
        let llm = Arc::new(MockLlmService::new());
        llm.queue_response(
            LlmResponse::text("Several calls")
                .with_tool_call("c1", "fs::list_dir", json!({"path": "/a"}))
                .with_tool_call("c2", "malformed_name", json!({}))
                .with_tool_call("c3", "fs::read_file", json!({"path": "/secret"}))
                .with_tool_call("c4", "ghost::tool", json!({}))
                .with_tool_call("c5", "fs::list_dir", json!({"path": "/b"})),
        );
        llm.queue_response(LlmResponse::text("done"));
        let tools = Arc::new(
            MockToolExecutor::new()
                .with_tool("fs::list_dir", vec![ResultItem::text("entry")])
                .with_failure("fs::read_file", "permission denied"),
        );

        let resolution = runtime(&llm, &tools).run("go").await.unwrap();
        let turns = &resolution.turns;
        assert_eq!(turns.len(), 4);

        // Text, then tool_use per dispatched call, error result right after its call
        let assistant = &turns[1].content;
        assert_eq!(assistant.len(), 5);
        assert!(matches!(&assistant[0], ContentBlock::Text { .. }));
        assert!(matches!(&assistant[1], ContentBlock::ToolUse { id, .. } if id == "c1"));
        assert!(matches!(&assistant[2], ContentBlock::ToolUse { id, .. } if id == "c3"));
        match &assistant[3] {
            ContentBlock::ToolResult { tool_use_id, text, is_error, .. } => {
                assert_eq!(tool_use_id, "c3");
                assert!(is_error);
                assert_eq!(text, "Error calling tool read_file: permission denied");
            }
            other => panic!("unexpected block: {other:?}"),
        }
        assert!(matches!(&assistant[4], ContentBlock::ToolUse { id, .. } if id == "c5"));

        // Only the two successes land in the user turn
        assert_eq!(turns[2].role, Role::User);
        assert_eq!(tool_results(&turns[2]), 2);

        // Invoked in model order
        let names: Vec<_> = tools.recorded_invocations().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            ["fs::list_dir", "malformed_name", "fs::read_file", "ghost::tool", "fs::list_dir"]
        );
    }

    #[tokio::test]
    async fn test_only_failures_end_the_loop() {
        let llm = Arc::new(MockLlmService::new());
        llm.queue_response(LlmResponse::default().with_tool_call("c1", "fs::read_file", json!({})));
        let tools = Arc::new(MockToolExecutor::new().with_failure("fs::read_file", "boom"));

        let resolution = runtime(&llm, &tools).run("read").await.unwrap();
        assert_eq!(resolution.rounds, 1);
        assert_eq!(resolution.turns.len(), 2);
        assert_eq!(tool_results(&resolution.turns[1]), 1);
    }

    #[tokio::test]
    async fn test_model_error_fails_resolution() {
        let llm = Arc::new(MockLlmService::new());
        llm.queue_error(LlmError::server_error("overloaded"));
        let tools = Arc::new(MockToolExecutor::new());

        let err = runtime(&llm, &tools).run("hi").await.unwrap_err();
        assert!(matches!(err, RuntimeError::Model(_)));
    }

    #[tokio::test]
    async fn test_round_limit() {
        let llm = Arc::new(MockLlmService::new());
        for i in 0..5 {
            llm.queue_response(LlmResponse::default().with_tool_call(&format!("c{i}"), "fs::list_dir", json!({})));
        }
        let tools = Arc::new(MockToolExecutor::new().with_tool("fs::list_dir", vec![ResultItem::text("x")]));

        let resolution = ConversationRuntime::new(llm.clone(), tools.clone(), tools.catalog().into(), 3)
            .run("loop forever")
            .await
            .unwrap();
        assert_eq!(resolution.rounds, 3);
        assert_eq!(llm.recorded_requests().len(), 3);
        // prompt + 3 x (assistant, results)
        assert_eq!(resolution.turns.len(), 7);
    }
}
