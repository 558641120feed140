//! Turn execution loop: calls the model, interprets its stop condition,
//! dispatches requested tools in ordered phases and feeds results back.
//!
//! The same loop drives both transports. [`run_streaming`] spawns it with a
//! channel sink and hands back the receiver; [`TurnEngine::run_batch`]
//! records every event into an [`ExecutionLog`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::Instrument;

use gw_domain::config::{ResolvedProfile, SuggestionsConfig};
use gw_domain::stream::{TurnEvent, Usage};
use gw_domain::tool::{ContentPart, Message, ToolCall, ToolResult};
use gw_domain::turn::{ExecutionLog, StopReason};
use gw_providers::{ChatRequest, ChatResponse, LlmProvider};
use gw_tools::{phase_of, CatalogSnapshot, Phase, ToolCatalog, ToolContext, ToolDispatcher, Truncator};

use super::{preview, suggestions};

/// Appended after a response cut short by the output token budget.
pub const CONTINUE_AFTER_MAX_TOKENS: &str = "Continue from where you stopped. Do not repeat yourself.";
/// Appended after a cooperative pause.
pub const CONTINUE_AFTER_PAUSE: &str = "Continue.";

/// Stand-in for an interrupted turn that produced no text, keeping role
/// alternation legal.
const EMPTY_PARTIAL: &str = "(no output)";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event sinks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where run events go as they happen.
#[async_trait::async_trait]
pub trait TurnSink: Send {
    async fn emit(&mut self, event: TurnEvent);
}

/// Forwards events to a live transport.
pub struct ChannelSink(pub mpsc::Sender<TurnEvent>);

#[async_trait::async_trait]
impl TurnSink for ChannelSink {
    async fn emit(&mut self, event: TurnEvent) {
        // A closed receiver means the client went away; the run still
        // finishes so its tool side effects stay consistent.
        let _ = self.0.send(event).await;
    }
}

#[async_trait::async_trait]
impl TurnSink for ExecutionLog {
    async fn emit(&mut self, event: TurnEvent) {
        self.record(&event);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run parameters / outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Input to a single run.
#[derive(Debug, Clone)]
pub struct RunInput {
    /// Seed conversation; normally a single user message.
    pub messages: Vec<Message>,
    pub profile: ResolvedProfile,
    /// Identity forwarded to the storage service.
    pub caller: Option<String>,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub success: bool,
    pub turns: u32,
    pub max_reached: bool,
    /// Final answer text, including any continuation segments.
    pub content: String,
    pub suggestions: Vec<String>,
    pub usage: Usage,
    #[serde(skip)]
    pub conversation: Vec<Message>,
}

/// Engine states. Handling states carry the response that led to them;
/// tool use also keeps the catalog snapshot the model was offered.
#[derive(Debug)]
enum TurnState {
    AwaitingModelResponse,
    HandlingToolUse(ChatResponse, Arc<CatalogSnapshot>),
    HandlingPause(ChatResponse),
    HandlingMaxTokens(ChatResponse),
    Done { max_reached: bool },
    Failed,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TurnEngine {
    provider: Arc<dyn LlmProvider>,
    catalog: Arc<ToolCatalog>,
    dispatcher: Arc<ToolDispatcher>,
    truncator: Truncator,
    suggestions: SuggestionsConfig,
}

/// Mutable state of one run. Owned by the loop, never shared.
struct RunState {
    conversation: Vec<Message>,
    turns: u32,
    answer: String,
    suggestions: Vec<String>,
    usage: Usage,
}

impl TurnEngine {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        catalog: Arc<ToolCatalog>,
        dispatcher: Arc<ToolDispatcher>,
        truncator: Truncator,
        suggestions: SuggestionsConfig,
    ) -> Self {
        Self {
            provider,
            catalog,
            dispatcher,
            truncator,
            suggestions,
        }
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Batch variant: run to completion and return the audit trail.
    pub async fn run_batch(&self, input: RunInput) -> (RunOutcome, ExecutionLog) {
        let mut log = ExecutionLog::new();
        let outcome = self.run(input, &mut log).await;
        (outcome, log)
    }

    /// Drive one run to a terminal state, emitting events into `sink`.
    pub async fn run<S: TurnSink>(&self, input: RunInput, sink: &mut S) -> RunOutcome {
        let RunInput { messages, profile, caller } = input;
        let model = profile
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string());
        let system = profile.system_instructions();

        let mut run = RunState {
            conversation: messages,
            turns: 0,
            answer: String::new(),
            suggestions: Vec::new(),
            usage: Usage::default(),
        };

        let mut state = TurnState::AwaitingModelResponse;
        let final_state = loop {
            state = match state {
                TurnState::AwaitingModelResponse => {
                    if run.turns >= profile.max_turns {
                        tracing::info!(turns = run.turns, "turn budget exhausted");
                        TurnState::Done { max_reached: true }
                    } else {
                        run.turns += 1;
                        self.await_model(&mut run, &profile, &model, &system, sink).await
                    }
                }
                TurnState::HandlingToolUse(resp, catalog) => {
                    self.handle_tool_use(&mut run, resp, &catalog, caller.as_deref(), sink).await;
                    TurnState::AwaitingModelResponse
                }
                TurnState::HandlingMaxTokens(resp) => {
                    append_partial(&mut run.conversation, resp.content, CONTINUE_AFTER_MAX_TOKENS);
                    TurnState::AwaitingModelResponse
                }
                TurnState::HandlingPause(resp) => {
                    append_partial(&mut run.conversation, resp.content, CONTINUE_AFTER_PAUSE);
                    TurnState::AwaitingModelResponse
                }
                terminal @ (TurnState::Done { .. } | TurnState::Failed) => break terminal,
            };
        };

        let (success, max_reached) = match final_state {
            TurnState::Done { max_reached } => {
                sink.emit(TurnEvent::Done { turns: run.turns, max_reached }).await;
                (true, max_reached)
            }
            _ => (false, false),
        };

        tracing::info!(
            turns = run.turns,
            success,
            max_reached,
            prompt_tokens = run.usage.prompt_tokens,
            completion_tokens = run.usage.completion_tokens,
            "run finished"
        );

        RunOutcome {
            success,
            turns: run.turns,
            max_reached,
            content: run.answer,
            suggestions: run.suggestions,
            usage: run.usage,
            conversation: run.conversation,
        }
    }

    /// One model call plus the stop-condition branch.
    async fn await_model<S: TurnSink>(
        &self,
        run: &mut RunState,
        profile: &ResolvedProfile,
        model: &str,
        system: &str,
        sink: &mut S,
    ) -> TurnState {
        sink.emit(TurnEvent::Thinking { turn: run.turns }).await;

        let catalog = self.catalog.snapshot().await;
        let req = ChatRequest {
            messages: run.conversation.clone(),
            tools: catalog.tools.clone(),
            native_tools: catalog.native.clone(),
            system: Some(system.to_string()),
            temperature: profile.temperature,
            max_tokens: Some(profile.max_tokens),
            model: Some(model.to_string()),
        };

        let llm_span = tracing::info_span!(
            "llm.call",
            "otel.kind" = "CLIENT",
            turn = run.turns,
            model = %model,
            input_tokens = tracing::field::Empty,
            output_tokens = tracing::field::Empty,
        );
        let resp = match self.provider.chat(req).instrument(llm_span.clone()).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(turn = run.turns, error = %e, "model call failed");
                sink.emit(TurnEvent::Error {
                    error: format!("model call failed: {e}"),
                    stop_reason: None,
                })
                .await;
                return TurnState::Failed;
            }
        };
        if let Some(u) = &resp.usage {
            llm_span.record("input_tokens", u.prompt_tokens);
            llm_span.record("output_tokens", u.completion_tokens);
            run.usage.add(u);
        }
        tracing::debug!(turn = run.turns, stop_reason = resp.stop_reason.as_str(), "model responded");

        let text = resp.text();
        if !text.is_empty() {
            sink.emit(TurnEvent::Text { content: text.clone() }).await;
        }

        match resp.stop_reason {
            StopReason::EndTurn => {
                run.answer.push_str(&text);
                run.conversation.push(Message::assistant_parts(resp.content));
                if self.suggestions.enabled {
                    if let Some(list) = suggestions::generate(
                        self.provider.as_ref(),
                        &self.suggestions,
                        model,
                        &run.conversation,
                        &run.answer,
                    )
                    .await
                    {
                        sink.emit(TurnEvent::Suggestions { suggestions: list.clone() }).await;
                        run.suggestions = list;
                    }
                }
                TurnState::Done { max_reached: false }
            }
            StopReason::ToolUse => {
                // Narration ahead of tool calls is not part of the answer.
                run.answer.clear();
                TurnState::HandlingToolUse(resp, catalog)
            }
            StopReason::MaxTokens => {
                run.answer.push_str(&text);
                TurnState::HandlingMaxTokens(resp)
            }
            StopReason::PauseTurn => {
                run.answer.push_str(&text);
                TurnState::HandlingPause(resp)
            }
            StopReason::Other(reason) => {
                tracing::warn!(turn = run.turns, stop_reason = %reason, "unexpected stop reason");
                sink.emit(TurnEvent::Error {
                    error: format!("unexpected stop reason: {reason}"),
                    stop_reason: Some(reason),
                })
                .await;
                TurnState::Failed
            }
        }
    }

    /// Execute every requested tool, phase by phase, and answer each
    /// invocation with exactly one tool-result block.
    async fn handle_tool_use<S: TurnSink>(
        &self,
        run: &mut RunState,
        resp: ChatResponse,
        catalog: &CatalogSnapshot,
        caller: Option<&str>,
        sink: &mut S,
    ) {
        let calls = resp.tool_calls();
        run.conversation.push(Message::assistant_parts(resp.content));

        if calls.is_empty() {
            // tool_use without invocations; nothing to answer.
            tracing::warn!(turn = run.turns, "tool_use stop without tool calls");
            run.conversation.push(Message::user(CONTINUE_AFTER_PAUSE));
            return;
        }

        let mut phases: BTreeMap<Phase, Vec<usize>> = BTreeMap::new();
        for (idx, call) in calls.iter().enumerate() {
            phases.entry(phase_of(&call.tool_name)).or_default().push(idx);
        }

        let mut answers: Vec<Option<ContentPart>> = vec![None; calls.len()];

        for (phase, indices) in phases {
            tracing::debug!(?phase, count = indices.len(), "dispatching tool phase");
            let batch: Vec<&ToolCall> = indices.iter().map(|&i| &calls[i]).collect();
            let results = self.run_phase(&batch, catalog, caller, sink).await;

            for (&idx, result) in indices.iter().zip(results) {
                let call = &calls[idx];
                let content = self.truncator.render(&result.payload());
                let event = match &result {
                    ToolResult::Success(_) => TurnEvent::ToolResult {
                        id: call.call_id.clone(),
                        tool: call.tool_name.clone(),
                        success: true,
                        summary: Some(preview(&content, 200)),
                        error: None,
                    },
                    ToolResult::Failure(msg) => TurnEvent::ToolResult {
                        id: call.call_id.clone(),
                        tool: call.tool_name.clone(),
                        success: false,
                        summary: None,
                        error: Some(msg.clone()),
                    },
                };
                sink.emit(event).await;
                answers[idx] = Some(ContentPart::tool_result(
                    call.call_id.clone(),
                    content,
                    !result.is_success(),
                ));
            }
        }

        run.conversation
            .push(Message::tool_results(answers.into_iter().flatten().collect()));
    }

    /// Run one phase concurrently, forwarding progress notes as they come.
    async fn run_phase<S: TurnSink>(
        &self,
        calls: &[&ToolCall],
        catalog: &CatalogSnapshot,
        caller: Option<&str>,
        sink: &mut S,
    ) -> Vec<ToolResult> {
        for call in calls {
            sink.emit(TurnEvent::ToolCall {
                id: call.call_id.clone(),
                tool: call.tool_name.clone(),
                input: call.arguments.clone(),
            })
            .await;
        }

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let ctx = ToolContext::new(caller.map(str::to_string)).with_progress(progress_tx);

        let fanout = futures_util::future::join_all(calls.iter().map(|call| {
            let span = tracing::info_span!("tool.call", tool = %call.tool_name, id = %call.call_id);
            self.dispatcher
                .execute(&call.tool_name, &call.arguments, &ctx, catalog)
                .instrument(span)
        }));
        tokio::pin!(fanout);

        let results = loop {
            tokio::select! {
                results = &mut fanout => break results,
                Some(note) = progress_rx.recv() => {
                    sink.emit(TurnEvent::ToolProgress { tool: note.tool, message: note.message }).await;
                }
            }
        };
        while let Ok(note) = progress_rx.try_recv() {
            sink.emit(TurnEvent::ToolProgress { tool: note.tool, message: note.message }).await;
        }
        results
    }
}

/// Keep an interrupted response in the conversation and ask for more.
///
/// Tool invocations are dropped from the partial content: they were never
/// executed and would otherwise be left unanswered.
fn append_partial(conversation: &mut Vec<Message>, content: Vec<ContentPart>, instruction: &str) {
    let mut kept: Vec<ContentPart> = content
        .into_iter()
        .filter(|p| !matches!(p, ContentPart::ToolUse { .. }))
        .collect();
    if kept.is_empty() {
        kept.push(ContentPart::text(EMPTY_PARTIAL));
    }
    conversation.push(Message::assistant_parts(kept));
    conversation.push(Message::user(instruction));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Spawn a run and return its id plus the live event channel.
///
/// The channel closes after the terminal `done` or `error` event.
pub fn run_streaming(engine: Arc<TurnEngine>, input: RunInput) -> (uuid::Uuid, mpsc::Receiver<TurnEvent>) {
    let (tx, rx) = mpsc::channel::<TurnEvent>(64);
    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("run", %run_id, streaming = true, "otel.kind" = "SERVER");

    tokio::spawn(
        async move {
            tracing::debug!("run started");
            let mut sink = ChannelSink(tx);
            engine.run(input, &mut sink).await;
        }
        .instrument(span),
    );

    (run_id, rx)
}
