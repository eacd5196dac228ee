use super::{
    AgentEvent, CompactMetadata, MessageBlock, RawStreamEvent, ResultEvent, SessionInit,
    StreamContentBlock, StreamDelta, SystemEvent, UserBlock, UserContent,
};

/// How an event affects the active parent-tool scope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScopeChange {
    /// The event carries no scope marker.
    #[default]
    Keep,
    Set(String),
    Clear,
}

impl ScopeChange {
    fn from_marker(marker: Option<Option<String>>) -> Self {
        match marker {
            None => ScopeChange::Keep,
            Some(Some(parent)) if !parent.is_empty() => ScopeChange::Set(parent),
            Some(_) => ScopeChange::Clear,
        }
    }
}

/// A tool result reported back by the runtime, keyed by the upstream tool-use id.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub tool_use_id: String,
    pub content: serde_json::Value,
    pub is_error: bool,
}

/// Closed set of handler paths an input event can take.
#[derive(Debug, Clone)]
pub enum EventKind {
    TurnStart,
    TextStart { index: usize, text: String },
    TextDelta { index: usize, text: String },
    ToolStart { index: usize, id: String, name: String },
    ToolInputDelta { index: usize, fragment: String },
    ThinkingStart { index: usize, text: String },
    ThinkingDelta { index: usize, text: String },
    BlockStop { index: usize },
    AssistantMessage(Vec<MessageBlock>),
    ToolResults(Vec<ToolResult>),
    SessionInit(SessionInit),
    Compacting,
    CompactBoundary(Option<CompactMetadata>),
    Result(Box<ResultEvent>),
    Ignored,
}

/// An input event narrowed to its handler path plus its scope marker.
#[derive(Debug, Clone)]
pub struct ClassifiedEvent {
    pub scope: ScopeChange,
    pub kind: EventKind,
}

impl ClassifiedEvent {
    fn unscoped(kind: EventKind) -> Self {
        Self {
            scope: ScopeChange::Keep,
            kind,
        }
    }
}

/// Determine the kind (and for stream deltas, the nested block type) of one event.
///
/// Incomplete or unknown events classify as [`EventKind::Ignored`].
#[must_use]
pub fn classify(event: AgentEvent) -> ClassifiedEvent {
    match event {
        AgentEvent::StreamEvent(envelope) => ClassifiedEvent {
            scope: ScopeChange::from_marker(envelope.parent_tool_use_id),
            kind: envelope.event.map_or(EventKind::Ignored, classify_stream_event),
        },
        AgentEvent::Assistant(envelope) => ClassifiedEvent {
            scope: ScopeChange::from_marker(envelope.parent_tool_use_id),
            kind: EventKind::AssistantMessage(envelope.message.content),
        },
        AgentEvent::User(envelope) => {
            let results = match envelope.message.content {
                UserContent::Blocks(blocks) => blocks
                    .into_iter()
                    .filter_map(|block| match block {
                        UserBlock::ToolResult {
                            tool_use_id,
                            content,
                            is_error,
                        } => Some(ToolResult {
                            tool_use_id,
                            content,
                            is_error,
                        }),
                        UserBlock::Unknown => None,
                    })
                    .collect::<Vec<_>>(),
                UserContent::Text(_) => Vec::new(),
            };
            let kind = if results.is_empty() {
                EventKind::Ignored
            } else {
                EventKind::ToolResults(results)
            };
            ClassifiedEvent {
                scope: ScopeChange::from_marker(envelope.parent_tool_use_id),
                kind,
            }
        }
        AgentEvent::System(system) => ClassifiedEvent::unscoped(match system {
            SystemEvent::Init(init) => EventKind::SessionInit(init),
            SystemEvent::Status { status } => match status.as_deref() {
                Some("compacting") => EventKind::Compacting,
                _ => EventKind::Ignored,
            },
            SystemEvent::CompactBoundary { compact_metadata } => {
                EventKind::CompactBoundary(compact_metadata)
            }
            SystemEvent::Unknown => EventKind::Ignored,
        }),
        AgentEvent::Result(result) => {
            ClassifiedEvent::unscoped(EventKind::Result(Box::new(result)))
        }
        AgentEvent::Unknown => ClassifiedEvent::unscoped(EventKind::Ignored),
    }
}

fn classify_stream_event(event: RawStreamEvent) -> EventKind {
    match event {
        RawStreamEvent::MessageStart { .. } => EventKind::TurnStart,
        RawStreamEvent::ContentBlockStart {
            index,
            content_block,
        } => match content_block {
            StreamContentBlock::Text { text } => EventKind::TextStart { index, text },
            StreamContentBlock::ToolUse { id, name } => EventKind::ToolStart { index, id, name },
            StreamContentBlock::Thinking { thinking } => EventKind::ThinkingStart {
                index,
                text: thinking,
            },
            StreamContentBlock::Unknown => EventKind::Ignored,
        },
        RawStreamEvent::ContentBlockDelta { index, delta } => match delta {
            StreamDelta::TextDelta { text } => EventKind::TextDelta { index, text },
            StreamDelta::InputJsonDelta { partial_json } => EventKind::ToolInputDelta {
                index,
                fragment: partial_json,
            },
            StreamDelta::ThinkingDelta { thinking } => EventKind::ThinkingDelta {
                index,
                text: thinking,
            },
            StreamDelta::SignatureDelta { .. } | StreamDelta::Unknown => EventKind::Ignored,
        },
        RawStreamEvent::ContentBlockStop { index } => EventKind::BlockStop { index },
        RawStreamEvent::MessageDelta {}
        | RawStreamEvent::MessageStop {}
        | RawStreamEvent::Unknown => EventKind::Ignored,
    }
}
