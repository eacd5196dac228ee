use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::time::Instant;

use crate::protocol::agent::classify::ScopeChange;
use crate::util::format_block_id;

const TEXT_ID_PREFIX: &str = "text";
const THINKING_ID_PREFIX: &str = "thinking";
const COMPACTION_ID_PREFIX: &str = "compact";

/// Block indices past this are not tracked; their stop closes whatever is open.
pub(crate) const MAX_TRACKED_BLOCK_INDEX: usize = 255;

/// Content kind opened at a stream block index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    ToolUse,
    Thinking,
}

/// The single open text segment.
#[derive(Debug, Clone)]
pub struct OpenText {
    pub id: String,
}

/// The tool invocation currently receiving streamed input.
#[derive(Debug, Clone)]
pub struct OpenTool {
    pub composite_id: String,
    pub name: String,
    pub input_buffer: String,
    /// Identity was already finalized; nothing for this slot is emitted.
    pub duplicate: bool,
}

/// The reasoning block currently receiving streamed content.
#[derive(Debug, Clone)]
pub struct OpenThinking {
    pub id: String,
    pub text: String,
    pub envelope_started: bool,
}

/// Mutable state for one streamed conversation.
///
/// Created fresh per transformer and never shared; once the terminal result
/// has been processed the session is finished and takes no further input.
#[derive(Debug, Default)]
pub struct SessionState {
    pub(crate) started: bool,
    pub(crate) finished: bool,
    pub(crate) stream_started_at: Option<Instant>,
    pub(crate) session_id: Option<String>,

    pub(crate) open_text: Option<OpenText>,
    pub(crate) last_closed_text_id: Option<String>,
    pub(crate) text_streamed_this_turn: bool,

    pub(crate) open_tool: Option<OpenTool>,
    pub(crate) emitted_tool_ids: FxHashSet<String>,
    pub(crate) identity_map: FxHashMap<String, String>,
    pub(crate) parent_tool_context: Option<String>,

    pub(crate) open_thinking: Option<OpenThinking>,
    pub(crate) thinking_streamed_this_turn: bool,

    pub(crate) pending_compaction_id: Option<String>,

    block_kinds: SmallVec<[Option<BlockKind>; 4]>,
    next_text_seq: u64,
    next_thinking_seq: u64,
    next_compaction_seq: u64,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn open_text_id(&self) -> Option<&str> {
        self.open_text.as_ref().map(|text| text.id.as_str())
    }

    #[must_use]
    pub fn open_tool_id(&self) -> Option<&str> {
        self.open_tool.as_ref().map(|tool| tool.composite_id.as_str())
    }

    #[must_use]
    pub fn open_thinking_id(&self) -> Option<&str> {
        self.open_thinking.as_ref().map(|thinking| thinking.id.as_str())
    }

    #[must_use]
    pub fn last_closed_text_id(&self) -> Option<&str> {
        self.last_closed_text_id.as_deref()
    }

    #[must_use]
    pub fn parent_tool_context(&self) -> Option<&str> {
        self.parent_tool_context.as_deref()
    }

    #[must_use]
    pub fn pending_compaction_id(&self) -> Option<&str> {
        self.pending_compaction_id.as_deref()
    }

    #[must_use]
    pub fn has_emitted_tool(&self, composite_id: &str) -> bool {
        self.emitted_tool_ids.contains(composite_id)
    }

    /// Composite id recorded when `original_id` was opened.
    #[must_use]
    pub fn mapped_tool_id(&self, original_id: &str) -> Option<&str> {
        self.identity_map.get(original_id).map(String::as_str)
    }

    pub(crate) fn apply_scope(&mut self, change: ScopeChange) {
        match change {
            ScopeChange::Keep => {}
            ScopeChange::Set(parent) => self.parent_tool_context = Some(parent),
            ScopeChange::Clear => self.parent_tool_context = None,
        }
    }

    /// `parent:original` under an active parent scope, the bare id otherwise.
    #[must_use]
    pub(crate) fn composite_tool_id(&self, original_id: &str) -> String {
        match self.parent_tool_context.as_deref() {
            Some(parent) => {
                let mut id = String::with_capacity(parent.len() + 1 + original_id.len());
                id.push_str(parent);
                id.push(':');
                id.push_str(original_id);
                id
            }
            None => original_id.to_owned(),
        }
    }

    /// Whether `original_id` was already finalized, under either identity.
    #[must_use]
    pub(crate) fn tool_already_emitted(&self, original_id: &str) -> bool {
        self.emitted_tool_ids.contains(original_id)
            || self
                .identity_map
                .get(original_id)
                .is_some_and(|composite| self.emitted_tool_ids.contains(composite))
    }

    pub(crate) fn next_text_id(&mut self) -> String {
        let id = format_block_id(TEXT_ID_PREFIX, self.next_text_seq);
        self.next_text_seq += 1;
        id
    }

    pub(crate) fn next_thinking_id(&mut self) -> String {
        let id = format_block_id(THINKING_ID_PREFIX, self.next_thinking_seq);
        self.next_thinking_seq += 1;
        id
    }

    pub(crate) fn next_compaction_id(&mut self) -> String {
        let id = format_block_id(COMPACTION_ID_PREFIX, self.next_compaction_seq);
        self.next_compaction_seq += 1;
        id
    }

    pub(crate) fn record_block(&mut self, index: usize, kind: BlockKind) {
        if index > MAX_TRACKED_BLOCK_INDEX {
            tracing::debug!(index, ?kind, "block index out of tracked range");
            return;
        }
        if index >= self.block_kinds.len() {
            self.block_kinds.resize(index + 1, None);
        }
        self.block_kinds[index] = Some(kind);
    }

    pub(crate) fn take_block(&mut self, index: usize) -> Option<BlockKind> {
        self.block_kinds.get_mut(index).and_then(Option::take)
    }

    /// Per-turn state reset at an assistant turn boundary.
    pub(crate) fn reset_turn(&mut self) {
        self.text_streamed_this_turn = false;
        self.thinking_streamed_this_turn = false;
        self.block_kinds.clear();
    }
}
