use std::time::Duration;

use crate::observability::token_counter::{log_stream_usage, resolve_usage};
use crate::protocol::agent::ResultEvent;
use crate::protocol::chunk::OutputChunk;
use crate::stream::transcoder::ChunkTransformer;

impl ChunkTransformer {
    /// Close the stream on the terminal result event.
    ///
    /// Open blocks and any pending compaction are closed first. Then
    /// `message-metadata`, `finish-step` and `finish` follow, all carrying
    /// the same accounting payload.
    pub(super) fn finalize(&mut self, result: &ResultEvent, out: &mut Vec<OutputChunk>) {
        self.close_open_blocks(out);
        self.close_pending_compaction(out);

        if let Some(session_id) = result.session_id.as_ref() {
            self.session.session_id = Some(session_id.clone());
        }
        let usage = resolve_usage(result.usage.as_ref(), result.model_usage.as_ref());

        let mut metadata = self.base_metadata();
        metadata.input_tokens = usage.input_tokens;
        metadata.output_tokens = usage.output_tokens;
        metadata.total_tokens = usage.total_tokens();
        metadata.cache_read_input_tokens = usage.cache_read_input_tokens;
        metadata.cache_creation_input_tokens = usage.cache_creation_input_tokens;
        metadata.total_cost_usd = result.total_cost_usd;
        metadata.agent_duration_ms = result.duration_ms;
        metadata.num_turns = result.num_turns;
        metadata.is_error = result.is_error;
        metadata.model_usage = result.model_usage.clone();

        log_stream_usage(
            self.options.provider.as_str(),
            metadata.session_id.as_deref(),
            &usage,
            Duration::from_millis(metadata.duration_ms),
        );

        out.push(OutputChunk::MessageMetadata {
            message_metadata: metadata.clone(),
        });
        out.push(OutputChunk::FinishStep {
            message_metadata: metadata.clone(),
        });
        out.push(OutputChunk::Finish {
            message_metadata: metadata,
        });
        self.session.finished = true;
    }
}
