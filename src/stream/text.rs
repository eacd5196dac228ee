use crate::protocol::chunk::OutputChunk;
use crate::stream::session::OpenText;
use crate::stream::transcoder::ChunkTransformer;

impl ChunkTransformer {
    /// Open a new text segment, closing whatever block was open before it.
    pub(super) fn open_text(&mut self, out: &mut Vec<OutputChunk>) {
        self.close_text(out);
        self.close_tool(out);
        self.close_thinking(out);

        let id = self.session.next_text_id();
        out.push(OutputChunk::TextStart { id: id.clone() });
        self.session.open_text = Some(OpenText { id });
    }

    /// Append a text fragment, opening a segment when deltas arrive before
    /// any block-start marker.
    pub(super) fn append_text(&mut self, delta: String, out: &mut Vec<OutputChunk>) {
        if self.session.open_text.is_none() {
            self.open_text(out);
        }
        self.session.text_streamed_this_turn = true;
        if let Some(text) = self.session.open_text.as_ref() {
            out.push(OutputChunk::TextDelta {
                id: text.id.clone(),
                delta,
            });
        }
    }

    pub(super) fn close_text(&mut self, out: &mut Vec<OutputChunk>) {
        let Some(text) = self.session.open_text.take() else {
            return;
        };
        out.push(OutputChunk::TextEnd {
            id: text.id.clone(),
        });
        self.session.last_closed_text_id = Some(text.id);
    }

    /// Emit a complete text segment reported only in a monolithic message.
    pub(super) fn emit_monolithic_text(&mut self, text: String, out: &mut Vec<OutputChunk>) {
        if text.is_empty() {
            return;
        }
        self.open_text(out);
        self.append_text(text, out);
        self.close_text(out);
    }
}
