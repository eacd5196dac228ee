use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures_util::Stream;
use pin_project_lite::pin_project;

use crate::config::CancelPolicy;
use crate::protocol::agent::AgentEvent;
use crate::protocol::chunk::OutputChunk;
use crate::stream::transcoder::ChunkTransformer;

pin_project! {
    /// Drives a [`ChunkTransformer`] from a fallible event stream.
    ///
    /// When the source ends without a terminal result, the transformer's
    /// [`CancelPolicy`] decides whether open blocks are flushed with an
    /// `abort` chunk or left open. A source error is yielded after any
    /// chunks it flushed, then the stream ends.
    pub struct ChunkStream<S, E> {
        #[pin]
        source: S,
        transformer: ChunkTransformer,
        pending: VecDeque<OutputChunk>,
        scratch: Vec<OutputChunk>,
        error: Option<E>,
        source_done: bool,
    }
}

impl<S, E> ChunkStream<S, E>
where
    S: Stream<Item = Result<AgentEvent, E>>,
{
    pub fn new(source: S, transformer: ChunkTransformer) -> Self {
        Self {
            source,
            transformer,
            pending: VecDeque::with_capacity(8),
            scratch: Vec::with_capacity(8),
            error: None,
            source_done: false,
        }
    }

    #[must_use]
    pub fn transformer(&self) -> &ChunkTransformer {
        &self.transformer
    }
}

/// Wrap an event stream so it yields UI chunks.
pub fn chunk_stream<S, E>(source: S, transformer: ChunkTransformer) -> ChunkStream<S, E>
where
    S: Stream<Item = Result<AgentEvent, E>>,
{
    ChunkStream::new(source, transformer)
}

fn end_of_source(transformer: &mut ChunkTransformer, out: &mut Vec<OutputChunk>) {
    if transformer.is_finished() {
        return;
    }
    match transformer.options().cancel_policy {
        CancelPolicy::Flush => transformer.abort_into(out),
        CancelPolicy::LeaveOpen => {
            tracing::debug!("event source ended before result, leaving blocks open");
        }
    }
}

impl<S, E> Stream for ChunkStream<S, E>
where
    S: Stream<Item = Result<AgentEvent, E>>,
{
    type Item = Result<OutputChunk, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if let Some(chunk) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(chunk)));
            }
            if *this.source_done {
                return Poll::Ready(this.error.take().map(Err));
            }

            match ready!(this.source.as_mut().poll_next(cx)) {
                Some(Ok(event)) => {
                    this.transformer.push_event_into(event, this.scratch);
                }
                Some(Err(err)) => {
                    *this.error = Some(err);
                    *this.source_done = true;
                    end_of_source(this.transformer, this.scratch);
                }
                None => {
                    *this.source_done = true;
                    end_of_source(this.transformer, this.scratch);
                }
            }
            this.pending.extend(this.scratch.drain(..));
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.pending.len(), None)
    }
}
