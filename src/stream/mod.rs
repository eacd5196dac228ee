pub mod adapter;
pub mod ndjson;
pub mod session;
pub mod sse;
pub mod transcoder;

mod finalize;
mod status;
mod text;
mod thinking;
mod tool;

pub use adapter::{chunk_stream, ChunkStream};
pub use ndjson::{agent_event_stream, decode_agent_line, decode_agent_line_strict, LineSplitter};
pub use session::SessionState;
pub use sse::{done_marker, encode_chunk, encoded_chunk_stream};
pub use status::COMPACTION_TOOL_NAME;
pub use thinking::THINKING_TOOL_NAME;
pub use tool::{resolve_tool_input, PROVIDER_METADATA_KEY};
pub use transcoder::{ChunkTransformer, TransformOptions};
