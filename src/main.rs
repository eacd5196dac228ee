use std::path::PathBuf;

use bytes::{Bytes, BytesMut};
use chunkify::config::{load_config, load_config_or_default, AppConfig};
use chunkify::error::ChunkifyError;
use chunkify::observability::init_tracing;
use chunkify::stream::{agent_event_stream, chunk_stream, encoded_chunk_stream};
use chunkify::stream::{ChunkTransformer, TransformOptions};
use futures_util::{Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const CONFIG_ENV: &str = "CHUNKIFY_CONFIG";
const READ_CHUNK_CAPACITY: usize = 16 * 1024;

fn main() {
    let config = resolve_config().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        eprintln!("Copy 'config.example.yaml' to 'config.yaml' or set {CONFIG_ENV}.");
        std::process::exit(e.exit_code());
    });

    init_tracing(&config.features.log_level);

    // stdin, stdout and fs run on the blocking pool; no I/O driver needed.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Failed to initialize Tokio runtime: {e}");
            std::process::exit(1);
        });

    let input = std::env::args_os().nth(1).map(PathBuf::from);
    if let Err(err) = runtime.block_on(run(config, input)) {
        tracing::error!(error = %err, "chunkify failed");
        eprintln!("chunkify: {err}");
        std::process::exit(err.exit_code());
    }
}

fn resolve_config() -> Result<AppConfig, ChunkifyError> {
    let config = match std::env::var(CONFIG_ENV) {
        Ok(path) if !path.is_empty() => load_config(&path)?,
        _ => load_config_or_default(DEFAULT_CONFIG_PATH)?,
    };
    Ok(config)
}

async fn run(config: AppConfig, input: Option<PathBuf>) -> Result<(), ChunkifyError> {
    let reader: Box<dyn AsyncRead + Send + Unpin> = match input {
        Some(path) if path.as_os_str() != "-" => {
            tracing::debug!(path = %path.display(), "reading agent events from file");
            Box::new(tokio::fs::File::open(&path).await?)
        }
        _ => Box::new(tokio::io::stdin()),
    };

    let options = TransformOptions::from(&config.transform);
    tracing::debug!(
        provider = %options.provider,
        cancel_policy = %options.cancel_policy,
        "starting transform"
    );

    let events = agent_event_stream(byte_stream(reader));
    let chunks = chunk_stream(events, ChunkTransformer::new(options));
    let mut frames = Box::pin(encoded_chunk_stream(
        chunks,
        config.output.format,
        config.output.emit_done_marker,
    ));

    let mut stdout = tokio::io::stdout();
    while let Some(frame) = frames.next().await {
        stdout.write_all(&frame?).await?;
        stdout.flush().await?;
    }
    Ok(())
}

fn byte_stream<R>(reader: R) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send
where
    R: AsyncRead + Send + Unpin + 'static,
{
    futures_util::stream::unfold(
        (reader, BytesMut::with_capacity(READ_CHUNK_CAPACITY)),
        |(mut reader, mut buffer)| async move {
            buffer.reserve(READ_CHUNK_CAPACITY);
            match reader.read_buf(&mut buffer).await {
                Ok(0) => None,
                Ok(_) => {
                    let bytes = buffer.split().freeze();
                    Some((Ok(bytes), (reader, buffer)))
                }
                Err(err) => Some((Err(err), (reader, buffer))),
            }
        },
    )
}
