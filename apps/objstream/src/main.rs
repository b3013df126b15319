//! objstream - stream files to and from S3-compatible object storage.
//!
//! Thin glue around the transfer engines: it wires a local file (or
//! stdin/stdout) to the buffered upload engine or the demand-driven
//! download engine and maps the terminal signal to an exit code.
//! Completion exits 0; any error prints a diagnostic and exits 1.
//!
//! # Usage
//!
//! ```text
//! objstream upload <bucket> <key> [file]     # file or stdin
//! objstream download <bucket> <key> [file]   # file or stdout
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OBJSTREAM_THRESHOLD_BYTES` | `10485760` | Segment flush threshold |
//! | `OBJSTREAM_CONTENT_MD5` | `false` | Per-segment Content-MD5 checksums |
//! | `OBJSTREAM_DIGEST` | *(unset)* | `rolling`, or a fixed digest value |
//! | `OBJSTREAM_UNSIGNED` | `false` | Open downloads without signing |
//! | `LOG_LEVEL` | `warn` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |
//!
//! Endpoint, region, and credentials resolve through the standard AWS
//! environment (`AWS_ENDPOINT_URL`, `AWS_REGION`, ...).

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use bytes::Bytes;
use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::info;
use tracing_subscriber::EnvFilter;

use objstream_core::config::{DEFAULT_SEGMENT_BYTES, DigestStrategy, TransferConfig};
use objstream_core::{BlobWriter, ObjectReader};
use objstream_model::Locator;
use objstream_s3::S3RemoteStore;

/// Read/write unit for local I/O and download demand.
const CHUNK_BYTES: usize = 256 * 1024;

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` value.
fn init_tracing() -> Result<()> {
    let filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = env::var("LOG_LEVEL").unwrap_or_else(|_| "warn".to_owned());
        EnvFilter::try_new(&level).with_context(|| format!("invalid log level filter: {level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    Ok(())
}

fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Build the transfer configuration from the environment.
fn transfer_config(locator: Locator) -> Result<TransferConfig> {
    let threshold_bytes = match env::var("OBJSTREAM_THRESHOLD_BYTES") {
        Ok(value) => value
            .parse::<usize>()
            .with_context(|| format!("invalid OBJSTREAM_THRESHOLD_BYTES: {value}"))?,
        Err(_) => DEFAULT_SEGMENT_BYTES,
    };

    let digest = match env::var("OBJSTREAM_DIGEST") {
        Ok(value) if value.eq_ignore_ascii_case("rolling") => DigestStrategy::Rolling,
        Ok(value) if !value.is_empty() => DigestStrategy::Fixed(value),
        _ => DigestStrategy::None,
    };

    let config = TransferConfig::builder()
        .locator(locator)
        .threshold_bytes(threshold_bytes)
        .content_integrity_check(
            env::var("OBJSTREAM_CONTENT_MD5").is_ok_and(|value| parse_bool(&value)),
        )
        .digest(digest)
        .unauthenticated_request(
            env::var("OBJSTREAM_UNSIGNED").is_ok_and(|value| parse_bool(&value)),
        )
        .build();
    config.validate()?;
    Ok(config)
}

/// Stream local bytes into a multi-part upload.
async fn upload(config: TransferConfig, file: Option<&str>) -> Result<()> {
    let store = Arc::new(S3RemoteStore::connect().await);
    let mut writer = BlobWriter::new(store, &config)?;

    let mut input: Box<dyn tokio::io::AsyncRead + Unpin> = match file {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("cannot open {path}"))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };

    let mut buffer = vec![0u8; CHUNK_BYTES];
    loop {
        let read = input.read(&mut buffer).await.context("reading input")?;
        if read == 0 {
            break;
        }
        writer.write(Bytes::copy_from_slice(&buffer[..read]))?;
    }

    let receipt = writer.finish(None).await?;
    info!(
        locator = %config.locator,
        etag = ?receipt.etag,
        "upload completed"
    );
    Ok(())
}

/// Stream a remote object to local bytes.
async fn download(config: TransferConfig, file: Option<&str>) -> Result<()> {
    let store = Arc::new(S3RemoteStore::connect().await);
    let (mut reader, metadata) = ObjectReader::new(store, &config)?;

    let mut output: Box<dyn tokio::io::AsyncWrite + Unpin> = match file {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("cannot create {path}"))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };

    reader.request(CHUNK_BYTES as u64);
    while let Some(chunk) = reader.next().await {
        let chunk = chunk?;
        output.write_all(&chunk).await.context("writing output")?;
        reader.request(chunk.len() as u64);
    }
    output.flush().await.context("flushing output")?;

    if let Some(meta) = metadata.await {
        info!(
            locator = %config.locator,
            content_length = ?meta.content_length,
            content_type = ?meta.content_type,
            "download completed"
        );
    }
    Ok(())
}

async fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let (command, bucket, key, file) = match args.as_slice() {
        [command, bucket, key] => (command.as_str(), bucket, key, None),
        [command, bucket, key, file] => (command.as_str(), bucket, key, Some(file.as_str())),
        _ => bail!("usage: objstream <upload|download> <bucket> <key> [file]"),
    };

    let config = transfer_config(Locator::new(bucket, key))?;
    match command {
        "upload" => upload(config, file).await,
        "download" => download(config, file).await,
        other => bail!("unknown command: {other}"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = init_tracing() {
        eprintln!("objstream: {err:#}");
        return ExitCode::FAILURE;
    }
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("objstream: {err:#}");
            ExitCode::FAILURE
        }
    }
}
