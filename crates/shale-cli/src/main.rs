//! SHALE CLI
//!
//! Streaming Hardened At-rest Log Encryption

mod config;
mod progress;
mod sink;

use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use rand::RngCore;
use rand::rngs::OsRng;

use shale_crypto::CipherKey;
use shale_pipeline::{
    EngineConfig, FileChunk, LogEncryptionEngine, LogFileHeader, LogMessage,
};

use config::Config;
use progress::{TransformProgress, format_bytes};
use sink::FileSinkListener;

/// SHALE - streaming at-rest encryption for storage-engine log files
#[derive(Parser)]
#[command(name = "shale")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a log file
    Encrypt {
        /// File to encrypt
        input: PathBuf,

        /// Destination for the encrypted bytes
        output: PathBuf,

        /// Hex key file (overrides the config)
        #[arg(short, long)]
        key_file: Option<PathBuf>,

        /// Byte address of the file within the log
        #[arg(long, default_value_t = 0)]
        handle: u64,

        /// Keep one IV for the whole file instead of rekeying per block
        #[arg(long)]
        whole_file_iv: bool,
    },

    /// Decrypt a log file
    Decrypt {
        /// File to decrypt
        input: PathBuf,

        /// Destination for the decrypted bytes
        output: PathBuf,

        /// Hex key file (overrides the config)
        #[arg(short, long)]
        key_file: Option<PathBuf>,

        /// Byte address of the file within the log
        #[arg(long, default_value_t = 0)]
        handle: u64,

        /// Keep one IV for the whole file instead of rekeying per block
        #[arg(long)]
        whole_file_iv: bool,
    },

    /// Generate a new encryption key
    Keygen {
        /// Output file for the hex key (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(if cli.verbose { "debug" } else { "info" })
        .init();

    let config = Config::load_or_default(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        Commands::Encrypt {
            input,
            output,
            key_file,
            handle,
            whole_file_iv,
        } => transform_file(
            &config,
            TransformArgs {
                input,
                output,
                key_file,
                handle,
                chunked_iv: !whole_file_iv,
                verb: "Encrypted",
            },
        ),
        Commands::Decrypt {
            input,
            output,
            key_file,
            handle,
            whole_file_iv,
        } => transform_file(
            &config,
            TransformArgs {
                input,
                output,
                key_file,
                handle,
                chunked_iv: !whole_file_iv,
                verb: "Decrypted",
            },
        ),
        Commands::Keygen { output } => generate_key(output),
    }
}

struct TransformArgs {
    input: PathBuf,
    output: PathBuf,
    key_file: Option<PathBuf>,
    handle: u64,
    chunked_iv: bool,
    verb: &'static str,
}

/// Stream a file through the encryption pipeline.
///
/// The keystream XOR is symmetric, so the same transform serves both
/// directions; the handle and key must simply match the ones used when the
/// file was written.
fn transform_file(config: &Config, args: TransformArgs) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!("input file not found: {}", args.input.display());
    }

    let key = load_key(config, args.key_file.as_deref())?;
    let file_size = fs::metadata(&args.input)?.len();

    let engine_config = EngineConfig::new(key, config.pipeline.block_alignment)
        .with_buffer_size(config.pipeline.buffer_size)
        .with_queue_capacity(config.pipeline.queue_capacity)
        .with_poll_interval(Duration::from_millis(config.pipeline.poll_interval_ms));

    let listener = FileSinkListener::create(&args.output)?;
    let mut engine = LogEncryptionEngine::new(engine_config, Box::new(listener))?;
    engine.start()?;

    let header = Arc::new(LogFileHeader::new(
        args.handle,
        args.input.clone(),
        true,
        args.chunked_iv,
    ));
    engine.submit(LogMessage::FileHeader(Arc::clone(&header)))?;

    let bar = TransformProgress::new(file_size, &args.input.display().to_string());
    let mut reader = fs::File::open(&args.input)?;
    let mut submitted = 0u64;

    loop {
        let mut buffer = engine.alloc()?;
        let len = fill_buffer(&mut reader, &mut buffer)?;
        if len == 0 {
            break;
        }
        submitted += len as u64;
        engine.submit(LogMessage::FileChunk(FileChunk::new(
            Arc::clone(&header),
            buffer,
            len,
        )?))?;
        bar.update(submitted);
    }

    engine.submit(LogMessage::EndChunk)?;
    let stats = engine.close()?;

    bar.finish_with_message(format!(
        "{} {} ({}) -> {}",
        args.verb,
        args.input.display(),
        format_bytes(stats.bytes_processed),
        args.output.display()
    ));
    Ok(())
}

/// Read from `reader` until the buffer is full or the input ends.
fn fill_buffer(reader: &mut impl Read, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = reader.read(&mut buffer[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn load_key(config: &Config, override_path: Option<&std::path::Path>) -> anyhow::Result<CipherKey> {
    let path = override_path
        .or(config.keys.key_file.as_deref())
        .ok_or_else(|| {
            anyhow::anyhow!("no key file given; pass --key-file or set keys.key_file in the config")
        })?;
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read key file {}: {e}", path.display()))?;
    Ok(CipherKey::from_hex(&content)?)
}

fn generate_key(output: Option<PathBuf>) -> anyhow::Result<()> {
    let mut bytes = [0u8; shale_crypto::KEY_SIZE];
    OsRng.fill_bytes(&mut bytes);
    let key = CipherKey::new(bytes);

    match output {
        Some(path) => {
            fs::write(&path, format!("{}\n", key.to_hex()))?;
            println!(
                "{} key written to {}",
                style("Generated").green().bold(),
                path.display()
            );
        }
        None => println!("{}", key.to_hex()),
    }
    Ok(())
}
