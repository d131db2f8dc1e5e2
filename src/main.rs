mod cli;

use livemux::{config, server};
use livemux_media::fmp4;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting livemux server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "livemux=trace,livemux_media=trace,livemux_common=debug,tower_http=debug".to_string()
        } else {
            "livemux=debug,livemux_media=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Inspect { file, samples } => inspect_file(&file, samples),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("livemux {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn inspect_file(file: &std::path::Path, samples: bool) -> Result<()> {
    let data = std::fs::read(file).with_context(|| format!("Failed to read {:?}", file))?;
    let boxes = fmp4::top_level_boxes(&data)?;

    println!("File: {}", file.display());
    println!("Size: {} bytes", data.len());
    println!("Top-level boxes: {}", boxes.len());

    let mut fragments = 0;
    let mut total_samples = 0;
    for header in &boxes {
        let name = String::from_utf8_lossy(&header.box_type);
        if &header.box_type != b"moof" {
            println!("  {} @{} ({} bytes)", name, header.offset, header.size);
            continue;
        }

        let summary = fmp4::summarize_fragment(&data[header.offset..])?;
        let span: u64 = summary.sample_durations.iter().map(|&d| d as u64).sum();
        println!(
            "  moof @{} seq={} track={} time={}ms..{}ms samples={}",
            header.offset,
            summary.sequence_number,
            summary.track_id,
            summary.base_decode_time,
            summary.base_decode_time + span,
            summary.sample_count()
        );
        if samples {
            for (i, size) in summary.sample_sizes.iter().enumerate() {
                let duration = summary.sample_durations.get(i).copied().unwrap_or(0);
                let sync = summary
                    .sample_flags
                    .get(i)
                    .is_some_and(|&f| f == fmp4::SYNC_SAMPLE_FLAGS);
                println!(
                    "      [{}] {} bytes, {}ms{}",
                    i,
                    size,
                    duration,
                    if sync { " [sync]" } else { "" }
                );
            }
        }
        fragments += 1;
        total_samples += summary.sample_count();
    }

    println!();
    println!("Fragments: {}", fragments);
    println!("Samples: {}", total_samples);

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!(
                "  Subscribe: audio={} video={} wait_keyframe={}",
                config.subscribe.sub_audio,
                config.subscribe.sub_video,
                config.subscribe.wait_keyframe
            );
            println!("  Wait timeout: {}s", config.subscribe.wait_timeout_secs);
            println!("  Test sources: {}", config.test_sources.len());
            for source in &config.test_sources {
                println!(
                    "    {} ({:?}, {} Hz tone)",
                    source.name, source.codec, source.frequency_hz
                );
            }
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}
