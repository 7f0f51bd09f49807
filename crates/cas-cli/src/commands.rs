use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use cas_crypto::ContentHasher;
use cas_server::{CasServer, ServerConfig, StorageConfig};
use cas_types::{Digest, DigestAlgorithm};
use colored::Colorize;
use serde_json::json;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Digest(args) => cmd_digest(args, cli.format),
        Command::Verify(args) => cmd_verify(args, cli.format),
        Command::Config(args) => cmd_config(args),
    }
}

/// Load the config file (or defaults) and apply command-line overrides.
fn resolve_config(
    path: Option<&Path>,
    bind: Option<SocketAddr>,
    root: Option<PathBuf>,
) -> anyhow::Result<ServerConfig> {
    let mut config = match path {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = bind {
        config.bind_addr = bind;
    }
    if let Some(root) = root {
        config.storage = StorageConfig::Filesystem { root };
    }
    tracing::debug!(bind = %config.bind_addr, storage = ?config.storage, "resolved server config");
    Ok(config)
}

fn digest_file(path: &Path, algorithm: DigestAlgorithm) -> anyhow::Result<(Digest, u64)> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let size = file.metadata()?.len();
    let digest = ContentHasher::new(algorithm)
        .hash_reader(BufReader::new(file))
        .with_context(|| format!("cannot read {}", path.display()))?;
    Ok((digest, size))
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = resolve_config(args.config.as_deref(), args.bind, args.root)?;
    let storage = match &config.storage {
        StorageConfig::Memory => "memory".to_string(),
        StorageConfig::Filesystem { root } => root.display().to_string(),
    };
    let server = CasServer::new(config)?;
    println!(
        "{} casd on {} (storage: {})",
        "✓".green().bold(),
        server.config().bind_addr.to_string().bold(),
        storage.cyan()
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.serve_with_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
    }))?;
    Ok(())
}

fn cmd_digest(args: DigestArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (digest, size) = digest_file(&args.file, args.algorithm)?;
    match format {
        OutputFormat::Text => println!("{}  {}", digest.to_string().yellow(), args.file.display()),
        OutputFormat::Json => println!(
            "{}",
            json!({"file": args.file, "digest": digest, "size": size})
        ),
    }
    Ok(())
}

fn cmd_verify(args: VerifyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (actual, size) = digest_file(&args.file, args.digest.algorithm())?;
    let ok = actual == args.digest;
    match format {
        OutputFormat::Text if ok => {
            println!("{} {} matches {}", "✓".green().bold(), args.file.display(), args.digest.short_hex().yellow());
        }
        OutputFormat::Text => {
            println!("{} {} does not match", "✗".red().bold(), args.file.display());
            println!("  expected: {}", args.digest.to_string().yellow());
            println!("  actual:   {}", actual.to_string().red());
        }
        OutputFormat::Json => println!(
            "{}",
            json!({"file": args.file, "expected": args.digest, "actual": actual, "size": size, "ok": ok})
        ),
    }
    if !ok {
        anyhow::bail!("digest mismatch for {}", args.file.display());
    }
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = resolve_config(args.config.as_deref(), None, None)?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
