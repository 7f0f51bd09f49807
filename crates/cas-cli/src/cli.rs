use std::net::SocketAddr;
use std::path::PathBuf;

use cas_types::{Digest, DigestAlgorithm};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "casd",
    about = "Content-addressable blob store daemon",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server and the idle-session reaper
    Serve(ServeArgs),
    /// Print the digest of a file
    Digest(DigestArgs),
    /// Check a file against an expected digest
    Verify(VerifyArgs),
    /// Print the effective server configuration as TOML
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Listen address, overrides the config file
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Store blobs under this directory instead of the configured backend
    #[arg(long)]
    pub root: Option<PathBuf>,
}

#[derive(Args)]
pub struct DigestArgs {
    pub file: PathBuf,
    #[arg(long, short, default_value = "sha256")]
    pub algorithm: DigestAlgorithm,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub file: PathBuf,
    pub digest: Digest,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve_defaults() {
        let cli = Cli::try_parse_from(["casd", "serve"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert!(args.config.is_none());
            assert!(args.bind.is_none());
            assert!(args.root.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_serve_overrides() {
        let cli = Cli::try_parse_from([
            "casd", "serve", "--config", "cas.toml", "--bind", "0.0.0.0:9000", "--root", "/data",
        ])
        .unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.config, Some("cas.toml".into()));
            assert_eq!(args.bind.map(|b| b.port()), Some(9000));
            assert_eq!(args.root, Some("/data".into()));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_digest_algorithm() {
        let cli = Cli::try_parse_from(["casd", "digest", "f.bin", "--algorithm", "blake3"]).unwrap();
        if let Command::Digest(args) = cli.command {
            assert_eq!(args.algorithm, DigestAlgorithm::Blake3);
        } else { panic!("wrong command"); }
        assert!(Cli::try_parse_from(["casd", "digest", "f.bin", "-a", "md5"]).is_err());
    }

    #[test]
    fn parse_verify_rejects_bad_digest() {
        assert!(Cli::try_parse_from(["casd", "verify", "f.bin", "sha256:nope"]).is_err());
    }

    #[test]
    fn global_flags() {
        let cli = Cli::try_parse_from(["casd", "digest", "f", "--format", "json", "-v"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
