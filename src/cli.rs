//! Command-line arguments for the gateway binary

use clap::Parser;
use std::path::PathBuf;

/// Authenticated streaming web gateway for local Ollama models
#[derive(Debug, Parser)]
#[command(name = "ollamabridge", version, about)]
pub struct Args {
    /// Path to the config file (default: ~/.ollamabridge/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port to listen on (overrides config file and PORT)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Ollama backend base URL (overrides config file and OLLAMA_HOST)
    #[arg(long)]
    pub ollama_host: Option<String>,

    /// Script tool directory (overrides config file and LUA_TOOLS_DIR)
    #[arg(long)]
    pub tools_dir: Option<PathBuf>,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_defaults() {
        let args = Args::parse_from(["ollamabridge"]);
        assert!(args.config.is_none());
        assert!(args.port.is_none());
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_args_parse_overrides() {
        let args = Args::parse_from([
            "ollamabridge",
            "--port",
            "9000",
            "--ollama-host",
            "http://gpu-box:11434",
            "-vv",
        ]);
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.ollama_host.as_deref(), Some("http://gpu-box:11434"));
        assert_eq!(args.verbose, 2);
    }
}
