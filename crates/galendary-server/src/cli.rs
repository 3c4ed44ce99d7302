//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use crate::config::ServerConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "galendary-server", version, about = "GalenDARY command backend")]
pub struct Args {
    /// JSON config file. Defaults plus `GALENDARY_*` variables when omitted.
    #[arg(long, short = 'c', env = "GALENDARY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Pause before restarting a failed service, in milliseconds.
    #[arg(long)]
    pub restart_delay_ms: Option<u64>,

    /// Stop after this many restarts.
    #[arg(long)]
    pub max_restarts: Option<u32>,

    /// `text` or `json`.
    #[arg(long)]
    pub log_format: Option<String>,
}

impl Args {
    /// Flags win over file and environment.
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(ms) = self.restart_delay_ms {
            config.restart_delay_ms = ms;
        }
        if let Some(max) = self.max_restarts {
            config.max_restarts = Some(max);
        }
        if let Some(format) = &self.log_format {
            config.log.format = format.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "galendary-server",
            "--restart-delay-ms",
            "5",
            "--max-restarts",
            "2",
        ]);
        let mut config = ServerConfig::default();
        args.apply(&mut config);
        assert_eq!(config.restart_delay_ms, 5);
        assert_eq!(config.max_restarts, Some(2));
        assert_eq!(config.log.format, "text");
    }
}
