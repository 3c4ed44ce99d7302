use std::process::ExitCode;

use clap::Parser;

use galendary_server::cli::Args;
use galendary_server::logging::{self, LogFormat};
use galendary_server::{Exit, ServerConfig, Supervisor, service};

fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("galendary-server: {}", e);
            return ExitCode::from(2);
        }
    };
    args.apply(&mut config);

    if let Err(e) = logging::init_logging(&config.log.level, LogFormat::parse(&config.log.format))
    {
        eprintln!("galendary-server: {}", e);
        return ExitCode::from(2);
    }

    let mut supervisor = Supervisor::new(config.restart_delay());
    if let Some(max) = config.max_restarts {
        supervisor = supervisor.max_restarts(max);
    }

    match supervisor.run(|| service::run(&config)) {
        Exit::Clean => ExitCode::SUCCESS,
        Exit::GaveUp(e) => {
            tracing::error!(error = %e, "Giving up");
            ExitCode::FAILURE
        }
    }
}
