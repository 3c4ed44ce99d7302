//! One service run: runtime, pool and transport built from scratch.

use std::io::{BufRead, Write};

use asupersync::runtime::RuntimeBuilder;
use galendary::{Cx, Dispatcher, ExecutionContext, Notifier, PoolFactory};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::mail::Mailer;
use crate::transport::{self, SessionStats};

/// Serve `input` on a fresh current-thread runtime.
pub fn run_with<N, F, R, W>(
    dispatcher: &Dispatcher<N>,
    context: &ExecutionContext<F>,
    input: R,
    output: &mut W,
) -> Result<SessionStats>
where
    N: Notifier,
    F: PoolFactory,
    R: BufRead,
    W: Write,
{
    let runtime = RuntimeBuilder::current_thread()
        .build()
        .map_err(|e| ServerError::Runtime(format!("{:?}", e)))?;
    let cx = Cx::for_testing();
    runtime.block_on(transport::serve(&cx, dispatcher, Some(context), input, output))
}

/// Serve stdin/stdout against the configured MySQL database.
pub fn run(config: &ServerConfig) -> Result<()> {
    let context = galendary::mysql_context(config.mysql_config()?, config.pool_config());
    let dispatcher = Dispatcher::new(Mailer::from_config(config.smtp_config()));
    tracing::info!(
        database = %config.database.host,
        mail = dispatcher.notifier().is_enabled(),
        "Service starting"
    );

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut output = stdout.lock();
    let stats = run_with(&dispatcher, &context, stdin.lock(), &mut output)?;

    if let Some(pool) = context.current_pool() {
        let pool_stats = pool.stats();
        tracing::info!(
            acquires = pool_stats.acquires,
            created = pool_stats.created,
            discarded = pool_stats.discarded,
            "Pool released"
        );
    }
    tracing::info!(
        requests = stats.requests,
        failures = stats.failures,
        "Input closed"
    );
    Ok(())
}
