use anyhow::Context;

use crate::core::{ComponentLogger, LogContext, Shutdown, ShutdownReason};

/// Routes SIGINT / SIGTERM / SIGHUP into `shutdown`. Once per process.
pub fn install_signal_handler(shutdown: Shutdown, ctx: LogContext) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        if shutdown.request(ShutdownReason::Signal) {
            ctx.info("termination signal received");
        }
    })
    .context("installing signal handler")?;
    Ok(())
}
