//! Global logging system.

use std::{
    fs::File,
    path::Path,
    sync::Arc,
    env,
    panic,
};
use backtrace::Backtrace;
use tracing_subscriber::{
    fmt::{
        self,
        time::uptime,
    },
    prelude::*,
    Registry,
    EnvFilter,
};


/// Default logging environment filter. Our crates are debug, everything else is warn.
const DEFAULT_FILTER: &'static str =
    "warn,torus_math=debug,world_data=debug,draw_queue=debug,horizon=debug";

/// Default path of the log file.
pub const LOG_FILE_NAME: &'static str = "log";

/// Initializes a `tracing` logging backend which outputs to stdout and also a log file at the
/// given path. Accepts ecosystem-standard `RUST_LOG` env filters. If the log file cannot be
/// created, logs to stdout only. Also routes panics through the logging system.
pub fn init_logging(log_path: impl AsRef<Path>) {
    let log_path = log_path.as_ref();

    let format = fmt::format()
        .compact()
        .with_timer(uptime())
        .with_line_number(true);
    let stdout_log = fmt::layer()
        .event_format(format);

    let (log_file_log, log_file_err) = match File::create(log_path) {
        Ok(log_file) => {
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(log_file));
            (Some(layer), None)
        }
        Err(e) => (None, Some(e)),
    };

    let mut filter = DEFAULT_FILTER.to_owned();
    if let Ok(env_filter) = env::var(EnvFilter::DEFAULT_ENV) {
        filter.push(',');
        filter.push_str(&env_filter);
    }

    let subscriber = Registry::default()
        .with(EnvFilter::new(filter))
        .with(stdout_log)
        .with(log_file_log);
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("unable to install log subscriber: {}", e);
        return;
    }
    info!("starting program");
    if let Some(e) = log_file_err {
        warn!(%e, path=%log_path.display(), "unable to create log file");
    }

    // make panic messages and backtrace go through logging system
    panic::set_hook(Box::new(|info| {
        error!("{}", info);
        if env::var("RUST_BACKTRACE").map(|val| val == "1").unwrap_or(true) {
            error!("{:?}", Backtrace::new());
        }
    }));
    trace!("installed custom panic hook");
}
