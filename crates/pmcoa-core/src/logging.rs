//! Logging through `env_logger`, routed around indicatif progress bars

use indicatif::MultiProgress;

fn label(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    }
}

fn ansi(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    }
}

/// `debug` wins over `quiet`.
fn default_filter(quiet: bool, debug: bool) -> &'static str {
    match (debug, quiet) {
        (true, _) => "debug",
        (false, true) => "warn",
        (false, false) => "info",
    }
}

/// Prints above the batch bars so a log line never tears one.
struct BarLogger {
    filter: env_logger::Logger,
    multi: MultiProgress,
}

impl log::Log for BarLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.filter.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if self.filter.enabled(record.metadata()) {
            let level = record.level();
            let line = format!("[{}{}\x1b[0m] {}", ansi(level), label(level), record.args());
            self.multi.suspend(|| eprintln!("{line}"));
        }
    }

    fn flush(&self) {}
}

/// Initialize logging.
///
/// With `multi` (TTY), log lines are printed above the progress bars.
/// Without it, plain `[LEVEL] msg` lines go to stderr.
/// A second call is a no-op, so tests and embedders can call it freely.
pub fn init_logging(quiet: bool, debug: bool, multi: Option<&MultiProgress>) {
    use std::io::Write;

    let env = env_logger::Env::default().default_filter_or(default_filter(quiet, debug));

    if let Some(multi) = multi {
        let filter = env_logger::Builder::from_env(env).build();
        let max_level = filter.filter();
        let logger = BarLogger {
            filter,
            multi: multi.clone(),
        };
        if log::set_boxed_logger(Box::new(logger)).is_ok() {
            log::set_max_level(max_level);
        }
    } else {
        let _ = env_logger::Builder::from_env(env)
            .format(|buf, record| writeln!(buf, "[{}] {}", label(record.level()), record.args()))
            .try_init();
    }
}
