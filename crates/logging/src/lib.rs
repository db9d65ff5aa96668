//! helpers for logging.
//!
//! Every courier binary and test calls one of these before doing anything else.  The filter comes from `RUST_LOG` as
//! usual; when unset we log at `info` so that registry summaries and desync errors are visible.
use std::io::Write;
use std::sync::Once;

static ONCE: Once = Once::new();

fn install(target: env_logger::Target) {
    ONCE.call_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .target(target)
            .format(|buf, record| {
                let now = time::OffsetDateTime::now_utc();

                writeln!(
                    buf,
                    "{} {} time={} target={}",
                    record.level(),
                    record.args(),
                    now,
                    record.target()
                )
            })
            // Tests may race another harness-installed logger; losing that race is fine.
            .try_init()
            .ok();
    });
}

/// Log to stderr.
///
/// If called multiple times in the same process, only applies once.
pub fn log_to_stderr() {
    install(env_logger::Target::Stderr);
}

/// Log to stdout.
///
/// Shares the once-only guard with [log_to_stderr]: whichever is called first wins.
pub fn log_to_stdout() {
    install(env_logger::Target::Stdout);
}
