//! `tracing`/`tracing-subscriber` initialization driven by `-l/--log-level`.

use tracing_subscriber::EnvFilter;

/// `0` = warnings and errors only, `1` = info, `2` = debug, `3`+ = trace.
/// `SPINDLE_LOG` overrides this entirely when set.
pub fn init(log_level: u8, quiet: bool) {
    let default_directive = if quiet {
        "spindle=warn"
    } else {
        match log_level {
            0 => "spindle=warn",
            1 => "spindle=info",
            2 => "spindle=debug",
            _ => "spindle=trace",
        }
    };

    let filter = EnvFilter::try_from_env("SPINDLE_LOG").unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}
