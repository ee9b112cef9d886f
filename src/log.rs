use std::time::Instant;

use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "FAST_LOG";

/// Installs the stderr subscriber. `default` is used when `FAST_LOG` is unset.
pub fn init(default: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (tests) is harmless.
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(filter)
        .try_init();
}

/// A named unit of work. Announced on creation, closed with its elapsed time on drop.
///
/// A section dropped without [`Section::done`] is logged as aborted, so error
/// paths still close the scope in the log.
pub struct Section {
    title: String,
    start: Instant,
    finished: bool,
}

impl Section {
    pub fn enter(title: impl Into<String>) -> Self {
        let title = title.into();
        info!("{}...", title);
        Section {
            title,
            start: Instant::now(),
            finished: false,
        }
    }

    pub fn done(mut self) {
        self.finished = true;
    }
}

impl Drop for Section {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_secs_f64();
        if self.finished {
            debug!("{} done in {:.3}s", self.title, elapsed);
        } else {
            warn!("{} aborted after {:.3}s", self.title, elapsed);
        }
    }
}
