use crate::config::Config;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;
use std::sync::OnceLock;

/// Set up log levels, formatting, and other configurations for the logger
///
/// Log lines are routed through the progress bar so a spinner in flight does
/// not get clobbered by output.
pub struct Logger {
    multi_progress: MultiProgress,
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

impl<'a> Logger {
    /// Initialize once with the configured level
    ///
    /// `logging.verbose` forces debug; RUST_LOG set in the terminal wins over
    /// both.
    pub fn init(config: &Config) -> &'a Self {
        let filter = if config.verbose {
            "debug"
        } else {
            config.log_level.as_filter()
        };

        LOGGER.get_or_init(|| {
            let logger = env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or(filter),
            )
            .build();

            let level = logger.filter();
            let multi_progress = MultiProgress::new();

            if LogWrapper::new(multi_progress.clone(), logger)
                .try_init()
                .is_ok()
            {
                log::set_max_level(level);
            }

            Self { multi_progress }
        })
    }

    pub fn multi_progress(&self) -> &MultiProgress {
        &self.multi_progress
    }
}
