use crate::config::Config;
use crate::display;
use crate::error::Error;
use crate::runner::{Runnable, Runner};

#[derive(clap::Args, Clone)]
pub struct SlowQueriesCommand {
    /// Time range in minutes.
    /// Defaults to defaults.time_range_minutes from config.toml.
    #[arg(value_name = "MINUTES", value_parser = clap::value_parser!(u32).range(1..))]
    minutes: Option<u32>,

    /// Duration threshold in milliseconds; only strictly slower queries are shown.
    /// Defaults to defaults.slow_query_threshold_ms from config.toml.
    #[arg(value_name = "THRESHOLD_MS", value_parser = clap::value_parser!(u64).range(1..))]
    threshold: Option<u64>,
}

impl SlowQueriesCommand {
    /// Both arguments fall back to their configured defaults independently
    fn parameters(&self, config: &Config) -> (u32, u64) {
        (
            self.minutes.unwrap_or(config.time_range_minutes),
            self.threshold.unwrap_or(config.slow_query_threshold_ms),
        )
    }
}

impl Runnable for SlowQueriesCommand {
    fn runner(&self) -> impl Runner {
        SlowQueriesRunner {
            command: self.clone(),
        }
    }
}

struct SlowQueriesRunner {
    command: SlowQueriesCommand,
}

impl Runner for SlowQueriesRunner {
    /// Retrieves and displays queries above the duration threshold
    async fn run(&mut self) -> Result<(), Error> {
        let config = self.config()?;
        let (window_minutes, threshold_ms) = self.command.parameters(&config);

        let client = self.client(&config).await?;

        let spinner = self.spinner(
            &config,
            &format!(
                "Fetching queries slower than {threshold_ms}ms for the last {window_minutes} minutes"
            ),
        );
        let rows = client.slow_queries(window_minutes, threshold_ms).await;
        spinner.finish_and_clear();

        display::render_slow_queries(&rows?, window_minutes, threshold_ms);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    fn config() -> Config {
        Config {
            workspace_id: "w".into(),
            time_range_minutes: 10,
            slow_query_threshold_ms: 5000,
            log_level: LogLevel::Off,
            verbose: false,
        }
    }

    #[test]
    fn both_arguments_default_from_config() {
        let command = SlowQueriesCommand {
            minutes: None,
            threshold: None,
        };
        assert_eq!(command.parameters(&config()), (10, 5000));
    }

    #[test]
    fn arguments_override_independently() {
        let command = SlowQueriesCommand {
            minutes: Some(60),
            threshold: None,
        };
        assert_eq!(command.parameters(&config()), (60, 5000));

        let command = SlowQueriesCommand {
            minutes: None,
            threshold: Some(250),
        };
        assert_eq!(command.parameters(&config()), (10, 250));
    }
}
