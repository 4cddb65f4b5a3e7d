use crate::config::Config;
use crate::display;
use crate::error::Error;
use crate::runner::{Runnable, Runner};

#[derive(clap::Args, Clone)]
pub struct ErrorsCommand {
    /// Time range in minutes.
    /// Defaults to defaults.time_range_minutes from config.toml.
    #[arg(value_name = "MINUTES", value_parser = clap::value_parser!(u32).range(1..))]
    minutes: Option<u32>,
}

impl ErrorsCommand {
    /// CLI argument wins; the configured default covers the rest
    fn window_minutes(&self, config: &Config) -> u32 {
        self.minutes.unwrap_or(config.time_range_minutes)
    }
}

impl Runnable for ErrorsCommand {
    fn runner(&self) -> impl Runner {
        ErrorsRunner {
            command: self.clone(),
        }
    }
}

struct ErrorsRunner {
    command: ErrorsCommand,
}

impl Runner for ErrorsRunner {
    /// Retrieves and displays recent SQL errors
    async fn run(&mut self) -> Result<(), Error> {
        let config = self.config()?;
        let window_minutes = self.command.window_minutes(&config);

        let client = self.client(&config).await?;

        let spinner = self.spinner(
            &config,
            &format!("Fetching SQL errors for the last {window_minutes} minutes"),
        );
        let rows = client.recent_errors(window_minutes).await;
        spinner.finish_and_clear();

        display::render_errors(&rows?, window_minutes);
        Ok(())
    }
}
