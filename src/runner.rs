use crate::client::LogsClient;
use crate::config::Config;
use crate::error::Error;
use crate::logger::Logger;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub(crate) trait Runner {
    /// Load the configuration snapshot and set up logging from it
    fn config(&self) -> Result<Config, Error> {
        let config = Config::load()?;
        Logger::init(&config);
        Ok(config)
    }

    /// Construct the client, running the credential chain
    ///
    /// Authentication may block on an interactive browser login.
    async fn client(&self, config: &Config) -> Result<LogsClient, Error> {
        Ok(LogsClient::connect(config).await?)
    }

    /// A spinner shown while the query round trip is in flight
    fn spinner(&self, config: &Config, message: &str) -> ProgressBar {
        let spinner = Logger::init(config)
            .multi_progress()
            .add(ProgressBar::new_spinner());

        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg:.dim}") {
            spinner.set_style(style);
        }

        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner
    }

    /// Run the command
    ///
    /// Returns an error shown to the user in case of failure
    async fn run(&mut self) -> Result<(), Error>;
}

/// Return a runner for a command
///
/// Ideally this should be a macro
pub(crate) trait Runnable {
    fn runner(&self) -> impl Runner;
}
