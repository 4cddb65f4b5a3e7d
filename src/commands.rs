pub mod errors;
pub mod slow_queries;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Show recent SQL errors from Log Analytics
    Errors(errors::ErrorsCommand),

    /// Show queries slower than a threshold
    SlowQueries(slow_queries::SlowQueriesCommand),
}
