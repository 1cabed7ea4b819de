//! supaguard - read-only SQL endpoint for a Supabase admin dashboard.

mod cli;

use std::process::ExitCode;

use cli::{check_query, Cli, Command};
use supaguard::config::Config;
use supaguard::error::Result;
use supaguard::safety::QueryValidator;
use supaguard::{db, logging, server};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is normal
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse_args();
    if cli.log_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    if let Ok(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}: {}", e.category(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load(Some(config_path.as_path()))?;

    match cli.command {
        Command::Serve { bind, channel } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
                config.validate()?;
            }
            if channel == db::ChannelBackend::Postgres {
                info!("Database: {}", config.database.display_string());
            }

            let channel = db::connect(channel, &config).await?;
            server::serve(&config, channel).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { query, envelope } => {
            let validator =
                QueryValidator::new().with_extra_keywords(&config.guard.extra_blocked_keywords);
            let report = check_query(&validator, &query, envelope);
            println!("{}", report.output);

            Ok(if report.accepted {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            })
        }
    }
}
