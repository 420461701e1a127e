//! tablequery - run a batch of SQL queries and print typed tables as JSON.

mod cli;

use cli::Cli;
use tablequery::config::Config;
use tablequery::error::Result;
use tablequery::logging;
use tablequery::query::{BatchRequest, QueryService};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}: {}", e.category(), e);
        eprintln!("{}: {}", e.category(), e.message());
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let config_path = cli.config_path();
    let config = Config::load_from_file(&config_path)?;
    logging::init_stderr_logging(&config.logging.level);
    info!("Loaded config from: {}", config_path.display());

    let mut request = BatchRequest::from_json(&cli.read_request()?)?;
    if let Some(password) = &cli.password {
        request.datasource.password = Some(password.clone());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, remaining queries will be skipped");
            on_interrupt.cancel();
        }
    });

    let service = QueryService::new(config.executor);
    let response = service.query(&request, &cancel).await?;

    println!("{}", response.to_json(cli.pretty)?);
    Ok(())
}
