use clap::Parser;
use leaddesk::cli::{self, Cli};
use leaddesk::config::Config;
use leaddesk::db::Database;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db = match cli.db.as_ref() {
        Some(path) => Database::open_at(path)?,
        None => Database::open()?,
    };

    let config = Config::load(&db)?;
    db.set_busy_timeout(config.busy_timeout)?;

    cli::run(cli, &db, &config)
}
