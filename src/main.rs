use dotenvy::dotenv;
use snafu::ResultExt as _;

use hypematch::config::Config;
use hypematch::database::Database;
use hypematch::error::{ApplicationError, ConnectDatabaseSnafu, ShutdownSignalSnafu};
use hypematch::logger;
use hypematch::store::StoryStore;
use hypematch::sweep::Sweeper;

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = Config::from_env()?;

    let _guard = logger::init(&config)?;

    let database = Database::connect(config.store_url.clone())
        .await
        .context(ConnectDatabaseSnafu)?;

    let store = StoryStore::new(database);
    let sweeper = Sweeper::new(store, config.sweep_interval).start();
    tracing::info!(
        interval = ?config.sweep_interval,
        "story expiry sweeper running, press ctrl-c to stop"
    );

    tokio::signal::ctrl_c().await.context(ShutdownSignalSnafu)?;
    sweeper.shutdown().await;

    Ok(())
}
