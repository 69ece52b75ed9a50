use comanda_lib::{api, logger, AppState, Config, Database};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    let _log_guard = logger::init_logger(&config.log_level, config.log_dir.as_deref());

    let db = Database::open(&config.database_path)?;
    db.initialize()?;
    info!(path = %config.database_path.display(), "Database ready");

    api::serve(AppState::new(db), &config.bind_addr()).await?;
    Ok(())
}
