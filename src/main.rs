//! Service entry point

use trailhead::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    init_tracing(&config)?;

    info!("Starting {}", config.service.name);

    let state = AppState::new(config.clone())?;
    let app = trailhead::api::app(state);

    Server::new(config).serve(app).await?;
    Ok(())
}
