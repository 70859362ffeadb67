use health_coach::config::{CoachConfig, load_dotenv};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = CoachConfig::from_env()?;
    tracing::info!(
        model = config.provider.model(),
        log = %config.log_path.display(),
        "starting health coach"
    );
    health_coach::ui::launch(config);
    Ok(())
}
