use jiff::Timestamp;
use std::io::IsTerminal;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use yt_daily_content::auth::FileCredentialStore;
use yt_daily_content::compute_upload_summary;
use yt_daily_content::config::Config;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // stdout is reserved for the result line
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let config = Config::from_env()?;
    tracing::debug!(?config, "loaded configuration");
    let store = FileCredentialStore::new(&config.auth_dir);

    let summary = compute_upload_summary(&config, store, Timestamp::now()).await?;

    let mut by_length: Vec<_> = summary.channels.iter().collect();
    by_length.sort_by(|a, b| b.total_seconds.cmp(&a.total_seconds));
    for uploads in by_length {
        tracing::debug!(
            channel = uploads.channel.title,
            videos = uploads.video_count,
            hours = uploads.total_seconds as f64 / 3600.0,
            first = ?uploads.first_published,
            last = ?uploads.last_published,
            "channel uploads"
        );
    }
    tracing::info!(
        channels = summary.channels.len(),
        videos = summary.video_count(),
        total_seconds = summary.total_seconds(),
        window = %summary.window,
        "aggregated uploads"
    );

    println!("{}", summary.daily_average());
    Ok(())
}
