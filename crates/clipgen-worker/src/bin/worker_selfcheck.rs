use std::path::Path;

use clipgen_media::Engine;
use clipgen_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with clip_output_dir={} temp_dir={}",
        config.clip_output_dir.display(),
        config.media.temp_dir.display()
    );
    ensure_dir(&config.clip_output_dir).await?;
    ensure_dir(&config.media.temp_dir).await?;
    ensure_dir(&config.content_store_dir).await?;
    ensure_engine(&Engine::new(config.media.clone())).await?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {}", path.display(), e))?;
    Ok(())
}

async fn ensure_engine(engine: &Engine) -> anyhow::Result<()> {
    let info = engine
        .check()
        .await
        .map_err(|e| anyhow::anyhow!("media engine not available: {}", e))?;

    println!(
        "worker-selfcheck: ffprobe {} ({})",
        info.ffprobe_path.display(),
        info.ffprobe_version
    );
    println!(
        "worker-selfcheck: ffmpeg {} ({})",
        info.ffmpeg_path.display(),
        info.ffmpeg_version
    );

    if !engine.supports_encoder("libwebp").await {
        println!("worker-selfcheck: warning: libwebp encoder missing, webp previews will fail");
    }
    Ok(())
}
