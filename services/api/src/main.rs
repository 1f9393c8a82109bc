use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use api::{AppState, config::AppConfig, create_router, middleware::JwtVerifier};
use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
use media::{
    UploadOrchestrator,
    database::{Database, VideoStore},
    object_store::{S3Config, S3ObjectStore},
    playback::PlaybackSigner,
    prober::FfprobeProber,
    remuxer::FfmpegRemuxer,
    sweeper::StagingSweeper,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting ClipVault API service");

    let config = AppConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }
    run_migrations(&pool).await?;

    tokio::fs::create_dir_all(&config.staging_dir).await?;

    let store = Arc::new(
        S3ObjectStore::new(&S3Config {
            region: config.s3_region.clone(),
            endpoint_url: config.s3_endpoint.clone(),
        })
        .await,
    );
    let videos: Arc<dyn VideoStore> = Arc::new(Database::new(pool));
    let playback = PlaybackSigner::new(store.clone(), config.playback_ttl());

    let uploads = UploadOrchestrator::new(
        config.pipeline_config(),
        Arc::new(FfprobeProber::new(&config.ffprobe_path)),
        Arc::new(FfmpegRemuxer::new(&config.ffmpeg_path)),
        store,
        videos.clone(),
        playback.clone(),
    );

    let mut sweeper = StagingSweeper::new(&config.staging_dir, config.staging_max_age())
        .start(&config.sweep_schedule)
        .await?;

    let app_state = AppState {
        videos,
        uploads: Arc::new(uploads),
        playback,
        jwt: JwtVerifier::new(&config.jwt_secret, &config.jwt_issuer),
    };
    let app = create_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("API service listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    info!("Shutting down ClipVault API service");
    sweeper.shutdown().await?;

    Ok(())
}
