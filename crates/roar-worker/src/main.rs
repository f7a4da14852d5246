//! Roarscore job worker binary.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use roar_emotion_client::{EmotionClient, EngineJobId};
use roar_firestore::{FirestoreClient, JobRepository};
use roar_models::{Job, JobType};
use roar_worker::{
    CameraStartHandler, CameraStopHandler, HandlerRegistry, Supervisor, VideoExpressionHandler,
    WorkerConfig, WorkerContext, WorkerError, WorkerResult,
};

/// Roarscore job worker.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Create a job document directly and exit
    #[arg(long, value_name = "TYPE:REF_TYPE:REF_ID")]
    create_job: Option<String>,

    /// Print a submitted expression job's raw predictions and exit
    #[arg(long, value_name = "ENGINE_JOB_ID")]
    fetch_engine_job: Option<String>,
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.verbose);

    if let Some(spec) = args.create_job.as_deref() {
        if let Err(e) = create_job(spec).await {
            error!("Failed to create job: {}", e);
            std::process::exit(1);
        }
        return;
    }

    if let Some(engine_job_id) = args.fetch_engine_job.as_deref() {
        if let Err(e) = fetch_engine_job(engine_job_id).await {
            error!("Failed to fetch engine job: {}", e);
            std::process::exit(1);
        }
        return;
    }

    info!("Starting roar-worker");

    // Load configuration
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    // Build the shared context
    let ctx = match WorkerContext::new(config).await {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            error!("Failed to build worker context: {}", e);
            std::process::exit(1);
        }
    };
    info!("Worker identity: {}", ctx.processor_id);

    let board = Arc::new(ctx.job_board());
    let directory = Arc::new(ctx.camera_directory());

    let registry = HandlerRegistry::new(
        Arc::new(VideoExpressionHandler::new(Arc::clone(&ctx))),
        Arc::new(CameraStartHandler::new(
            Arc::clone(&directory),
            ctx.camera_signals.clone(),
            ctx.config.work_dir.clone(),
            ctx.config.camera_stop_poll_interval,
        )),
        Arc::new(CameraStopHandler::new(
            directory,
            ctx.camera_signals.clone(),
        )),
    );

    // One supervisor per job type
    let (shutdown_tx, _) = tokio::sync::watch::channel(false);
    let mut supervisors = Vec::new();

    for job_type in JobType::ALL {
        let supervisor = Supervisor::new(
            Arc::clone(&board),
            ctx.processor_id.clone(),
            ctx.config.shutdown_timeout,
        );
        let handler = registry.handler_for(job_type);
        let shutdown_rx = shutdown_tx.subscribe();

        supervisors.push(tokio::spawn(async move {
            if let Err(e) = supervisor.run(job_type, handler, shutdown_rx).await {
                error!("Supervisor for {} failed: {}", job_type, e);
            }
        }));
    }

    tokio::signal::ctrl_c().await.ok();
    info!("Received shutdown signal");
    let _ = shutdown_tx.send(true);

    for handle in supervisors {
        handle.await.ok();
    }

    info!("Worker shutdown complete");
}

fn init_tracing(verbose: bool) {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Diagnostic mode: submit a job document directly, bypassing any API.
async fn create_job(spec: &str) -> WorkerResult<()> {
    let mut parts = spec.splitn(3, ':');
    let (job_type, ref_type, ref_id) = match (parts.next(), parts.next(), parts.next()) {
        (Some(t), Some(rt), Some(rid)) if !rt.is_empty() && !rid.is_empty() => (t, rt, rid),
        _ => {
            return Err(WorkerError::config_error(
                "expected TYPE:REF_TYPE:REF_ID, e.g. StartCamera:camera:cam-1",
            ))
        }
    };

    let job_type = JobType::parse(job_type)
        .ok_or_else(|| WorkerError::config_error(format!("unknown job type {}", job_type)))?;

    let firestore = FirestoreClient::from_env().await?;
    let jobs = JobRepository::new(firestore);

    let job = Job::requested(job_type, ref_type, ref_id);
    jobs.create(&job).await?;

    info!("Created job {} for {}:{}", job.id, ref_type, ref_id);
    println!("{}", job.id);
    Ok(())
}

/// Diagnostic mode: print an engine job's raw predictions, bypassing the
/// queue.
async fn fetch_engine_job(engine_job_id: &str) -> WorkerResult<()> {
    let emotion = EmotionClient::from_env()?;
    let envelopes = emotion
        .predictions(&EngineJobId::from_string(engine_job_id))
        .await?;

    println!("{}", serde_json::to_string_pretty(&envelopes)?);
    Ok(())
}
