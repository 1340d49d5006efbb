//! Subcommand runners.

use std::sync::Arc;

use anyhow::{Context, bail};
use echoat_core::app::{SchedulerGroup, Submitter};
use echoat_core::domain::{RawTime, Submission};
use echoat_core::impls::{InMemoryTaskStore, StdoutSink};
use echoat_core::ports::{RandomKeyGenerator, SystemClock, TaskStore};
use echoat_redis::RedisTaskStore;
use tracing::{error, info};

use crate::cli::{Command, SchedulerArgs, ServeArgs, StoreArgs, StoreKind, SubmitArgs, WorkerArgs};
use crate::server::{self, AppState};

pub async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Serve(args) => serve(args).await,
        Command::Worker(args) => worker(args).await,
        Command::Submit(args) => submit(args).await,
    }
}

async fn open_store(args: &StoreArgs) -> anyhow::Result<Arc<dyn TaskStore>> {
    match args.store {
        StoreKind::Redis => {
            let store = RedisTaskStore::connect(args.redis_config())
                .await
                .with_context(|| format!("connecting to {}", args.redis_url))?;
            Ok(Arc::new(store))
        }
        StoreKind::Memory => {
            info!(index = %args.index, "using in-process store; tasks are not shared or persisted");
            Ok(Arc::new(InMemoryTaskStore::new(args.index)))
        }
    }
}

fn spawn_schedulers(store: &Arc<dyn TaskStore>, args: &SchedulerArgs) -> SchedulerGroup {
    SchedulerGroup::spawn(
        args.schedulers.max(1),
        Arc::clone(store),
        Arc::new(StdoutSink),
        Arc::new(SystemClock),
        args.config(),
    )
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let store = open_store(&args.store).await?;
    let group = spawn_schedulers(&store, &args.scheduler);

    let submitter = Submitter::new(
        Arc::clone(&store),
        Arc::new(RandomKeyGenerator),
        Arc::new(SystemClock),
        args.submitter.config(),
    );
    let app = server::router(AppState {
        submitter: Arc::new(submitter),
    });

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    info!(listen = %args.listen, schedulers = group.len(), "listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    group.shutdown_and_join().await;
    served.context("http server failed")
}

async fn worker(args: WorkerArgs) -> anyhow::Result<()> {
    let store = open_store(&args.store).await?;
    let group = spawn_schedulers(&store, &args.scheduler);
    info!(schedulers = group.len(), "worker running");

    shutdown_signal().await;
    group.shutdown_and_join().await;
    Ok(())
}

async fn submit(args: SubmitArgs) -> anyhow::Result<()> {
    if args.store.store == StoreKind::Memory {
        bail!("submit needs a shared store; a memory store would vanish when this command exits");
    }
    let store = open_store(&args.store).await?;

    let submitter = Submitter::new(
        store,
        Arc::new(RandomKeyGenerator),
        Arc::new(SystemClock),
        args.submitter.config(),
    );
    let submission = Submission {
        time: Some(RawTime::Text(args.time)),
        message: Some(args.message),
    };
    let key = submitter.submit(&submission).await?;

    println!("Queued {key}");
    Ok(())
}
