use std::path::Path;

use tokio::sync::broadcast::{self, error::RecvError};
use treeforge_core::api::{
    BuildEvent, BuildOutput, BuildStrategy, Builder, BuilderOptions, TreeforgeConfig,
};

use super::cli::BuildArgs;
use crate::error::CliError;
use crate::manifest::Manifest;
use crate::units::copy_tree;

pub async fn run(args: BuildArgs, cfg: &TreeforgeConfig) -> Result<i32, CliError> {
    let manifest = Manifest::load(&args.manifest)?;
    let base = args
        .manifest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let options = BuilderOptions::from_config(cfg);
    let root = manifest.instantiate(base, options.temp.clone())?;
    let builder = Builder::with_options(root, options);
    spawn_event_logger(builder.subscribe());

    let result = build_and_publish(&builder, &args, cfg).await;
    // Scratch directories go away here, so publishing happens first.
    let cleaned = builder.cleanup().await;
    result?;
    cleaned?;
    Ok(0)
}

async fn build_and_publish(
    builder: &Builder,
    args: &BuildArgs,
    cfg: &TreeforgeConfig,
) -> Result<(), CliError> {
    let mut output = pass(builder, BuildStrategy::initial()).await?;

    if !args.changed.is_empty() {
        let changed = cfg.cache.categorize(&args.changed);
        tracing::info!(?changed, files = args.changed.len(), "running incremental pass");
        output = pass(builder, BuildStrategy::incremental(changed)).await?;
    }

    if let Some(path) = &args.graph_json {
        let json = output.snapshot().to_json().map_err(anyhow::Error::from)?;
        std::fs::write(path, json)?;
    }

    match &args.out {
        Some(out) => {
            copy_tree(&output.directory, out)?;
            println!("{}", out.display());
        }
        None => println!("{}", output.directory.display()),
    }
    Ok(())
}

/// One pass; Ctrl-C cancels cooperatively and waits for the pass to settle.
async fn pass(builder: &Builder, strategy: BuildStrategy) -> Result<BuildOutput, CliError> {
    let observe = |leaf: &Path| tracing::trace!(path = %leaf.display(), "leaf");
    let pending = builder.build(Some(&observe), strategy);
    tokio::pin!(pending);

    let outcome = tokio::select! {
        res = &mut pending => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted; canceling build");
            builder.cancel();
            pending.await
        }
    };
    Ok(outcome?)
}

fn spawn_event_logger(mut events: broadcast::Receiver<BuildEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(BuildEvent::Started { pass_id, .. }) => {
                    tracing::debug!("Pass {} started", pass_id);
                }
                Ok(BuildEvent::Finished {
                    pass_id,
                    ok,
                    canceled,
                    ..
                }) => {
                    tracing::info!("Pass {} finished (ok={}, canceled={})", pass_id, ok, canceled);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "build event logger lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
