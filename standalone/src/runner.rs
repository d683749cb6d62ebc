use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use glob::glob;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use bmr_coordinator::{ChunkStore, Coordinator, InputFile, Task};
use common::codec::{encode_pairs, encode_partial};
use common::{Partial, Workload};

use crate::args::Args;

/// Run the whole job described by `args` and report its result.
pub async fn run<S: ChunkStore>(coordinator: Coordinator<S>, args: &Args) -> Result<()> {
    if workload::try_named(&args.workload).is_none() {
        bail!(
            "The workload `{}` is not a known workload (expected one of {})",
            args.workload,
            workload::NAMES.join(", ")
        );
    }

    let inputs = load_inputs(&args.input).await?;
    coordinator
        .start(inputs, &args.workload, &args.workload, args.chunk_size)
        .await?;

    let poll_interval = Duration::from_millis(args.poll_interval_ms);
    let result = run_workers(&coordinator, args.workers, poll_interval).await?;

    match &args.output {
        Some(path) => {
            let json = serde_json::to_string_pretty(&result)?;
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("wrote {} keys to {}", result.len(), path.display());
        }
        None => {
            for (key, value) in &result {
                println!("{key} {value}");
            }
        }
    }

    coordinator.finish().await;
    Ok(())
}

/// Read every file matching `pattern`.
pub async fn load_inputs(pattern: &str) -> Result<Vec<InputFile>> {
    let mut inputs = Vec::new();
    for path in glob(pattern)? {
        let path = path?;
        if path.is_file() {
            inputs.push(InputFile::read_from_path(&path).await?);
        }
    }

    if inputs.is_empty() {
        bail!("no input files match `{pattern}`");
    }
    info!("read {} input files matching `{pattern}`", inputs.len());
    Ok(inputs)
}

/// Spawn `workers` workers against a started job and wait until it is done.
///
/// If any worker fails the others are stopped and the job is reset, since a
/// task that is never submitted would stall its phase.
pub async fn run_workers<S: ChunkStore>(
    coordinator: &Coordinator<S>,
    workers: usize,
    poll_interval: Duration,
) -> Result<Partial> {
    let mut pool = JoinSet::new();
    for id in 0..workers.max(1) {
        pool.spawn(work(id, coordinator.clone(), poll_interval));
    }

    while let Some(joined) = pool.join_next().await {
        let failure = match joined {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e,
            Err(e) => anyhow!(e),
        };
        error!("worker failed: {failure:#}");
        pool.abort_all();
        coordinator.reset().await;
        return Err(failure);
    }

    Ok(coordinator.final_result().await)
}

fn resolve(name: &str) -> Result<Workload> {
    workload::try_named(name).ok_or_else(|| anyhow!("The workload `{name}` is not a known workload"))
}

async fn work<S: ChunkStore>(
    id: usize,
    coordinator: Coordinator<S>,
    poll_interval: Duration,
) -> Result<()> {
    let mut completed = 0usize;
    loop {
        match coordinator.next_task().await {
            Task::Map(task) => {
                let workload = resolve(&task.mapper)?;
                let data = coordinator.read_chunk(&task.chunk).await?;
                let pairs = (workload.map_fn)(data)
                    .and_then(|pairs| pairs.collect::<Result<Vec<_>>>())
                    .with_context(|| format!("map over chunk {} failed", task.chunk.key))?;
                coordinator.submit_map_result(&encode_pairs(&pairs)).await?;
            }
            Task::Reduce(task) => {
                let workload = resolve(&task.reducer)?;
                let partial = (workload.reduce_fn)(&task.key, Box::new(task.values.into_iter()))
                    .with_context(|| format!("reduce of key `{}` failed", task.key))?;
                coordinator
                    .submit_reduce_result(&encode_partial(&partial))
                    .await?;
            }
            Task::Wait => {
                tokio::time::sleep(poll_interval).await;
                continue;
            }
            Task::Empty => {
                debug!("worker {id} done after {completed} tasks");
                return Ok(());
            }
        }
        completed += 1;
    }
}
