// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

use crate::workload::{WorkloadItem, PR_MESSAGE_SIZE, PR_SOURCE_KEY};

use log::{error, info};
use mdcache::{CacheManager, CacheStats, PurgeFlags};
use std::time::Instant;
use tokio::sync::mpsc::*;
use tokio::sync::oneshot;

pub(crate) struct Rpc(
    pub(crate) CacheCommand,
    pub(crate) Option<oneshot::Sender<Result<String, String>>>,
);

#[derive(Debug)]
pub(crate) enum CacheCommand {
    /// Cache the metadata of the given objects
    Populate(Vec<WorkloadItem>),
    /// Look up the hierarchy and size of the given objects
    Lookup(Vec<u32>),
    /// Clear the selected caches
    Purge(PurgeFlags),
    /// Render the counters of every cache
    Stats,
    /// Log the counters of every cache
    Dump(log::Level),
    Terminate,
}

pub(crate) async fn init_host(rx: &mut Receiver<Rpc>, manager: &CacheManager) {
    info!("Starting the cache manager host");

    while let Some(Rpc(message, channel)) = rx.recv().await {
        let response = match (message, channel) {
            (CacheCommand::Terminate, _) => {
                break;
            }
            (_, None) => {
                error!("Received a cache command without a reply channel");
                continue;
            }
            (CacheCommand::Populate(items), Some(response)) => {
                let tic = Instant::now();
                let len = items.len();
                for item in items {
                    manager.set_object(item.obj_id, item.object).await;
                    manager.set_acls(item.obj_id, item.acls).await;
                    for (tag, value) in item.props {
                        manager.set_cell(item.obj_id, tag, value).await;
                    }
                    let _ = manager.set_complete(item.obj_id).await;
                    manager
                        .set_index_data(item.obj_id, PR_SOURCE_KEY, item.source_key)
                        .await;
                }
                let msg = format!(
                    "CACHED {} objects in {} s",
                    len,
                    tic.elapsed().as_secs_f64()
                );
                response.send(Ok(msg))
            }
            (CacheCommand::Lookup(obj_ids), Some(response)) => {
                let tic = Instant::now();
                let mut hits = 0;
                for obj_id in obj_ids.iter() {
                    let object = manager.get_object(*obj_id).await;
                    let size = manager.get_cell(*obj_id, PR_MESSAGE_SIZE, false).await;
                    if object.is_ok() && size.is_ok() {
                        hits += 1;
                    }
                }
                let msg = format!(
                    "LOOKED UP {} objects in {} s ({} found)",
                    obj_ids.len(),
                    tic.elapsed().as_secs_f64(),
                    hits
                );
                response.send(Ok(msg))
            }
            (CacheCommand::Purge(flags), Some(response)) => {
                if flags.is_empty() {
                    response.send(Err("No caches were selected, nothing will be done".to_string()))
                } else {
                    manager.purge(flags).await;
                    response.send(Ok(format!("PURGED caches: {flags}")))
                }
            }
            (CacheCommand::Stats, Some(response)) => {
                let stats = manager.collect_stats().await;
                response.send(Ok(render_stats(&stats)))
            }
            (CacheCommand::Dump(level), Some(response)) => {
                manager.dump_stats(level).await;
                response.send(Ok("DUMPED cache statistics".to_string()))
            }
        };
        if response.is_err() {
            error!("Failed to reply to a cache command, the caller went away");
        }
    }
    info!("Cache manager host stopped");
}

/// Send a command to the host and wait for its reply
pub(crate) async fn call(tx: &Sender<Rpc>, command: CacheCommand) -> Result<String, String> {
    let (rpc_tx, rpc_rx) = oneshot::channel();
    if tx.send(Rpc(command, Some(rpc_tx))).await.is_err() {
        return Err("The cache manager host is not running".to_string());
    }
    match rpc_rx.await {
        Ok(reply) => reply,
        Err(err) => Err(format!("{err}")),
    }
}

pub(crate) fn render_stats(stats: &[CacheStats]) -> String {
    let mut lines = vec![format!(
        "{:<12} {:>8} {:>12} {:>12} {:>8} {:>10} {:>10} {:>7}",
        "cache", "items", "size", "max size", "max age", "requests", "hits", "ratio"
    )];
    for cache in stats {
        lines.push(format!(
            "{:<12} {:>8} {:>12} {:>12} {:>8} {:>10} {:>10} {:>6.1}%",
            cache.name,
            cache.items,
            cache.size,
            cache.max_size,
            cache.max_age,
            cache.hits,
            cache.valid,
            cache.hit_ratio() * 100.0
        ));
    }
    lines.join("\n")
}
