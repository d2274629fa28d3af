// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! A tool hosting a metadata cache manager: warms it up with a synthetic mailbox,
//! then purges caches, renders statistics or runs a lookup workload

mod host;
mod logs;
mod workload;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use host::{CacheCommand, Rpc};
use log::{info, warn};
use logs::ConsoleLogger;
use mdcache::{CacheConfig, CacheManager, PurgeFlags};
use std::path::PathBuf;
use tokio::sync::mpsc::*;

#[derive(ValueEnum, Clone, Debug)]
enum PublicLogLevels {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl PublicLogLevels {
    pub(crate) fn to_log_level(&self) -> log::Level {
        match &self {
            PublicLogLevels::Error => log::Level::Error,
            PublicLogLevels::Warn => log::Level::Warn,
            PublicLogLevels::Info => log::Level::Info,
            PublicLogLevels::Debug => log::Level::Debug,
            PublicLogLevels::Trace => log::Level::Trace,
        }
    }
}

/// Metadata cache administration
#[derive(Parser, Debug)]
#[clap(author, about, long_about = None)]
pub struct Arguments {
    /// JSON file with the cache settings (defaults apply when omitted)
    #[clap(long = "config", short = 'c')]
    config: Option<PathBuf>,

    #[clap(
        value_enum,
        long = "log_level",
        short = 'l',
        name = "Adjust the console log-level (default = INFO)",
        ignore_case = true,
        default_value = "Info"
    )]
    console_level: PublicLogLevels,

    /// Disable colored log output
    #[clap(long = "no_color")]
    no_color: bool,

    /// Number of synthetic objects cached before running the command
    #[clap(long = "objects", short = 'n', default_value = "10000")]
    objects: u32,

    /// Seed of the synthetic workload
    #[clap(long = "seed", default_value = "42")]
    seed: u64,

    #[clap(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug, Clone)]
enum Mode {
    /// Clear caches, given as a comma-separated list of names or "all"
    Purge {
        /// Caches to clear (quota, quotadefault, object, store, acl, cell, index1,
        /// index2, indexedproperty, userobject, externid, userdetail, server)
        caches: String,
    },
    /// Print the counters of every cache
    Stats,
    /// Run random lookups against the warmed-up caches
    Workload {
        /// Number of lookups
        #[clap(long = "lookups", default_value = "100000")]
        lookups: u32,
    },
}

// MAIN //
#[tokio::main]
async fn main() -> Result<()> {
    let args = Arguments::parse();
    let level = args.console_level.to_log_level();
    if let Err(err) = ConsoleLogger::init(level, args.no_color) {
        println!("Error initializing console logger {err}");
    }

    // validate the request before doing any work
    let purge_flags = match &args.mode {
        Mode::Purge { caches } => Some(PurgeFlags::parse(caches)?),
        _ => None,
    };

    let config = match &args.config {
        Some(path) => CacheConfig::load(path).await?,
        None => {
            info!("No settings file given, using default cache sizes");
            CacheConfig::default()
        }
    };

    let (tx, mut rx) = channel(2);
    let host = tokio::spawn(async move {
        let manager = CacheManager::new(&config);
        host::init_host(&mut rx, &manager).await
    });

    let outcome = run(&args, purge_flags, &tx).await;

    if tx.send(Rpc(CacheCommand::Terminate, None)).await.is_err() {
        warn!("The cache manager host already stopped");
    }
    host.await?;
    outcome
}

async fn run(args: &Arguments, purge_flags: Option<PurgeFlags>, tx: &Sender<Rpc>) -> Result<()> {
    let items = workload::generate_items(args.objects, args.seed);
    info!("{}", request(tx, CacheCommand::Populate(items)).await?);

    match &args.mode {
        Mode::Purge { .. } => {
            let flags = purge_flags.ok_or_else(|| anyhow!("No caches were selected"))?;
            println!("{}", request(tx, CacheCommand::Stats).await?);
            info!("{}", request(tx, CacheCommand::Purge(flags)).await?);
            println!("{}", request(tx, CacheCommand::Stats).await?);
        }
        Mode::Stats => {
            println!("{}", request(tx, CacheCommand::Stats).await?);
        }
        Mode::Workload { lookups } => {
            let obj_ids = workload::generate_lookups(args.objects, *lookups, args.seed);
            info!("{}", request(tx, CacheCommand::Lookup(obj_ids)).await?);
            request(tx, CacheCommand::Dump(log::Level::Info)).await?;
        }
    }
    Ok(())
}

async fn request(tx: &Sender<Rpc>, command: CacheCommand) -> Result<String> {
    host::call(tx, command).await.map_err(|err| anyhow!(err))
}
