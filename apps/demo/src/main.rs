use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use list_core::{placeholder_paginator, Identified, RealtimeList};
use serde::Serialize;
use shared::domain::{Page, PageBounds};
use shared::protocol::ListEvent;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Track {
    id: u64,
    title: String,
}

impl Identified for Track {
    type Key = u64;

    fn identity(&self) -> u64 {
        self.id
    }
}

#[derive(Debug)]
struct Settings {
    catalog_size: usize,
    page_size: usize,
    placeholder_len: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog_size: 16,
            page_size: 5,
            placeholder_len: 5,
        }
    }
}

fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(v) = std::env::var("LIST_DEMO__CATALOG_SIZE") {
        if let Ok(parsed) = v.parse() {
            settings.catalog_size = parsed;
        }
    }
    if let Ok(v) = std::env::var("LIST_DEMO__PAGE_SIZE") {
        if let Ok(parsed) = v.parse() {
            settings.page_size = parsed;
        }
    }
    if let Ok(v) = std::env::var("LIST_DEMO__PLACEHOLDER_LEN") {
        if let Ok(parsed) = v.parse() {
            settings.placeholder_len = parsed;
        }
    }

    settings
}

#[derive(Parser, Debug)]
struct Cli {
    /// Catalog size (overrides LIST_DEMO__CATALOG_SIZE).
    #[arg(long)]
    catalog_size: Option<usize>,
    /// Page size (overrides LIST_DEMO__PAGE_SIZE).
    #[arg(long)]
    page_size: Option<usize>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk the catalog page by page with placeholder slots.
    Paged,
    /// Mirror scripted add/update/delete events into a windowed list.
    Live,
}

fn catalog(len: usize) -> Vec<Track> {
    (0..len as u64)
        .map(|id| Track {
            id,
            title: format!("track {id}"),
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(catalog_size) = cli.catalog_size {
        settings.catalog_size = catalog_size;
    }
    if let Some(page_size) = cli.page_size {
        settings.page_size = page_size;
    }

    match cli.command {
        Command::Paged => run_paged(settings).await,
        Command::Live => run_live(settings).await,
    }
}

async fn run_paged(settings: Settings) -> Result<()> {
    let source = Arc::new(catalog(settings.catalog_size));
    let page_size = settings.page_size;

    let fetch_source = Arc::clone(&source);
    let paginator = placeholder_paginator(
        move |page_number: usize| {
            let source = Arc::clone(&fetch_source);
            async move {
                // stand-in for the network hop; keeps the placeholders visible
                tokio::time::sleep(Duration::from_millis(150)).await;
                let items: Vec<Track> = source
                    .iter()
                    .skip((page_number - 1) * page_size)
                    .take(page_size)
                    .cloned()
                    .collect();
                anyhow::Ok(Page::wrap(items, source.len(), page_number, page_size))
            }
        },
        settings.placeholder_len,
    );

    let mut snapshots = paginator.items().subscribe();
    let printer = tokio::spawn(async move {
        while let Some(snapshot) = snapshots.recv().await {
            match serde_json::to_string(&snapshot) {
                Ok(json) => println!("{json}"),
                Err(err) => tracing::warn!(error = %err, "snapshot encode failed"),
            }
        }
    });

    while !paginator.complete().get() {
        paginator.load_more().await;
        info!(
            page = paginator.page().get(),
            total = paginator.total().get(),
            "loaded page"
        );
    }

    drop(paginator);
    let _ = printer.await;
    Ok(())
}

async fn run_live(settings: Settings) -> Result<()> {
    let store = Arc::new(Mutex::new(catalog(settings.catalog_size)));
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let fetch_store = Arc::clone(&store);
    let fetcher = move |limit: usize, offset: usize| {
        let store = Arc::clone(&fetch_store);
        async move {
            let store = store.lock().await;
            let items: Vec<Track> = store.iter().skip(offset).take(limit).cloned().collect();
            anyhow::Ok(Page {
                items,
                total: store.len(),
                page: PageBounds { offset, limit },
            })
        }
    };

    let list = RealtimeList::new(
        fetcher,
        Some(UnboundedReceiverStream::new(events_rx)),
        settings.page_size,
    );

    list.load_more().await;
    info!(
        items = list.items().get().len(),
        total = list.total().get(),
        "initial window"
    );

    let script_store = Arc::clone(&store);
    let script = tokio::spawn(async move {
        let fresh = Track {
            id: 900,
            title: "fresh track".into(),
        };
        script_store.lock().await.push(fresh.clone());
        let _ = events_tx.send(ListEvent::Add {
            item_key: fresh.id,
            item: fresh,
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let revised = Track {
            id: 0,
            title: "track 0 (remastered)".into(),
        };
        if let Some(slot) = script_store
            .lock()
            .await
            .iter_mut()
            .find(|track| track.id == 0)
        {
            *slot = revised.clone();
        }
        let _ = events_tx.send(ListEvent::Update {
            item_key: revised.id,
            item: revised,
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        script_store.lock().await.retain(|track| track.id != 1);
        let _ = events_tx.send(ListEvent::Delete { item_key: 1 });
    });

    script.await?;
    // let the pump drain the queued events, including the delete backfill
    tokio::time::sleep(Duration::from_millis(300)).await;

    println!("{}", serde_json::to_string(&list.items().get())?);
    info!(
        total = list.total().get(),
        events_count = list.events_count().get(),
        complete = list.complete().get(),
        "final counters"
    );
    Ok(())
}
