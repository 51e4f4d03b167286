//! Subcommands. Each one mounts a cache for its collection and works through it.

use crate::error::CliError;
use clap::Subcommand;
use fieldops_cache::{CacheOptions, CollectionCache, Notifier};
use fieldops_client::Backend;
use fieldops_core::{FeedMessage, Fields, Record, RecordId, Table};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print every record of a collection, newest first
    List {
        table: String,

        /// Print at most this many records
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Case-insensitive substring search over a collection
    Search {
        table: String,
        query: String,

        /// Columns to search (defaults to the collection's search columns)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },

    /// Create a record from a JSON object
    Create { table: String, json: String },

    /// Apply a JSON object of changes to one record
    Update {
        table: String,
        id: String,
        json: String,
    },

    /// Delete one record
    Delete { table: String, id: String },

    /// Follow the change feeds of one or more collections until Ctrl-C
    Watch {
        #[arg(required = true)]
        tables: Vec<String>,
    },
}

/// Shared pieces every command needs. Built once in `main`.
#[derive(Clone)]
pub struct Context {
    pub backend: Arc<dyn Backend>,
    pub notifier: Arc<dyn Notifier>,
    pub options: CacheOptions,
}

impl Context {
    fn cache(&self, table: &str) -> CollectionCache {
        CollectionCache::new(
            self.backend.clone(),
            table,
            self.notifier.clone(),
            self.options.clone(),
        )
    }
}

/// Run a one-shot command, writing records to `out` as JSON lines.
pub async fn run<W: Write>(command: Command, ctx: &Context, out: &mut W) -> Result<(), CliError> {
    match command {
        Command::List { table, limit } => {
            let mut cache = ctx.cache(&table);
            cache.load().await?;
            let limit = limit.unwrap_or(usize::MAX);
            for record in cache.records().iter().take(limit) {
                print_record(out, record)?;
            }
        }
        Command::Search {
            table,
            query,
            fields,
        } => {
            let fields = search_fields(&table, fields)?;
            let mut cache = ctx.cache(&table);
            cache.load().await?;
            for record in cache.search(&query, &fields) {
                print_record(out, record)?;
            }
        }
        Command::Create { table, json } => {
            let fields = parse_fields(&json)?;
            let mut cache = ctx.cache(&table);
            let record = cache.create(fields).await?;
            print_record(out, &record)?;
        }
        Command::Update { table, id, json } => {
            let id = parse_id(&id)?;
            let patch = parse_fields(&json)?;
            let mut cache = ctx.cache(&table);
            let record = cache.update(&id, patch).await?;
            print_record(out, &record)?;
        }
        Command::Delete { table, id } => {
            let id = parse_id(&id)?;
            let mut cache = ctx.cache(&table);
            cache.delete(&id).await?;
            writeln!(out, "{}", json!({ "deleted": id }))?;
        }
        Command::Watch { tables } => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let handles = spawn_watchers(ctx, &tables, shutdown_rx).await;
            tokio::signal::ctrl_c().await?;
            info!("Shutting down watchers");
            let _ = shutdown_tx.send(true);
            for handle in handles {
                if let Err(err) = handle.await {
                    warn!(error = %err, "Watcher task failed");
                }
            }
        }
    }
    out.flush()?;
    Ok(())
}

/// Mount one cache per table and follow its feed until `shutdown` flips.
pub async fn spawn_watchers(
    ctx: &Context,
    tables: &[String],
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::with_capacity(tables.len());
    for table in tables {
        let cache = CollectionCache::mount(
            ctx.backend.clone(),
            table.as_str(),
            ctx.notifier.clone(),
            ctx.options.clone(),
        )
        .await;
        info!(table = %table, records = cache.len(), "Watching collection");
        handles.push(tokio::spawn(watch_collection(cache, shutdown.clone())));
    }
    handles
}

async fn watch_collection(mut cache: CollectionCache, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            message = cache.next_feed_message() => {
                match message {
                    Some(FeedMessage::Change(event)) => {
                        println!("{}", json!({ "table": cache.table(), "change": event }));
                    }
                    Some(FeedMessage::Status(status)) => {
                        info!(table = %cache.table(), status = ?status, "Feed status");
                    }
                    None => {
                        warn!(table = %cache.table(), "Change feed ended");
                        break;
                    }
                }
                if cache.needs_resync() {
                    let _ = cache.resync().await;
                }
            }
        }
    }
    cache.unmount();
}

fn print_record<W: Write>(out: &mut W, record: &Record) -> Result<(), CliError> {
    writeln!(out, "{}", serde_json::to_string(record)?)?;
    Ok(())
}

/// Parse a JSON object argument into a field map.
pub fn parse_fields(text: &str) -> Result<Fields, CliError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(fields) => Ok(fields),
        other => Err(CliError::Usage(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

pub fn parse_id(text: &str) -> Result<RecordId, CliError> {
    text.parse::<RecordId>()
        .map_err(|e| CliError::Usage(e.to_string()))
}

/// Explicit `--fields`, or the known collection's search columns.
pub fn search_fields(table: &str, fields: Vec<String>) -> Result<Vec<String>, CliError> {
    if !fields.is_empty() {
        return Ok(fields);
    }
    table
        .parse::<Table>()
        .map(|known| known.search_fields().iter().map(|f| f.to_string()).collect())
        .map_err(|_| {
            CliError::Usage(format!(
                "{} has no default search columns; pass --fields",
                table
            ))
        })
}
