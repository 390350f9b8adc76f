//! CLI Tooling
//!
//! Scan, list, create and open documents in a directory-backed registry.
//! Each invocation loads the record snapshot, runs one command, and writes
//! the snapshot back.

use crate::config::{xdg, ConfigLoader, MultidocConfig};
use crate::controller::DocumentsController;
use crate::discovery::{ContainerSearch, DirectoryScanner, EnrollReport};
use crate::docstore::{FsDocumentProvider, ModelVersionInitializer};
use crate::error::CoreError;
use crate::establish::{Continuation, EstablishedDocument};
use crate::events::CoreEvent;
use crate::logging::init_logging;
use crate::store::{PersistedRecord, Record, RecordStatus};
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{info, warn};

const REMOTE_INITIAL_BATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Multidoc CLI - local and synchronized document registry
#[derive(Parser)]
#[command(name = "multidoc")]
#[command(about = "Track documents across local and synchronized storage")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Local documents directory (overrides storage.local_docs_dir)
    #[arg(long)]
    pub docs_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover local (and remote, if configured) documents
    Scan {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List known documents
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Create a new document
    Create {
        /// Display name of the document
        name: String,
    },
    /// Open (or create, if missing) a known document
    Open {
        /// Document uuid
        uuid: String,
    },
}

/// CLI context owning the runtime and the controller
pub struct CliContext {
    controller: DocumentsController,
    config: MultidocConfig,
    runtime: Runtime,
}

impl CliContext {
    /// Load configuration, start logging, and restore the record snapshot.
    pub fn new(cli: &Cli) -> Result<Self, CoreError> {
        let mut config = match &cli.config {
            Some(path) => ConfigLoader::load_from_file(path),
            None => ConfigLoader::load(),
        }
        .map_err(|e| CoreError::ConfigError(e.to_string()))?;

        if let Some(dir) = &cli.docs_dir {
            config.storage.local_docs_dir = Some(dir.clone());
        }
        if let Some(level) = &cli.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &cli.log_format {
            config.logging.format = format.clone();
        }
        init_logging(Some(&config.logging))?;

        let runtime = Runtime::new()
            .map_err(|e| CoreError::ConfigError(format!("Failed to create runtime: {}", e)))?;
        let controller = {
            let _guard = runtime.enter();
            DocumentsController::new(
                &config,
                Arc::new(FsDocumentProvider::new()),
                Arc::new(ModelVersionInitializer),
            )?
        };
        controller.load_records()?;

        Ok(Self {
            controller,
            config,
            runtime,
        })
    }

    pub fn controller(&self) -> &DocumentsController {
        &self.controller
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, CoreError> {
        let output = match command {
            Commands::Scan { format } => {
                let (report, remote) = self.scan()?;
                self.controller.save_records()?;
                let records = self.controller.snapshot();
                if format == "json" {
                    format_records_json(&records)?
                } else {
                    let mut out = format_report(&report);
                    if let Some(remote) = remote {
                        out.push_str(&format!("\nRemote: {} document(s)", remote));
                    }
                    format!("{}\n{}", out, format_records_table(&records))
                }
            }
            Commands::List { format } => {
                let records = self.controller.snapshot();
                if format == "json" {
                    format_records_json(&records)?
                } else if records.is_empty() {
                    "No documents. Run 'multidoc scan' or 'multidoc create <name>'.".to_string()
                } else {
                    format_records_table(&records)
                }
            }
            Commands::Create { name } => {
                let (continuation, rx) = Continuation::channel();
                let uuid = self.controller.add_document(name, continuation)?;
                let document = self.wait(rx, &uuid)?;
                self.controller.save_records()?;
                format!(
                    "Created {} ({}) at {}",
                    name.bold(),
                    uuid,
                    document.handle.url().display()
                )
            }
            Commands::Open { uuid } => {
                let (continuation, rx) = Continuation::channel();
                self.controller.establish(uuid, continuation)?;
                let document = self.wait(rx, uuid)?;
                self.controller.save_records()?;
                let verb = if document.created { "Created" } else { "Opened" };
                format!("{} {} at {}", verb, uuid, document.handle.url().display())
            }
        };
        Ok(output)
    }

    /// Local scan, then one initial batch from the remote container if any.
    fn scan(&self) -> Result<(EnrollReport, Option<usize>), CoreError> {
        let docs_dir = self.controller.resolver().local_docs_dir().to_path_buf();
        xdg::ensure_dir(&docs_dir)?;
        let report = self
            .controller
            .discover_local(&DirectoryScanner::new(&docs_dir))?;

        let Some(remote_dir) = self.controller.resolver().remote_documents_dir() else {
            return Ok((report, None));
        };
        if !self.config.discovery.remote_search_enabled {
            return Ok((report, None));
        }

        let mut events = self.controller.subscribe();
        let launched = {
            let _guard = self.runtime.enter();
            self.controller
                .launch_remote_search(Arc::new(ContainerSearch::new(&remote_dir)))?
        };
        let mut remote_count = None;
        if launched {
            let remote = self.runtime.block_on(async {
                tokio::time::timeout(REMOTE_INITIAL_BATCH_TIMEOUT, async {
                    while let Some(event) = events.recv().await {
                        if let CoreEvent::RemoteBatchReceived {
                            initial: true,
                            enrolled,
                            rejected,
                        } = event
                        {
                            return Some((enrolled, rejected));
                        }
                    }
                    None
                })
                .await
            });
            match remote {
                Ok(Some((enrolled, rejected))) => {
                    info!(enrolled, rejected, dir = %remote_dir.display(), "Remote scan complete");
                    remote_count = Some(enrolled);
                }
                _ => warn!(dir = %remote_dir.display(), "Remote search returned no initial batch"),
            }
            self.controller.ignore_remote_search();
        }
        Ok((report, remote_count))
    }

    fn wait(
        &self,
        rx: tokio::sync::oneshot::Receiver<Result<EstablishedDocument, CoreError>>,
        uuid: &str,
    ) -> Result<EstablishedDocument, CoreError> {
        let document = self
            .runtime
            .block_on(rx)
            .map_err(|_| CoreError::RecordNotFound(uuid.to_string()))??;
        let handle = document.handle.clone();
        self.runtime.block_on(async move {
            if let Err(e) = handle.close().await {
                warn!(uuid = %uuid, error = %e, "Failed to close document");
            }
        });
        Ok(document)
    }
}

fn format_report(report: &EnrollReport) -> String {
    let mut out = format!(
        "Enrolled {} document(s): {} new, {} updated",
        report.enrolled(),
        report.inserted,
        report.updated
    );
    if !report.rejected.is_empty() {
        out.push_str(&format!(", {} rejected", report.rejected.len().red()));
        for e in &report.rejected {
            out.push_str(&format!("\n  - {}", e));
        }
    }
    out
}

fn status_cell(status: RecordStatus) -> String {
    match status {
        RecordStatus::Ready => status.label().green().to_string(),
        RecordStatus::Establishing | RecordStatus::Recovering => {
            status.label().yellow().to_string()
        }
        RecordStatus::Failed => status.label().red().to_string(),
        RecordStatus::Discovered => status.label().to_string(),
    }
}

fn format_records_table(records: &[Record]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Name", "UUID", "Status", "Local", "Remote"]);
    for record in records {
        table.add_row(vec![
            record.file_name.clone(),
            record.uuid.clone(),
            status_cell(record.status),
            if record.created_locally { "yes" } else { "no" }.to_string(),
            record
                .remote_url
                .as_ref()
                .map(|url| url.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table.to_string()
}

fn format_records_json(records: &[Record]) -> Result<String, CoreError> {
    let persisted: Vec<PersistedRecord> = records.iter().map(PersistedRecord::from).collect();
    serde_json::to_string_pretty(&persisted)
        .map_err(|e| CoreError::Persistence(format!("Failed to encode records: {}", e)))
}
