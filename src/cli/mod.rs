use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::clipboard::SystemClipboard;
use crate::config::Config;
use crate::feedback::{FeedbackTimer, COPY_FEEDBACK_WINDOW};
use crate::history::{HistoryItem, HistoryStore, NewHistoryItem, OperationKind, RecordField};
use crate::storage::{self, Substrate};

pub mod commands;

use commands::format_item;

/// Substrate handle shared by every store the CLI opens
pub type SharedSubstrate = Arc<dyn Substrate + Send + Sync>;

#[derive(Parser)]
#[command(name = "cipherlog")]
#[command(about = "Encrypt/decrypt operation history")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Show recorded operations, newest first")]
    List {
        #[arg(short, long, value_enum, default_value_t = OperationKind::Encrypt)]
        kind: OperationKind,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    #[command(about = "Record a completed operation")]
    Save {
        #[arg(short, long, value_enum, default_value_t = OperationKind::Encrypt)]
        kind: OperationKind,

        text: String,

        cipher: String,
    },

    #[command(about = "Remove a recorded operation")]
    Delete {
        #[arg(short, long, value_enum, default_value_t = OperationKind::Encrypt)]
        kind: OperationKind,

        text: String,

        cipher: String,
    },

    #[command(about = "Copy a field of a listed operation to the clipboard")]
    Copy {
        #[arg(short, long, value_enum, default_value_t = OperationKind::Encrypt)]
        kind: OperationKind,

        /// Position in `list` output (0 = most recent)
        index: usize,

        #[arg(short, long, value_enum, default_value_t = RecordField::Cipher)]
        field: RecordField,
    },

    #[command(about = "Configuration management")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Generate example configuration")]
    Init {
        #[arg(long)]
        force: bool,
    },

    #[command(about = "Validate configuration")]
    Validate { path: Option<PathBuf> },
}

pub struct CliHandler {
    config: Config,
    substrate: Option<SharedSubstrate>,
}

impl CliHandler {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            substrate: None,
        }
    }

    /// Handler over an already opened substrate
    pub fn with_substrate(config: Config, substrate: SharedSubstrate) -> Self {
        Self {
            config,
            substrate: Some(substrate),
        }
    }

    /// Lazily open the configured substrate when needed
    fn ensure_substrate(&mut self) -> Result<SharedSubstrate> {
        if let Some(substrate) = &self.substrate {
            return Ok(Arc::clone(substrate));
        }

        let substrate: SharedSubstrate = Arc::from(storage::open(&self.config.storage)?);
        self.substrate = Some(Arc::clone(&substrate));
        Ok(substrate)
    }

    /// Open the history for `kind`
    pub fn open_store(&mut self, kind: OperationKind) -> Result<HistoryStore<SharedSubstrate>> {
        let substrate = self.ensure_substrate()?;
        Ok(HistoryStore::new(substrate, kind)?)
    }

    pub async fn handle_command(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::List { kind, limit } => self.handle_list(kind, limit),
            Commands::Save { kind, text, cipher } => self.handle_save(kind, text, cipher),
            Commands::Delete { kind, text, cipher } => self.handle_delete(kind, text, cipher),
            Commands::Copy { kind, index, field } => self.handle_copy(kind, index, field).await,
            Commands::Config { action } => self.handle_config(action),
        }
    }

    fn handle_list(&mut self, kind: OperationKind, limit: Option<usize>) -> Result<()> {
        let store = self.open_store(kind)?;

        if store.is_empty() {
            println!("No {} history", kind);
            return Ok(());
        }

        let limit = limit.unwrap_or(store.len());
        for (index, item) in store.items().iter().take(limit).enumerate() {
            println!("{}", format_item(index, item));
        }

        Ok(())
    }

    fn handle_save(&mut self, kind: OperationKind, text: String, cipher: String) -> Result<()> {
        let mut store = self.open_store(kind)?;
        store.save(NewHistoryItem::new(text, cipher))?;
        info!(kind = %kind, total = store.len(), "Recorded operation");
        Ok(())
    }

    fn handle_delete(&mut self, kind: OperationKind, text: String, cipher: String) -> Result<()> {
        let mut store = self.open_store(kind)?;
        let before = store.len();

        store.delete(&HistoryItem::new(text, cipher, 0))?;

        if store.len() < before {
            println!("Deleted. {} {} entries remain", store.len(), kind);
        } else {
            println!("No matching {} entry", kind);
        }
        Ok(())
    }

    async fn handle_copy(
        &mut self,
        kind: OperationKind,
        index: usize,
        field: RecordField,
    ) -> Result<()> {
        let store = self.open_store(kind)?;
        let item = store
            .items()
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("No {} entry at index {}", kind, index))?;

        let timer = FeedbackTimer::new(Arc::new(SystemClipboard::new()));
        let reset = timer.trigger(&item, field).await;

        println!("{}  [copied]", format_item(index, &item));
        reset.await?;
        info!(
            window_ms = COPY_FEEDBACK_WINDOW.as_millis() as u64,
            copied = item.is_copied(),
            "Copy feedback cleared"
        );
        Ok(())
    }

    fn handle_config(&self, action: ConfigAction) -> Result<()> {
        match action {
            ConfigAction::Show => {
                println!("{}", toml::to_string_pretty(&self.config)?);
            }
            ConfigAction::Init { force } => {
                let path = Config::default_path()
                    .ok_or_else(|| anyhow!("Could not find config directory"))?;
                Config::write_example(&path, force)?;
                println!("Wrote example configuration to {}", path.display());
            }
            ConfigAction::Validate { path } => {
                match path {
                    Some(path) => {
                        Config::load_from_path(&path)?;
                    }
                    None => self.config.validate()?,
                }
                println!("Configuration is valid");
            }
        }
        Ok(())
    }
}
