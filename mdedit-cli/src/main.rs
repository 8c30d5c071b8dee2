//! mdedit CLI - scripted replay harness for the mdedit client core

mod script;
mod session;

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgAction, Command};
use mdedit_core::{open_store, ClientConfig, KeyValueStore, MemoryStore};
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};

use crate::script::{parse_script, ScriptStep};
use crate::session::{Session, SessionOptions};

/// CLI arguments structure
#[derive(Debug, Clone)]
pub struct Args {
    pub url: Option<String>,
    pub path: String,
    pub csrf_token: Option<String>,
    pub config_file: Option<PathBuf>,
    pub storage: Option<PathBuf>,
    pub ephemeral: bool,
    pub script: Option<PathBuf>,
    pub content: String,
    pub dev_mode: bool,
    pub validate_config: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse() -> Self {
        let matches = Command::new("mdedit")
            .version("0.1.0")
            .about("Replay client sessions against the mdedit collaborative editor core")
            .long_about(
                "mdedit drives the client core of the collaborative markdown editor: \
                it mounts the editor, flash and clipboard hooks, opens the live connection \
                through a logging transport and replays a JSON-lines script of server \
                events, key presses and navigation. A JSON report is printed at the end.",
            )
            .arg(
                Arg::new("url")
                    .long("url")
                    .help("Page URL; its path selects the document")
                    .conflicts_with("path")
                    .value_parser(clap::value_parser!(String)),
            )
            .arg(
                Arg::new("path")
                    .long("path")
                    .help("Navigation path, e.g. /editor/<slug>")
                    .default_value("/")
                    .value_parser(clap::value_parser!(String)),
            )
            .arg(
                Arg::new("csrf-token")
                    .long("csrf-token")
                    .help("Replay-protection token sent on every connect (random by default)")
                    .value_parser(clap::value_parser!(String)),
            )
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .help("Path to configuration file (JSON format)")
                    .value_parser(clap::value_parser!(PathBuf)),
            )
            .arg(
                Arg::new("storage")
                    .long("storage")
                    .help("Durable storage file for capability tokens")
                    .long_help(
                        "JSON file holding durable client storage. Overrides storage.file \
                        from the configuration. Defaults to mdedit/storage.json under the \
                        user data directory.",
                    )
                    .conflicts_with("ephemeral")
                    .value_parser(clap::value_parser!(PathBuf)),
            )
            .arg(
                Arg::new("ephemeral")
                    .long("ephemeral")
                    .help("Keep storage in memory only")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("script")
                    .short('s')
                    .long("script")
                    .help("JSON-lines session script, '-' for stdin")
                    .value_parser(clap::value_parser!(PathBuf)),
            )
            .arg(
                Arg::new("content")
                    .long("content")
                    .help("Initial editor content")
                    .default_value("")
                    .value_parser(clap::value_parser!(String)),
            )
            .arg(
                Arg::new("dev-mode")
                    .long("dev-mode")
                    .help("Enable development mode with enhanced logging")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("validate-config")
                    .long("validate-config")
                    .help("Validate configuration file and exit")
                    .action(ArgAction::SetTrue),
            )
            .after_help(
                "EXAMPLES:\n    \
                mdedit --path /editor/doc1 --script session.jsonl\n    \
                mdedit --url https://pads.example/editor/doc1 --ephemeral\n    \
                mdedit --validate-config --config mdedit.json",
            )
            .get_matches();

        Self {
            url: matches.get_one::<String>("url").cloned(),
            path: matches
                .get_one::<String>("path")
                .cloned()
                .unwrap_or_else(|| "/".to_string()),
            csrf_token: matches.get_one::<String>("csrf-token").cloned(),
            config_file: matches.get_one::<PathBuf>("config").cloned(),
            storage: matches.get_one::<PathBuf>("storage").cloned(),
            ephemeral: matches.get_flag("ephemeral"),
            script: matches.get_one::<PathBuf>("script").cloned(),
            content: matches
                .get_one::<String>("content")
                .cloned()
                .unwrap_or_default(),
            dev_mode: matches.get_flag("dev-mode"),
            validate_config: matches.get_flag("validate-config"),
        }
    }

    /// Navigation path, taken from the URL when one is given
    pub fn navigation_path(&self) -> Result<String> {
        match &self.url {
            Some(raw) => {
                let url = url::Url::parse(raw).with_context(|| format!("Invalid URL: {}", raw))?;
                Ok(url.path().to_string())
            }
            None => {
                if !self.path.starts_with('/') {
                    bail!("Path must start with '/': {}", self.path);
                }
                Ok(self.path.clone())
            }
        }
    }

    /// Load configuration and apply CLI overrides
    pub fn load_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config_file {
            Some(path) => ClientConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ClientConfig::new(),
        };

        if self.dev_mode {
            config.dev_mode = true;
        }

        if self.ephemeral {
            config.storage.file = None;
        } else if let Some(path) = &self.storage {
            config.storage.file = Some(path.clone());
        } else if config.storage.file.is_none() {
            config.storage.file = default_storage_file();
        }

        Ok(config)
    }

    /// Read the script, if any
    pub fn load_script(&self) -> Result<Vec<ScriptStep>> {
        let Some(path) = &self.script else {
            return Ok(Vec::new());
        };

        if path.as_os_str() == "-" {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read script from stdin")?;
            return parse_script(input.as_bytes());
        }

        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open script {}", path.display()))?;
        parse_script(BufReader::new(file))
    }
}

/// Default durable storage location under the user data directory
fn default_storage_file() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("mdedit").join("storage.json"))
}

fn init_logging(dev_mode: bool) {
    let log_level = if dev_mode { Level::DEBUG } else { Level::INFO };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(dev_mode)
        .with_line_number(dev_mode)
        .with_file(dev_mode);

    if dev_mode {
        subscriber.with_ansi(true).pretty().init();
        info!("🔧 Development mode enabled");
    } else {
        subscriber.with_ansi(true).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.dev_mode);

    let config = args.load_config()?;

    if args.validate_config {
        let result = config.check();
        for warning in &result.warnings {
            println!("⚠️  {}", warning);
        }
        if !result.is_valid {
            for e in &result.errors {
                println!("❌ {}", e);
            }
            bail!("Configuration is invalid");
        }
        println!("✅ Configuration is valid");
        return Ok(());
    }

    let path = args.navigation_path()?;
    let steps = args.load_script()?;

    let storage: Arc<dyn KeyValueStore> = match open_store(&config.storage) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open durable storage, using memory: {}", e);
            Arc::new(MemoryStore::new())
        }
    };

    info!("🚀 Starting mdedit client session at {}", path);

    let csrf_token = args
        .csrf_token
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut session = Session::start(
        config,
        storage,
        SessionOptions {
            csrf_token,
            path,
            initial_content: args.content.clone(),
        },
    )
    .await?;

    let outcome = session.run_script(&steps).await;
    if let Err(e) = &outcome {
        error!("Session stopped early: {:#}", e);
    }

    let report = session.report();
    println!("{}", serde_json::to_string_pretty(&report)?);

    session.shutdown().await?;
    info!("Session finished after {} steps", steps.len());

    outcome
}
