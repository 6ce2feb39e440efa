//! Command registry for REPL commands
//!
//! Handlers are plain functions over a shared [`CommandContext`] holding
//! the open Sparklet, the library service and the spark data store.

pub mod general;
pub mod library;
pub mod sparklet;

use crate::config::Cli;
use crate::generator::HttpGenerator;
use crate::storage::{FileDataStore, FileRepository};
use crate::terminal::{render_screen, Widget};
use crate::timers::{ThreadTimers, TimerFired};
use anyhow::{bail, Context, Result};
use colored::*;
use crossbeam_channel::Sender;
use sparklet_core::store::{read_last_active, write_last_active};
use sparklet_core::{DispatchOutcome, EngineConfig, SparkletService, SparkletSession};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Result of executing a command
#[derive(Debug)]
pub enum CommandResult {
    /// Command executed successfully, continue REPL
    Success,
    /// Command executed, show this message
    Message(String),
    /// Exit the REPL
    Exit,
    /// Not a command, try evaluating as expression
    NotACommand,
    /// Error occurred
    Error(String),
    /// Watch a file for changes
    Watch(PathBuf),
}

/// Where the open Sparklet was loaded from
#[derive(Debug, Clone, PartialEq)]
pub enum SparkletSource {
    File(PathBuf),
    Library(String),
}

impl fmt::Display for SparkletSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SparkletSource::File(path) => write!(f, "{}", path.display()),
            SparkletSource::Library(id) => write!(f, "library:{}", id),
        }
    }
}

pub type HostSession = SparkletSession<ThreadTimers>;
pub type HostService = SparkletService<FileRepository, HttpGenerator>;

pub struct ActiveSparklet {
    pub session: HostSession,
    pub source: SparkletSource,
}

/// Context passed to command handlers
pub struct CommandContext {
    pub active: Option<ActiveSparklet>,
    /// Widgets numbered by the last printed view
    pub widgets: Vec<Widget>,
    pub service: HostService,
    pub store: FileDataStore,
    pub identity: String,
    pub engine: EngineConfig,
    fired_tx: Sender<TimerFired>,
    /// Bumped per opened session so firings from a closed one are dropped
    epoch: u64,
}

impl CommandContext {
    pub fn new(cli: &Cli, fired_tx: Sender<TimerFired>) -> Self {
        Self::with_parts(
            HostService::new(
                FileRepository::new(cli.library_dir()),
                HttpGenerator::new(cli.generator_url.clone()),
            ),
            FileDataStore::new(cli.spark_dir()),
            cli.identity.clone(),
            cli.engine_config(),
            fired_tx,
        )
    }

    pub fn with_parts(
        service: HostService,
        store: FileDataStore,
        identity: String,
        engine: EngineConfig,
        fired_tx: Sender<TimerFired>,
    ) -> Self {
        Self {
            active: None,
            widgets: Vec::new(),
            service,
            store,
            identity,
            engine,
            fired_tx,
            epoch: 0,
        }
    }

    /// Open a file path if it exists, otherwise treat `target` as a
    /// library id
    pub fn open_target(&mut self, target: &str) -> Result<&HostSession> {
        let path = Path::new(target);
        if path.is_file() {
            self.open_file(path)
        } else {
            self.open_library(target)
        }
    }

    pub fn open_file(&mut self, path: &Path) -> Result<&HostSession> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(self.mount(&json, SparkletSource::File(path.to_path_buf())))
    }

    /// Open a library record and remember it as the last active sparklet
    pub fn open_library(&mut self, id: &str) -> Result<&HostSession> {
        let json = self.service.definition(id)?;
        write_last_active(&mut self.store, Some(id));
        Ok(self.mount(&json, SparkletSource::Library(id.to_string())))
    }

    /// Reopen whatever was open last time, if anything
    pub fn resume(&mut self) -> Result<Option<&HostSession>> {
        match read_last_active(&self.store) {
            Some(id) => self.open_library(&id).map(Some),
            None => Ok(None),
        }
    }

    /// Replace the open session. The old session is dropped first, which
    /// cancels all of its timers.
    fn mount(&mut self, json: &str, source: SparkletSource) -> &HostSession {
        self.active = None;
        self.widgets.clear();
        self.epoch += 1;

        let timers = ThreadTimers::new(self.epoch, self.fired_tx.clone());
        let session = SparkletSession::from_json(json, timers, self.engine.clone());
        info!(sparklet = %session.title(), %source, "Opened");
        &self
            .active
            .insert(ActiveSparklet { session, source })
            .session
    }

    pub fn close(&mut self) -> bool {
        self.widgets.clear();
        match self.active.take() {
            Some(active) => {
                if matches!(active.source, SparkletSource::Library(_)) {
                    write_last_active(&mut self.store, None);
                }
                true
            }
            None => false,
        }
    }

    pub fn session(&self) -> Result<&HostSession> {
        match &self.active {
            Some(active) => Ok(&active.session),
            None => bail!("no sparklet is open (use 'open <file|id>')"),
        }
    }

    pub fn session_mut(&mut self) -> Result<&mut HostSession> {
        match &mut self.active {
            Some(active) => Ok(&mut active.session),
            None => bail!("no sparklet is open (use 'open <file|id>')"),
        }
    }

    pub fn source(&self) -> Option<&SparkletSource> {
        self.active.as_ref().map(|active| &active.source)
    }

    /// Deliver a timer firing from the timer thread
    pub fn handle_fired(&mut self, fired: TimerFired) -> Option<DispatchOutcome> {
        if fired.epoch != self.epoch {
            debug!(epoch = fired.epoch, id = %fired.id, "Dropping firing from a closed session");
            return None;
        }
        self.active.as_mut()?.session.fire(fired.id)
    }

    /// Render the open sparklet and renumber its widgets
    pub fn render_view(&mut self) -> Result<String> {
        let session = self.session()?;
        let title = session.title().to_string();
        let screen = render_screen(&session.render());
        self.widgets = screen.widgets;
        Ok(format!(
            "{} {}\n{}",
            "✦".bright_yellow(),
            title.bright_cyan().bold(),
            screen.text
        ))
    }

    /// Report a dispatch: the fresh view when state changed, otherwise a
    /// short status line
    pub fn outcome_message(&mut self, outcome: DispatchOutcome) -> CommandResult {
        match outcome {
            DispatchOutcome::Updated(_) => match self.render_view() {
                Ok(view) => CommandResult::Message(view),
                Err(e) => CommandResult::Error(e.to_string()),
            },
            DispatchOutcome::NoChange => CommandResult::Message("(no change)".dimmed().to_string()),
            DispatchOutcome::Missing => CommandResult::Error("no such action".to_string()),
            DispatchOutcome::Failed(message) => CommandResult::Error(message),
            DispatchOutcome::Closed => CommandResult::Error("sparklet is closed".to_string()),
        }
    }
}

/// A command handler function
pub type CommandHandler = fn(&str, &mut CommandContext) -> CommandResult;

/// Registry of available commands
pub struct CommandRegistry {
    /// Commands indexed by their prefix, longest first
    commands: Vec<(String, CommandHandler)>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    pub fn register(&mut self, prefix: &str, handler: CommandHandler) {
        self.commands.push((prefix.to_string(), handler));
        self.commands.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Execute a command, returning NotACommand if no match found
    pub fn execute(&self, input: &str, ctx: &mut CommandContext) -> CommandResult {
        for (prefix, handler) in &self.commands {
            if input == prefix || input.starts_with(&format!("{} ", prefix)) {
                let args = input[prefix.len()..].trim();
                return handler(args, ctx);
            }
        }
        CommandResult::NotACommand
    }

    pub fn list_commands(&self) -> Vec<&str> {
        self.commands.iter().map(|(p, _)| p.as_str()).collect()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a fully populated command registry with all built-in commands
pub fn create_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    // Running a sparklet
    registry.register("open", sparklet::cmd_open);
    registry.register("view", sparklet::cmd_view);
    registry.register("state", sparklet::cmd_state);
    registry.register("press", sparklet::cmd_press);
    registry.register("input", sparklet::cmd_input);
    registry.register("action", sparklet::cmd_action);
    registry.register("helper", sparklet::cmd_helper);
    registry.register("pending", sparklet::cmd_pending);
    registry.register("eval", sparklet::cmd_eval);
    registry.register("close", sparklet::cmd_close);

    // Library
    registry.register("library", library::cmd_library);
    registry.register("save", library::cmd_save);
    registry.register("update", library::cmd_update);
    registry.register("export", library::cmd_export);
    registry.register("duplicate", library::cmd_duplicate);
    registry.register("submit", library::cmd_submit);
    registry.register("publish", library::cmd_publish);
    registry.register("unpublish", library::cmd_unpublish);
    registry.register("delete", library::cmd_delete);
    registry.register("generate", library::cmd_generate);
    registry.register("refine", library::cmd_refine);

    // General commands
    registry.register("help", general::cmd_help);
    registry.register("quit", general::cmd_quit);
    registry.register("exit", general::cmd_quit);
    registry.register("watch", general::cmd_watch);

    registry
}

/// Parse an optional JSON params argument; empty means `{}`
pub(crate) fn parse_params(text: &str) -> Result<sparklet_core::Value> {
    if text.trim().is_empty() {
        return Ok(sparklet_core::Value::object());
    }
    let json: serde_json::Value =
        serde_json::from_str(text).with_context(|| format!("params are not JSON: {}", text))?;
    Ok(json.into())
}
