//! REPL (Read-Eval-Print Loop) hosting one Sparklet at a time
//!
//! Three event sources feed one loop: typed lines from the editor thread,
//! elapsed timers from the session's timer thread and file-watch events.
//! All session work happens on this thread.

use crate::commands::{
    create_registry, sparklet, CommandContext, CommandRegistry, CommandResult, SparkletSource,
};
use crate::config::Cli;
use crate::repl::watcher::{canonical, FileWatcher};
use crate::timers::TimerFired;
use anyhow::{anyhow, Result};
use colored::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use notify::{Event, EventKind};
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RustylineResult};
use std::path::Path;
use std::thread;
use tracing::debug;

pub mod watcher;

/// Types of events the REPL loop handles
enum ReplEvent {
    Input(Result<String, ReadlineError>),
}

/// Interactive REPL for Sparklets
pub struct Repl {
    editor: Option<DefaultEditor>,
    registry: CommandRegistry,
    ctx: CommandContext,

    // Event channels
    tx_input: Sender<ReplEvent>,
    rx_input: Receiver<ReplEvent>,
    rx_timers: Receiver<TimerFired>,
    tx_watcher: Sender<notify::Result<Event>>,
    rx_watcher: Receiver<notify::Result<Event>>,

    // File watcher
    watcher: Option<FileWatcher>,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(cli: &Cli) -> RustylineResult<Self> {
        let editor = DefaultEditor::new()?;
        let (tx_input, rx_input) = unbounded();
        let (tx_timers, rx_timers) = unbounded();
        let (tx_watcher, rx_watcher) = unbounded();

        Ok(Repl {
            editor: Some(editor),
            registry: create_registry(),
            ctx: CommandContext::new(cli, tx_timers),
            tx_input,
            rx_input,
            rx_timers,
            tx_watcher,
            rx_watcher,
            watcher: None,
        })
    }

    /// Open the sparklet named on the command line, or resume the last
    /// active one
    fn open_initial(&mut self, cli: &Cli) {
        let opened = match &cli.definition {
            Some(target) => self.ctx.open_target(target).map(|_| ()),
            None => self.ctx.resume().map(|_| ()),
        };
        if let Err(e) = opened {
            println!("{} {:#}", "Error:".bright_red().bold(), e);
            return;
        }
        if self.ctx.active.is_none() {
            return;
        }

        if cli.watch {
            match self.ctx.source().cloned() {
                Some(SparkletSource::File(path)) => self.watch(&path),
                _ => println!("{} --watch needs a definition file", "Note:".yellow()),
            }
        }
        let view = sparklet::cmd_view("", &mut self.ctx);
        self.show(view);
    }

    /// Print a command result. Returns false when the REPL should exit.
    fn show(&mut self, result: CommandResult) -> bool {
        match result {
            CommandResult::Success => {}
            CommandResult::Message(msg) => println!("{}", msg),
            CommandResult::Exit => {
                println!("{} ✦", "Goodbye!".bright_cyan());
                return false;
            }
            CommandResult::Error(e) => {
                println!("{} {}", "Error:".bright_red().bold(), e.red());
            }
            CommandResult::Watch(path) => {
                self.watch(&path);
                let view = sparklet::cmd_view("", &mut self.ctx);
                return self.show(view);
            }
            CommandResult::NotACommand => {}
        }
        true
    }

    fn watch(&mut self, path: &Path) {
        // Initialize watcher if needed
        if self.watcher.is_none() {
            match FileWatcher::new(self.tx_watcher.clone()) {
                Ok(w) => self.watcher = Some(w),
                Err(e) => {
                    println!("{} Failed to create watcher: {}", "Error:".red(), e);
                    return;
                }
            }
        }

        if let Some(w) = &mut self.watcher {
            match w.watch_file(path) {
                Ok(true) => println!(
                    "{} Watching {} for changes...",
                    "👀".bright_cyan(),
                    path.display().to_string().bright_green()
                ),
                Ok(false) => {}
                Err(e) => println!("{} Failed to watch {}: {}", "Error:".red(), path.display(), e),
            }
        }
    }

    /// Reload a changed file if it is the open sparklet
    fn reload(&mut self, changed: &Path) {
        if !self.watcher.as_ref().is_some_and(|w| w.is_watched(changed)) {
            return;
        }
        let changed = canonical(changed);
        let is_open = matches!(
            self.ctx.source(),
            Some(SparkletSource::File(path)) if canonical(path) == changed
        );
        if !is_open {
            debug!(path = %changed.display(), "Ignoring change to a file that is not open");
            return;
        }

        println!("{} File changed: {}", "⚡".bright_yellow(), changed.display());
        match self.ctx.open_file(&changed) {
            Ok(session) => match session.load_error() {
                Some(e) => println!("{} {}", "Reloaded with errors:".yellow(), e),
                None => println!("{} Reloaded successfully", "✓".bright_green()),
            },
            Err(e) => {
                println!("{} {:#}", "Error:".red(), e);
                return;
            }
        }
        let view = sparklet::cmd_view("", &mut self.ctx);
        self.show(view);
    }

    fn handle_line(&mut self, line: &str) -> bool {
        match self.registry.execute(line, &mut self.ctx) {
            // Anything else is an expression against the open sparklet
            CommandResult::NotACommand => {
                let result = sparklet::cmd_eval(line, &mut self.ctx);
                self.show(result)
            }
            result => self.show(result),
        }
    }

    /// Start the REPL loop
    pub fn run(&mut self, cli: &Cli) -> Result<()> {
        println!(
            "{} {}",
            "✦".bright_yellow(),
            "Sparks: a terminal home for Sparklets".bright_cyan().bold()
        );
        println!(
            "Type '{}' for more information, '{}' or {} to exit.\n",
            "help".bright_green(),
            "quit".bright_red(),
            "Ctrl+C".bright_red()
        );

        self.open_initial(cli);

        // Move editor to thread
        let mut editor = self
            .editor
            .take()
            .ok_or_else(|| anyhow!("REPL is already running"))?;
        let tx_input = self.tx_input.clone();

        thread::spawn(move || loop {
            let prompt = format!("{} ", "sparks>".bright_magenta().bold());
            let readline = editor.readline(&prompt);

            match readline {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if !line.is_empty() {
                        let _ = editor.add_history_entry(&line);
                    }
                    if tx_input.send(ReplEvent::Input(Ok(line))).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    let _ = tx_input.send(ReplEvent::Input(Err(err)));
                    break;
                }
            }
        });

        loop {
            crossbeam_channel::select! {
                recv(self.rx_input) -> msg => match msg {
                    Ok(ReplEvent::Input(Ok(line))) => {
                        if line.is_empty() {
                            continue;
                        }
                        if !self.handle_line(&line) {
                            break;
                        }
                    }
                    Ok(ReplEvent::Input(Err(ReadlineError::Interrupted)))
                    | Ok(ReplEvent::Input(Err(ReadlineError::Eof))) => {
                        println!("{} ✦", "Goodbye!".bright_cyan());
                        break;
                    }
                    Ok(ReplEvent::Input(Err(err))) => {
                        println!(
                            "{} {}",
                            "Error reading input:".bright_red().bold(),
                            err.to_string().red()
                        );
                        break;
                    }
                    Err(_) => break, // Channel closed
                },

                recv(self.rx_timers) -> msg => match msg {
                    Ok(fired) => {
                        // Only redraw when the scheduled action changed something;
                        // failures are already logged by the session
                        match self.ctx.handle_fired(fired) {
                            Some(outcome) if outcome.changed() => {
                                let result = self.ctx.outcome_message(outcome);
                                self.show(result);
                            }
                            _ => {}
                        }
                    }
                    Err(_) => break,
                },

                recv(self.rx_watcher) -> msg => match msg {
                    Ok(Ok(event)) => {
                        if let EventKind::Modify(_) | EventKind::Create(_) = event.kind {
                            for path in event.paths {
                                self.reload(&path);
                            }
                        }
                    }
                    Ok(Err(e)) => println!("{} Watch error: {}", "Error:".red(), e),
                    Err(_) => break, // Channel closed
                }
            }
        }

        // Tear down without clearing the pointer so the next start resumes
        drop(self.ctx.active.take());
        Ok(())
    }
}

/// Convenience function to start the REPL
pub fn start(cli: &Cli) -> Result<()> {
    let mut repl = Repl::new(cli).map_err(|e| anyhow!("Failed to initialize REPL: {}", e))?;
    repl.run(cli)
}
