//! General REPL commands (help, quit, watch)

use crate::commands::{CommandContext, CommandResult};
use colored::*;
use std::path::PathBuf;

/// Handle `help` command
pub fn cmd_help(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    print_help();
    CommandResult::Success
}

/// Handle `quit` or `exit` command
pub fn cmd_quit(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    CommandResult::Exit
}

/// Handle `watch [file]`: open the file and reload it on every change.
/// Without an argument, watches the file that is already open.
pub fn cmd_watch(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let path = if args.is_empty() {
        match ctx.source() {
            Some(crate::commands::SparkletSource::File(path)) => path.clone(),
            _ => return CommandResult::Error("Usage: watch <file>".to_string()),
        }
    } else {
        PathBuf::from(args)
    };

    if let Err(e) = ctx.open_file(&path) {
        return CommandResult::Error(format!("{:#}", e));
    }
    CommandResult::Watch(path)
}

fn section(title: &str, rows: &[(&str, &str)]) {
    println!("{}", title.green());
    for (usage, text) in rows {
        println!("  {:<28} - {}", usage.cyan(), text);
    }
    println!();
}

/// Print help information
fn print_help() {
    println!("{}", "✦ Sparks Help".bold());
    println!("{}", "=============".bold());
    println!();
    section(
        "Running a Sparklet:",
        &[
            ("open <file|id>", "Open a definition file or library sparklet"),
            ("view", "Show the view; widgets are numbered"),
            ("state", "Print the current state as JSON"),
            ("press <n>", "Press button n"),
            ("input <n> <text>", "Type text into input n"),
            ("action <name> [json]", "Dispatch an action with params"),
            ("helper <name> [json]", "Call a helper and print its result"),
            ("pending", "List scheduled actions"),
            ("eval <expr>", "Evaluate an expression against state"),
            ("close", "Close the sparklet (cancels its timers)"),
        ],
    );
    section(
        "Library:",
        &[
            ("library", "List published and your own sparklets"),
            ("save [file]", "Add a definition file as a new draft"),
            ("update <id> [file]", "Replace a sparklet's definition"),
            ("export <id> <file>", "Write a sparklet's definition to a file"),
            ("duplicate <id>", "Copy a sparklet as your draft"),
            ("submit <id>", "Submit a draft for review"),
            ("publish <id>", "Publish a pending sparklet"),
            ("unpublish <id>", "Move a sparklet back to draft"),
            ("delete <id>", "Delete one of your sparklets"),
            ("generate <vision>", "Create a sparklet from a description"),
            ("refine <id> <vision>", "Ask for changes to a sparklet"),
        ],
    );
    section(
        "General:",
        &[
            ("watch [file]", "Reload the file whenever it changes"),
            ("help", "Show this help"),
            ("quit / exit", "Leave"),
        ],
    );
    println!("{}", "Examples:".green());
    println!("  sparks> {}", "open demos/tic-tac-toe.json".cyan());
    println!("  sparks> {}", "press 5".cyan());
    println!("  sparks> {}", "action onCellPress {\"index\": 0}".cyan());
    println!("  sparks> {}", "state.board.filter(c => c === 'X').length".cyan());
    println!();
    println!(
        "Anything that is not a command is evaluated as an expression against the state."
    );
}
