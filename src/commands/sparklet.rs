//! Commands that drive the open Sparklet

use crate::commands::{parse_params, CommandContext, CommandResult};
use crate::terminal::Widget;
use colored::*;
use sparklet_core::Value;

/// Handle `open <file|id>`
pub fn cmd_open(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: open <file|id>".to_string());
    }
    if let Err(e) = ctx.open_target(args) {
        return CommandResult::Error(format!("{:#}", e));
    }
    cmd_view("", ctx)
}

/// Handle `view`
pub fn cmd_view(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    match ctx.render_view() {
        Ok(view) => CommandResult::Message(view),
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

/// Handle `state`
pub fn cmd_state(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    let session = match ctx.session() {
        Ok(session) => session,
        Err(e) => return CommandResult::Error(e.to_string()),
    };
    let mut out = pretty(&session.state_json());
    if session.revision() > 0 {
        out.push_str(&format!(
            "\n{}",
            format!(
                "revision {} (last change: {})",
                session.revision(),
                session.last_change().join(", ")
            )
            .dimmed()
        ));
    }
    CommandResult::Message(out)
}

/// Handle `press <n>`
pub fn cmd_press(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let target = match widget(args, ctx) {
        Ok(Widget::Press { target, .. }) => target,
        Ok(other) => return CommandResult::Error(format!("{} is an {}", args, other.describe())),
        Err(e) => return CommandResult::Error(e),
    };
    match ctx.session_mut() {
        Ok(session) => {
            let outcome = session.press(&target);
            ctx.outcome_message(outcome)
        }
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

/// Handle `input <n> <text>`
pub fn cmd_input(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let (number, text) = args.split_once(' ').unwrap_or((args, ""));
    let binding = match widget(number, ctx) {
        Ok(Widget::Input { binding }) => binding,
        Ok(other) => return CommandResult::Error(format!("{} is a {}", number, other.describe())),
        Err(e) => return CommandResult::Error(e),
    };
    if binding.is_empty() {
        return CommandResult::Error(format!("input {} has no binding", number));
    }
    match ctx.session_mut() {
        Ok(session) => {
            let outcome = session.set_binding(&binding, text.trim());
            ctx.outcome_message(outcome)
        }
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

/// Handle `action <name> [json]`
pub fn cmd_action(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let (name, params) = args.split_once(' ').unwrap_or((args, ""));
    if name.is_empty() {
        return CommandResult::Error("Usage: action <name> [json]".to_string());
    }
    let params = match parse_params(params) {
        Ok(params) => params,
        Err(e) => return CommandResult::Error(format!("{:#}", e)),
    };
    match ctx.session_mut() {
        Ok(session) => {
            let outcome = session.execute_action(name, params);
            ctx.outcome_message(outcome)
        }
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

/// Handle `helper <name> [json]`
pub fn cmd_helper(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let (name, params) = args.split_once(' ').unwrap_or((args, ""));
    if name.is_empty() {
        return CommandResult::Error("Usage: helper <name> [json]".to_string());
    }
    let params = match parse_params(params) {
        Ok(params) => params,
        Err(e) => return CommandResult::Error(format!("{:#}", e)),
    };
    match ctx.session_mut() {
        Ok(session) => CommandResult::Message(pretty(&session.run_helper(name, params).to_json())),
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

/// Handle `pending`
pub fn cmd_pending(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    let session = match ctx.session() {
        Ok(session) => session,
        Err(e) => return CommandResult::Error(e.to_string()),
    };
    let pending = session.pending();
    if pending.is_empty() {
        return CommandResult::Message("No scheduled actions".to_string());
    }

    let mut out = format!("⏱  Scheduled actions ({}):", pending.len());
    for (name, schedule) in pending {
        out.push_str(&format!(
            "\n  {} {} after {}ms {}",
            name.bright_green(),
            schedule.params.to_json(),
            schedule.delay_ms,
            format!("(timer {})", schedule.timer).dimmed()
        ));
    }
    CommandResult::Message(out)
}

/// Handle `eval <expr>`; also used for input that is not a command
pub fn cmd_eval(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: eval <expression>".to_string());
    }
    match ctx.session() {
        Ok(session) => {
            let value = session.interpolate(&Value::string(format!("{{{{ {} }}}}", args)));
            CommandResult::Message(match value {
                Value::String(text) => format!("{:?}", text),
                Value::Undefined => "undefined".dimmed().to_string(),
                other => pretty(&other.to_json()),
            })
        }
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

/// Handle `close`
pub fn cmd_close(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    if ctx.close() {
        CommandResult::Message("Closed sparklet; all scheduled actions cancelled".to_string())
    } else {
        CommandResult::Error("no sparklet is open".to_string())
    }
}

/// Look up a numbered widget from the last printed view
fn widget(number: &str, ctx: &CommandContext) -> Result<Widget, String> {
    let index = number
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("'{}' is not a widget number", number.trim()))?;
    if ctx.widgets.is_empty() {
        return Err("no widgets on screen (use 'view')".to_string());
    }
    index
        .checked_sub(1)
        .and_then(|i| ctx.widgets.get(i))
        .cloned()
        .ok_or_else(|| format!("widget {} does not exist (1-{})", index, ctx.widgets.len()))
}

fn pretty(json: &serde_json::Value) -> String {
    serde_json::to_string_pretty(json).unwrap_or_else(|_| json.to_string())
}
