//! Library commands: saving, sharing and generating sparklets
//!
//! Commands taking an `<id>` fall back to the open library sparklet when
//! the id is omitted.

use crate::commands::{CommandContext, CommandResult, SparkletSource};
use colored::*;
use sparklet_core::{PublishStatus, SparkletRecord};
use std::path::PathBuf;

/// Handle `library`
pub fn cmd_library(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    let records = match ctx.service.list_visible(&ctx.identity) {
        Ok(records) => records,
        Err(e) => return CommandResult::Error(e.to_string()),
    };
    if records.is_empty() {
        return CommandResult::Message(
            "Library is empty. Use 'save <file>' or 'generate <vision>'.".to_string(),
        );
    }

    let active = active_id(ctx);
    let mut out = format!("📚 Library ({}):", records.len());
    for record in &records {
        let marker = if active.as_deref() == Some(record.id.as_str()) {
            "▶".bright_green().to_string()
        } else {
            " ".to_string()
        };
        let owner = if record.is_owned_by(&ctx.identity) {
            String::new()
        } else {
            format!(" by {}", record.owner).dimmed().to_string()
        };
        out.push_str(&format!(
            "\n {} {}  {:<9} {} {}{}",
            marker,
            record.id.bright_black(),
            status_label(record.status),
            record.icon,
            record.title.bold(),
            owner
        ));
    }
    CommandResult::Message(out)
}

/// Handle `save [file]`: store a definition file as a new draft
pub fn cmd_save(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let path = match file_arg(args, ctx) {
        Ok(path) => path,
        Err(e) => return CommandResult::Error(e),
    };
    let json = match std::fs::read_to_string(&path) {
        Ok(json) => json,
        Err(e) => return CommandResult::Error(format!("reading {}: {}", path.display(), e)),
    };
    match ctx.service.create(&ctx.identity, &json) {
        Ok(record) => CommandResult::Message(format!(
            "{} Saved '{}' as {}",
            "✓".bright_green(),
            record.title,
            record.id.bright_cyan()
        )),
        Err(e) => save_failed(e),
    }
}

/// Handle `update <id> [file]`
pub fn cmd_update(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let (id, file) = args.split_once(' ').unwrap_or((args, ""));
    if id.is_empty() {
        return CommandResult::Error("Usage: update <id> [file]".to_string());
    }
    let path = match file_arg(file, ctx) {
        Ok(path) => path,
        Err(e) => return CommandResult::Error(e),
    };
    let json = match std::fs::read_to_string(&path) {
        Ok(json) => json,
        Err(e) => return CommandResult::Error(format!("reading {}: {}", path.display(), e)),
    };
    match ctx.service.update_definition(id, &ctx.identity, &json) {
        Ok(record) => {
            let reopened = reopen_if_active(ctx, &record.id);
            CommandResult::Message(format!(
                "{} Updated {}{}",
                "✓".bright_green(),
                record.id.bright_cyan(),
                reopened
            ))
        }
        Err(e) => save_failed(e),
    }
}

/// Handle `export <id> <file>`
pub fn cmd_export(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let Some((id, file)) = args.split_once(' ') else {
        return CommandResult::Error("Usage: export <id> <file>".to_string());
    };
    let json = match ctx.service.definition(id) {
        Ok(json) => json,
        Err(e) => return CommandResult::Error(e.to_string()),
    };
    // Pretty-print for editing; fall back to the stored text as-is
    let text = serde_json::from_str::<serde_json::Value>(&json)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or(json);
    match std::fs::write(file.trim(), text) {
        Ok(()) => CommandResult::Message(format!("Wrote {} to {}", id, file.trim())),
        Err(e) => CommandResult::Error(format!("writing {}: {}", file.trim(), e)),
    }
}

/// Handle `duplicate [id]`
pub fn cmd_duplicate(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let id = match id_arg(args, ctx) {
        Ok(id) => id,
        Err(e) => return CommandResult::Error(e),
    };
    match ctx.service.duplicate(&id, &ctx.identity) {
        Ok(record) => CommandResult::Message(format!(
            "{} Duplicated as '{}' ({})",
            "✓".bright_green(),
            record.title,
            record.id.bright_cyan()
        )),
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

/// Handle `submit [id]`
pub fn cmd_submit(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let id = match id_arg(args, ctx) {
        Ok(id) => id,
        Err(e) => return CommandResult::Error(e),
    };
    status_result(ctx.service.submit_for_review(&id, &ctx.identity))
}

/// Handle `publish [id]`
pub fn cmd_publish(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let id = match id_arg(args, ctx) {
        Ok(id) => id,
        Err(e) => return CommandResult::Error(e),
    };
    status_result(ctx.service.publish(&id))
}

/// Handle `unpublish [id]`
pub fn cmd_unpublish(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let id = match id_arg(args, ctx) {
        Ok(id) => id,
        Err(e) => return CommandResult::Error(e),
    };
    status_result(ctx.service.unpublish(&id, &ctx.identity))
}

/// Handle `delete <id>`; the id is required
pub fn cmd_delete(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: delete <id>".to_string());
    }
    match ctx.service.delete(args, &ctx.identity) {
        Ok(()) => {
            if active_id(ctx).as_deref() == Some(args) {
                ctx.close();
            }
            CommandResult::Message(format!("Deleted {}", args))
        }
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

/// Handle `generate <vision>`: create and open a new sparklet
pub fn cmd_generate(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: generate <vision>".to_string());
    }
    println!("{}", "Generating...".dimmed());
    let (record, summary) = match ctx.service.create_from_vision(&ctx.identity, args) {
        Ok(created) => created,
        Err(e) => return CommandResult::Error(e.to_string()),
    };
    if let Err(e) = ctx.open_library(&record.id) {
        return CommandResult::Error(format!("{:#}", e));
    }
    with_view(
        ctx,
        format!(
            "{} Created '{}' ({})\n{}",
            "✓".bright_green(),
            record.title,
            record.id.bright_cyan(),
            summary.italic()
        ),
    )
}

/// Handle `refine <id> <vision>`
pub fn cmd_refine(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let Some((id, vision)) = args.split_once(' ') else {
        return CommandResult::Error("Usage: refine <id> <vision>".to_string());
    };
    println!("{}", "Refining...".dimmed());
    match ctx.service.refine(id, &ctx.identity, vision.trim()) {
        Ok((record, summary)) => {
            let reopened = reopen_if_active(ctx, &record.id);
            CommandResult::Message(format!(
                "{} Refined {}{}\n{}",
                "✓".bright_green(),
                record.id.bright_cyan(),
                reopened,
                summary.italic()
            ))
        }
        Err(e) => CommandResult::Error(format!("{} (the sparklet was not changed)", e)),
    }
}

fn active_id(ctx: &CommandContext) -> Option<String> {
    match ctx.source() {
        Some(SparkletSource::Library(id)) => Some(id.clone()),
        _ => None,
    }
}

fn id_arg(args: &str, ctx: &CommandContext) -> Result<String, String> {
    if !args.is_empty() {
        return Ok(args.to_string());
    }
    active_id(ctx).ok_or_else(|| "no library sparklet is open; pass an id".to_string())
}

fn file_arg(args: &str, ctx: &CommandContext) -> Result<PathBuf, String> {
    if !args.trim().is_empty() {
        return Ok(PathBuf::from(args.trim()));
    }
    match ctx.source() {
        Some(SparkletSource::File(path)) => Ok(path.clone()),
        _ => Err("no definition file is open; pass a file".to_string()),
    }
}

/// Reopen the sparklet if it is the one on screen
fn reopen_if_active(ctx: &mut CommandContext, id: &str) -> String {
    if active_id(ctx).as_deref() != Some(id) {
        return String::new();
    }
    match ctx.open_library(id) {
        Ok(_) => " and reloaded it".to_string(),
        Err(e) => format!(" but could not reload it: {:#}", e),
    }
}

fn with_view(ctx: &mut CommandContext, message: String) -> CommandResult {
    match ctx.render_view() {
        Ok(view) => CommandResult::Message(format!("{}\n{}", message, view)),
        Err(_) => CommandResult::Message(message),
    }
}

fn status_result(result: Result<SparkletRecord, sparklet_core::ServiceError>) -> CommandResult {
    match result {
        Ok(record) => CommandResult::Message(format!(
            "{} is now {}",
            record.id.bright_cyan(),
            status_label(record.status)
        )),
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

fn save_failed(e: sparklet_core::ServiceError) -> CommandResult {
    CommandResult::Error(format!("Save failed: {}", e))
}

fn status_label(status: PublishStatus) -> ColoredString {
    match status {
        PublishStatus::Draft => "draft".yellow(),
        PublishStatus::Pending => "pending".bright_blue(),
        PublishStatus::Published => "published".bright_green(),
    }
}
