#[cfg(test)]
mod tests {
    use crossbeam_channel::{unbounded, Receiver};
    use sparks::commands::sparklet::{cmd_action, cmd_input, cmd_press, cmd_view};
    use sparks::commands::{
        create_registry, CommandContext, CommandResult, HostService, SparkletSource,
    };
    use sparks::generator::HttpGenerator;
    use sparks::terminal::Widget;
    use sparks::{FileDataStore, FileRepository, TimerFired};
    use sparklet_core::{EngineConfig, PublishStatus, SparkletRepository};
    use std::path::PathBuf;
    use std::time::Duration;

    const COUNTER: &str = r#"{
        "title": "Counter",
        "initialState": {"count": 0, "label": ""},
        "actions": {
            "increment": "return { count: state.count + 1 }",
            "later": "helpers.scheduleAction('increment', {}, 20)"
        },
        "view": {"elements": [
            {"type": "text", "value": "Count: {{ count }}"},
            {"type": "button", "label": "+1", "onPress": "increment"},
            {"type": "input", "binding": "state.label", "placeholder": "Label"}
        ]}
    }"#;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sparks-cmd-{}-{}", std::process::id(), name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn context(dir: &PathBuf) -> (CommandContext, Receiver<TimerFired>) {
        colored::control::set_override(false);
        let (tx, rx) = unbounded();
        let service = HostService::new(
            FileRepository::new(dir.join("library")),
            HttpGenerator::new(None),
        );
        let ctx = CommandContext::with_parts(
            service,
            FileDataStore::new(dir.join("spark")),
            "ada".to_string(),
            EngineConfig::default(),
            tx,
        );
        (ctx, rx)
    }

    fn message(result: CommandResult) -> String {
        match result {
            CommandResult::Message(text) => text,
            other => panic!("expected a message, got {:?}", other),
        }
    }

    fn write_counter(dir: &PathBuf) -> PathBuf {
        let path = dir.join("counter.json");
        std::fs::write(&path, COUNTER).unwrap();
        path
    }

    #[test]
    fn test_press_and_input_by_number() {
        let dir = scratch_dir("press");
        let (mut ctx, _rx) = context(&dir);
        ctx.open_file(&write_counter(&dir)).unwrap();

        let view = message(cmd_view("", &mut ctx));
        assert!(view.contains("Count: 0"));
        assert_eq!(ctx.widgets.len(), 2);
        assert!(matches!(ctx.widgets[1], Widget::Input { .. }));

        let view = message(cmd_press("1", &mut ctx));
        assert!(view.contains("Count: 1"));

        message(cmd_input("2 groceries", &mut ctx));
        assert_eq!(ctx.session().unwrap().state_json()["label"], "groceries");

        assert!(matches!(cmd_press("2", &mut ctx), CommandResult::Error(_)));
        assert!(matches!(cmd_press("9", &mut ctx), CommandResult::Error(_)));
    }

    #[test]
    fn test_scheduled_action_fires_on_wall_clock() {
        let dir = scratch_dir("timers");
        let (mut ctx, rx) = context(&dir);
        ctx.open_file(&write_counter(&dir)).unwrap();

        message(cmd_action("later", &mut ctx));
        assert!(ctx.session().unwrap().is_pending("increment"));

        let fired = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let outcome = ctx.handle_fired(fired).unwrap();
        assert!(outcome.changed());
        assert_eq!(ctx.session().unwrap().state_json()["count"], 1);
        assert!(!ctx.session().unwrap().is_pending("increment"));
    }

    #[test]
    fn test_reopen_drops_old_firings() {
        let dir = scratch_dir("epoch");
        let (mut ctx, rx) = context(&dir);
        let path = write_counter(&dir);
        ctx.open_file(&path).unwrap();
        message(cmd_action("later", &mut ctx));
        let stale = rx.recv_timeout(Duration::from_secs(2)).unwrap();

        ctx.open_file(&path).unwrap();
        assert!(ctx.handle_fired(stale).is_none());
        assert_eq!(ctx.session().unwrap().state_json()["count"], 0);
    }

    #[test]
    fn test_close_cancels_timers() {
        let dir = scratch_dir("close");
        let (mut ctx, rx) = context(&dir);
        ctx.open_file(&write_counter(&dir)).unwrap();
        message(cmd_action("later", &mut ctx));

        assert!(ctx.close());
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert!(ctx.session().is_err());
    }

    #[test]
    fn test_library_workflow_and_resume() {
        let dir = scratch_dir("library");
        let (mut ctx, _rx) = context(&dir);
        let registry = create_registry();
        let path = write_counter(&dir);

        let saved = message(registry.execute(&format!("save {}", path.display()), &mut ctx));
        assert!(saved.contains("Saved 'Counter'"));
        let id = ctx.service.repository().list().unwrap()[0].id.clone();

        message(registry.execute(&format!("open {}", id), &mut ctx));
        assert_eq!(ctx.source(), Some(&SparkletSource::Library(id.clone())));

        // Ids default to the open library sparklet
        message(registry.execute("submit", &mut ctx));
        message(registry.execute("publish", &mut ctx));
        assert_eq!(ctx.service.get(&id).unwrap().status, PublishStatus::Published);
        assert!(matches!(registry.execute("publish", &mut ctx), CommandResult::Error(_)));

        let listing = message(registry.execute("library", &mut ctx));
        assert!(listing.contains("Counter"));
        assert!(listing.contains("published"));

        // A fresh context over the same data dir resumes the same sparklet
        drop(ctx);
        let (mut resumed, _rx) = context(&dir);
        resumed.resume().unwrap();
        assert_eq!(resumed.source(), Some(&SparkletSource::Library(id)));
        assert_eq!(resumed.session().unwrap().title(), "Counter");
    }

    #[test]
    fn test_invalid_save_keeps_library_unchanged() {
        let dir = scratch_dir("invalid");
        let (mut ctx, _rx) = context(&dir);
        let registry = create_registry();
        let bad = dir.join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();

        match registry.execute(&format!("save {}", bad.display()), &mut ctx) {
            CommandResult::Error(e) => assert!(e.starts_with("Save failed")),
            other => panic!("expected an error, got {:?}", other),
        }
        assert!(ctx.service.repository().list().unwrap().is_empty());
    }

    #[test]
    fn test_generate_without_endpoint_reports_error() {
        let dir = scratch_dir("generate");
        let (mut ctx, _rx) = context(&dir);
        let registry = create_registry();

        match registry.execute("generate a tip calculator", &mut ctx) {
            CommandResult::Error(e) => assert!(e.contains("SPARKS_GENERATOR_URL")),
            other => panic!("expected an error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_input_is_not_a_command() {
        let dir = scratch_dir("eval");
        let (mut ctx, _rx) = context(&dir);
        assert!(matches!(
            create_registry().execute("count + 1", &mut ctx),
            CommandResult::NotACommand
        ));
    }
}
