/// Deserialization tests for entity and event payloads as the cockpit
/// backend writes them.
#[cfg(test)]
mod unit {
    use crate::types::{
        Command, CommandEvent, CommandStatus, Entity, EventKind, LogLine, LogStream,
        MutationEvent,
    };
    use chrono::{Datelike, Timelike};

    #[test]
    fn parse_command() {
        let json = r#"{
            "id": "01HXAMPLE0000000000000000A",
            "createdAt": "2024-05-01T10:11:12.345678901Z",
            "command": "ls -la",
            "status": "RUNNING"
        }"#;
        let cmd: Command = serde_json::from_str(json).unwrap();
        assert_eq!(cmd.id, "01HXAMPLE0000000000000000A");
        assert_eq!(cmd.command, "ls -la");
        assert_eq!(cmd.status, CommandStatus::Running);
        assert_eq!(cmd.created_at.year(), 2024);
        assert_eq!(cmd.created_at.nanosecond(), 345_678_901);
    }

    #[test]
    fn parse_command_event_each_kind() {
        for (kind, expected) in [
            ("create", EventKind::Create),
            ("update", EventKind::Update),
            ("delete", EventKind::Delete),
        ] {
            let json = format!(
                r#"{{"id":"a","createdAt":"2024-05-01T10:00:00Z","command":"true","status":"EXITED","type":"{kind}"}}"#
            );
            let event = Command::decode_event(&json).unwrap();
            assert_eq!(event.kind, expected);
            assert_eq!(event.entity.status, CommandStatus::Exited);
        }
    }

    #[test]
    fn command_event_without_type_is_rejected() {
        let json = r#"{"id":"a","createdAt":"2024-05-01T10:00:00Z","command":"true","status":"IDLE"}"#;
        assert!(Command::decode_event(json).is_err());
    }

    #[test]
    fn unknown_status_is_rejected() {
        let json = r#"{"id":"a","createdAt":"2024-05-01T10:00:00Z","command":"true","status":"PAUSED","type":"update"}"#;
        assert!(Command::decode_event(json).is_err());
    }

    #[test]
    fn command_event_serializes_flat() {
        let event: CommandEvent = MutationEvent::delete(Command {
            id: "a".into(),
            created_at: "2024-05-01T10:00:00Z".parse().unwrap(),
            command: "true".into(),
            status: CommandStatus::Error,
        })
        .into();
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "delete");
        assert_eq!(value["status"], "ERROR");
        assert_eq!(value["createdAt"], "2024-05-01T10:00:00Z");
        assert!(value.get("command").is_some());
    }

    #[test]
    fn parse_log_line_fds() {
        for (fd, expected) in [
            (1, LogStream::Stdout),
            (2, LogStream::Stderr),
            (-1, LogStream::Error),
        ] {
            let json = format!(
                r#"{{"id":"l","commandId":"c","createdAt":"2024-05-01T10:00:00Z","content":"hi","fd":{fd}}}"#
            );
            let line: LogLine = serde_json::from_str(&json).unwrap();
            assert_eq!(line.stream, expected);
            assert_eq!(line.command_id, "c");
        }
    }

    #[test]
    fn unknown_fd_is_rejected() {
        let json = r#"{"id":"l","commandId":"c","createdAt":"2024-05-01T10:00:00Z","content":"hi","fd":3}"#;
        assert!(serde_json::from_str::<LogLine>(json).is_err());
    }

    #[test]
    fn log_payload_decodes_as_create() {
        let json = r#"{"id":"l","commandId":"c","createdAt":"2024-05-01T10:00:00Z","content":"out","fd":2}"#;
        let event = LogLine::decode_event(json).unwrap();
        assert_eq!(event.kind, EventKind::Create);
        assert_eq!(event.entity.stream, LogStream::Stderr);
    }

    #[test]
    fn command_update_only_touches_status() {
        let mut original: Command = serde_json::from_str(
            r#"{"id":"a","createdAt":"2024-05-01T10:00:00Z","command":"sleep 1","status":"IDLE"}"#,
        )
        .unwrap();
        let update: Command = serde_json::from_str(
            r#"{"id":"a","createdAt":"2030-01-01T00:00:00Z","command":"other","status":"RUNNING"}"#,
        )
        .unwrap();
        original.apply_update(&update);
        assert_eq!(original.status, CommandStatus::Running);
        assert_eq!(original.command, "sleep 1");
        assert_eq!(original.created_at.year(), 2024);
    }

    #[test]
    fn finished_statuses() {
        assert!(!CommandStatus::Idle.is_finished());
        assert!(!CommandStatus::Running.is_finished());
        assert!(CommandStatus::Exited.is_finished());
        assert!(CommandStatus::Error.is_finished());
    }
}
