use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ─── Entity ───────────────────────────────────────────────────────────────

/// A record that can live in a [`Collection`](crate::collection::Collection).
///
/// Ids are opaque strings that sort in creation order; they double as the
/// dedup key and as the `before` cursor for paging.
pub trait Entity: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> &str;

    /// Copy the mutable fields of `update` into `self`. Identity and creation
    /// fields are left alone.
    fn apply_update(&mut self, update: &Self);

    /// Decode one push message payload for this entity's scope.
    fn decode_event(payload: &str) -> Result<MutationEvent<Self>, serde_json::Error>;
}

// ─── Mutation events ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

/// An entity value tagged with what happened to it.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationEvent<E> {
    pub kind: EventKind,
    pub entity: E,
}

impl<E> MutationEvent<E> {
    pub fn create(entity: E) -> Self {
        Self {
            kind: EventKind::Create,
            entity,
        }
    }

    pub fn update(entity: E) -> Self {
        Self {
            kind: EventKind::Update,
            entity,
        }
    }

    pub fn delete(entity: E) -> Self {
        Self {
            kind: EventKind::Delete,
            entity,
        }
    }
}

// ─── Command ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandStatus {
    Idle,
    Running,
    Exited,
    Error,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Idle => "IDLE",
            CommandStatus::Running => "RUNNING",
            CommandStatus::Exited => "EXITED",
            CommandStatus::Error => "ERROR",
        }
    }

    /// `true` once the command will never produce more output.
    pub fn is_finished(&self) -> bool {
        matches!(self, CommandStatus::Exited | CommandStatus::Error)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// The shell text submitted by the user.
    pub command: String,
    pub status: CommandStatus,
}

/// Wire shape of a message on the command stream: the command object with
/// an extra `"type"` discriminator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(flatten)]
    pub command: Command,
}

impl From<CommandEvent> for MutationEvent<Command> {
    fn from(ev: CommandEvent) -> Self {
        MutationEvent {
            kind: ev.kind,
            entity: ev.command,
        }
    }
}

impl From<MutationEvent<Command>> for CommandEvent {
    fn from(ev: MutationEvent<Command>) -> Self {
        CommandEvent {
            kind: ev.kind,
            command: ev.entity,
        }
    }
}

impl Entity for Command {
    fn id(&self) -> &str {
        &self.id
    }

    fn apply_update(&mut self, update: &Self) {
        self.status = update.status;
    }

    fn decode_event(payload: &str) -> Result<MutationEvent<Self>, serde_json::Error> {
        serde_json::from_str::<CommandEvent>(payload).map(Into::into)
    }
}

// ─── LogLine ──────────────────────────────────────────────────────────────

/// Which file descriptor a log line came from. On the wire this is the raw
/// fd number, with `-1` reserved for lines the runner itself wrote when the
/// command could not be started or read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum LogStream {
    Stdout,
    Stderr,
    Error,
}

impl TryFrom<i32> for LogStream {
    type Error = String;

    fn try_from(fd: i32) -> Result<Self, String> {
        match fd {
            1 => Ok(LogStream::Stdout),
            2 => Ok(LogStream::Stderr),
            -1 => Ok(LogStream::Error),
            other => Err(format!("unknown log fd {other}")),
        }
    }
}

impl From<LogStream> for i32 {
    fn from(stream: LogStream) -> i32 {
        match stream {
            LogStream::Stdout => 1,
            LogStream::Stderr => 2,
            LogStream::Error => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLine {
    pub id: String,
    pub command_id: String,
    pub created_at: DateTime<Utc>,
    pub content: String,
    #[serde(rename = "fd")]
    pub stream: LogStream,
}

impl Entity for LogLine {
    fn id(&self) -> &str {
        &self.id
    }

    // Log lines are append-only; nothing is mutable.
    fn apply_update(&mut self, _update: &Self) {}

    fn decode_event(payload: &str) -> Result<MutationEvent<Self>, serde_json::Error> {
        serde_json::from_str::<LogLine>(payload).map(MutationEvent::create)
    }
}
