use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context};
use cockpit_client::{Command, CommandStatus, LogLine, Snapshot};
use tokio::sync::watch;

use super::logs::LogPrinter;
use super::{load_all, Ctx};
use crate::output::{print_json, print_json_line};

/// How long to keep reading output after the command finishes. The server
/// may write its own diagnostic line just after the final status.
const SETTLE: Duration = Duration::from_millis(250);

pub async fn run(ctx: &Ctx, command: &str, follow: bool) -> anyhow::Result<()> {
    let created = ctx
        .http
        .create_command(command)
        .await
        .context("failed to start command")?;

    if ctx.json && !follow {
        return print_json(&created);
    }
    if ctx.json {
        print_json_line(&created)?;
    } else {
        eprintln!("started {}: {}", created.id, created.command);
    }
    if !follow {
        println!("{}", created.id);
        return Ok(());
    }

    let status = tail(ctx, &created).await?;
    match status {
        Some(CommandStatus::Error) => bail!("command {} failed", created.id),
        Some(status) => {
            if !ctx.json {
                eprintln!("command {} {}", created.id, status.as_str().to_lowercase());
            }
            Ok(())
        }
        None => Ok(()),
    }
}

/// Print the command's output until it finishes. Returns the final status,
/// or `None` when interrupted.
async fn tail(ctx: &Ctx, created: &Command) -> anyhow::Result<Option<CommandStatus>> {
    let id = created.id.as_str();
    let commands = ctx
        .reconciler
        .commands()
        .await
        .context("failed to watch command status")?;
    let logs = ctx
        .reconciler
        .logs(id)
        .await
        .with_context(|| format!("failed to load logs for command '{id}'"))?;
    // The seed is only the newest page; output written before the stream
    // connected may be older than that.
    load_all(&logs).await?;

    let mut status_rx = commands.subscribe();
    let mut logs_rx = logs.subscribe();
    let mut printer = LogPrinter::new(ctx.json);
    printer.print_new(&logs_rx.borrow_and_update())?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let finished = loop {
        let status = {
            let snapshot = status_rx.borrow_and_update();
            if !snapshot.live {
                bail!("lost the command stream before {id} finished");
            }
            snapshot.get(id).map(|cmd| cmd.status)
        };
        match status {
            Some(status) if status.is_finished() => break status,
            Some(_) => {}
            None => bail!("command {id} was removed before it finished"),
        }

        tokio::select! {
            changed = logs_rx.changed() => {
                if changed.is_err() {
                    bail!("log stream for {id} closed");
                }
                let snapshot = logs_rx.borrow_and_update().clone();
                printer.print_new(&snapshot)?;
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    bail!("lost the command stream before {id} finished");
                }
            }
            _ = &mut ctrl_c => {
                logs.deactivate();
                commands.deactivate();
                return Ok(None);
            }
        }
    };

    settle(&mut logs_rx, &mut printer, SETTLE).await?;

    logs.deactivate();
    commands.deactivate();
    Ok(Some(finished))
}

/// Keep printing lines that arrive within `window`, then print whatever the
/// latest snapshot holds.
async fn settle<W: Write>(
    logs_rx: &mut watch::Receiver<Snapshot<LogLine>>,
    printer: &mut LogPrinter<W>,
    window: Duration,
) -> anyhow::Result<()> {
    let drained = tokio::time::timeout(window, async {
        while logs_rx.changed().await.is_ok() {
            let snapshot = logs_rx.borrow_and_update().clone();
            printer.print_new(&snapshot)?;
        }
        anyhow::Ok(())
    })
    .await;
    if let Ok(Err(e)) = drained {
        return Err(e);
    }

    let snapshot = logs_rx.borrow_and_update().clone();
    printer.print_new(&snapshot)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cockpit_client::LogStream;
    use std::io;
    use std::sync::Arc;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn snapshot(contents: &[&str]) -> Snapshot<LogLine> {
        let items = contents
            .iter()
            .enumerate()
            .rev()
            .map(|(i, content)| {
                Arc::new(LogLine {
                    id: format!("l{i}"),
                    command_id: "c".to_string(),
                    created_at: "2024-05-01T10:00:00Z".parse().unwrap(),
                    content: content.to_string(),
                    stream: LogStream::Stdout,
                })
            })
            .collect();
        Snapshot {
            items,
            has_more: false,
            live: true,
            version: 0,
        }
    }

    #[tokio::test]
    async fn settle_prints_late_lines() {
        let (tx, mut rx) = watch::channel(snapshot(&["one"]));
        let mut printer = LogPrinter::with_writer(false, Vec::new());
        printer.print_new(&rx.borrow_and_update()).unwrap();

        tx.send_replace(snapshot(&["one", "two"]));
        settle(&mut rx, &mut printer, Duration::from_millis(20))
            .await
            .unwrap();

        let out = String::from_utf8(printer.into_writer()).unwrap();
        assert_eq!(out, "one\ntwo\n");
    }

    #[tokio::test]
    async fn settle_reports_write_failures() {
        let (tx, mut rx) = watch::channel(snapshot(&[]));
        let mut printer = LogPrinter::with_writer(false, ClosedPipe);

        tx.send_replace(snapshot(&["late"]));
        let err = settle(&mut rx, &mut printer, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to write command output"));
    }
}
