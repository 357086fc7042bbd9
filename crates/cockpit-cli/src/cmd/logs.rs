use std::collections::HashSet;
use std::io::{self, Write};

use anyhow::Context;
use cockpit_client::{LogLine, Snapshot};

use super::{load_all, Ctx};
use crate::output::{print_json, write_log_line};

pub async fn run(ctx: &Ctx, id: &str, all: bool, follow: bool) -> anyhow::Result<()> {
    let logs = ctx
        .reconciler
        .logs(id)
        .await
        .with_context(|| format!("failed to load logs for command '{id}'"))?;
    if all {
        load_all(&logs).await?;
    }

    let mut updates = logs.subscribe();
    let snapshot = updates.borrow_and_update().clone();

    if ctx.json && !follow {
        let lines: Vec<&LogLine> = snapshot.iter_oldest_first().collect();
        print_json(&lines)?;
        logs.deactivate();
        return Ok(());
    }

    let mut printer = LogPrinter::new(ctx.json);
    printer.print_new(&snapshot)?;

    if follow {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut live = snapshot.live;
        while live {
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = &mut ctrl_c => break,
            }
            let next = updates.borrow_and_update().clone();
            printer.print_new(&next)?;
            live = next.live;
        }
        if !live {
            tracing::warn!(command = id, "log stream ended");
        }
    }

    logs.deactivate();
    Ok(())
}

/// Prints each log line once, oldest first, however many snapshots it
/// shows up in.
pub struct LogPrinter<W = io::Stdout> {
    seen: HashSet<String>,
    json: bool,
    out: W,
}

impl LogPrinter {
    pub fn new(json: bool) -> Self {
        Self::with_writer(json, io::stdout())
    }
}

impl<W: Write> LogPrinter<W> {
    pub fn with_writer(json: bool, out: W) -> Self {
        Self {
            seen: HashSet::new(),
            json,
            out,
        }
    }

    /// Print lines from `snapshot` not printed before. Returns how many.
    pub fn print_new(&mut self, snapshot: &Snapshot<LogLine>) -> anyhow::Result<usize> {
        let mut printed = 0;
        for line in snapshot.iter_oldest_first() {
            if !self.seen.insert(line.id.clone()) {
                continue;
            }
            write_log_line(&mut self.out, line, self.json)
                .context("failed to write command output")?;
            printed += 1;
        }
        Ok(printed)
    }

    #[cfg(test)]
    pub fn into_writer(self) -> W {
        self.out
    }
}
