use anyhow::Context;
use cockpit_client::{Command, CommandEvent, Entity, EventKind, MutationEvent, Snapshot};
use tokio::sync::watch;

use super::{load_all, Ctx};
use crate::output::{command_row, print_json, print_json_line, print_table, COMMAND_HEADERS};

pub async fn run(ctx: &Ctx, all: bool, follow: bool) -> anyhow::Result<()> {
    let commands = ctx
        .reconciler
        .commands()
        .await
        .context("failed to load commands")?;
    if all {
        load_all(&commands).await?;
    }

    let mut updates = commands.subscribe();
    let snapshot = updates.borrow_and_update().clone();

    if ctx.json {
        print_json(&snapshot.iter().collect::<Vec<_>>())?;
    } else if snapshot.is_empty() {
        println!("No commands.");
    } else {
        let rows: Vec<Vec<String>> = snapshot.iter().map(command_row).collect();
        print_table(&COMMAND_HEADERS, &rows);
        if snapshot.has_more && !all {
            println!("(older commands not shown; use --all)");
        }
    }

    if follow {
        follow_changes(&mut updates, snapshot, ctx.json).await?;
    }
    commands.deactivate();
    Ok(())
}

async fn follow_changes(
    updates: &mut watch::Receiver<Snapshot<Command>>,
    mut prev: Snapshot<Command>,
    json: bool,
) -> anyhow::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while prev.live {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = &mut ctrl_c => break,
        }
        let next = updates.borrow_and_update().clone();
        for change in changes(&prev, &next) {
            print_change(change, json)?;
        }
        prev = next;
    }
    if !prev.live {
        tracing::warn!("command stream ended");
    }
    Ok(())
}

fn print_change(change: MutationEvent<Command>, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json_line(&CommandEvent::from(change));
    }
    let cmd = &change.entity;
    let marker = match change.kind {
        EventKind::Create => '+',
        EventKind::Update => '~',
        EventKind::Delete => '-',
    };
    println!("{marker} {}  {:<7}  {}", cmd.id, cmd.status, cmd.command);
    Ok(())
}

/// What changed between two snapshots, as the mutations that would produce
/// it: new ids, status changes, then removals.
fn changes(prev: &Snapshot<Command>, next: &Snapshot<Command>) -> Vec<MutationEvent<Command>> {
    let mut out = Vec::new();
    for cmd in next.iter() {
        match prev.get(cmd.id()) {
            None => out.push(MutationEvent::create(cmd.clone())),
            Some(old) if old.status != cmd.status => out.push(MutationEvent::update(cmd.clone())),
            Some(_) => {}
        }
    }
    for cmd in prev.iter() {
        if next.get(cmd.id()).is_none() {
            out.push(MutationEvent::delete(cmd.clone()));
        }
    }
    out
}
