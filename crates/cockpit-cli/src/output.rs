use cockpit_client::{Command, LogLine, LogStream};
use serde::Serialize;
use std::io::Write;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One compact JSON document per line, for streamed output.
pub fn print_json_line<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    println!("{}", render_row(headers.iter().copied(), &widths));
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", rule.join("  "));
    for row in rows {
        println!("{}", render_row(row.iter().map(String::as_str), &widths));
    }
}

fn render_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, &w)| format!("{cell:w$}"))
        .collect();
    padded.join("  ").trim_end().to_string()
}

pub const COMMAND_HEADERS: [&str; 4] = ["ID", "CREATED", "STATUS", "COMMAND"];

pub fn command_row(cmd: &Command) -> Vec<String> {
    vec![
        cmd.id.clone(),
        cmd.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        cmd.status.to_string(),
        cmd.command.clone(),
    ]
}

/// Write a log line. Output the command sent to stdout goes to `out`; its
/// stderr goes to our stderr, and lines the server itself wrote (fd -1)
/// get a prefix there.
pub fn write_log_line<W: Write>(out: &mut W, line: &LogLine, json: bool) -> anyhow::Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string(line)?)?;
        return Ok(());
    }
    match line.stream {
        LogStream::Stdout => writeln!(out, "{}", line.content)?,
        LogStream::Stderr => eprintln!("{}", line.content),
        LogStream::Error => eprintln!("cockpit: {}", line.content),
    }
    Ok(())
}
