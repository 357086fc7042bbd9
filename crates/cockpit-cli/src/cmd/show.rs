use anyhow::Context;

use super::Ctx;
use crate::output::print_json;

pub async fn run(ctx: &Ctx, id: &str) -> anyhow::Result<()> {
    let cmd = ctx
        .http
        .get_command(id)
        .await
        .with_context(|| format!("failed to fetch command '{id}'"))?;

    if ctx.json {
        return print_json(&cmd);
    }
    println!("id:       {}", cmd.id);
    println!("created:  {}", cmd.created_at.to_rfc3339());
    println!("status:   {}", cmd.status);
    println!("command:  {}", cmd.command);
    Ok(())
}
