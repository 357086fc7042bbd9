use anyhow::Context;

use super::Ctx;
use crate::output::print_json;

pub async fn run(ctx: &Ctx, id: &str) -> anyhow::Result<()> {
    ctx.http
        .delete_command(id)
        .await
        .with_context(|| format!("failed to delete command '{id}'"))?;

    if ctx.json {
        return print_json(&serde_json::json!({ "id": id, "deleted": true }));
    }
    println!("Deleted {id}");
    Ok(())
}
