//! One-shot status command.

use anyhow::Result;

use crate::state::AppState;

/// Print the system status (which embeds the health report) as pretty JSON.
///
/// Exits non-zero through the caller when the store cannot be opened; a
/// degraded report is still printed and is not an error.
pub async fn status(state: &AppState) -> Result<()> {
    let status = state.health.system_status().await;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
