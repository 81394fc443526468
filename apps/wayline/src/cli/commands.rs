//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::script::{Report, ResultState, Script, describe_edits, replay};
use std::path::Path;
use wayline_core::{NavigationError, StackReconciler};

/// Maximum script size (1 MB).
const MAX_SCRIPT_FILE_SIZE: u64 = 1024 * 1024;

/// Validate a script path and its size before reading.
fn validate_script_path(path: &Path) -> Result<(), NavigationError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        NavigationError::Io(format!("Cannot read script '{}': {}", path.display(), e))
    })?;

    if !metadata.is_file() {
        return Err(NavigationError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    if metadata.len() > MAX_SCRIPT_FILE_SIZE {
        return Err(NavigationError::Config(format!(
            "Script size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_SCRIPT_FILE_SIZE
        )));
    }
    Ok(())
}

// =============================================================================
// DIFF COMMAND
// =============================================================================

/// Print the edit script between two name sequences.
pub fn cmd_diff(from: &[String], to: &[String], json_mode: bool) -> Result<(), NavigationError> {
    let script = StackReconciler::diff(from, to);

    if json_mode {
        let output = serde_json::json!({
            "from": from,
            "to": to,
            "distance": script.len(),
            "script": script,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Edit Script");
    println!("===========");
    println!("From:     [{}]", from.join(", "));
    println!("To:       [{}]", to.join(", "));
    println!("Distance: {}", script.len());
    println!("Edits:    {}", describe_edits(&script));
    Ok(())
}

// =============================================================================
// REPLAY COMMAND
// =============================================================================

/// Load a script file and replay it.
pub async fn cmd_replay(path: &Path, json_mode: bool) -> Result<(), NavigationError> {
    validate_script_path(path)?;
    let script = Script::from_path(path)?;
    tracing::info!(
        script = %path.display(),
        steps = script.steps.len(),
        routes = script.routes.len(),
        "replaying script"
    );

    let report = replay(&script).await;

    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_default()
        );
        return Ok(());
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &Report) {
    println!("Replay: {}", report.label.as_deref().unwrap_or("(unnamed)"));
    println!("==================");
    for step in &report.steps {
        println!(
            "#{:<3} {:<20} {:<32} [{}] r{}",
            step.index,
            step.op,
            step.outcome,
            step.stack.join(", "),
            step.revision
        );
    }

    if report.results.is_empty() {
        return;
    }
    println!();
    println!("Results");
    println!("-------");
    for push in &report.results {
        let state = match &push.result {
            ResultState::Delivered(value) => format!("delivered {:?}", value),
            ResultState::Discarded => "discarded".to_string(),
            ResultState::Pending => "pending".to_string(),
        };
        println!("#{:<3} {:<20} {}", push.step, push.route, state);
    }
}
