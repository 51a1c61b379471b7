//! Install chime into Claude Code settings.json.
//!
//! Merges into the existing `hooks` table: unrelated hooks are preserved
//! and rerunning replaces chime's own entries instead of duplicating them.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};

use crate::cli::SetupHooksOpts;

/// Hook events chime listens to.
const HOOK_EVENTS: &[&str] = &["Stop", "SubagentStop", "Notification"];

/// Resolve the settings.json path based on scope.
pub fn settings_path(scope: &str, home: Option<&Path>) -> anyhow::Result<PathBuf> {
    match scope {
        "project" => Ok(PathBuf::from(".claude/settings.json")),
        "user" => {
            let home = home.ok_or_else(|| anyhow::anyhow!("HOME not set; cannot resolve user scope"))?;
            Ok(home.join(".claude/settings.json"))
        }
        _ => anyhow::bail!("invalid scope: {scope:?} (expected \"project\" or \"user\")"),
    }
}

fn hook_entry(command: &str) -> Value {
    json!({
        "matcher": "",
        "hooks": [{ "type": "command", "command": command }],
    })
}

fn runs_command(entry: &Value, command: &str) -> bool {
    entry["hooks"]
        .as_array()
        .is_some_and(|hooks| hooks.iter().any(|h| h["command"] == command))
}

/// Merge chime's hook entries into a parsed settings object.
pub fn merge_hooks(settings: &mut Value, command: &str) -> anyhow::Result<()> {
    let obj = settings
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("settings.json is not a JSON object"))?;
    let hooks = obj
        .entry("hooks")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("settings.json `hooks` is not an object"))?;

    for event in HOOK_EVENTS {
        let entries = hooks
            .entry((*event).to_owned())
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .ok_or_else(|| anyhow::anyhow!("settings.json `hooks.{event}` is not an array"))?;
        entries.retain(|entry| !runs_command(entry, command));
        entries.push(hook_entry(command));
    }
    Ok(())
}

/// Apply hook configuration to the settings file (merge, not overwrite).
pub fn apply_hooks(opts: &SetupHooksOpts) -> anyhow::Result<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let path = settings_path(&opts.scope, home.as_deref())?;

    let mut settings: Value = if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)?
    } else {
        json!({})
    };
    merge_hooks(&mut settings, &opts.command)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let output = serde_json::to_string_pretty(&settings)?;
    std::fs::write(&path, format!("{output}\n"))?;

    Ok(path)
}

// ─── Tests ────────────────────────────────────────────────────────
