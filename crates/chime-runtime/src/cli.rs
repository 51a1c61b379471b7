//! CLI definition using clap derive.

use std::path::PathBuf;
use std::time::Duration;

use chime_core::EventKind;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chime", version, about = "Sound notifications for agent lifecycle events")]
pub struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/chime/config.toml)
    #[arg(long, env = "CHIME_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// State file (default: $XDG_STATE_HOME/chime/state.json)
    #[arg(long, env = "CHIME_STATE", global = true)]
    pub state_path: Option<PathBuf>,

    /// Log every decision to stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fire one event (stop, permission_prompt, idle_prompt, subagent, or a custom kind)
    Notify(NotifyOpts),
    /// Read a Claude Code hook payload on stdin and fire the matching event
    Hook,
    /// Silence all notifications for a while
    Mute(MuteOpts),
    /// End a mute early
    Unmute,
    /// Show, set, or clear the runtime profile
    Profile(ProfileOpts),
    /// Print persisted state
    Status,
    /// Manage the pending playback queue
    #[command(subcommand)]
    Queue(QueueCommand),
    /// Play the effective sound for a kind, skipping admission and the queue
    Test(TestOpts),
    /// Install chime into Claude Code settings.json
    SetupHooks(SetupHooksOpts),
}

#[derive(clap::Args)]
pub struct NotifyOpts {
    pub kind: EventKind,

    /// Directory whose .chime.toml applies (default: current directory)
    #[arg(long)]
    pub cwd: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct MuteOpts {
    /// How long, e.g. 90s, 30m, 2h
    #[arg(long = "for", value_parser = parse_duration)]
    pub duration: Duration,

    /// Profile to switch to when the mute ends
    #[arg(long)]
    pub resume_profile: Option<String>,
}

#[derive(clap::Args)]
pub struct ProfileOpts {
    pub name: Option<String>,

    /// Drop the override and fall back to active_profile
    #[arg(long, conflicts_with = "name")]
    pub clear: bool,
}

#[derive(Subcommand)]
pub enum QueueCommand {
    /// Drop every pending entry
    Clear,
}

#[derive(clap::Args)]
pub struct TestOpts {
    pub kind: EventKind,

    #[arg(long)]
    pub cwd: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct SetupHooksOpts {
    /// "user" (~/.claude/settings.json) or "project" (.claude/settings.json)
    #[arg(long, default_value = "user")]
    pub scope: String,

    /// Command the hooks run
    #[arg(long, default_value = "chime hook")]
    pub command: String,
}

/// Parse `90`, `90s`, `30m`, `2h`, or a combination like `1h30m`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration".to_owned());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            's' => 1,
            'm' => 60,
            'h' => 3_600,
            _ => return Err(format!("invalid duration {s:?}: unknown unit {c:?}")),
        };
        let n: u64 = digits
            .parse()
            .map_err(|_| format!("invalid duration {s:?}: missing number before {c:?}"))?;
        total = n
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| format!("duration {s:?} is too large"))?;
        digits.clear();
    }
    if !digits.is_empty() {
        return Err(format!("invalid duration {s:?}: trailing number without unit"));
    }
    Ok(Duration::from_secs(total))
}
