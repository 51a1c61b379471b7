//! `chime notify`, `chime hook`, `chime test`.
//!
//! `notify` and `hook` exit 0 whatever happens to the event: a hook
//! runtime must never see a failure because a chime was skipped.

use std::io::Read;
use std::path::{Path, PathBuf};

use chime_core::{Event, EventKind};
use chime_player::Player;
use chime_scheduler::{ConfigSource, Outcome};
use chrono::Utc;

use crate::context::Context;
use crate::hook::{self, HookPayload};

pub async fn cmd_notify(ctx: &Context, kind: EventKind, cwd: Option<PathBuf>) {
    let workspace = cwd.or_else(|| std::env::current_dir().ok());
    fire(ctx, kind, workspace.as_deref()).await;
}

pub async fn cmd_hook(ctx: &Context) {
    let mut input = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut input) {
        tracing::warn!("could not read hook payload: {e}");
        return;
    }
    let payload = match HookPayload::from_json(&input) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("invalid hook payload: {e}");
            return;
        }
    };
    let Some(kind) = hook::translate(&payload) else {
        tracing::debug!("ignoring hook {:?}", payload.hook_event_name);
        return;
    };
    let workspace = payload.cwd.clone().or_else(|| std::env::current_dir().ok());
    fire(ctx, kind, workspace.as_deref()).await;
}

async fn fire(ctx: &Context, kind: EventKind, workspace: Option<&Path>) {
    let scheduler = ctx.scheduler(workspace);
    let event = Event::new(kind, Utc::now(), std::process::id());
    match scheduler.submit(&event).await {
        Outcome::Denied(result) => tracing::debug!("{}: not played ({result})", event.kind),
        Outcome::Rejected { drained } => {
            tracing::debug!("{}: queue full, dropped (drained: {drained:?})", event.kind);
        }
        Outcome::Queued { leader_pid } => {
            tracing::debug!("{}: queued behind pid {leader_pid}", event.kind);
        }
        Outcome::Drained(report) => tracing::debug!("{}: drained {report:?}", event.kind),
        Outcome::Degraded { admission, played } => {
            tracing::debug!("{}: uncoordinated, {admission}, played={played}", event.kind);
        }
    }
}

/// Play `kind`'s effective sound now. Unlike `notify`, failures are errors.
pub async fn cmd_test(ctx: &Context, kind: EventKind, cwd: Option<PathBuf>) -> anyhow::Result<()> {
    let workspace = cwd.or_else(|| std::env::current_dir().ok());
    let source = ctx.source(workspace.as_deref());
    let profile_override = ctx.store().load().profile_override;
    let resolution = source.resolve(&kind, profile_override.as_deref());
    let sound = source.sound_path(&resolution.config.sound);
    let volume = resolution.config.volume;

    println!("{kind}: {} at volume {volume:.2}", sound.display());
    if !resolution.config.enabled {
        println!("note: {kind} is disabled by config; playing anyway");
    }
    ctx.player().play(&sound, volume).await?;
    Ok(())
}
