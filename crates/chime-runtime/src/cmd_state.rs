//! State-editing commands: mute, unmute, profile, status, queue clear.

use std::time::Duration;

use anyhow::Context as _;
use chime_core::{PersistedState, QuickDisableWindow};
use chrono::{DateTime, Local, Utc};

use crate::context::Context;

pub fn cmd_mute(ctx: &Context, duration: Duration, resume_profile: Option<String>) -> anyhow::Result<()> {
    let span = chrono::Duration::from_std(duration).context("mute duration is too large")?;
    let until = Utc::now()
        .checked_add_signed(span)
        .context("mute duration is too large")?;
    warn_unknown_profile(ctx, resume_profile.as_deref());

    ctx.store().with_lock(|state| {
        state.quick_disable = Some(QuickDisableWindow {
            until,
            resume_profile: resume_profile.clone(),
        });
    })?;

    println!("muted until {}", local(until));
    if let Some(profile) = resume_profile {
        println!("profile {profile:?} applies afterwards");
    }
    Ok(())
}

pub fn cmd_unmute(ctx: &Context) -> anyhow::Result<()> {
    let cleared = ctx.store().with_lock(|state| state.quick_disable.take())?;
    match cleared {
        Some(window) if window.is_active(Utc::now()) => println!("unmuted"),
        _ => println!("not muted"),
    }
    Ok(())
}

/// No arguments prints the profile in effect.
pub fn cmd_profile(ctx: &Context, name: Option<String>, clear: bool) -> anyhow::Result<()> {
    let store = ctx.store();
    if clear {
        store.with_lock(|state| state.profile_override = None)?;
        println!("profile override cleared");
        return Ok(());
    }
    match name {
        Some(name) => {
            warn_unknown_profile(ctx, Some(&name));
            store.with_lock(|state| state.profile_override = Some(name.clone()))?;
            println!("profile set to {name:?}");
        }
        None => {
            let state = store.load();
            println!("{}", describe_profile(ctx, &state));
        }
    }
    Ok(())
}

pub fn cmd_status(ctx: &Context) -> anyhow::Result<()> {
    let state = ctx.store().load();
    let now = Utc::now();
    match state.quick_disable.as_ref().filter(|w| w.is_active(now)) {
        Some(window) => println!("muted until {}", local(window.until)),
        None => println!("not muted"),
    }
    println!("{}", describe_profile(ctx, &state));
    println!("state: {}", ctx.state_path.display());
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

pub fn cmd_queue_clear(ctx: &Context) -> anyhow::Result<()> {
    let dropped = ctx.store().with_lock(|state| state.playback_queue.clear())?;
    println!("dropped {dropped} pending notification(s)");
    Ok(())
}

fn describe_profile(ctx: &Context, state: &PersistedState) -> String {
    match (&state.profile_override, &ctx.config.active_profile) {
        (Some(name), _) => format!("profile: {name} (override)"),
        (None, Some(name)) => format!("profile: {name} (config)"),
        (None, None) => "profile: none".to_owned(),
    }
}

fn warn_unknown_profile(ctx: &Context, name: Option<&str>) {
    if let Some(name) = name {
        if !ctx.config.profiles.contains_key(name) {
            eprintln!("warning: profile {name:?} is not defined in the config");
        }
    }
}

fn local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}
