//! chime: sound notifications for agent lifecycle hooks.
//!
//! Every invocation is short-lived. Coordination between concurrent
//! invocations happens through the shared state file (see
//! `chime-scheduler`); this binary only wires config, logging, and CLI.

use clap::Parser;

mod cli;
mod cmd_notify;
mod cmd_state;
mod config;
mod context;
mod hook;
mod setup_hooks;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let config_path = config::config_path(args.config.clone(), config::process_env);
    let (loaded, config_error) = match config::load_global(config_path.as_deref()) {
        Ok(loaded) => (loaded, None),
        Err(e) => (chime_core::GlobalConfig::default(), Some(e)),
    };

    let env_filter = std::env::var("CHIME_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok();
    let filter = context::log_filter(env_filter, args.verbose, loaded.diagnostics.log_denials);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    if let Some(e) = config_error {
        tracing::warn!("{e}; using built-in defaults");
    }

    let ctx = context::Context {
        config: loaded,
        state_path: config::state_path(args.state_path.clone(), config::process_env),
        verbose: args.verbose,
        home: std::env::var_os("HOME").map(std::path::PathBuf::from),
        config_dir: config::config_dir(config::process_env),
    };

    match args.command {
        cli::Command::Notify(opts) => cmd_notify::cmd_notify(&ctx, opts.kind, opts.cwd).await,
        cli::Command::Hook => cmd_notify::cmd_hook(&ctx).await,
        cli::Command::Test(opts) => cmd_notify::cmd_test(&ctx, opts.kind, opts.cwd).await?,
        cli::Command::Mute(opts) => cmd_state::cmd_mute(&ctx, opts.duration, opts.resume_profile)?,
        cli::Command::Unmute => cmd_state::cmd_unmute(&ctx)?,
        cli::Command::Profile(opts) => cmd_state::cmd_profile(&ctx, opts.name, opts.clear)?,
        cli::Command::Status => cmd_state::cmd_status(&ctx)?,
        cli::Command::Queue(cli::QueueCommand::Clear) => cmd_state::cmd_queue_clear(&ctx)?,
        cli::Command::SetupHooks(opts) => {
            let path = setup_hooks::apply_hooks(&opts)?;
            println!("hooks written to {}", path.display());
        }
    }

    Ok(())
}
