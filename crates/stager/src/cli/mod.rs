use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use stager_install::InstallConfig;

mod install;
mod plan;
mod rollback;
mod snapshots;

#[derive(Clone, Debug, Parser)]
#[command(name = "stager", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub cmd:    Commands,
}

#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    #[arg(long, global = true, env = "STAGER_INSTANCE", help = "Instance root (defaults to the current directory)")]
    pub instance:  Option<PathBuf>,
    #[arg(long, global = true, help = "Config file (defaults to <instance>/stager.toml when present)")]
    pub config:    Option<PathBuf>,
    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "Increase log verbosity")]
    pub verbose:   u8,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "i", name = "install", about = "Install or repair the tree described by the lockfile")]
    Install(install::InstallArg),
    #[command(alias = "p", name = "plan", about = "Show what install would do, without writing")]
    Plan(plan::PlanArg),
    #[command(alias = "rb", name = "rollback", about = "Restore the live tree from a snapshot")]
    Rollback(rollback::RollbackArg),
    #[command(alias = "ls", name = "snapshots", about = "List recorded snapshots")]
    Snapshots(snapshots::SnapshotsArg),
}

impl App {
    pub async fn run(self) -> Result<()> {
        let config = self.global.load_config()?;
        match self.cmd {
            Commands::Install(arg) => arg.run(config).await,
            Commands::Plan(arg) => arg.run(config),
            Commands::Rollback(arg) => arg.run(config),
            Commands::Snapshots(arg) => arg.run(config),
        }
    }
}

impl GlobalArgs {
    fn load_config(&self) -> Result<InstallConfig> {
        let root = match &self.instance {
            Some(root) => root.clone(),
            None => std::env::current_dir().context("failed to determine the current directory")?,
        };
        InstallConfig::load(&root, self.config.as_deref())
            .with_context(|| format!("failed to load configuration for '{}'", root.display()))
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() { App::command().debug_assert(); }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let app = App::try_parse_from(["stager", "rollback", "--snapshot", "s1", "--instance", "/srv/pack", "-vv"]).unwrap();
        assert_eq!(app.global.instance.as_deref(), Some(std::path::Path::new("/srv/pack")));
        assert_eq!(app.global.verbose, 2);
        assert!(matches!(app.cmd, Commands::Rollback(_)));
    }

    #[test]
    fn aliases_resolve() {
        let app = App::try_parse_from(["stager", "ls"]).unwrap();
        assert!(matches!(app.cmd, Commands::Snapshots(_)));
    }
}
