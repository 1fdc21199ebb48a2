use anyhow::{Context, Result};
use clap::Args;
use stager_fetch::{HttpFetcher, ReqwestClient};
use stager_install::{InstallConfig, Installer};

#[derive(Args, Clone, Debug)]
pub struct PlanArg {}

impl PlanArg {
    pub fn run(self, config: InstallConfig) -> Result<()> {
        let lockfile = config.lockfile.clone();
        let installer = Installer::new(config, HttpFetcher::new(ReqwestClient::new()));
        let plan = installer
            .plan()
            .with_context(|| format!("failed to plan from '{}'", lockfile.display()))?;
        super::print_json(&plan)
    }
}
