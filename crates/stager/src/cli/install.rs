use anyhow::{Context, Result};
use clap::Args;
use stager_fetch::{HttpFetcher, ReqwestClient};
use stager_install::{DecisionRecorder, InstallConfig, Installer, RepairPolicy};

#[derive(Args, Clone, Debug)]
pub struct InstallArg {
    #[arg(long, help = "Quarantine and re-fetch live files that fail verification instead of stopping")]
    repair: bool,
    #[arg(long, help = "Print every decision as JSON")]
    audit:  bool,
}

impl InstallArg {
    pub async fn run(self, config: InstallConfig) -> Result<()> {
        let policy = if self.repair { RepairPolicy::QuarantineAndReinstall } else { RepairPolicy::FailLoud };
        let lockfile = config.lockfile.clone();
        let recorder = DecisionRecorder::new();

        let installer = Installer::new(config.repair(policy), HttpFetcher::new(ReqwestClient::new()))
            .hook(recorder.clone());
        let result = installer.install_from_lockfile().await;

        if self.audit {
            super::print_json(&recorder.decisions())?;
        }
        let report = result.with_context(|| format!("install from '{}' failed", lockfile.display()))?;

        println!(
            "installed {}, verified {}, skipped {}",
            report.installed_count, report.verified_count, report.skipped_count
        );
        if let Some(id) = &report.snapshot_id {
            println!("snapshot {id}");
        }
        Ok(())
    }
}
