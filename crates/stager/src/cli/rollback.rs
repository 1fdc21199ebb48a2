use anyhow::Result;
use clap::Args;
use stager_install::{DecisionRecorder, InstallConfig, RollbackExecutor};

#[derive(Args, Clone, Debug)]
pub struct RollbackArg {
    #[arg(long, help = "Snapshot id to restore (defaults to the newest usable one)")]
    snapshot: Option<String>,
    #[arg(long, help = "Print every decision as JSON")]
    audit:    bool,
}

impl RollbackArg {
    pub fn run(self, config: InstallConfig) -> Result<()> {
        let recorder = DecisionRecorder::new();
        let result = RollbackExecutor::new(config)
            .hook(recorder.clone())
            .execute_rollback(self.snapshot.as_deref());

        if self.audit {
            super::print_json(&recorder.decisions())?;
        }
        let report = result?;

        println!(
            "restored {} from snapshot {} ({} already matched, {} quarantined)",
            report.restored_count, report.snapshot_id, report.skipped_count, report.quarantined_count
        );
        Ok(())
    }
}
