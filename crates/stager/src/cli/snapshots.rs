use anyhow::Result;
use clap::Args;
use stager_install::{InstallConfig, SnapshotStore};
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Args, Clone, Debug)]
pub struct SnapshotsArg {}

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "snapshot")]
    id:        String,
    #[tabled(rename = "target version")]
    target:    String,
    artifacts: String,
    status:    String,
}

impl SnapshotsArg {
    pub fn run(self, config: InstallConfig) -> Result<()> {
        let store = SnapshotStore::new(&config.snapshot_root);
        let rows: Vec<SnapshotRow> = store
            .list()?
            .into_iter()
            .rev()
            .map(|id| match store.load(&id) {
                Ok(manifest) => SnapshotRow {
                    id,
                    target: manifest.target_version,
                    artifacts: manifest.artifact_count.to_string(),
                    status: "ok".to_string(),
                },
                Err(e) => SnapshotRow {
                    id,
                    target: "-".to_string(),
                    artifacts: "-".to_string(),
                    status: format!("unusable: {e}"),
                },
            })
            .collect();

        if rows.is_empty() {
            println!("no snapshots under '{}'", store.root().display());
            return Ok(());
        }

        let mut table = Table::new(rows);
        table.with(Style::blank());
        println!("{table}");
        Ok(())
    }
}
