use crate::output::{print_json, print_table};
use anyhow::bail;
use forge_core::atomic::StateManager;
use forge_core::consistency::ConsistencyChecker;
use std::path::Path;

pub fn run(root: &Path, feature: Option<&str>, json: bool) -> anyhow::Result<()> {
    let manager = StateManager::open(root)?;
    let report = ConsistencyChecker::new(manager.root(), manager.git(), manager.store())
        .run_for(feature)?;

    if json {
        print_json(&report)?;
    } else if report.is_consistent() {
        println!("OK: filesystem, record store, and git agree.");
    } else {
        let rows: Vec<Vec<String>> = report
            .issues
            .iter()
            .map(|i| {
                vec![
                    format!("{:?}", i.severity).to_lowercase(),
                    format!("{:?}", i.kind),
                    i.path.clone(),
                    i.detail.clone(),
                ]
            })
            .collect();
        print_table(&["SEVERITY", "KIND", "PATH", "DETAIL"], rows);
    }

    if !report.is_consistent() {
        bail!("consistency check found {} issue(s)", report.issues.len());
    }
    Ok(())
}
