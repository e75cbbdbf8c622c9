use crate::output::{print_json, print_table};
use anyhow::Context;
use forge_core::atomic::StateManager;
use std::path::Path;

pub fn run(root: &Path, feature: Option<&str>, limit: usize, json: bool) -> anyhow::Result<()> {
    let manager = StateManager::open(root)?;

    let path = match feature {
        Some(name) => {
            let feature = manager
                .store()
                .get_feature(name)?
                .with_context(|| format!("feature '{name}' not found"))?;
            Some(feature.path)
        }
        None => Some(forge_core::paths::FEATURES_DIR.to_string()),
    };

    let commits = manager
        .git()
        .recent_commits(path.as_deref(), limit)
        .context("failed to read git history")?;

    if json {
        print_json(&commits)?;
        return Ok(());
    }

    if commits.is_empty() {
        println!("No commits yet.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = commits
        .iter()
        .map(|c| {
            vec![
                c.sha.clone(),
                c.date.format("%Y-%m-%d %H:%M").to_string(),
                c.author.clone(),
                c.message.clone(),
            ]
        })
        .collect();
    print_table(&["SHA", "DATE", "AUTHOR", "MESSAGE"], rows);
    Ok(())
}
