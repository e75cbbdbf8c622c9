use crate::output::print_json;
use anyhow::Context;
use forge_core::atomic::init_workspace;
use std::path::Path;

pub fn run(root: &Path, project: Option<&str>, json: bool) -> anyhow::Result<()> {
    let name = match project {
        Some(p) => p.to_string(),
        None => root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string()),
    };

    init_workspace(root, &name)
        .with_context(|| format!("failed to initialize workspace at {}", root.display()))?;

    if json {
        print_json(&serde_json::json!({
            "initialized": true,
            "project": name,
            "root": root.display().to_string(),
        }))?;
    } else {
        println!("Initialized workspace '{name}' at {}", root.display());
        println!("Next: forge feature create <name>");
    }
    Ok(())
}
