use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use forge_core::atomic::StateManager;
use std::path::Path;

#[derive(Subcommand)]
pub enum EpicSubcommand {
    /// Create an epic under a feature
    Create {
        feature: String,
        title: String,
        /// Story points
        #[arg(long, default_value = "0")]
        points: u32,
        /// Explicit epic number (default: next free)
        #[arg(long)]
        number: Option<u32>,
    },
    /// List epics for a feature
    List { feature: String },
}

pub fn run(root: &Path, subcmd: EpicSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        EpicSubcommand::Create {
            feature,
            title,
            points,
            number,
        } => create(root, &feature, &title, points, number, json),
        EpicSubcommand::List { feature } => list(root, &feature, json),
    }
}

fn create(
    root: &Path,
    feature: &str,
    title: &str,
    points: u32,
    number: Option<u32>,
    json: bool,
) -> anyhow::Result<()> {
    let manager = StateManager::open(root)?;
    let epic = manager
        .create_epic(feature, title, points, number)
        .with_context(|| format!("failed to create epic under '{feature}'"))?;

    if json {
        print_json(&epic)?;
    } else {
        println!(
            "Created epic {:03} under {}: {}",
            epic.epic_number, feature, epic.title
        );
    }
    Ok(())
}

fn list(root: &Path, feature: &str, json: bool) -> anyhow::Result<()> {
    let manager = StateManager::open(root)?;
    let epics = manager
        .store()
        .list_epics(feature)
        .with_context(|| format!("failed to list epics for '{feature}'"))?;

    if json {
        print_json(&epics)?;
        return Ok(());
    }

    if epics.is_empty() {
        println!("No epics yet for {feature}.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = epics
        .iter()
        .map(|e| {
            vec![
                format!("{:03}", e.epic_number),
                e.status.to_string(),
                e.points.to_string(),
                e.title.clone(),
            ]
        })
        .collect();
    print_table(&["NUM", "STATUS", "POINTS", "TITLE"], rows);
    Ok(())
}
