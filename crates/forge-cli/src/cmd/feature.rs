use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use forge_core::atomic::StateManager;
use forge_core::types::{FeatureStatus, ScaleLevel, Scope};
use std::path::Path;
use std::str::FromStr;

#[derive(Subcommand)]
pub enum FeatureSubcommand {
    /// Create a new feature (scaffold, record, and commit in one unit)
    Create {
        /// Kebab-case feature name
        name: String,
        /// Scope: mvp or feature
        #[arg(long, default_value = "feature")]
        scope: String,
        /// Scale level 0-4 (controls the generated document set)
        #[arg(long, default_value = "2")]
        scale_level: u8,
        /// One-liner description of the feature's intent
        #[arg(long, default_value = "")]
        description: String,
        /// Owner (default: from config)
        #[arg(long)]
        owner: Option<String>,
    },
    /// List features
    List {
        /// Filter by status: active, completed, or archived
        #[arg(long)]
        status: Option<String>,
    },
    /// Show feature details
    Show { name: String },
}

pub fn run(root: &Path, subcmd: FeatureSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        FeatureSubcommand::Create {
            name,
            scope,
            scale_level,
            description,
            owner,
        } => create(
            root,
            &name,
            &scope,
            scale_level,
            &description,
            owner.as_deref(),
            json,
        ),
        FeatureSubcommand::List { status } => list(root, status.as_deref(), json),
        FeatureSubcommand::Show { name } => show(root, &name, json),
    }
}

fn create(
    root: &Path,
    name: &str,
    scope_str: &str,
    scale_level: u8,
    description: &str,
    owner: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let scope = Scope::from_str(scope_str)?;
    let level = ScaleLevel::from_u8(scale_level)?;

    let manager = StateManager::open(root)?;
    let feature = manager
        .create_feature(name, scope, level, description, owner)
        .with_context(|| format!("failed to create feature '{name}'"))?;

    if json {
        print_json(&feature)?;
    } else {
        println!("Created feature: {} (scale level {})", feature.name, level);
        println!("Path: {}", feature.path);
    }
    Ok(())
}

fn list(root: &Path, status: Option<&str>, json: bool) -> anyhow::Result<()> {
    let status = status.map(FeatureStatus::from_str).transpose()?;
    let manager = StateManager::open(root)?;
    let features = manager
        .store()
        .list_features(status)
        .context("failed to list features")?;

    if json {
        print_json(&features)?;
        return Ok(());
    }

    if features.is_empty() {
        println!("No features yet.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = features
        .iter()
        .map(|f| {
            vec![
                f.name.clone(),
                f.scope.to_string(),
                f.scale_level.to_string(),
                f.status.to_string(),
                f.owner.clone(),
            ]
        })
        .collect();
    print_table(&["NAME", "SCOPE", "LEVEL", "STATUS", "OWNER"], rows);
    Ok(())
}

fn show(root: &Path, name: &str, json: bool) -> anyhow::Result<()> {
    let manager = StateManager::open(root)?;
    let feature = manager
        .store()
        .get_feature(name)?
        .with_context(|| format!("feature '{name}' not found"))?;

    if json {
        print_json(&feature)?;
        return Ok(());
    }

    println!("Feature: {}", feature.name);
    if !feature.description.is_empty() {
        println!("Desc:    {}", feature.description);
    }
    println!("Scope:   {}", feature.scope);
    println!("Level:   {}", feature.scale_level);
    println!("Status:  {}", feature.status);
    println!("Owner:   {}", feature.owner);
    println!("Created: {}", feature.created_at.format("%Y-%m-%d %H:%M"));
    println!("Path:    {}", feature.path);

    let epics = manager.store().list_epics(name)?;
    if !epics.is_empty() {
        println!("\nEpics ({}):", epics.len());
        for epic in &epics {
            println!(
                "  [{:03}] {} — {} ({} pts)",
                epic.epic_number, epic.status, epic.title, epic.points
            );
        }
    }

    let stories = manager.store().list_stories(name, None)?;
    if !stories.is_empty() {
        println!("\nStories ({}):", stories.len());
        for story in &stories {
            println!("  [{}] {}", story.story_id(), story.status);
        }
    }

    Ok(())
}
