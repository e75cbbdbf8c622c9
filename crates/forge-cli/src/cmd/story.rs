use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use forge_core::atomic::StateManager;
use forge_core::types::StoryStatus;
use std::path::Path;
use std::str::FromStr;

#[derive(Subcommand)]
pub enum StorySubcommand {
    /// Create a story under an epic
    Create {
        feature: String,
        /// Parent epic number
        epic: u32,
        title: String,
        /// Story points
        #[arg(long, default_value = "0")]
        points: u32,
    },
    /// Set a story's status (todo, in_progress, done, blocked)
    Status {
        feature: String,
        /// Story identifier, e.g. 1.2
        id: String,
        status: String,
    },
    /// List stories for a feature
    List {
        feature: String,
        /// Restrict to one epic
        #[arg(long)]
        epic: Option<u32>,
    },
}

pub fn run(root: &Path, subcmd: StorySubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        StorySubcommand::Create {
            feature,
            epic,
            title,
            points,
        } => create(root, &feature, epic, &title, points, json),
        StorySubcommand::Status {
            feature,
            id,
            status,
        } => set_status(root, &feature, &id, &status, json),
        StorySubcommand::List { feature, epic } => list(root, &feature, epic, json),
    }
}

fn create(
    root: &Path,
    feature: &str,
    epic: u32,
    title: &str,
    points: u32,
    json: bool,
) -> anyhow::Result<()> {
    let manager = StateManager::open(root)?;
    let story = manager
        .create_story(feature, epic, title, points)
        .with_context(|| format!("failed to create story under '{feature}' epic {epic}"))?;

    if json {
        print_json(&story)?;
    } else {
        println!("Created story {} under {}", story.story_id(), feature);
        println!("Path: {}", story.file_path);
    }
    Ok(())
}

/// Story ids are written `<epic>.<story>`, matching the file naming.
fn parse_story_id(id: &str) -> anyhow::Result<(u32, u32)> {
    let (epic, story) = id
        .split_once('.')
        .with_context(|| format!("invalid story id '{id}': expected <epic>.<story>"))?;
    Ok((
        epic.parse()
            .with_context(|| format!("invalid epic number in '{id}'"))?,
        story
            .parse()
            .with_context(|| format!("invalid story number in '{id}'"))?,
    ))
}

fn set_status(
    root: &Path,
    feature: &str,
    id: &str,
    status_str: &str,
    json: bool,
) -> anyhow::Result<()> {
    let (epic, story_number) = parse_story_id(id)?;
    let status = StoryStatus::from_str(status_str)?;

    let manager = StateManager::open(root)?;
    let story = manager
        .set_story_status(feature, epic, story_number, status)
        .with_context(|| format!("failed to set status of story {feature}/{id}"))?;

    if json {
        print_json(&story)?;
    } else {
        println!("Story {} is now {}", story.story_id(), story.status);
    }
    Ok(())
}

fn list(root: &Path, feature: &str, epic: Option<u32>, json: bool) -> anyhow::Result<()> {
    let manager = StateManager::open(root)?;
    let stories = manager
        .store()
        .list_stories(feature, epic)
        .with_context(|| format!("failed to list stories for '{feature}'"))?;

    if json {
        print_json(&stories)?;
        return Ok(());
    }

    if stories.is_empty() {
        println!("No stories yet for {feature}.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = stories
        .iter()
        .map(|s| {
            vec![
                s.story_id(),
                s.status.to_string(),
                s.points.to_string(),
                s.file_path.clone(),
            ]
        })
        .collect();
    print_table(&["ID", "STATUS", "POINTS", "PATH"], rows);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn story_id_parses() {
        assert_eq!(parse_story_id("1.2").unwrap(), (1, 2));
        assert_eq!(parse_story_id("12.34").unwrap(), (12, 34));
    }

    #[test]
    fn malformed_story_id_is_rejected() {
        for bad in ["", "1", "1.", ".2", "a.b", "1.2.3"] {
            assert!(parse_story_id(bad).is_err(), "expected invalid: {bad}");
        }
    }
}
