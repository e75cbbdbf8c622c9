use crate::output::print_json;
use clap::Subcommand;
use forge_core::paths;
use forge_core::store::EntityStore;
use std::path::Path;

#[derive(Subcommand)]
pub enum MigrateSubcommand {
    /// Show the record store schema version
    Status,
    /// Apply pending record store schema migrations
    Run,
}

pub fn run(root: &Path, subcmd: MigrateSubcommand, json: bool) -> anyhow::Result<()> {
    // Opening the store already applies pending migrations; Run exists so
    // operators can do it explicitly and see what happened.
    let store = EntityStore::open(&paths::db_path(root))?;
    let current = store.schema_version()?;
    let latest = EntityStore::latest_schema_version();

    match subcmd {
        MigrateSubcommand::Status => {
            if json {
                print_json(&serde_json::json!({
                    "schema_version": current,
                    "latest": latest,
                    "pending": latest.saturating_sub(current),
                }))?;
            } else {
                println!("Schema version: {current} (latest: {latest})");
            }
        }
        MigrateSubcommand::Run => {
            let applied = store.migrate_schema()?;
            if json {
                print_json(&serde_json::json!({
                    "applied": applied,
                    "schema_version": store.schema_version()?,
                }))?;
            } else if applied == 0 {
                println!("Schema is up to date (version {current}).");
            } else {
                println!("Applied {applied} migration(s); now at version {}.", store.schema_version()?);
            }
        }
    }
    Ok(())
}
