//! `gophertalk migrate`

use anyhow::{Context, Result};
use clap::Parser;
use gophertalk_server::Settings;

use super::DatabaseArgs;

#[derive(Parser, Debug)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseArgs,
}

pub async fn run_migrate(args: MigrateArgs) -> Result<()> {
    let (database, pool) = args.database.into_settings();
    let settings = Settings {
        database,
        pool,
        ..Settings::default()
    };

    gophertalk_server::migrate(settings)
        .await
        .context("failed to create database schema")?;

    tracing::info!("schema is up to date");
    Ok(())
}
