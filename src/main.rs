// Entrypoint for the migration CLI.
// - Keeps `main` small: load config, build the client, run the migrator.
// - Returns `anyhow::Result`; only config, manifest and token-request
//   failures end the run early.

use anyhow::Context;
use clap::Parser;
use instaghost_cli::api::BlogClient;
use instaghost_cli::config::Config;
use instaghost_cli::export::read_records;
use instaghost_cli::migrate::{plan, Migrator};
use instaghost_cli::{init_tracing, ui};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "instaghost", about = "Import a photo export into a Ghost blog")]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Number of records migrated at once (overrides the config file)
    #[arg(long)]
    concurrency: Option<usize>,
    /// Print the post payloads without calling the blog
    #[arg(long)]
    dry_run: bool,
    /// Do not show a progress bar
    #[arg(long)]
    no_progress: bool,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let mut config = Config::from_file(&config_path)?;
    config.apply_env();
    if let Some(n) = cli.concurrency {
        config.concurrency = n;
    }
    config.validate()?;

    if cli.dry_run {
        let manifest = config.manifest_path();
        let records = read_records(&manifest)
            .with_context(|| format!("Reading export manifest {}", manifest.display()))?;
        ui::print_json(&plan(&config, &records))?;
        return Ok(());
    }

    if config.auth.password.is_empty() {
        if let Some(password) = ui::prompt_password(&config.auth.username)? {
            config.auth.password = password;
        }
    }

    let client = BlogClient::from_config(&config)?;
    let migrator = Migrator::new(&client, &config, ui::progress_bar(!cli.no_progress));
    migrator.run()?;
    Ok(())
}
