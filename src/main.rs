use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use podfeeder::{
    render_config_table, AssemblyOptions, Config, Database, DatabaseError, Feeder, ProgramRecord,
    Settings, UpdateSummary,
};

/// Get the config directory path (~/.config/podfeeder/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("podfeeder"))
}

#[derive(Parser, Debug)]
#[command(name = "podfeeder", about = "Podcast RSS feeds for archived radio recordings")]
struct Args {
    /// Settings file (default: ~/.config/podfeeder/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    settings: Option<PathBuf>,

    /// Public URL media and feeds are served under
    #[arg(long, value_name = "URL", global = true)]
    base_url: Option<String>,

    /// Output directory for feed files
    #[arg(long, value_name = "DIR", global = true)]
    rss_root: Option<PathBuf>,

    /// Directory recordings are stored under
    #[arg(long, value_name = "DIR", global = true)]
    media_root: Option<PathBuf>,

    /// Catalog database
    #[arg(long, value_name = "FILE", global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load recorded programs (JSON or YAML list) into the catalog
    ImportPrograms {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },

    /// Register feed configs (JSON or YAML)
    RegisterConfig {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },

    /// List registered feed configs
    ShowConfigs,

    /// Unregister feed configs by id (written feed files are left in place)
    RemoveConfig {
        #[arg(value_name = "CONFIG_ID", required = true)]
        ids: Vec<String>,
    },

    /// Rebuild the feed of every registered config
    UpdateFeeds {
        /// Also rebuild feeds whose date range closed over a week ago
        #[arg(long)]
        force: bool,
    },

    /// Write one feed per show found in the catalog
    BuildAll {
        /// Sort key of programs
        #[arg(long, value_parser = ["datetime", "episode_id"])]
        sort_by: Option<String>,

        /// Sort programs from oldest
        #[arg(long)]
        from_oldest: bool,

        /// Leave duplicated programs
        #[arg(long)]
        leave_duplicates: bool,
    },
}

impl Args {
    fn settings(&self) -> Result<Settings> {
        let path = match &self.settings {
            Some(path) => path.clone(),
            None => get_config_dir()?.join("config.toml"),
        };
        let mut settings = Settings::load(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;

        if let Some(base_url) = &self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(rss_root) = &self.rss_root {
            settings.rss_root = rss_root.clone();
        }
        if let Some(media_root) = &self.media_root {
            settings.media_root = media_root.clone();
        }
        if let Some(database) = &self.database {
            settings.database = database.clone();
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let settings = args.settings()?;

    let db_path = settings.database.to_string_lossy().into_owned();
    let db = match Database::open(&db_path).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: the catalog database is locked by another process. Please try again later.");
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    let assembler = settings.assembler().context("Invalid settings")?;
    let feeder = Feeder::new(db, assembler, settings.rss_root.clone()).pretty(settings.pretty);

    match args.command {
        Command::ImportPrograms { files } => {
            for file in files {
                let records = ProgramRecord::read_all(&file)
                    .with_context(|| format!("Failed to read programs from {}", file.display()))?;
                let count = feeder.database().insert_programs(&records).await?;
                println!("Imported {} program(s) from {}", count, file.display());
            }
        }
        Command::RegisterConfig { files } => {
            for file in files {
                let config = Config::from_file(&file)
                    .with_context(|| format!("Failed to load config {}", file.display()))?;
                let id = feeder.register_config(&config).await?;
                println!("{}  {}", id, file.display());
            }
        }
        Command::ShowConfigs => {
            let configs = feeder.database().list_configs().await?;
            print!("{}", render_config_table(&configs));
        }
        Command::RemoveConfig { ids } => {
            for id in ids {
                if feeder.database().remove_config(&id).await? {
                    println!("removed {}", id);
                } else {
                    eprintln!("no config {}", id);
                }
            }
        }
        Command::UpdateFeeds { force } => {
            let summary = feeder.update_feeds(force).await?;
            report(&summary);
            if !summary.is_success() {
                std::process::exit(1);
            }
        }
        Command::BuildAll {
            sort_by,
            from_oldest,
            leave_duplicates,
        } => {
            let options = AssemblyOptions {
                channel: None,
                sort_by,
                from_oldest,
                remove_duplicates: !leave_duplicates,
            };
            let summary = feeder.build_all(&options).await?;
            report(&summary);
            if !summary.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn report(summary: &UpdateSummary) {
    for path in &summary.written {
        println!("wrote   {}", path.display());
    }
    for id in &summary.stale {
        println!("stale   {}", id);
    }
    for id in &summary.empty {
        println!("empty   {}", id);
    }
    for (id, error) in &summary.failed {
        eprintln!("failed  {}: {}", id, error);
    }
    println!(
        "{} written, {} stale, {} empty, {} failed",
        summary.written.len(),
        summary.stale.len(),
        summary.empty.len(),
        summary.failed.len()
    );
}
