use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use schemalift::store::StoreFile;
use schemalift::{AppData, MigrationSettings, Migrator, catalog};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "lift-tool")]
#[command(about = "Store migration tooling for SchemaLift")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the store's on-disk version against the current one
    Status {
        #[arg(long)]
        db: PathBuf,
    },
    /// Print the step chain from a given version to the current one
    Plan {
        #[arg(long)]
        from: u32,
    },
    /// Run every pending migration step against a store
    Upgrade {
        #[arg(long)]
        db: PathBuf,
        /// Root directory of the filesystem assets rows point at
        #[arg(long)]
        files: PathBuf,
        /// JSON bundle of localized default texts
        #[arg(long)]
        appdata: Option<PathBuf>,
        /// Keep the working copies around after the run
        #[arg(long)]
        keep_workdir: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Status { db } => status(&db),
        Command::Plan { from } => plan(from),
        Command::Upgrade {
            db,
            files,
            appdata,
            keep_workdir,
        } => upgrade(db, files, appdata.as_deref(), keep_workdir),
    }
}

fn status(db: &Path) -> Result<()> {
    let on_disk = StoreFile::new(db)
        .peek_version()
        .with_context(|| format!("Failed to read store '{}'", db.display()))?;

    println!("Store:           {}", db.display());
    println!("On-disk version: {}", on_disk);
    println!("Current version: {}", catalog::CURRENT_VERSION);

    let pending = catalog::plan().resolve(on_disk)?;
    if pending.is_empty() {
        println!("Status:          up to date");
    } else {
        println!("Status:          {} pending steps", pending.len());
    }
    Ok(())
}

fn plan(from: u32) -> Result<()> {
    let chain = catalog::plan().resolve(from)?;
    if chain.is_empty() {
        println!("Version {} is current, nothing to do", from);
        return Ok(());
    }

    println!(
        "{} steps from version {} to {}:",
        chain.len(),
        from,
        catalog::CURRENT_VERSION
    );
    for step in chain {
        let mut notes = Vec::new();
        if step.prologue().is_some() {
            notes.push("prologue".to_string());
        }
        if !step.transforms().is_empty() {
            notes.push(format!("{} table transforms", step.transforms().len()));
        }
        if step.epilogue().is_some() {
            notes.push("epilogue".to_string());
        }
        for (table, _) in step.waived_tables() {
            notes.push(format!("count waived on {}", table));
        }
        let suffix = if notes.is_empty() {
            String::new()
        } else {
            format!(" ({})", notes.join(", "))
        };
        println!("- {} -> {}{}", step.version(), step.target_version(), suffix);
    }
    Ok(())
}

fn upgrade(db: PathBuf, files: PathBuf, appdata: Option<&Path>, keep_workdir: bool) -> Result<()> {
    let settings = MigrationSettings::new(db, files).keep_workdir(keep_workdir);
    let mut migrator = Migrator::new(settings);

    if let Some(path) = appdata {
        let bundle = AppData::from_file(path)
            .with_context(|| format!("Failed to load appdata bundle '{}'", path.display()))?;
        migrator = migrator.with_appdata(bundle);
    }

    let report = migrator.run()?;
    if report.is_noop() {
        println!("Store already at version {}", report.to_version);
        return Ok(());
    }

    println!(
        "Migrated from version {} to {}",
        report.from_version, report.to_version
    );
    for step in &report.steps {
        println!("- {} -> {}", step.from_version, step.to_version);
        for table in &step.tables {
            let marker = if table.waived { " (waived)" } else { "" };
            println!(
                "    {}: {} -> {} rows{}",
                table.table, table.expected, table.actual, marker
            );
        }
    }
    Ok(())
}
