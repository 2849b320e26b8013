use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use viewership_scraper::{
    DocumentStore, HttpFetcher, JsonDirStore, ListingReport, MemoryStore, PersistMode,
    PersistSummary, Pipeline, ProfileReport, Region, Settings, StoreError, ThreadSleeper,
};

/// How profile collections are written
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Insert or replace each profile by name, keep the others
    Merge,
    /// Clear the collection and write the new batch
    Replace,
}

impl From<ModeArg> for PersistMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Merge => PersistMode::MergeUpsert,
            ModeArg::Replace => PersistMode::ReplaceAll,
        }
    }
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq)]
enum Command {
    /// Top 50 French streamers
    France,
    /// Top 500 streamers worldwide
    World,
    /// France then World
    Both,
    /// Profiles of the stored French streamers
    ProfilesFr,
    /// Profiles of the stored world streamers
    ProfilesWorld,
    /// Both listings, then both profile sets
    All,
}

/// Scrape twitchtracker viewership rankings into JSON collections
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Operation to run; shows a menu when omitted
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory holding one JSON file per collection
    #[arg(long, env = "VIEWERSHIP_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Create the data directory if it does not exist
    #[arg(long)]
    create_data_dir: bool,

    /// Keep results in memory instead of writing them
    #[arg(long)]
    dry_run: bool,

    /// Pause between page requests, in milliseconds
    #[arg(long, default_value_t = 1500)]
    delay_ms: u64,

    /// Listing pages to walk at most
    #[arg(long, default_value_t = 10)]
    max_pages: u32,

    /// Profiles to scrape per region (defaults: all French, top 50 world)
    #[arg(long)]
    profile_limit: Option<usize>,

    /// How profile collections are written
    #[arg(long, value_enum, default_value_t = ModeArg::Merge)]
    profile_mode: ModeArg,
}

impl Cli {
    fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        let delay = Duration::from_millis(self.delay_ms);
        for config in [&mut settings.france, &mut settings.world] {
            config.delay = delay;
            config.max_pages = self.max_pages;
        }
        settings.profiles.delay = delay;
        settings.profile_mode = self.profile_mode.into();
        if let Some(limit) = self.profile_limit {
            settings.fr_profile_limit = Some(limit);
            settings.world_profile_limit = Some(limit);
        }
        settings
    }

    fn open_store(&self) -> Result<Box<dyn DocumentStore>> {
        if self.dry_run {
            println!("Dry run: results are kept in memory only");
            return Ok(Box::new(MemoryStore::new()));
        }
        if self.create_data_dir {
            fs::create_dir_all(&self.data_dir).with_context(|| {
                format!("Failed to create data directory {}", self.data_dir.display())
            })?;
        }
        Ok(Box::new(JsonDirStore::new(&self.data_dir)))
    }
}

const MENU: &[(&str, Command, &str)] = &[
    ("1", Command::France, "Scrape France only"),
    ("2", Command::World, "Scrape World Top 500 only"),
    ("3", Command::Both, "Scrape France + World"),
    ("4", Command::ProfilesFr, "Scrape French profiles"),
    ("5", Command::ProfilesWorld, "Scrape world profiles"),
    ("6", Command::All, "Scrape everything"),
];

/// Prompts until a valid choice is entered. `None` on end of input.
fn prompt_menu() -> Result<Option<Command>> {
    println!("TWITCHTRACKER SCRAPER");
    println!("{}", "=".repeat(50));
    for (key, _, label) in MENU {
        println!("{}. {}", key, label);
    }
    println!("{}", "=".repeat(50));

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\nChoice (1-{}): ", MENU.len());
        io::stdout().flush().context("Failed to flush stdout")?;

        let line = match lines.next() {
            Some(line) => line.context("Failed to read choice")?,
            None => return Ok(None),
        };
        let choice = line.trim();
        match MENU.iter().find(|(key, _, _)| *key == choice) {
            Some((_, command, _)) => return Ok(Some(*command)),
            None => println!("Invalid choice. Type a number from 1 to {}.", MENU.len()),
        }
    }
}

fn report_saved(saved: &Result<PersistSummary, StoreError>, data_dir: &Path) {
    match saved {
        Ok(summary) => println!("✅ {}", summary),
        Err(err) if err.is_connection() => {
            println!("❌ Could not reach the data store: {}", err);
            println!(
                "💡 Create {} (or rerun with --create-data-dir / --data-dir) and try again; \
                 the scraped data was not saved.",
                data_dir.display()
            );
        }
        Err(err) => println!("❌ Saving failed: {}", err),
    }
}

fn report_listing(report: &ListingReport, data_dir: &Path) {
    let label = match report.region {
        Region::Fr => "France",
        Region::World => "World",
    };
    println!(
        "\n{}: {} streamers collected, {} rows skipped",
        label,
        report.run.records.len(),
        report.run.skipped
    );
    if !report.run.failed_pages.is_empty() {
        println!("   Pages that failed: {:?}", report.run.failed_pages);
    }
    match &report.saved {
        Some(saved) => report_saved(saved, data_dir),
        None => println!("⚠️ Nothing fetched, stored {} listing left untouched", label),
    }
}

fn report_profiles(report: &ProfileReport, data_dir: &Path) {
    println!(
        "\nProfiles ({}): {} scraped, {} failed, {} without URL",
        report.region.as_str(),
        report.run.profiles.len(),
        report.run.failed.len(),
        report.run.missing_url
    );
    report_saved(&report.saved, data_dir);
}

fn run(command: Command, pipeline: &mut Pipeline, data_dir: &Path) {
    match command {
        Command::France => report_listing(&pipeline.scrape_france(), data_dir),
        Command::World => report_listing(&pipeline.scrape_world(), data_dir),
        Command::Both => {
            let (fr, world) = pipeline.scrape_both();
            report_listing(&fr, data_dir);
            report_listing(&world, data_dir);
        }
        Command::ProfilesFr => report_profiles(&pipeline.scrape_profiles(Region::Fr), data_dir),
        Command::ProfilesWorld => {
            report_profiles(&pipeline.scrape_profiles(Region::World), data_dir)
        }
        Command::All => {
            let (listings, profiles) = pipeline.scrape_everything();
            for report in &listings {
                report_listing(report, data_dir);
            }
            for report in &profiles {
                report_profiles(report, data_dir);
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    ctrlc::set_handler(|| {
        println!("\n\nScraping cancelled.");
        std::process::exit(0);
    })
    .context("Failed to set Ctrl-C handler")?;

    let cli = Cli::parse();

    let command = match cli.command {
        Some(command) => command,
        None => match prompt_menu()? {
            Some(command) => command,
            None => {
                println!("\nScraping cancelled.");
                return Ok(());
            }
        },
    };

    let fetcher = HttpFetcher::new().context("Failed to build HTTP client")?;
    let sleeper = ThreadSleeper;
    let mut store = cli.open_store()?;
    let mut pipeline = Pipeline::new(&fetcher, &sleeper, store.as_mut(), cli.settings());

    run(command, &mut pipeline, &cli.data_dir);
    Ok(())
}
