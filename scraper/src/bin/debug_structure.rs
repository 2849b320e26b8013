use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use scraper::{Html, Selector};
use viewership_scraper::{
    extract_profile, parse_listing, Fetcher, HttpFetcher, Region, RowContext,
};

/// Save a page for regression testing and report what the extractors see in it
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Page to fetch, e.g. https://twitchtracker.com/zerator
    url: String,

    /// Name of the saved fixture (without extension)
    test_name: String,
}

fn count(document: &Html, css: &str) -> usize {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).count(),
        Err(_) => 0,
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    println!("Fetching HTML from {}...", cli.url);
    let fetcher = HttpFetcher::new().context("Failed to build HTTP client")?;
    let html = fetcher
        .fetch(&cli.url)
        .with_context(|| format!("Failed to fetch {}", cli.url))?;

    let failures_dir = Path::new("src/tests/fixtures/failures");
    fs::create_dir_all(failures_dir).context("Failed to create failures directory")?;
    let file_path = failures_dir.join(format!("{}.html", cli.test_name));
    fs::write(&file_path, &html).context("Failed to write HTML file")?;
    println!("Saved HTML to {} for regression testing", file_path.display());

    let document = Html::parse_document(&html);
    let streamer = cli
        .url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    let page_text = document.root_element().text().collect::<String>().to_lowercase();

    println!("\nHTML analysis results:");
    println!("  - Divs with classes: {}", count(&document, "div[class]"));
    println!("  - Tables: {}", count(&document, "table"));
    println!("  - Listing rows (table tbody tr): {}", count(&document, "table tbody tr"));
    println!("  - Scripts: {}", count(&document, "script"));
    println!("  - Game entries: {}", count(&document, "#channel-games a.entity"));
    println!("  - Stream entries: {}", count(&document, "#channel-streams a.entity-line"));
    println!("  - Stat blocks: {}", count(&document, "div.g-x-s-block"));
    println!(
        "  - Name '{}' found in page: {}",
        streamer,
        !streamer.is_empty() && page_text.contains(&streamer)
    );

    let ctx = RowContext {
        page: 1,
        region: Region::World,
        scraped_at: Utc::now(),
    };
    let listing = parse_listing(&html, &ctx);
    println!(
        "\nAs a listing page: {} records, {} skipped, {} non-data rows",
        listing.records.len(),
        listing.skipped.len(),
        listing.ignored
    );
    for err in &listing.skipped {
        println!("   {}", err);
    }

    let profile = extract_profile(&html, &streamer, &cli.url, Utc::now());
    println!(
        "As a profile page: bio {}, {} games, {} streams, {} stats, channel info {:?}",
        if profile.bio.is_some() { "found" } else { "missing" },
        profile.top_games.len(),
        profile.recent_streams.len(),
        profile.additional_stats.len(),
        profile.channel_info
    );

    Ok(())
}
