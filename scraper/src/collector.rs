//! Page-by-page collection of a ranked listing.

use std::time::Duration;

use chrono::Utc;

use crate::fetch::{Fetcher, Sleeper};
use crate::listing::{parse_listing, Region, RowContext, StreamerRecord, SITE_ORIGIN};

pub const DEFAULT_MAX_PAGES: u32 = 10;
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(1500);
pub const FR_RANK_CEILING: u32 = 50;

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub base_url: String,
    pub region: Region,
    pub max_pages: u32,
    /// Stop once a record at or past this rank has been accepted.
    pub rank_ceiling: Option<u32>,
    pub delay: Duration,
}

impl CollectorConfig {
    /// Top 50 French channels.
    pub fn france() -> Self {
        Self {
            base_url: format!("{SITE_ORIGIN}/channels/viewership/french"),
            region: Region::Fr,
            max_pages: DEFAULT_MAX_PAGES,
            rank_ceiling: Some(FR_RANK_CEILING),
            delay: DEFAULT_PAGE_DELAY,
        }
    }

    /// Top 500 channels worldwide, 50 per page.
    pub fn world() -> Self {
        Self {
            base_url: format!("{SITE_ORIGIN}/channels/viewership"),
            region: Region::World,
            max_pages: DEFAULT_MAX_PAGES,
            rank_ceiling: None,
            delay: DEFAULT_PAGE_DELAY,
        }
    }

    pub fn page_url(&self, page: u32) -> String {
        if page > 1 {
            format!("{}?page={}", self.base_url, page)
        } else {
            self.base_url.clone()
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CollectionRun {
    pub records: Vec<StreamerRecord>,
    /// Data rows that failed extraction.
    pub skipped: usize,
    pub pages_fetched: u32,
    pub failed_pages: Vec<u32>,
}

/// Walks the listing pages in order and gathers every valid row.
///
/// A page that fails to fetch contributes nothing; the run carries on with
/// the next page.
pub fn collect(
    config: &CollectorConfig,
    fetcher: &dyn Fetcher,
    sleeper: &dyn Sleeper,
) -> CollectionRun {
    let mut run = CollectionRun::default();

    for page in 1..=config.max_pages {
        if page > 1 {
            sleeper.sleep(config.delay);
        }

        let url = config.page_url(page);
        log::info!("Scraping {} page {}...", config.region.as_str(), page);

        let html = match fetcher.fetch(&url) {
            Ok(html) => html,
            Err(err) => {
                log::warn!("Page {} failed, continuing: {}", page, err);
                run.failed_pages.push(page);
                continue;
            }
        };
        run.pages_fetched += 1;

        let ctx = RowContext {
            page,
            region: config.region,
            scraped_at: Utc::now(),
        };
        let listing = parse_listing(&html, &ctx);
        log::info!(
            "Page {}: {} records, {} skipped, {} non-data rows",
            page,
            listing.records.len(),
            listing.skipped.len(),
            listing.ignored
        );

        for err in &listing.skipped {
            log::warn!("Page {}: {}", page, err);
        }
        run.skipped += listing.skipped.len();

        let mut ceiling_reached = false;
        for record in listing.records {
            match config.rank_ceiling {
                Some(ceiling) if record.rank > ceiling => {
                    ceiling_reached = true;
                    break;
                }
                _ => run.records.push(record),
            }
        }

        if let (Some(ceiling), Some(last)) = (config.rank_ceiling, run.records.last()) {
            if last.rank >= ceiling {
                ceiling_reached = true;
            }
        }
        if ceiling_reached {
            log::info!("Rank ceiling reached on page {}, stopping", page);
            break;
        }
    }

    log::info!(
        "Collected {} {} records ({} skipped, {} failed pages)",
        run.records.len(),
        config.region.as_str(),
        run.skipped,
        run.failed_pages.len()
    );
    run
}
