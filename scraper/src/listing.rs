//! Extraction of ranked rows from a listing page.

use chrono::{DateTime, Utc};
use reqwest::Url;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};

use crate::error::RowError;
use crate::html::{selector, text_of};
use crate::numbers::{parse_count, parse_number, PLACEHOLDER};

pub const SITE_ORIGIN: &str = "https://twitchtracker.com";

/// Rows with fewer cells than this are ads or separators.
pub const MIN_CELLS: usize = 6;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Fr,
    World,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Fr => "fr",
            Region::World => "world",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StreamerRecord {
    pub rank: u32,
    pub name: String,
    pub profile_url: String,
    pub avatar_url: Option<String>,
    pub avg_viewers: Option<f64>,
    pub max_viewers: Option<f64>,
    pub hours_streamed: Option<f64>,
    pub total_followers: Option<f64>,
    pub followers_gain: Option<f64>,
    pub total_views: Option<f64>,
    pub total_minutes_watched: Option<f64>,
    pub global_rank: Option<i64>,
    pub page: u32,
    pub scraped_at: DateTime<Utc>,
    pub region: Region,
}

/// Provenance stamped on every record of one page.
#[derive(Debug, Clone, Copy)]
pub struct RowContext {
    pub page: u32,
    pub region: Region,
    pub scraped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Record(StreamerRecord),
    /// Not a data row (ad, separator, header).
    Ignored,
    /// A data row that could not be extracted.
    Skipped(RowError),
}

/// Result of running every row of one page through [`extract_row`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ListingPage {
    pub records: Vec<StreamerRecord>,
    pub ignored: usize,
    pub skipped: Vec<RowError>,
}

/// Parses `html` and extracts every `table tbody tr`.
pub fn parse_listing(html: &str, ctx: &RowContext) -> ListingPage {
    let document = Html::parse_document(html);
    let row_selector = selector("table tbody tr");

    let mut page = ListingPage::default();
    for row in document.select(&row_selector) {
        match extract_row(row, ctx) {
            RowOutcome::Record(record) => page.records.push(record),
            RowOutcome::Ignored => page.ignored += 1,
            RowOutcome::Skipped(err) => page.skipped.push(err),
        }
    }
    page
}

/// Maps one `<tr>` to a record.
pub fn extract_row(row: ElementRef, ctx: &RowContext) -> RowOutcome {
    let td = selector("td");
    let cells: Vec<ElementRef> = row.select(&td).collect();
    extract_cells(&cells, ctx)
}

/// Maps the cells of one row to a record.
///
/// Column order: rank, link/avatar, name, avg viewers, hours streamed,
/// max viewers, minutes watched, global rank, followers gain, followers,
/// views. Everything after the max viewers column is optional.
pub fn extract_cells(cells: &[ElementRef], ctx: &RowContext) -> RowOutcome {
    if cells.len() < MIN_CELLS {
        return RowOutcome::Ignored;
    }

    let rank = match parse_rank(&text_of(cells[0])) {
        Some(rank) => rank,
        None => return RowOutcome::Ignored,
    };

    let anchor = selector("a[href]");
    let href = match cells[1]
        .select(&anchor)
        .next()
        .and_then(|a| a.value().attr("href"))
    {
        Some(href) => href,
        None => return RowOutcome::Skipped(RowError::MissingProfileLink { rank }),
    };
    let profile_url = match resolve_link(href) {
        Some(url) => url,
        None => {
            return RowOutcome::Skipped(RowError::InvalidProfileLink {
                rank,
                href: href.to_string(),
            })
        }
    };

    let img = selector("img");
    let avatar_url = cells[1].select(&img).next().and_then(|img| {
        img.value()
            .attr("src")
            .or_else(|| img.value().attr("data-src"))
            .map(str::to_string)
    });

    let name = text_of(cells[2]);
    if name.is_empty() {
        return RowOutcome::Skipped(RowError::EmptyName { rank });
    }

    let span = selector("span");
    let hours_streamed = cells[4]
        .select(&span)
        .next()
        .map(text_of)
        .unwrap_or_else(|| text_of(cells[4]));

    let optional = |idx: usize| cells.get(idx).map(|cell| text_of(*cell));

    let followers_gain = optional(8).map(|t| t.trim_start_matches('+').to_string());
    let total_views = optional(10).filter(|t| !t.contains(PLACEHOLDER));

    RowOutcome::Record(StreamerRecord {
        rank,
        name,
        profile_url,
        avatar_url,
        avg_viewers: parse_number(&text_of(cells[3])),
        max_viewers: parse_number(&text_of(cells[5])),
        hours_streamed: parse_number(&hours_streamed),
        total_followers: optional(9).as_deref().and_then(parse_number),
        followers_gain: followers_gain.as_deref().and_then(parse_number),
        total_views: total_views.as_deref().and_then(parse_number),
        total_minutes_watched: optional(6).as_deref().and_then(parse_number),
        global_rank: optional(7)
            .as_deref()
            .map(|t| t.trim_start_matches('#'))
            .and_then(parse_count),
        page: ctx.page,
        scraped_at: ctx.scraped_at,
        region: ctx.region,
    })
}

/// `"#12"` → 12. Only a leading `#` is dropped; anything else that is not a
/// positive integer is `None`.
pub fn parse_rank(text: &str) -> Option<u32> {
    let text = text.trim();
    let digits = text.strip_prefix('#').unwrap_or(text);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok().filter(|rank| *rank > 0)
}

/// Resolves a profile link against the site origin.
pub fn resolve_link(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let base = Url::parse(SITE_ORIGIN).ok()?;
    base.join(href).ok().map(String::from)
}
