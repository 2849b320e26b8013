//! Per-streamer profile pages.
//!
//! Every sub-field is best effort: the page layout is not under our control,
//! so anything that cannot be found is left empty rather than failing the
//! whole profile.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::fetch::{Fetcher, Sleeper};
use crate::html::{select_first, selector, selectors, stripped_text};
use crate::numbers::StatValue;

pub const MAX_TOP_GAMES: usize = 5;
pub const MAX_RECENT_STREAMS: usize = 10;

/// Cloudflare's stand-in for obfuscated e-mail addresses, with either space.
const EMAIL_PLACEHOLDERS: &[&str] = &["[email protected]", "[email\u{a0}protected]"];

const BIO_SELECTORS: &[&str] = &[
    r#"div[style*="word-wrap:break-word"]"#,
    ".description",
    ".bio",
    ".about",
    "[data-bio]",
    ".stream-description",
];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GameHours {
    pub game: String,
    pub hours: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RecentStream {
    pub date: String,
    pub game: String,
    pub duration: String,
    pub max_viewers: String,
    pub all_games: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ChannelInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProfileRecord {
    pub name: String,
    pub profile_url: String,
    pub rank: Option<u32>,
    pub scraped_at: DateTime<Utc>,
    pub bio: Option<String>,
    pub top_games: Vec<GameHours>,
    pub recent_streams: Vec<RecentStream>,
    pub additional_stats: BTreeMap<String, StatValue>,
    pub channel_info: ChannelInfo,
}

/// Extracts a profile from page HTML. `rank` is left for the caller to join.
pub fn extract_profile(
    html: &str,
    name: &str,
    profile_url: &str,
    scraped_at: DateTime<Utc>,
) -> ProfileRecord {
    let document = Html::parse_document(html);
    let root = document.root_element();

    ProfileRecord {
        name: name.to_string(),
        profile_url: profile_url.to_string(),
        rank: None,
        scraped_at,
        bio: extract_bio(root),
        top_games: extract_top_games(root),
        recent_streams: extract_recent_streams(root),
        additional_stats: extract_additional_stats(root),
        channel_info: extract_channel_info(root),
    }
}

pub fn extract_bio(root: ElementRef) -> Option<String> {
    let element = select_first(root, &selectors(BIO_SELECTORS))?;
    let mut bio = stripped_text(element);
    for placeholder in EMAIL_PLACEHOLDERS {
        bio = bio.replace(*placeholder, "");
    }
    let bio = bio.trim();
    if bio.is_empty() {
        None
    } else {
        Some(bio.to_string())
    }
}

pub fn extract_top_games(root: ElementRef) -> Vec<GameHours> {
    let entries = selector("#channel-games a.entity");
    let title = selector("div[title]");
    let hours = selector("span.to-time");

    root.select(&entries)
        .filter_map(|entry| {
            let game = entry
                .select(&title)
                .next()
                .and_then(|div| div.value().attr("title"))
                .map(str::trim)
                .filter(|t| !t.is_empty())?;
            let hours = entry
                .select(&hours)
                .next()
                .map(stripped_text)
                .unwrap_or_else(|| "N/A".to_string());
            Some(GameHours {
                game: game.to_string(),
                hours,
            })
        })
        .take(MAX_TOP_GAMES)
        .collect()
}

pub fn extract_recent_streams(root: ElementRef) -> Vec<RecentStream> {
    let entries = selector("#channel-streams a.entity-line");
    let date = selector("div[data-dt]");
    let viewers = selector("div.to-number-lg");
    let duration = selector("div.to-time-lg");
    let game_img = selector("img[title]");

    root.select(&entries)
        .take(MAX_RECENT_STREAMS)
        .map(|entry| {
            let all_games: Vec<String> = entry
                .select(&game_img)
                .filter_map(|img| img.value().attr("title"))
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();

            RecentStream {
                date: entry
                    .select(&date)
                    .next()
                    .and_then(|div| div.value().attr("data-dt"))
                    .unwrap_or("N/A")
                    .to_string(),
                game: all_games
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string()),
                duration: entry
                    .select(&duration)
                    .next()
                    .map(stripped_text)
                    .unwrap_or_else(|| "0h".to_string()),
                max_viewers: entry
                    .select(&viewers)
                    .next()
                    .map(stripped_text)
                    .unwrap_or_else(|| "0".to_string()),
                all_games,
            }
        })
        .collect()
}

/// `"Hours Streamed:"` → `"hours_streamed"`.
pub fn stat_key(label: &str) -> String {
    label.trim().to_lowercase().replace(' ', "_").replace(':', "")
}

/// Lifetime stat blocks plus every two-column row of the stat tables.
pub fn extract_additional_stats(root: ElementRef) -> BTreeMap<String, StatValue> {
    let mut stats = BTreeMap::new();

    let blocks = selector("div.g-x-s-block");
    let values = selectors(&["div.to-number", "div.g-x-s-value"]);
    let label = selector("div.g-x-s-label");
    for block in root.select(&blocks) {
        let value = select_first(block, &values)
            .map(stripped_text)
            .and_then(|v| StatValue::from_text(&v));
        let key = block
            .select(&label)
            .next()
            .map(|l| stat_key(&stripped_text(l)))
            .filter(|k| !k.is_empty());
        if let (Some(key), Some(value)) = (key, value) {
            stats.insert(key, value);
        }
    }

    let rows = selector("table.table tr");
    let td = selector("td");
    for row in root.select(&rows) {
        let cells: Vec<ElementRef> = row.select(&td).collect();
        if cells.len() != 2 {
            continue;
        }
        let key = stat_key(&stripped_text(cells[0]));
        if key.is_empty() {
            continue;
        }
        if let Some(value) = StatValue::from_text(&stripped_text(cells[1])) {
            stats.insert(key, value);
        }
    }

    stats
}

pub fn extract_channel_info(root: ElementRef) -> ChannelInfo {
    let mut info = ChannelInfo::default();

    let div = selector("div");
    let heading = root
        .select(&div)
        .filter(|d| stripped_text(*d) == "Streamer Profile")
        .last();
    let container = match heading
        .and_then(|h| h.parent())
        .and_then(|p| p.parent())
        .and_then(ElementRef::wrap)
    {
        Some(container) => container,
        None => return info,
    };

    let language = selector(r#"a[href*="/languages/"]"#);
    info.language = container
        .select(&language)
        .next()
        .map(stripped_text)
        .filter(|t| !t.is_empty());

    let created = selector("span.to-date");
    info.created_date = container
        .select(&created)
        .next()
        .map(stripped_text)
        .filter(|t| !t.is_empty());

    let labels = selector("span.label-soft");
    info.status = container
        .select(&labels)
        .map(stripped_text)
        .filter(|t| t == "Partner" || t == "Affiliate")
        .last();

    info
}

/// A streamer to fetch a profile for, usually read back from a listing collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileTarget {
    pub name: String,
    pub profile_url: Option<String>,
    pub rank: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ProfileConfig {
    pub delay: Duration,
    /// Longer pause taken instead of `delay` after every `batch_size` requests.
    pub batch_pause: Duration,
    /// Zero disables the batch pause.
    pub batch_size: usize,
    /// Wait before retrying a rate-limited (429) request.
    pub rate_limit_backoff: Duration,
    /// Attempts per profile, first try included.
    pub max_attempts: u32,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1500),
            batch_pause: Duration::from_secs(3),
            batch_size: 10,
            rate_limit_backoff: Duration::from_secs(60),
            max_attempts: 2,
        }
    }
}

impl ProfileConfig {
    /// Pause to take once `requested` profiles have been fetched.
    pub fn pause_after(&self, requested: usize) -> Duration {
        if self.batch_size > 0 && requested % self.batch_size == 0 {
            self.batch_pause
        } else {
            self.delay
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProfileRun {
    pub profiles: Vec<ProfileRecord>,
    /// Names whose page could not be fetched.
    pub failed: Vec<String>,
    pub missing_url: usize,
}

/// Fetches and extracts one profile, retrying only on HTTP 429.
pub fn scrape_profile(
    target_name: &str,
    profile_url: &str,
    fetcher: &dyn Fetcher,
    sleeper: &dyn Sleeper,
    config: &ProfileConfig,
) -> Result<ProfileRecord, FetchError> {
    let mut attempt = 1;
    loop {
        log::info!(
            "Scraping profile {} - {} (attempt {})",
            target_name,
            profile_url,
            attempt
        );
        match fetcher.fetch(profile_url) {
            Ok(html) => return Ok(extract_profile(&html, target_name, profile_url, Utc::now())),
            Err(FetchError::RateLimited { .. }) if attempt < config.max_attempts => {
                log::warn!(
                    "Rate limited on {}, waiting {:?} before retrying",
                    target_name,
                    config.rate_limit_backoff
                );
                sleeper.sleep(config.rate_limit_backoff);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Scrapes the profile of every target in order, one request at a time.
pub fn collect_profiles(
    targets: &[ProfileTarget],
    fetcher: &dyn Fetcher,
    sleeper: &dyn Sleeper,
    config: &ProfileConfig,
) -> ProfileRun {
    let mut run = ProfileRun::default();
    let total = targets.len();
    let mut requested = 0;

    for (idx, target) in targets.iter().enumerate() {
        let url = match target.profile_url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => url,
            None => {
                log::warn!("No profile URL for {}", target.name);
                run.missing_url += 1;
                continue;
            }
        };

        if requested > 0 {
            let pause = config.pause_after(requested);
            if pause > config.delay {
                log::info!("Pausing {:?} after {} profiles", pause, requested);
            }
            sleeper.sleep(pause);
        }
        requested += 1;

        log::info!(
            "[{}/{}] Rank #{} - {}",
            idx + 1,
            total,
            target.rank.map(|r| r.to_string()).unwrap_or_else(|| "?".to_string()),
            target.name
        );

        match scrape_profile(&target.name, url, fetcher, sleeper, config) {
            Ok(mut profile) => {
                profile.rank = target.rank;
                log::info!(
                    "Profile {}: bio {}, {} games, {} streams, {} stats",
                    target.name,
                    if profile.bio.is_some() { "found" } else { "missing" },
                    profile.top_games.len(),
                    profile.recent_streams.len(),
                    profile.additional_stats.len()
                );
                run.profiles.push(profile);
            }
            Err(err) => {
                log::error!("Profile {} failed: {}", target.name, err);
                run.failed.push(target.name.clone());
            }
        }
    }

    log::info!(
        "Profiles done: {} scraped, {} failed, {} without URL",
        run.profiles.len(),
        run.failed.len(),
        run.missing_url
    );
    run
}
