//! The scrape operations offered by the command line: collect, then persist.

use crate::collector::{collect, CollectionRun, CollectorConfig};
use crate::error::StoreError;
use crate::fetch::{Fetcher, Sleeper};
use crate::listing::{Region, StreamerRecord};
use crate::profile::{collect_profiles, ProfileConfig, ProfileRecord, ProfileRun, ProfileTarget};
use crate::store::{persist, DocumentStore, Filter, PersistMode, PersistSummary};

pub const VIEWERSHIP_FR: &str = "viewership_fr";
pub const VIEWERSHIP_WORLD: &str = "viewership_world";
pub const PROFILES_FR: &str = "streamers_profiles_fr";
pub const PROFILES_WORLD: &str = "profiles";

/// Profiles scraped from the world listing unless told otherwise.
pub const DEFAULT_WORLD_PROFILE_LIMIT: usize = 50;

pub fn listing_collection(region: Region) -> &'static str {
    match region {
        Region::Fr => VIEWERSHIP_FR,
        Region::World => VIEWERSHIP_WORLD,
    }
}

pub fn profile_collection(region: Region) -> &'static str {
    match region {
        Region::Fr => PROFILES_FR,
        Region::World => PROFILES_WORLD,
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub france: CollectorConfig,
    pub world: CollectorConfig,
    pub profiles: ProfileConfig,
    pub listing_mode: PersistMode,
    pub profile_mode: PersistMode,
    pub fr_profile_limit: Option<usize>,
    pub world_profile_limit: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            france: CollectorConfig::france(),
            world: CollectorConfig::world(),
            profiles: ProfileConfig::default(),
            listing_mode: PersistMode::ReplaceAll,
            profile_mode: PersistMode::MergeUpsert,
            fr_profile_limit: None,
            world_profile_limit: Some(DEFAULT_WORLD_PROFILE_LIMIT),
        }
    }
}

/// Scraped listing plus the outcome of saving it. The records stay available
/// when saving failed.
#[derive(Debug)]
pub struct ListingReport {
    pub region: Region,
    pub run: CollectionRun,
    /// `None` when no page could be fetched; the stored listing is left as it was.
    pub saved: Option<Result<PersistSummary, StoreError>>,
}

#[derive(Debug)]
pub struct ProfileReport {
    pub region: Region,
    pub run: ProfileRun,
    pub saved: Result<PersistSummary, StoreError>,
}

pub struct Pipeline<'a> {
    fetcher: &'a dyn Fetcher,
    sleeper: &'a dyn Sleeper,
    store: &'a mut dyn DocumentStore,
    settings: Settings,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        fetcher: &'a dyn Fetcher,
        sleeper: &'a dyn Sleeper,
        store: &'a mut dyn DocumentStore,
        settings: Settings,
    ) -> Self {
        Self {
            fetcher,
            sleeper,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn scrape_listing(&mut self, region: Region) -> ListingReport {
        let config = match region {
            Region::Fr => &self.settings.france,
            Region::World => &self.settings.world,
        };
        let run = collect(config, self.fetcher, self.sleeper);
        let saved = if run.pages_fetched == 0 {
            log::warn!(
                "No {} page could be fetched, leaving '{}' untouched",
                region.as_str(),
                listing_collection(region)
            );
            None
        } else {
            Some(self.save_listing(region, &run.records))
        };
        ListingReport { region, run, saved }
    }

    pub fn scrape_france(&mut self) -> ListingReport {
        self.scrape_listing(Region::Fr)
    }

    pub fn scrape_world(&mut self) -> ListingReport {
        self.scrape_listing(Region::World)
    }

    pub fn scrape_both(&mut self) -> (ListingReport, ListingReport) {
        (self.scrape_france(), self.scrape_world())
    }

    /// Re-saves records kept from an earlier report, e.g. after the store came back.
    pub fn save_listing(
        &mut self,
        region: Region,
        records: &[StreamerRecord],
    ) -> Result<PersistSummary, StoreError> {
        let label = match region {
            Region::Fr => "French streamers",
            Region::World => "world top streamers",
        };
        persist(
            &mut *self.store,
            listing_collection(region),
            records,
            self.settings.listing_mode,
            label,
        )
    }

    /// Scrapes the profiles of the streamers stored in the region's listing.
    pub fn scrape_profiles(&mut self, region: Region) -> ProfileReport {
        let limit = match region {
            Region::Fr => self.settings.fr_profile_limit,
            Region::World => self.settings.world_profile_limit,
        };
        let targets = match load_targets(&*self.store, listing_collection(region), limit) {
            Ok(targets) => targets,
            Err(err) => {
                return ProfileReport {
                    region,
                    run: ProfileRun::default(),
                    saved: Err(err),
                }
            }
        };
        log::info!(
            "{} streamers found in '{}'",
            targets.len(),
            listing_collection(region)
        );

        let run = collect_profiles(
            &targets,
            self.fetcher,
            self.sleeper,
            &self.settings.profiles,
        );
        let saved = self.save_profiles(region, &run.profiles);
        ProfileReport { region, run, saved }
    }

    pub fn save_profiles(
        &mut self,
        region: Region,
        profiles: &[ProfileRecord],
    ) -> Result<PersistSummary, StoreError> {
        persist(
            &mut *self.store,
            profile_collection(region),
            profiles,
            self.settings.profile_mode,
            "profiles",
        )
    }

    /// Both listings, then the profiles of both.
    pub fn scrape_everything(&mut self) -> (Vec<ListingReport>, Vec<ProfileReport>) {
        let (fr, world) = self.scrape_both();
        let profiles = vec![
            self.scrape_profiles(Region::Fr),
            self.scrape_profiles(Region::World),
        ];
        (vec![fr, world], profiles)
    }
}

/// Reads `name`, `profile_url` and `rank` of a listing collection, best ranks first.
pub fn load_targets(
    store: &dyn DocumentStore,
    collection: &str,
    limit: Option<usize>,
) -> Result<Vec<ProfileTarget>, StoreError> {
    let docs = store.find(
        collection,
        &Filter::new(),
        Some(&["name", "profile_url", "rank"][..]),
    )?;

    let mut targets: Vec<ProfileTarget> = docs
        .iter()
        .filter_map(|doc| {
            let name = doc.get("name")?.as_str()?.to_string();
            Some(ProfileTarget {
                name,
                profile_url: doc
                    .get("profile_url")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                rank: doc
                    .get("rank")
                    .and_then(|v| v.as_u64())
                    .and_then(|r| u32::try_from(r).ok()),
            })
        })
        .collect();

    targets.sort_by_key(|t| t.rank.unwrap_or(u32::MAX));
    if let Some(limit) = limit {
        targets.truncate(limit);
    }
    Ok(targets)
}
