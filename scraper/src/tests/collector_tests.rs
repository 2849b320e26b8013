use std::time::Duration;

use super::{listing_page, listing_row, ranked_page, FakeFetcher, FakeResponse, RecordingSleeper};
use crate::collector::{collect, CollectorConfig};
use crate::listing::Region;

const BASE: &str = "https://tracker.test/channels/viewership";

fn bounded(ceiling: u32) -> CollectorConfig {
    CollectorConfig {
        base_url: BASE.to_string(),
        region: Region::Fr,
        max_pages: 10,
        rank_ceiling: Some(ceiling),
        delay: Duration::from_millis(1500),
    }
}

fn unbounded() -> CollectorConfig {
    CollectorConfig {
        rank_ceiling: None,
        region: Region::World,
        ..bounded(0)
    }
}

#[test]
fn test_page_urls() {
    let config = unbounded();
    assert_eq!(config.page_url(1), BASE);
    assert_eq!(config.page_url(2), format!("{}?page=2", BASE));
    assert_eq!(config.page_url(10), format!("{}?page=10", BASE));
}

#[test]
fn test_presets() {
    let fr = CollectorConfig::france();
    assert_eq!(fr.base_url, "https://twitchtracker.com/channels/viewership/french");
    assert_eq!(fr.rank_ceiling, Some(50));
    assert_eq!(fr.max_pages, 10);
    assert_eq!(fr.delay, Duration::from_millis(1500));

    let world = CollectorConfig::world();
    assert_eq!(world.base_url, "https://twitchtracker.com/channels/viewership");
    assert_eq!(world.rank_ceiling, None);
    assert_eq!(world.region, Region::World);
}

#[test]
fn test_bounded_run_stops_after_ceiling_page() {
    let config = bounded(50);
    let fetcher = FakeFetcher::new()
        .page(&config.page_url(1), ranked_page(1..=50))
        .page(&config.page_url(2), ranked_page(51..=100));
    let sleeper = RecordingSleeper::default();

    let run = collect(&config, &fetcher, &sleeper);

    assert_eq!(run.records.len(), 50);
    let ranks: Vec<u32> = run.records.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, (1..=50).collect::<Vec<u32>>());
    assert_eq!(fetcher.requested(), vec![BASE.to_string()]);
    assert!(sleeper.pauses().is_empty());
    assert_eq!(run.pages_fetched, 1);
    assert!(run.records.iter().all(|r| r.region == Region::Fr && r.page == 1));
}

#[test]
fn test_ceiling_inside_a_page_drops_higher_ranks() {
    let config = bounded(50);
    let fetcher = FakeFetcher::new()
        .page(&config.page_url(1), ranked_page(1..=40))
        .page(&config.page_url(2), ranked_page(41..=60));
    let sleeper = RecordingSleeper::default();

    let run = collect(&config, &fetcher, &sleeper);

    assert_eq!(run.records.len(), 50);
    assert_eq!(run.records.last().map(|r| r.rank), Some(50));
    assert_eq!(run.records[45].page, 2);
    assert_eq!(fetcher.requested().len(), 2);
    assert_eq!(sleeper.pauses(), vec![Duration::from_millis(1500)]);
}

#[test]
fn test_failed_page_contributes_nothing() {
    let config = unbounded();
    let mut fetcher = FakeFetcher::new();
    let mut expected = Vec::new();
    for page in 1..=10u32 {
        let first = (page - 1) * 3 + 1;
        if page == 3 {
            fetcher = fetcher.respond(&config.page_url(page), FakeResponse::Status(503));
        } else {
            fetcher = fetcher.page(&config.page_url(page), ranked_page(first..=first + 2));
            expected.extend(first..=first + 2);
        }
    }
    let sleeper = RecordingSleeper::default();

    let run = collect(&config, &fetcher, &sleeper);

    let ranks: Vec<u32> = run.records.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, expected);
    assert_eq!(run.failed_pages, vec![3]);
    assert_eq!(run.pages_fetched, 9);
    assert_eq!(fetcher.requested().len(), 10);
    // a pause before every page but the first, none after the last
    assert_eq!(sleeper.pauses().len(), 9);
}

#[test]
fn test_unbounded_run_walks_every_page() {
    let mut config = unbounded();
    config.max_pages = 3;
    let fetcher = FakeFetcher::new()
        .page(&config.page_url(1), ranked_page(1..=50))
        .page(&config.page_url(2), ranked_page(51..=100))
        .page(&config.page_url(3), ranked_page(101..=150));
    let sleeper = RecordingSleeper::default();

    let run = collect(&config, &fetcher, &sleeper);

    assert_eq!(run.records.len(), 150);
    assert_eq!(run.records[149].page, 3);
    assert!(run.records.iter().all(|r| r.region == Region::World));
    assert_eq!(sleeper.pauses().len(), 2);
}

#[test]
fn test_skipped_rows_are_counted_across_pages() {
    let mut config = unbounded();
    config.max_pages = 2;
    let broken = |rank: u32| {
        listing_row(rank, &format!("broken{}", rank))
            .replace(&format!(r#"<a href="/broken{}">"#, rank), "<a>")
    };
    let fetcher = FakeFetcher::new()
        .page(
            &config.page_url(1),
            listing_page(&[listing_row(1, "ok1"), broken(2)]),
        )
        .page(
            &config.page_url(2),
            listing_page(&[broken(3), listing_row(4, "ok4"), broken(5)]),
        );
    let sleeper = RecordingSleeper::default();

    let run = collect(&config, &fetcher, &sleeper);

    let names: Vec<&str> = run.records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["ok1", "ok4"]);
    assert_eq!(run.skipped, 3);
}

#[test]
fn test_every_page_failing_returns_empty_run() {
    let mut config = bounded(50);
    config.max_pages = 4;
    let fetcher = FakeFetcher::new();
    let sleeper = RecordingSleeper::default();

    let run = collect(&config, &fetcher, &sleeper);

    assert!(run.records.is_empty());
    assert_eq!(run.failed_pages, vec![1, 2, 3, 4]);
    assert_eq!(run.pages_fetched, 0);
}
