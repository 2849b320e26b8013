use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::error::FetchError;
use crate::fetch::{Fetcher, Sleeper};

pub mod collector_tests;
pub mod fixtures;

/// Helper function to log and save failed HTML for future regression testing
pub fn save_failed_html(html: &str, test_name: &str) -> Result<()> {
    let failures_dir =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/tests/fixtures/failures");
    fs::create_dir_all(&failures_dir)?;

    let file_path = failures_dir.join(format!("{}.html", test_name));
    fs::write(&file_path, html)?;

    println!("Saved failed HTML to {}", file_path.display());
    Ok(())
}

#[derive(Debug, Clone)]
pub enum FakeResponse {
    Page(String),
    Status(u16),
    RateLimited,
}

/// Serves canned responses per URL, in order. Unknown URLs answer 404.
#[derive(Default)]
pub struct FakeFetcher {
    responses: RefCell<HashMap<String, VecDeque<FakeResponse>>>,
    requested: RefCell<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: &str, response: FakeResponse) -> Self {
        self.responses
            .borrow_mut()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn page(self, url: &str, html: String) -> Self {
        self.respond(url, FakeResponse::Page(html))
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.requested.borrow_mut().push(url.to_string());
        let next = self
            .responses
            .borrow_mut()
            .get_mut(url)
            .and_then(|queue| queue.pop_front());
        match next {
            Some(FakeResponse::Page(html)) => Ok(html),
            Some(FakeResponse::RateLimited) => Err(FetchError::RateLimited {
                url: url.to_string(),
            }),
            Some(FakeResponse::Status(status)) => Err(FetchError::Status {
                status,
                url: url.to_string(),
            }),
            None => Err(FetchError::Status {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

/// Records requested pauses instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    pauses: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.pauses.borrow_mut().push(duration);
    }
}

/// One complete listing row in the site's column order.
pub fn listing_row(rank: u32, name: &str) -> String {
    format!(
        r#"<tr>
  <td>#{rank}</td>
  <td><a href="/{slug}"><img src="https://static.example/{slug}.png"></a></td>
  <td>{name}</td>
  <td>1.5K</td>
  <td><span>120</span> hrs</td>
  <td>3K</td>
  <td>2.5M</td>
  <td>#{global}</td>
  <td>+1,000</td>
  <td>10K</td>
  <td>1M</td>
</tr>"#,
        rank = rank,
        slug = name.to_lowercase(),
        name = name,
        global = rank * 10,
    )
}

pub fn listing_page(rows: &[String]) -> String {
    format!(
        "<html><body><table><thead><tr><th>#</th></tr></thead>\
         <tbody>{}</tbody></table></body></html>",
        rows.join("\n")
    )
}

/// A listing page of consecutive ranks named `streamer<rank>`.
pub fn ranked_page(ranks: std::ops::RangeInclusive<u32>) -> String {
    let rows: Vec<String> = ranks
        .map(|rank| listing_row(rank, &format!("streamer{}", rank)))
        .collect();
    listing_page(&rows)
}

pub fn assert_close(actual: Option<f64>, expected: f64) {
    match actual {
        Some(value) => assert!(
            (value - expected).abs() < 1e-6,
            "expected {}, got {}",
            expected,
            value
        ),
        None => panic!("expected {}, got None", expected),
    }
}
