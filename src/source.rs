//! The content-extraction collaborator behind the menu service.
//!
//! A source answers one question: for a `MM.DD` date key, which menu
//! sections are published? Each section is an ordered list of items, the
//! first being breakfast and the second lunch. How the content is obtained
//! (scraping, an API, a file) stays behind the trait.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::error::SourceError;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MenuItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl MenuItem {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

// One published block of items for a date
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct MenuSection {
    pub items: Vec<MenuItem>,
}

pub trait MenuSource: Send + Sync {
    fn fetch(&self, date_key: &str) -> impl Future<Output = Result<Vec<MenuSection>, SourceError>> + Send;
}

pub fn date_key(date: NaiveDate) -> String {
    date.format("%m.%d").to_string()
}

/// Offline source reading a JSON document keyed by `MM.DD`:
///
/// ```json
/// { "10.14": [[{"title": "Rice porridge", "description": "kimchi"},
///              {"title": "Bibimbap", "description": "egg soup"}]] }
/// ```
///
/// The file is re-read on every fetch so edits are picked up by the next
/// scheduled refresh.
#[derive(Clone, Debug)]
pub struct JsonFileSource {
    locator: PathBuf,
}

impl JsonFileSource {
    pub fn new(locator: impl Into<PathBuf>) -> Self {
        Self { locator: locator.into() }
    }
}

impl MenuSource for JsonFileSource {
    async fn fetch(&self, date_key: &str) -> Result<Vec<MenuSection>, SourceError> {
        let raw = tokio::fs::read_to_string(&self.locator)
            .await
            .map_err(|e| SourceError::Unavailable(format!("{}: {e}", self.locator.display())))?;
        let mut document: HashMap<String, Vec<MenuSection>> =
            serde_json::from_str(&raw).map_err(|e| SourceError::Malformed {
                date_key: date_key.to_string(),
                reason: e.to_string(),
            })?;
        let sections = document.remove(date_key).unwrap_or_default();
        debug!(date_key, sections = sections.len(), "read menu sections");
        Ok(sections)
    }
}
