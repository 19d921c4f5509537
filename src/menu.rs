//! Cafeteria menu cache and the service that keeps it fresh.
//!
//! The service fetches a window of days (7 by default) starting today,
//! one request per day. Any failing day throws the whole batch away: the
//! service waits the cooldown and starts again from day zero, so the cache
//! is only ever replaced by a complete batch. Refreshes run once at startup
//! and then on every configured daily hour.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{Local, NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::SourceError;
use crate::redraw::RedrawSignal;
use crate::schedule::{delay_until_next, next_run, DAY};
use crate::source::{date_key, MenuSection, MenuSource};
use crate::store::MenuStore;

pub const MAX_DAYS: usize = 7;

pub const CLOSED_TEXT: &str = "Closed";
pub const LOADING_TEXT: &str = "Loading menu...";
pub const DEFAULT_MESSAGE: &str = "Have a good day.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealEntry {
    pub primary: String,
    pub detail: String,
}

impl MealEntry {
    pub fn new(primary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            detail: detail.into(),
        }
    }

    pub fn closed() -> Self {
        Self::new(CLOSED_TEXT, "")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayMenu {
    pub breakfast: MealEntry,
    pub lunch: MealEntry,
}

impl DayMenu {
    pub fn closed() -> Self {
        Self {
            breakfast: MealEntry::closed(),
            lunch: MealEntry::closed(),
        }
    }

    // First item of a section is breakfast, the second lunch; later sections win.
    pub fn from_sections(sections: &[MenuSection]) -> Self {
        let mut day = Self::closed();
        for section in sections {
            if let Some(item) = section.items.first() {
                day.breakfast = MealEntry::new(format!("Breakfast {}", item.title), item.description.clone());
            }
            if let Some(item) = section.items.get(1) {
                day.lunch = MealEntry::new(format!("Lunch {}", item.title), item.description.clone());
            }
        }
        day
    }
}

pub type MenuDays = heapless::Vec<DayMenu, MAX_DAYS>;

// One complete batch, indexed by days since `fetched_on`
#[derive(Clone, Debug, PartialEq)]
pub struct MenuCache {
    pub fetched_on: NaiveDate,
    pub days: MenuDays,
}

impl MenuCache {
    pub fn new(fetched_on: NaiveDate, days: MenuDays) -> Self {
        Self { fetched_on, days }
    }

    pub fn for_date(&self, date: NaiveDate) -> Option<&DayMenu> {
        let offset = date.signed_duration_since(self.fetched_on).num_days();
        usize::try_from(offset).ok().and_then(|i| self.days.get(i))
    }
}

/// Copy-on-write handle to the current batch. Readers never see a partial
/// batch; writers replace the whole value.
#[derive(Clone, Debug, Default)]
pub struct SharedMenuCache(Arc<ArcSwapOption<MenuCache>>);

impl SharedMenuCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self) -> Option<Arc<MenuCache>> {
        self.0.load_full()
    }

    pub fn replace(&self, cache: MenuCache) {
        self.0.store(Some(Arc::new(cache)));
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FetchPolicy {
    pub days: usize,
    pub cooldown: Duration,
    // None retries forever
    pub max_attempts: Option<NonZeroU32>,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            days: MAX_DAYS,
            cooldown: Duration::from_secs(3600),
            max_attempts: None,
        }
    }
}

pub async fn fetch_day<S: MenuSource>(source: &S, date: NaiveDate) -> Result<DayMenu, SourceError> {
    let key = date_key(date);
    debug!(date_key = %key, "fetching menu");
    let sections = source.fetch(&key).await?;
    Ok(DayMenu::from_sections(&sections))
}

/// Fetch `policy.days` consecutive days starting at `today`.
///
/// Any error restarts the whole batch after the cooldown. With
/// `max_attempts` set, the last error is returned once attempts run out.
pub async fn fetch_all<S: MenuSource>(
    source: &S,
    today: NaiveDate,
    policy: &FetchPolicy,
) -> Result<MenuDays, SourceError> {
    let days = policy.days.clamp(1, MAX_DAYS);
    let mut attempt: u32 = 0;
    'batch: loop {
        attempt += 1;
        let mut batch = MenuDays::new();
        for offset in 0..days {
            let date = today + chrono::Days::new(offset as u64);
            match fetch_day(source, date).await {
                Ok(day) => {
                    if batch.push(day).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    if policy.max_attempts.is_some_and(|max| attempt >= max.get()) {
                        return Err(err);
                    }
                    warn!(
                        %err,
                        date_key = %date_key(date),
                        attempt,
                        cooldown_secs = policy.cooldown.as_secs(),
                        "menu fetch failed, retrying whole batch after cooldown"
                    );
                    tokio::time::sleep(policy.cooldown).await;
                    continue 'batch;
                }
            }
        }
        return Ok(batch);
    }
}

pub type NowFn = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub fn local_now() -> NowFn {
    Arc::new(|| Local::now().naive_local())
}

pub struct MenuService<S> {
    source: S,
    cache: SharedMenuCache,
    store: Option<Mutex<Box<dyn MenuStore>>>,
    policy: FetchPolicy,
    schedule_hours: Vec<u32>,
    redraw: RedrawSignal,
    now: NowFn,
}

impl<S: MenuSource + 'static> MenuService<S> {
    pub fn new(source: S, policy: FetchPolicy, schedule_hours: Vec<u32>, redraw: RedrawSignal, now: NowFn) -> Self {
        let schedule_hours = schedule_hours
            .into_iter()
            .filter(|&hour| {
                let valid = hour < 24;
                if !valid {
                    warn!(hour, "ignoring schedule hour outside 0..24");
                }
                valid
            })
            .collect();
        Self {
            source,
            cache: SharedMenuCache::new(),
            store: None,
            policy,
            schedule_hours,
            redraw,
            now,
        }
    }

    pub fn with_store(mut self, store: Box<dyn MenuStore>) -> Self {
        self.store = Some(Mutex::new(store));
        self
    }

    pub fn cache(&self) -> SharedMenuCache {
        self.cache.clone()
    }

    pub fn schedule_hours(&self) -> &[u32] {
        &self.schedule_hours
    }

    pub fn redraw_signal(&self) -> RedrawSignal {
        self.redraw.clone()
    }

    /// Seed an empty cache from the durable store: the run of consecutive
    /// stored days starting today, if there is one.
    pub fn restore_from_store(&self) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        if self.cache.load().is_some() {
            return false;
        }
        let today = (self.now)().date();
        let rows = match store.lock().load() {
            Ok(rows) => rows,
            Err(err) => {
                error!(%err, "could not read menu store");
                return false;
            }
        };

        let mut days = MenuDays::new();
        let mut date = today;
        while let Some(day) = rows.get(&date) {
            if days.push(day.clone()).is_err() {
                break;
            }
            date = date + chrono::Days::new(1);
        }
        if days.is_empty() {
            return false;
        }
        info!(days = days.len(), "restored menu from store");
        self.cache.replace(MenuCache::new(today, days));
        self.redraw.request();
        true
    }

    /// Run one refresh cycle, retries included. Returns whether the cache
    /// was replaced.
    pub async fn refresh(&self) -> bool {
        let today = (self.now)().date();
        match fetch_all(&self.source, today, &self.policy).await {
            Ok(days) => {
                info!(%today, days = days.len(), "menu refreshed");
                self.persist(today, &days);
                self.cache.replace(MenuCache::new(today, days));
                self.redraw.request();
                true
            }
            Err(err) => {
                error!(%err, "giving up on menu refresh, keeping previous cache");
                false
            }
        }
    }

    fn persist(&self, today: NaiveDate, days: &MenuDays) {
        let Some(store) = &self.store else {
            return;
        };
        let mut store = store.lock();
        for (offset, day) in days.iter().enumerate() {
            let date = today + chrono::Days::new(offset as u64);
            if let Err(err) = store.upsert(date, day) {
                error!(%err, %date, "could not store menu day");
            }
        }
        match store.prune_before(today) {
            Ok(removed) if removed > 0 => debug!(removed, "pruned old menu days"),
            Ok(_) => {}
            Err(err) => error!(%err, "could not prune menu store"),
        }
    }

    /// Spawn the startup refresh and one independent task per schedule hour.
    pub fn start(self: &Arc<Self>, tasks: &mut JoinSet<()>) {
        self.restore_from_store();

        let service = self.clone();
        tasks.spawn(async move {
            service.refresh().await;
        });

        for &hour in &self.schedule_hours {
            let service = self.clone();
            let now = (self.now)();
            let initial = delay_until_next(now, hour);
            debug!(hour, first_run = %next_run(now, hour), "scheduling daily menu fetch");
            tasks.spawn(async move {
                let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + initial, DAY);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    info!(hour, "scheduled menu fetch");
                    service.refresh().await;
                }
            });
        }
    }
}
