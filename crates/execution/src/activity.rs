//! Recent liquidity activity built from contract event logs.

use chrono::{DateTime, TimeZone, Utc};
use easydefi_domain::entities::LiquidityEvent;
use easydefi_domain::enums::{EventFilter, LiquidityEventKind};
use easydefi_domain::token::DEFAULT_DECIMALS;
use easydefi_domain::value_objects::Amount;
use easydefi_protocols::{ChainError, PlatformClient};
use tracing::{debug, warn};

/// Number of events shown when no limit is configured.
pub const DEFAULT_ACTIVITY_LIMIT: usize = 5;

/// One rendered line of the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    /// "Deposit" or "Withdraw".
    pub label: &'static str,
    /// `+` for deposits, `-` for withdrawals.
    pub sign: char,
    pub user: String,
    /// Token A amount with two decimals.
    pub amount_a: String,
    pub amount_b: String,
    /// e.g. "5 minutes ago".
    pub age: String,
    pub tx_hash: String,
}

impl ActivityEntry {
    pub fn from_event(event: &LiquidityEvent, now: DateTime<Utc>) -> Self {
        let sign = match event.kind {
            LiquidityEventKind::Added => '+',
            LiquidityEventKind::Removed => '-',
        };
        Self {
            label: event.kind.label(),
            sign,
            user: event.user.clone(),
            amount_a: Amount::from_token_amount(event.amount_a, DEFAULT_DECIMALS).to_fixed(2),
            amount_b: Amount::from_token_amount(event.amount_b, DEFAULT_DECIMALS).to_fixed(2),
            age: time_ago(event.timestamp, now),
            tx_hash: event.tx_hash.clone(),
        }
    }
}

/// Keeps the events `filter` accepts, newest first, at most `limit` of them.
pub fn select_recent(
    mut events: Vec<LiquidityEvent>,
    filter: EventFilter,
    limit: usize,
) -> Vec<LiquidityEvent> {
    events.retain(|event| filter.accepts(event.kind));
    events.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then(b.block_number.cmp(&a.block_number))
    });
    events.truncate(limit);
    events
}

/// Distance from `timestamp` (unix seconds) to `now`, worded like
/// "about 2 hours ago".
pub fn time_ago(timestamp: u64, now: DateTime<Utc>) -> String {
    let then = i64::try_from(timestamp)
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or(now);
    let seconds = (now - then).num_seconds().max(0);
    let minutes = (seconds + 30) / 60;

    let distance = match minutes {
        0 => "less than a minute".to_string(),
        1 => "1 minute".to_string(),
        2..45 => format!("{minutes} minutes"),
        45..90 => "about 1 hour".to_string(),
        90..1440 => format!("about {} hours", (minutes + 30) / 60),
        1440..2520 => "1 day".to_string(),
        2520..43200 => format!("{} days", (minutes + 720) / 1440),
        43200..86400 => {
            let months = (minutes + 21600) / 43200;
            format!("about {months} month{}", plural(months))
        }
        86400..525600 => format!("{} months", (minutes + 21600) / 43200),
        _ => {
            let years = minutes / 525600;
            format!("about {years} year{}", plural(years))
        }
    };
    format!("{distance} ago")
}

fn plural(count: i64) -> &'static str {
    if count == 1 { "" } else { "s" }
}

/// Activity feed for the pool screen.
pub struct ActivityFeed {
    client: PlatformClient,
    filter: EventFilter,
    limit: usize,
    events: Vec<LiquidityEvent>,
}

impl ActivityFeed {
    #[must_use]
    pub fn new(client: PlatformClient, filter: EventFilter, limit: usize) -> Self {
        Self {
            client,
            filter,
            limit,
            events: Vec::new(),
        }
    }

    pub fn filter(&self) -> EventFilter {
        self.filter
    }

    /// Changes the filter. Call [`ActivityFeed::refresh`] afterwards.
    pub fn set_filter(&mut self, filter: EventFilter) {
        self.filter = filter;
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// Events currently shown, newest first.
    pub fn events(&self) -> &[LiquidityEvent] {
        &self.events
    }

    /// Refetches the logs for every kind the filter shows.
    ///
    /// # Errors
    /// Returns the read error; the previous events stay in place.
    pub async fn refresh(&mut self) -> Result<(), ChainError> {
        let mut fetched = Vec::new();
        for kind in self.filter.kinds() {
            match self.client.liquidity_events(*kind).await {
                Ok(events) => fetched.extend(events),
                Err(err) => {
                    warn!(event = kind.event_name(), error = %err, "Failed to fetch logs");
                    return Err(err);
                }
            }
        }
        self.events = select_recent(fetched, self.filter, self.limit);
        debug!(count = self.events.len(), filter = ?self.filter, "Activity refreshed");
        Ok(())
    }

    /// Renders the events relative to `now`.
    pub fn render(&self, now: DateTime<Utc>) -> Vec<ActivityEntry> {
        self.events
            .iter()
            .map(|event| ActivityEntry::from_event(event, now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easydefi_domain::token::TokenAmount;

    fn event(kind: LiquidityEventKind, timestamp: u64) -> LiquidityEvent {
        LiquidityEvent {
            kind,
            user: "0xuser".to_string(),
            token_a: "0xaly".to_string(),
            token_b: "0xsaly".to_string(),
            amount_a: TokenAmount::from_whole(1, 18),
            amount_b: TokenAmount::from_whole(2, 18),
            timestamp,
            block_number: timestamp,
            tx_hash: format!("0x{timestamp:x}"),
        }
    }

    #[test]
    fn test_select_recent_sorts_filters_and_limits() {
        let events: Vec<_> = (1..=8)
            .map(|t| {
                let kind = if t % 2 == 0 {
                    LiquidityEventKind::Added
                } else {
                    LiquidityEventKind::Removed
                };
                event(kind, t)
            })
            .collect();

        let all = select_recent(events.clone(), EventFilter::All, DEFAULT_ACTIVITY_LIMIT);
        let stamps: Vec<u64> = all.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, [8, 7, 6, 5, 4]);

        let deposits = select_recent(events.clone(), EventFilter::Deposits, 10);
        let stamps: Vec<u64> = deposits.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, [8, 6, 4, 2]);

        let withdrawals = select_recent(events, EventFilter::Withdrawals, 2);
        assert!(withdrawals.iter().all(|e| e.kind == LiquidityEventKind::Removed));
        assert_eq!(withdrawals.len(), 2);
    }

    #[test]
    fn test_time_ago() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        let at = |secs_ago: u64| time_ago(1_700_000_000 - secs_ago, now);
        assert_eq!(at(10), "less than a minute ago");
        assert_eq!(at(60), "1 minute ago");
        assert_eq!(at(5 * 60), "5 minutes ago");
        assert_eq!(at(60 * 60), "about 1 hour ago");
        assert_eq!(at(3 * 3600), "about 3 hours ago");
        assert_eq!(at(86_400), "1 day ago");
        assert_eq!(at(5 * 86_400), "5 days ago");
        assert_eq!(at(40 * 86_400), "about 1 month ago");
        assert_eq!(at(400 * 86_400), "about 1 year ago");
        // Clock skew never yields a future phrase.
        assert_eq!(time_ago(1_700_000_100, now), "less than a minute ago");
    }

    #[test]
    fn test_entry_rendering() {
        let now = Utc.timestamp_opt(1_000, 0).single().unwrap();
        let entry = ActivityEntry::from_event(&event(LiquidityEventKind::Added, 700), now);
        assert_eq!(entry.label, "Deposit");
        assert_eq!(entry.sign, '+');
        assert_eq!(entry.amount_a, "1.00");
        assert_eq!(entry.amount_b, "2.00");
        assert_eq!(entry.age, "5 minutes ago");
    }
}
