use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the auth provider's OAuth access-token list.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthAccessToken {
    pub token: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: Option<DateTime<Utc>>,
    pub date: Option<NaiveDate>,
}

impl EventTime {
    fn resolve(&self) -> Option<(DateTime<Utc>, bool)> {
        if let Some(dt) = self.date_time {
            return Some((dt, false));
        }
        self.date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| (naive.and_utc(), true))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEvent {
    pub id: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    pub html_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleEventList {
    #[serde(default)]
    pub items: Vec<GoogleEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub html_link: Option<String>,
}

impl CalendarEvent {
    /// `None` when the event carries no usable start or end.
    pub fn from_google(event: GoogleEvent) -> Option<Self> {
        let (start, all_day) = event.start.resolve()?;
        let (end, _) = event.end.resolve()?;

        Some(Self {
            id: event.id,
            title: event.summary.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| "(No title)".to_string()),
            description: event.description,
            location: event.location,
            start,
            end,
            all_day,
            html_link: event.html_link,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarQuery {
    pub time_min: Option<DateTime<Utc>>,
    pub time_max: Option<DateTime<Utc>>,
    pub max_results: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("Calendar integration is not configured")]
    NotConfigured,

    #[error("No calendar account connected")]
    NotConnected,

    #[error("Invalid time range: time_min must be before time_max")]
    InvalidRange,

    #[error("Calendar provider error: {0}")]
    Upstream(String),
}
