use chrono::{Duration, SecondsFormat, Utc};
use reqwest::Client;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{CalendarError, CalendarEvent, CalendarQuery, GoogleEventList, OAuthAccessToken};

const OAUTH_PROVIDER: &str = "oauth_google";
const DEFAULT_WINDOW_DAYS: i64 = 30;
const DEFAULT_MAX_RESULTS: u32 = 50;
const MAX_RESULTS_CAP: u32 = 250;

/// Reads a user's primary calendar with the OAuth token the auth provider
/// holds for them.
pub struct CalendarService {
    client: Client,
    auth_api_url: String,
    auth_secret_key: String,
    calendar_api_url: String,
}

impl CalendarService {
    pub fn new(config: &AppConfig) -> Result<Self, CalendarError> {
        if !config.is_calendar_configured() {
            return Err(CalendarError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            auth_api_url: config.auth_api_url.trim_end_matches('/').to_string(),
            auth_secret_key: config.auth_secret_key.clone(),
            calendar_api_url: config.calendar_api_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn get_oauth_token(&self, user_id: &str) -> Result<String, CalendarError> {
        let url = format!(
            "{}/v1/users/{}/oauth_access_tokens/{}",
            self.auth_api_url, user_id, OAUTH_PROVIDER
        );
        debug!("Fetching calendar token for user {}", user_id);

        let response = self.client
            .get(&url)
            .bearer_auth(&self.auth_secret_key)
            .send()
            .await
            .map_err(|e| CalendarError::Upstream(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(CalendarError::NotConnected);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Auth provider token error ({}): {}", status, text);
            return Err(CalendarError::Upstream(format!("token lookup failed with {}", status)));
        }

        let tokens: Vec<OAuthAccessToken> = response
            .json()
            .await
            .map_err(|e| CalendarError::Upstream(e.to_string()))?;

        tokens
            .into_iter()
            .map(|t| t.token)
            .find(|t| !t.is_empty())
            .ok_or(CalendarError::NotConnected)
    }

    pub async fn list_events(&self, user_id: &str, query: &CalendarQuery) -> Result<Vec<CalendarEvent>, CalendarError> {
        let time_min = query.time_min.unwrap_or_else(Utc::now);
        let time_max = query.time_max.unwrap_or_else(|| time_min + Duration::days(DEFAULT_WINDOW_DAYS));
        if time_min >= time_max {
            return Err(CalendarError::InvalidRange);
        }
        let max_results = query.max_results.unwrap_or(DEFAULT_MAX_RESULTS).clamp(1, MAX_RESULTS_CAP);

        let token = self.get_oauth_token(user_id).await?;

        let url = format!("{}/calendar/v3/calendars/primary/events", self.calendar_api_url);
        let response = self.client
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("timeMin", time_min.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("timeMax", time_max.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("maxResults", max_results.to_string()),
            ])
            .send()
            .await
            .map_err(|e| CalendarError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Calendar API error ({}): {}", status, text);
            return Err(CalendarError::Upstream(format!("calendar request failed with {}", status)));
        }

        let list: GoogleEventList = response
            .json()
            .await
            .map_err(|e| CalendarError::Upstream(e.to_string()))?;

        let events: Vec<CalendarEvent> = list.items
            .into_iter()
            .filter_map(CalendarEvent::from_google)
            .collect();

        info!("Loaded {} calendar events for user {}", events.len(), user_id);
        Ok(events)
    }
}
