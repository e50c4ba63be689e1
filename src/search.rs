//! Blocking YouTube Data API v3 client used by the search step.
//!
//! Three endpoints are involved: `search` to collect video ids (paginated),
//! `videos` for per-video details (batched, 50 ids per call) and `channels`
//! for per-channel details. A failed page or batch is reported and skipped so
//! one bad response never discards everything fetched so far.

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Ids per `videos`/`channels` call, the API maximum.
const BATCH_SIZE: usize = 50;
/// Pause between consecutive API calls.
const CALL_DELAY: Duration = Duration::from_millis(500);
/// Listing descriptions are capped; full text comes from the harvest step.
const DESCRIPTION_LIMIT: usize = 500;

/// Search filters for the id-collection phase.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub query: String,
    pub language: String,
    pub published_after: Option<String>,
    pub published_before: Option<String>,
    pub max_results: usize,
}

/// One `videos.list` row flattened for CSV export.
#[derive(Debug, Clone)]
pub struct VideoListing {
    pub video_id: String,
    pub channel_id: String,
    pub channel_title: String,
    pub title: String,
    pub description: String,
    pub published_at: String,
    pub recording_date: String,
    pub duration: String,
    pub definition: String,
    pub caption: String,
    pub tags: Vec<String>,
    pub default_language: String,
    pub default_audio_language: String,
    pub category_id: String,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub video_url: String,
}

/// One `channels.list` row flattened for CSV export.
#[derive(Debug, Clone)]
pub struct ChannelListing {
    pub channel_id: String,
    pub channel_title: String,
    pub custom_url: String,
    pub description: String,
    pub country: String,
    pub published_at: String,
    pub subscriber_count: i64,
    pub video_count: i64,
    pub view_count: i64,
    pub keywords: String,
    pub channel_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    #[serde(default)]
    snippet: Snippet,
    #[serde(default, rename = "contentDetails")]
    content_details: ContentDetails,
    #[serde(default)]
    statistics: Statistics,
    #[serde(default, rename = "recordingDetails")]
    recording_details: RecordingDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Snippet {
    published_at: String,
    channel_id: String,
    channel_title: String,
    title: String,
    description: String,
    tags: Vec<String>,
    default_language: String,
    default_audio_language: String,
    category_id: String,
    custom_url: String,
    country: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContentDetails {
    duration: String,
    definition: String,
    caption: String,
}

// The API reports counters as decimal strings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Statistics {
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
    subscriber_count: Option<String>,
    video_count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RecordingDetails {
    recording_date: String,
}

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    statistics: Statistics,
    #[serde(default, rename = "brandingSettings")]
    branding_settings: BrandingSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BrandingSettings {
    channel: BrandingChannel,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BrandingChannel {
    keywords: String,
}

pub struct SearchClient {
    agent: ureq::Agent,
    api_key: String,
}

impl SearchClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(30))
                .build(),
            api_key: api_key.into(),
        }
    }

    /// Collects up to `max_results` video ids matching the query. A failing
    /// page ends the pagination but keeps the ids gathered so far.
    pub fn search_video_ids(&self, params: &SearchParams) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        while ids.len() < params.max_results {
            let page_size = (params.max_results - ids.len()).min(BATCH_SIZE);
            let mut request = self
                .agent
                .get(&format!("{API_BASE}/search"))
                .query("key", &self.api_key)
                .query("q", &params.query)
                .query("part", "id")
                .query("type", "video")
                .query("maxResults", &page_size.to_string())
                .query("relevanceLanguage", &params.language)
                .query("videoCaption", "any");
            if let Some(after) = &params.published_after {
                request = request.query("publishedAfter", after);
            }
            if let Some(before) = &params.published_before {
                request = request.query("publishedBefore", before);
            }
            if let Some(token) = &page_token {
                request = request.query("pageToken", token);
            }

            let response: SearchResponse = match fetch_json(request, "search") {
                Ok(response) => response,
                Err(err) => {
                    eprintln!("  Warning: search page failed: {err:#}");
                    break;
                }
            };

            for item in response.items {
                if let Some(id) = item.id.video_id {
                    ids.push(id);
                }
            }

            match response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
            thread::sleep(CALL_DELAY);
        }

        Ok(ids)
    }

    /// Fetches listing details for the given video ids, 50 per call. A failed
    /// batch is skipped; the others still contribute.
    pub fn video_details(&self, ids: &[String]) -> Result<Vec<VideoListing>> {
        let mut listings = Vec::new();
        for batch in ids.chunks(BATCH_SIZE) {
            let request = self
                .agent
                .get(&format!("{API_BASE}/videos"))
                .query("key", &self.api_key)
                .query("part", "id,snippet,contentDetails,statistics,recordingDetails")
                .query("id", &batch.join(","));

            match fetch_json::<VideoListResponse>(request, "videos") {
                Ok(response) => {
                    listings.extend(response.items.into_iter().map(video_listing));
                }
                Err(err) => {
                    eprintln!("  Warning: video detail batch failed: {err:#}");
                }
            }
            thread::sleep(CALL_DELAY);
        }
        Ok(listings)
    }

    /// Fetches listing details for the given channel ids, deduplicated
    /// first-seen-wins before batching.
    pub fn channel_details(&self, ids: &[String]) -> Result<Vec<ChannelListing>> {
        let unique = dedupe_preserving_order(ids);
        let mut listings = Vec::new();
        for batch in unique.chunks(BATCH_SIZE) {
            let request = self
                .agent
                .get(&format!("{API_BASE}/channels"))
                .query("key", &self.api_key)
                .query(
                    "part",
                    "id,snippet,contentDetails,statistics,brandingSettings",
                )
                .query("id", &batch.join(","));

            match fetch_json::<ChannelListResponse>(request, "channels") {
                Ok(response) => {
                    listings.extend(response.items.into_iter().map(channel_listing));
                }
                Err(err) => {
                    eprintln!("  Warning: channel detail batch failed: {err:#}");
                }
            }
            thread::sleep(CALL_DELAY);
        }
        Ok(listings)
    }
}

fn fetch_json<T: serde::de::DeserializeOwned>(request: ureq::Request, label: &str) -> Result<T> {
    request
        .call()
        .with_context(|| format!("querying {label} endpoint"))?
        .into_json()
        .with_context(|| format!("decoding {label} response"))
}

fn video_listing(item: VideoItem) -> VideoListing {
    let video_url = format!("https://www.youtube.com/watch?v={}", item.id);
    VideoListing {
        video_id: item.id,
        channel_id: item.snippet.channel_id,
        channel_title: item.snippet.channel_title,
        title: item.snippet.title,
        description: truncate_chars(&item.snippet.description, DESCRIPTION_LIMIT),
        published_at: item.snippet.published_at,
        recording_date: item.recording_details.recording_date,
        duration: item.content_details.duration,
        definition: item.content_details.definition,
        caption: item.content_details.caption,
        tags: item.snippet.tags,
        default_language: item.snippet.default_language,
        default_audio_language: item.snippet.default_audio_language,
        category_id: item.snippet.category_id,
        view_count: parse_stat(&item.statistics.view_count),
        like_count: parse_stat(&item.statistics.like_count),
        comment_count: parse_stat(&item.statistics.comment_count),
        video_url,
    }
}

fn channel_listing(item: ChannelItem) -> ChannelListing {
    let channel_url = format!("https://www.youtube.com/channel/{}", item.id);
    ChannelListing {
        channel_id: item.id,
        channel_title: item.snippet.title,
        custom_url: item.snippet.custom_url,
        description: truncate_chars(&item.snippet.description, DESCRIPTION_LIMIT),
        country: item.snippet.country,
        published_at: item.snippet.published_at,
        subscriber_count: parse_stat(&item.statistics.subscriber_count),
        video_count: parse_stat(&item.statistics.video_count),
        view_count: parse_stat(&item.statistics.view_count),
        keywords: item.branding_settings.channel.keywords,
        channel_url,
    }
}

/// Missing or malformed counters count as zero in listings.
fn parse_stat(value: &Option<String>) -> i64 {
    value
        .as_deref()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(0)
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

fn dedupe_preserving_order(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| !id.is_empty() && seen.insert(id.as_str()))
        .cloned()
        .collect()
}
