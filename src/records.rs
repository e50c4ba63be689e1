//! Normalization of raw extractor metadata into stable record schemas.
//!
//! The payloads these functions consume come straight from an external
//! extractor and may be missing any field, or carry it with an unexpected
//! type. Every lookup therefore has an explicit default; only a payload that
//! is not an object at all is rejected. Records serialize every field, nulls
//! included, so the schema seen by downstream consumers never varies with
//! upstream completeness.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Channel-path prefix tried first when deriving `custom_url`.
const CHANNEL_URL_PREFIX: &str = "https://www.youtube.com/channel/";
/// Bare site prefix tried second; anything else passes through unchanged.
const SITE_URL_PREFIX: &str = "https://www.youtube.com/";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("metadata payload is not an object")]
    NotAnObject,
}

/// Per-video snapshot of everything the extractor reports about one upload.
///
/// The three time fields are preserved verbatim even when they disagree;
/// upstream sources differ on which of them is populated and reconciling
/// them here would lose information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: Option<String>,
    pub channel_id: Option<String>,
    pub published_at: Option<String>,
    pub timestamp: Option<i64>,
    pub release_timestamp: Option<i64>,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub default_language: Option<String>,
    pub duration: Option<i64>,
    pub duration_string: Option<String>,
    pub definition: String,
    pub resolution: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub fps: Option<f64>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub filesize: Option<i64>,
    pub filesize_approx: Option<i64>,
    pub has_subtitles: bool,
    pub has_automatic_captions: bool,
    pub available_subtitles: Vec<String>,
    pub available_auto_captions: Vec<String>,
    pub age_limit: Option<i64>,
    pub is_live: Option<bool>,
    pub was_live: Option<bool>,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub thumbnail: Option<String>,
    pub webpage_url: Option<String>,
    pub channel_url: Option<String>,
}

/// Per-channel snapshot derived from a video payload.
///
/// `description`, `country`, `external_links` and `business_email` need a
/// dedicated channel-page lookup this extractor does not perform; they are
/// kept in the schema as empty placeholders so richer extractors can fill
/// them without downstream changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub channel_id: Option<String>,
    pub custom_url: String,
    pub channel_handle: Option<String>,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub description: String,
    pub country: String,
    pub channel_follower_count: Option<i64>,
    pub external_links: Vec<String>,
    pub business_email: String,
}

/// Maps a raw extractor payload onto [`VideoRecord`].
///
/// Field-level problems degrade to the field's default; only a payload that
/// is not an object fails.
pub fn extract_video(raw: &Value) -> Result<VideoRecord, ExtractError> {
    let map = raw.as_object().ok_or(ExtractError::NotAnObject)?;

    let height = integer(map, "height");
    let definition = if height.unwrap_or(0) >= 720 { "hd" } else { "sd" };

    Ok(VideoRecord {
        video_id: text(map, "id"),
        channel_id: text(map, "channel_id"),
        published_at: text(map, "upload_date"),
        timestamp: integer(map, "timestamp"),
        release_timestamp: integer(map, "release_timestamp"),
        title: text(map, "title").unwrap_or_default(),
        description: text(map, "description").unwrap_or_default(),
        tags: text_list(map, "tags"),
        categories: text_list(map, "categories"),
        default_language: text(map, "language"),
        duration: integer(map, "duration"),
        duration_string: text(map, "duration_string"),
        definition: definition.to_owned(),
        resolution: text(map, "resolution"),
        width: integer(map, "width"),
        height,
        fps: float(map, "fps"),
        vcodec: text(map, "vcodec"),
        acodec: text(map, "acodec"),
        filesize: integer(map, "filesize"),
        filesize_approx: integer(map, "filesize_approx"),
        has_subtitles: has_entries(map, "subtitles"),
        has_automatic_captions: has_entries(map, "automatic_captions"),
        available_subtitles: language_codes(map, "subtitles"),
        available_auto_captions: language_codes(map, "automatic_captions"),
        age_limit: integer(map, "age_limit"),
        is_live: boolean(map, "is_live"),
        was_live: boolean(map, "was_live"),
        view_count: integer(map, "view_count"),
        like_count: integer(map, "like_count"),
        comment_count: integer(map, "comment_count"),
        thumbnail: text(map, "thumbnail"),
        webpage_url: text(map, "webpage_url"),
        channel_url: text(map, "channel_url"),
    })
}

/// Maps a raw extractor payload onto [`ChannelRecord`].
pub fn extract_channel(raw: &Value) -> Result<ChannelRecord, ExtractError> {
    let map = raw.as_object().ok_or(ExtractError::NotAnObject)?;

    let channel_url = text(map, "channel_url").unwrap_or_default();

    Ok(ChannelRecord {
        channel_id: text(map, "channel_id"),
        custom_url: strip_channel_prefix(&channel_url).to_owned(),
        channel_handle: text(map, "uploader_id"),
        title: text(map, "channel"),
        uploader: text(map, "uploader"),
        description: String::new(),
        country: String::new(),
        channel_follower_count: integer(map, "channel_follower_count"),
        external_links: Vec::new(),
        business_email: String::new(),
    })
}

/// Strips the first matching known prefix; unknown shapes pass through.
fn strip_channel_prefix(url: &str) -> &str {
    url.strip_prefix(CHANNEL_URL_PREFIX)
        .or_else(|| url.strip_prefix(SITE_URL_PREFIX))
        .unwrap_or(url)
}

fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn integer(map: &Map<String, Value>, key: &str) -> Option<i64> {
    let value = map.get(key)?;
    // Some extractors report integral quantities as floats.
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

fn float(map: &Map<String, Value>, key: &str) -> Option<f64> {
    map.get(key).and_then(Value::as_f64)
}

fn boolean(map: &Map<String, Value>, key: &str) -> Option<bool> {
    map.get(key).and_then(Value::as_bool)
}

/// String entries of an array field; non-string entries are ignored.
fn text_list(map: &Map<String, Value>, key: &str) -> Vec<String> {
    map.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// True only for a present, non-empty object; an explicitly empty caption
/// map still means "no captions".
fn has_entries(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key)
        .and_then(Value::as_object)
        .is_some_and(|entries| !entries.is_empty())
}

/// Keys of an object field, sorted so the rendered list is deterministic.
fn language_codes(map: &Map<String, Value>, key: &str) -> Vec<String> {
    let mut codes: Vec<String> = map
        .get(key)
        .and_then(Value::as_object)
        .map(|entries| entries.keys().cloned().collect())
        .unwrap_or_default();
    codes.sort();
    codes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_video_rejects_non_objects() {
        assert!(extract_video(&json!([1, 2])).is_err());
        assert!(extract_video(&json!("nope")).is_err());
        assert!(extract_channel(&json!(null)).is_err());
    }

    #[test]
    fn empty_payload_yields_complete_defaults() {
        let record = extract_video(&json!({})).unwrap();
        assert!(record.video_id.is_none());
        assert!(record.channel_id.is_none());
        assert_eq!(record.title, "");
        assert_eq!(record.description, "");
        assert!(record.tags.is_empty());
        assert!(record.duration.is_none());
        assert_eq!(record.definition, "sd");
        assert!(!record.has_subtitles);
        assert!(!record.has_automatic_captions);
        assert!(record.available_subtitles.is_empty());
        assert!(record.view_count.is_none());

        // Nulls stay in the serialized form; the schema never shrinks.
        let rendered = serde_json::to_value(&record).unwrap();
        let fields = rendered.as_object().unwrap();
        assert_eq!(fields.len(), 34);
        assert!(fields.get("view_count").unwrap().is_null());
    }

    #[test]
    fn definition_threshold_is_720() {
        let hd = extract_video(&json!({"height": 720})).unwrap();
        assert_eq!(hd.definition, "hd");
        let sd = extract_video(&json!({"height": 719})).unwrap();
        assert_eq!(sd.definition, "sd");
        let unknown = extract_video(&json!({})).unwrap();
        assert_eq!(unknown.definition, "sd");
    }

    #[test]
    fn caption_flags_require_non_empty_maps() {
        let record = extract_video(&json!({
            "subtitles": {},
            "automatic_captions": {"en": [], "de": []},
        }))
        .unwrap();
        assert!(!record.has_subtitles);
        assert!(record.has_automatic_captions);
        assert!(record.available_subtitles.is_empty());
        assert_eq!(record.available_auto_captions, vec!["de", "en"]);
    }

    #[test]
    fn video_fields_map_through() {
        let record = extract_video(&json!({
            "id": "vid1",
            "channel_id": "UCx",
            "upload_date": "20240102",
            "timestamp": 1704153600,
            "release_timestamp": 1704153601,
            "title": "Title",
            "description": "Body",
            "tags": ["a", 7, "b"],
            "categories": ["News"],
            "duration": 93.4,
            "height": 1080,
            "width": 1920,
            "fps": 29.97,
            "view_count": 0,
        }))
        .unwrap();
        assert_eq!(record.video_id.as_deref(), Some("vid1"));
        assert_eq!(record.published_at.as_deref(), Some("20240102"));
        assert_eq!(record.timestamp, Some(1704153600));
        assert_eq!(record.release_timestamp, Some(1704153601));
        assert_eq!(record.tags, vec!["a", "b"]);
        assert_eq!(record.duration, Some(93));
        assert_eq!(record.definition, "hd");
        assert_eq!(record.fps, Some(29.97));
        // Zero is a report, not an absence.
        assert_eq!(record.view_count, Some(0));
    }

    #[test]
    fn custom_url_strips_channel_prefix_first() {
        let record = extract_channel(&json!({
            "channel_url": "https://www.youtube.com/channel/UCabc",
        }))
        .unwrap();
        assert_eq!(record.custom_url, "UCabc");
    }

    #[test]
    fn custom_url_falls_back_to_site_prefix() {
        let record = extract_channel(&json!({
            "channel_url": "https://www.youtube.com/@handle",
        }))
        .unwrap();
        assert_eq!(record.custom_url, "@handle");
    }

    #[test]
    fn custom_url_passes_unknown_urls_through() {
        let record = extract_channel(&json!({
            "channel_url": "https://example.com/somewhere",
        }))
        .unwrap();
        assert_eq!(record.custom_url, "https://example.com/somewhere");
    }

    #[test]
    fn channel_placeholders_are_always_present() {
        let record = extract_channel(&json!({})).unwrap();
        assert!(record.channel_id.is_none());
        assert_eq!(record.custom_url, "");
        assert_eq!(record.description, "");
        assert_eq!(record.country, "");
        assert!(record.external_links.is_empty());
        assert_eq!(record.business_email, "");

        let rendered = serde_json::to_value(&record).unwrap();
        let fields = rendered.as_object().unwrap();
        assert_eq!(fields.len(), 10);
        assert_eq!(fields.get("business_email").unwrap(), "");
    }

    #[test]
    fn channel_fields_map_through() {
        let record = extract_channel(&json!({
            "channel_id": "UCx",
            "channel_url": "https://www.youtube.com/channel/UCx",
            "uploader_id": "@handle",
            "channel": "Channel Name",
            "uploader": "Uploader Name",
            "channel_follower_count": 1234,
        }))
        .unwrap();
        assert_eq!(record.channel_id.as_deref(), Some("UCx"));
        assert_eq!(record.custom_url, "UCx");
        assert_eq!(record.channel_handle.as_deref(), Some("@handle"));
        assert_eq!(record.title.as_deref(), Some("Channel Name"));
        assert_eq!(record.uploader.as_deref(), Some("Uploader Name"));
        assert_eq!(record.channel_follower_count, Some(1234));
    }
}
