//! Tabular and JSON exports for harvested records.
//!
//! CSV columns are fixed per file so re-runs always produce the same header,
//! whatever the upstream payloads contained. List-valued cells are
//! pipe-joined; null cells are empty, which keeps "not reported" distinct
//! from zero once the files land in a spreadsheet.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use walkdir::WalkDir;

use crate::records::{ChannelRecord, VideoRecord};
use crate::sanitize::RawValue;
use crate::search::{ChannelListing, VideoListing};
use crate::transcripts::TranscriptSet;

const VIDEO_COLUMNS: &[&str] = &[
    "video_id",
    "channel_id",
    "published_at",
    "timestamp",
    "release_timestamp",
    "title",
    "description",
    "tags",
    "categories",
    "default_language",
    "duration",
    "duration_string",
    "definition",
    "resolution",
    "width",
    "height",
    "fps",
    "vcodec",
    "acodec",
    "filesize",
    "filesize_approx",
    "has_subtitles",
    "has_automatic_captions",
    "available_subtitles",
    "available_auto_captions",
    "age_limit",
    "is_live",
    "was_live",
    "view_count",
    "like_count",
    "comment_count",
    "thumbnail",
    "webpage_url",
    "channel_url",
];

const CHANNEL_COLUMNS: &[&str] = &[
    "channel_id",
    "custom_url",
    "channel_handle",
    "title",
    "uploader",
    "description",
    "country",
    "channel_follower_count",
    "external_links",
    "business_email",
];

const VIDEO_LISTING_COLUMNS: &[&str] = &[
    "video_id",
    "channel_id",
    "channel_title",
    "title",
    "description",
    "published_at",
    "recording_date",
    "duration",
    "definition",
    "caption",
    "tags",
    "default_language",
    "default_audio_language",
    "category_id",
    "view_count",
    "like_count",
    "comment_count",
    "video_url",
];

const CHANNEL_LISTING_COLUMNS: &[&str] = &[
    "channel_id",
    "channel_title",
    "custom_url",
    "description",
    "country",
    "published_at",
    "subscriber_count",
    "video_count",
    "view_count",
    "keywords",
    "channel_url",
];

/// Run report written next to the exports.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub timestamp: String,
    pub total_videos: usize,
    pub total_channels: usize,
    pub videos_with_transcripts: usize,
    pub downloaded_videos: bool,
    pub video_quality: String,
    pub total_video_size_mb: f64,
    pub statistics: SummaryStatistics,
}

#[derive(Debug, Serialize)]
pub struct SummaryStatistics {
    pub videos_with_subtitles: usize,
    pub videos_with_auto_captions: usize,
    pub total_views: i64,
    pub total_likes: i64,
    pub total_duration_seconds: i64,
}

pub fn write_videos_csv(path: &Path, records: &[VideoRecord]) -> Result<()> {
    let rows = records.iter().map(|record| {
        csv_line(&[
            opt_text(&record.video_id),
            opt_text(&record.channel_id),
            opt_text(&record.published_at),
            opt_int(record.timestamp),
            opt_int(record.release_timestamp),
            record.title.clone(),
            record.description.clone(),
            join_list(&record.tags),
            join_list(&record.categories),
            opt_text(&record.default_language),
            opt_int(record.duration),
            opt_text(&record.duration_string),
            record.definition.clone(),
            opt_text(&record.resolution),
            opt_int(record.width),
            opt_int(record.height),
            opt_float(record.fps),
            opt_text(&record.vcodec),
            opt_text(&record.acodec),
            opt_int(record.filesize),
            opt_int(record.filesize_approx),
            record.has_subtitles.to_string(),
            record.has_automatic_captions.to_string(),
            join_list(&record.available_subtitles),
            join_list(&record.available_auto_captions),
            opt_int(record.age_limit),
            opt_bool(record.is_live),
            opt_bool(record.was_live),
            opt_int(record.view_count),
            opt_int(record.like_count),
            opt_int(record.comment_count),
            opt_text(&record.thumbnail),
            opt_text(&record.webpage_url),
            opt_text(&record.channel_url),
        ])
    });
    write_csv(path, VIDEO_COLUMNS, rows)
}

pub fn write_channels_csv(path: &Path, records: &[ChannelRecord]) -> Result<()> {
    let rows = records.iter().map(|record| {
        csv_line(&[
            opt_text(&record.channel_id),
            record.custom_url.clone(),
            opt_text(&record.channel_handle),
            opt_text(&record.title),
            opt_text(&record.uploader),
            record.description.clone(),
            record.country.clone(),
            opt_int(record.channel_follower_count),
            join_list(&record.external_links),
            record.business_email.clone(),
        ])
    });
    write_csv(path, CHANNEL_COLUMNS, rows)
}

pub fn write_video_listings_csv(path: &Path, listings: &[VideoListing]) -> Result<()> {
    let rows = listings.iter().map(|listing| {
        csv_line(&[
            listing.video_id.clone(),
            listing.channel_id.clone(),
            listing.channel_title.clone(),
            listing.title.clone(),
            listing.description.clone(),
            listing.published_at.clone(),
            listing.recording_date.clone(),
            listing.duration.clone(),
            listing.definition.clone(),
            listing.caption.clone(),
            join_list(&listing.tags),
            listing.default_language.clone(),
            listing.default_audio_language.clone(),
            listing.category_id.clone(),
            listing.view_count.to_string(),
            listing.like_count.to_string(),
            listing.comment_count.to_string(),
            listing.video_url.clone(),
        ])
    });
    write_csv(path, VIDEO_LISTING_COLUMNS, rows)
}

pub fn write_channel_listings_csv(path: &Path, listings: &[ChannelListing]) -> Result<()> {
    let rows = listings.iter().map(|listing| {
        csv_line(&[
            listing.channel_id.clone(),
            listing.channel_title.clone(),
            listing.custom_url.clone(),
            listing.description.clone(),
            listing.country.clone(),
            listing.published_at.clone(),
            listing.subscriber_count.to_string(),
            listing.video_count.to_string(),
            listing.view_count.to_string(),
            listing.keywords.clone(),
            listing.channel_url.clone(),
        ])
    });
    write_csv(path, CHANNEL_LISTING_COLUMNS, rows)
}

pub fn write_transcripts_json(path: &Path, sets: &[TranscriptSet]) -> Result<()> {
    let payload = serde_json::to_vec_pretty(sets).context("serializing transcripts")?;
    fs::write(path, payload).with_context(|| format!("writing {}", path.display()))
}

/// Archives the sanitized metadata payload as `<video_id>_full.json`.
pub fn write_video_archive(
    metadata_dir: &Path,
    video_id: &str,
    payload: &Option<RawValue>,
) -> Result<()> {
    let path = metadata_dir.join(format!("{video_id}_full.json"));
    let payload = serde_json::to_vec_pretty(payload).context("serializing archived metadata")?;
    fs::write(&path, payload).with_context(|| format!("writing {}", path.display()))
}

pub fn write_summary(path: &Path, summary: &Summary) -> Result<()> {
    let payload = serde_json::to_vec_pretty(summary).context("serializing summary")?;
    fs::write(path, payload).with_context(|| format!("writing {}", path.display()))
}

/// Builds the run report. `media_dir` is the tree holding downloaded media,
/// or `None` when this run was metadata-only.
pub fn build_summary(
    videos: &[VideoRecord],
    total_channels: usize,
    transcript_sets: &[TranscriptSet],
    media_dir: Option<&Path>,
    video_quality: Option<&str>,
) -> Summary {
    let total_video_size_mb = media_dir.map(downloaded_media_mb).unwrap_or(0.0);

    Summary {
        timestamp: Utc::now().to_rfc3339(),
        total_videos: videos.len(),
        total_channels,
        videos_with_transcripts: transcript_sets.len(),
        downloaded_videos: media_dir.is_some(),
        video_quality: video_quality.unwrap_or("N/A").to_owned(),
        total_video_size_mb,
        statistics: SummaryStatistics {
            videos_with_subtitles: videos.iter().filter(|v| v.has_subtitles).count(),
            videos_with_auto_captions: videos.iter().filter(|v| v.has_automatic_captions).count(),
            total_views: videos.iter().filter_map(|v| v.view_count).sum(),
            total_likes: videos.iter().filter_map(|v| v.like_count).sum(),
            total_duration_seconds: videos.iter().filter_map(|v| v.duration).sum(),
        },
    }
}

/// Sums the size of merged media files under `dir`, in megabytes rounded to
/// two decimals.
fn downloaded_media_mb(dir: &Path) -> f64 {
    let mut bytes = 0u64;
    for entry in WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
    {
        if entry.path().extension().and_then(|ext| ext.to_str()) != Some("mp4") {
            continue;
        }
        if let Ok(meta) = entry.metadata() {
            bytes += meta.len();
        }
    }
    let mb = bytes as f64 / (1024.0 * 1024.0);
    (mb * 100.0).round() / 100.0
}

fn write_csv<I>(path: &Path, columns: &[&str], rows: I) -> Result<()>
where
    I: Iterator<Item = String>,
{
    let mut out = String::new();
    out.push_str(&csv_line(
        &columns.iter().map(|c| (*c).to_owned()).collect::<Vec<_>>(),
    ));
    for row in rows {
        out.push_str(&row);
    }
    fs::write(path, out).with_context(|| format!("writing {}", path.display()))
}

fn csv_line(fields: &[String]) -> String {
    let mut line = fields
        .iter()
        .map(|field| csv_field(field))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

/// Quotes a field when it contains a delimiter, quote, or line break.
fn csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

fn join_list(items: &[String]) -> String {
    items.join("|")
}

fn opt_text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn opt_int(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn opt_float(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn opt_bool(value: Option<bool>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::extract_video;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn csv_field_quotes_only_when_needed() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn videos_csv_has_header_and_stable_width() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("videos_detailed.csv");
        let record = extract_video(&json!({
            "id": "vid",
            "title": "Title, with comma",
            "tags": ["a", "b"],
        }))
        .unwrap();
        write_videos_csv(&path, &[record]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("video_id,channel_id,"));
        assert_eq!(header.split(',').count(), VIDEO_COLUMNS.len());
        let row = lines.next().unwrap();
        assert!(row.starts_with("vid,"));
        assert!(row.contains("\"Title, with comma\""));
        assert!(row.contains("a|b"));
    }

    #[test]
    fn channels_csv_renders_placeholders_as_empty_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("channels_detailed.csv");
        let record = crate::records::extract_channel(&json!({
            "channel_id": "UCx",
            "channel_url": "https://www.youtube.com/channel/UCx",
        }))
        .unwrap();
        write_channels_csv(&path, &[record]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let row = content.lines().nth(1).unwrap();
        assert_eq!(row, "UCx,UCx,,,,,,,,");
    }

    #[test]
    fn summary_counts_are_computed_from_records() {
        let with_subs = extract_video(&json!({
            "view_count": 10,
            "like_count": 2,
            "duration": 60,
            "subtitles": {"en": []},
        }))
        .unwrap();
        let bare = extract_video(&json!({"view_count": 5})).unwrap();

        let sets = vec![TranscriptSet { video_id: "a".into(), transcripts: Vec::new() }];
        let summary = build_summary(&[with_subs, bare], 3, &sets, None, None);

        assert_eq!(summary.total_videos, 2);
        assert_eq!(summary.total_channels, 3);
        assert_eq!(summary.videos_with_transcripts, 1);
        assert!(!summary.downloaded_videos);
        assert_eq!(summary.video_quality, "N/A");
        assert_eq!(summary.total_video_size_mb, 0.0);
        assert_eq!(summary.statistics.videos_with_subtitles, 1);
        assert_eq!(summary.statistics.videos_with_auto_captions, 0);
        assert_eq!(summary.statistics.total_views, 15);
        assert_eq!(summary.statistics.total_likes, 2);
        assert_eq!(summary.statistics.total_duration_seconds, 60);
    }

    #[test]
    fn media_size_only_counts_merged_files() {
        let dir = tempdir().unwrap();
        let video_dir = dir.path().join("vid");
        fs::create_dir_all(&video_dir).unwrap();
        fs::write(video_dir.join("vid.mp4"), vec![0u8; 2048]).unwrap();
        fs::write(video_dir.join("vid.info.json"), b"{}").unwrap();

        let summary = build_summary(&[], 0, &[], Some(dir.path()), Some("best"));
        assert!(summary.downloaded_videos);
        assert_eq!(summary.video_quality, "best");
        assert!(summary.total_video_size_mb > 0.0);
    }

    #[test]
    fn archive_serializes_sanitized_payload() {
        let dir = tempdir().unwrap();
        let raw = RawValue::from_json(json!({"id": "vid", "views": 1}));
        let clean = crate::sanitize::sanitize(&raw);
        write_video_archive(dir.path(), "vid", &clean).unwrap();

        let content = fs::read_to_string(dir.path().join("vid_full.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, json!({"id": "vid", "views": 1}));
    }
}
