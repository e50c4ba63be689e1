//! Reconstruction of per-language transcripts from downloaded caption tracks.
//!
//! Caption files end up in different places depending on whether the media
//! itself was downloaded, so callers pass the candidate roots in priority
//! order. The first root that owns a `<video_id>` directory is used
//! exclusively; tracks are never merged across roots.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// File extension of segment-based caption tracks written by the extractor.
pub const CAPTION_EXT: &str = "json3";

/// One timed caption line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
}

/// Ordered caption lines for a single language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub language: String,
    pub segments: Vec<Segment>,
}

/// Every reconstructed transcript that belongs to one video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSet {
    pub video_id: String,
    pub transcripts: Vec<Transcript>,
}

/// Rebuilds transcripts for `video_id` from caption files on disk.
///
/// Returns one entry per successfully parsed caption file, in sorted filename
/// order. Segments keep the order they have in the source track; out-of-order
/// tracks stay out of order. An unreadable or malformed file is logged and
/// skipped without affecting its siblings. When the metadata reports no
/// caption tracks at all the filesystem is not touched.
pub fn reconstruct_transcripts(
    video_id: &str,
    caption_tracks: Option<&Map<String, Value>>,
    search_roots: &[PathBuf],
) -> Vec<Transcript> {
    if caption_tracks.is_none_or(Map::is_empty) {
        return Vec::new();
    }

    let Some(video_dir) = search_roots
        .iter()
        .map(|root| root.join(video_id))
        .find(|dir| dir.is_dir())
    else {
        return Vec::new();
    };

    let mut transcripts = Vec::new();
    for file_name in caption_file_names(&video_dir, video_id) {
        let Some(language) = language_code(&file_name) else {
            continue;
        };
        let path = video_dir.join(&file_name);
        match parse_caption_file(&path) {
            Ok(Some(segments)) => transcripts.push(Transcript { language, segments }),
            // Valid JSON without an event list is not a caption track.
            Ok(None) => {}
            Err(err) => {
                log::warn!("skipping caption file {}: {err:#}", path.display());
            }
        }
    }

    transcripts
}

/// Candidate file names under `dir`, sorted for deterministic output.
fn caption_file_names(dir: &Path, video_id: &str) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("cannot list caption directory {}: {err}", dir.display());
            return Vec::new();
        }
    };

    let suffix = format!(".{CAPTION_EXT}");
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(video_id) && name.ends_with(&suffix))
        .collect();
    names.sort();
    names
}

/// Language code is the second-to-last dot-delimited filename component,
/// e.g. `dQw4w9WgXcQ.en-US.json3` -> `en-US`.
fn language_code(file_name: &str) -> Option<String> {
    file_name.split('.').rev().nth(1).map(str::to_owned)
}

/// Parses one caption track. `Ok(None)` means the file holds no `events`
/// list; events without segment text are control events and are skipped.
fn parse_caption_file(path: &Path) -> Result<Option<Vec<Segment>>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = BufReader::new(file);
    let data: Value =
        serde_json::from_reader(reader).with_context(|| format!("parsing {}", path.display()))?;

    let Some(events) = data.get("events").and_then(Value::as_array) else {
        return Ok(None);
    };

    let mut segments = Vec::new();
    for event in events {
        let Some(segs) = event.get("segs").and_then(Value::as_array) else {
            continue;
        };

        let text: String = segs
            .iter()
            .map(|seg| seg.get("utf8").and_then(Value::as_str).unwrap_or(""))
            .collect();

        let start_ms = event_ms(event, "tStartMs");
        let duration_ms = event_ms(event, "dDurationMs");
        segments.push(Segment {
            start_ms,
            end_ms: start_ms + duration_ms,
            text: text.trim().to_owned(),
        });
    }

    Ok(Some(segments))
}

/// Millisecond field of an event, defaulting to 0 and clamped non-negative.
fn event_ms(event: &Value, key: &str) -> i64 {
    event
        .get(key)
        .and_then(|value| value.as_i64().or_else(|| value.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
        .max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn track_map(languages: &[&str]) -> Map<String, Value> {
        let mut map = Map::new();
        for language in languages {
            map.insert((*language).to_owned(), json!([]));
        }
        map
    }

    fn write_track(root: &Path, video_id: &str, language: &str, body: &Value) {
        let dir = root.join(video_id);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{video_id}.{language}.{CAPTION_EXT}"));
        fs::write(path, serde_json::to_vec(body).unwrap()).unwrap();
    }

    #[test]
    fn empty_caption_map_skips_probing() {
        let ghost = vec![PathBuf::from("/nonexistent/captions")];
        assert!(reconstruct_transcripts("vid", None, &ghost).is_empty());
        assert!(reconstruct_transcripts("vid", Some(&Map::new()), &ghost).is_empty());
    }

    #[test]
    fn source_order_is_preserved() {
        let temp = tempdir().unwrap();
        write_track(
            temp.path(),
            "vid",
            "en",
            &json!({"events": [
                {"tStartMs": 1000, "dDurationMs": 500, "segs": [{"utf8": "a"}]},
                {"tStartMs": 500, "dDurationMs": 400, "segs": [{"utf8": "b"}]},
            ]}),
        );

        let tracks = track_map(&["en"]);
        let result =
            reconstruct_transcripts("vid", Some(&tracks), &[temp.path().to_path_buf()]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].language, "en");
        assert_eq!(
            result[0].segments,
            vec![
                Segment { start_ms: 1000, end_ms: 1500, text: "a".into() },
                Segment { start_ms: 500, end_ms: 900, text: "b".into() },
            ]
        );
    }

    #[test]
    fn segment_text_concatenates_and_trims() {
        let temp = tempdir().unwrap();
        write_track(
            temp.path(),
            "vid",
            "en",
            &json!({"events": [
                {"tStartMs": 10, "segs": [{"utf8": " hello"}, {"utf8": " world "}, {}]},
                {"tStartMs": 20, "aAppend": 1},
            ]}),
        );

        let tracks = track_map(&["en"]);
        let result =
            reconstruct_transcripts("vid", Some(&tracks), &[temp.path().to_path_buf()]);
        // The second event has no segs and is a control event.
        assert_eq!(result[0].segments.len(), 1);
        assert_eq!(
            result[0].segments[0],
            Segment { start_ms: 10, end_ms: 10, text: "hello world".into() }
        );
    }

    #[test]
    fn first_root_with_video_directory_wins() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        write_track(
            second.path(),
            "vid",
            "en",
            &json!({"events": [{"tStartMs": 0, "dDurationMs": 1, "segs": [{"utf8": "x"}]}]}),
        );

        let tracks = track_map(&["en"]);
        let roots = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let result = reconstruct_transcripts("vid", Some(&tracks), &roots);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].segments[0].text, "x");
    }

    #[test]
    fn matched_root_is_used_exclusively_even_when_empty() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        // First root has the video directory but no caption files in it.
        fs::create_dir_all(first.path().join("vid")).unwrap();
        write_track(
            second.path(),
            "vid",
            "en",
            &json!({"events": [{"tStartMs": 0, "segs": [{"utf8": "x"}]}]}),
        );

        let tracks = track_map(&["en"]);
        let roots = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        assert!(reconstruct_transcripts("vid", Some(&tracks), &roots).is_empty());
    }

    #[test]
    fn malformed_file_does_not_abort_other_languages() {
        let temp = tempdir().unwrap();
        write_track(
            temp.path(),
            "vid",
            "de",
            &json!({"events": [{"tStartMs": 5, "dDurationMs": 5, "segs": [{"utf8": "gut"}]}]}),
        );
        let broken = temp.path().join("vid").join(format!("vid.en.{CAPTION_EXT}"));
        fs::write(&broken, b"{ not json").unwrap();

        let tracks = track_map(&["de", "en"]);
        let result =
            reconstruct_transcripts("vid", Some(&tracks), &[temp.path().to_path_buf()]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].language, "de");
        assert_eq!(result[0].segments[0].text, "gut");
    }

    #[test]
    fn files_for_other_videos_are_ignored() {
        let temp = tempdir().unwrap();
        write_track(
            temp.path(),
            "vid",
            "en",
            &json!({"events": [{"tStartMs": 0, "segs": [{"utf8": "mine"}]}]}),
        );
        let foreign = temp.path().join("vid").join(format!("other.en.{CAPTION_EXT}"));
        fs::write(&foreign, b"{}").unwrap();
        let wrong_ext = temp.path().join("vid").join("vid.en.vtt");
        fs::write(&wrong_ext, b"WEBVTT").unwrap();

        let tracks = track_map(&["en"]);
        let result =
            reconstruct_transcripts("vid", Some(&tracks), &[temp.path().to_path_buf()]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].segments[0].text, "mine");
    }

    #[test]
    fn track_without_events_yields_nothing() {
        let temp = tempdir().unwrap();
        write_track(temp.path(), "vid", "en", &json!({"wireMagic": "pb3"}));

        let tracks = track_map(&["en"]);
        let result =
            reconstruct_transcripts("vid", Some(&tracks), &[temp.path().to_path_buf()]);
        assert!(result.is_empty());
    }

    #[test]
    fn parsed_track_with_only_control_events_keeps_its_entry() {
        let temp = tempdir().unwrap();
        write_track(
            temp.path(),
            "vid",
            "en",
            &json!({"events": [{"tStartMs": 0, "aAppend": 1}]}),
        );

        let tracks = track_map(&["en"]);
        let result =
            reconstruct_transcripts("vid", Some(&tracks), &[temp.path().to_path_buf()]);
        assert_eq!(result.len(), 1);
        assert!(result[0].segments.is_empty());
    }

    #[test]
    fn negative_times_clamp_to_zero() {
        let temp = tempdir().unwrap();
        write_track(
            temp.path(),
            "vid",
            "en",
            &json!({"events": [{"tStartMs": -20, "dDurationMs": -5, "segs": [{"utf8": "x"}]}]}),
        );

        let tracks = track_map(&["en"]);
        let result =
            reconstruct_transcripts("vid", Some(&tracks), &[temp.path().to_path_buf()]);
        assert_eq!(
            result[0].segments[0],
            Segment { start_ms: 0, end_ms: 0, text: "x".into() }
        );
    }

    #[test]
    fn language_code_comes_from_file_name() {
        assert_eq!(language_code("vid.en-US.json3").as_deref(), Some("en-US"));
        assert_eq!(language_code("vid.json3").as_deref(), Some("vid"));
        assert_eq!(language_code("plain").as_deref(), None);
    }
}
