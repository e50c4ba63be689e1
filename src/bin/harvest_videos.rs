#![forbid(unsafe_code)]

//! Command-line harvester that walks a list of video ids, pulls metadata and
//! caption tracks through yt-dlp (optionally the media too), and exports
//! normalized CSV/JSON tables plus a per-video archived metadata copy.
//!
//! One failing video never stops the batch: every per-video error is reported
//! as a warning and the loop moves on.

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tubeharvest_tools::config::{RuntimeOverrides, resolve_runtime_config};
use tubeharvest_tools::export;
use tubeharvest_tools::records::{self, ChannelRecord, VideoRecord};
use tubeharvest_tools::sanitize::{RawValue, sanitize};
use tubeharvest_tools::security::ensure_not_root;
use tubeharvest_tools::transcripts::{self, TranscriptSet};
use tubeharvest_tools::ytdlp::{self, MediaQuality};

const METADATA_SUBDIR: &str = "metadata";
const TRANSCRIPTS_SUBDIR: &str = "transcripts";
const VIDEOS_SUBDIR: &str = "videos";
const COOKIES_FILE: &str = "cookies.txt";
const VIDEOS_CSV_FILE: &str = "videos_detailed.csv";
const CHANNELS_CSV_FILE: &str = "channels_detailed.csv";
const TRANSCRIPTS_JSON_FILE: &str = "transcripts_all.json";
const SUMMARY_FILE: &str = "summary.json";

/// Convenience wrapper around every filesystem location this binary touches.
struct Paths {
    base: PathBuf,
    metadata: PathBuf,
    transcripts: PathBuf,
    videos: PathBuf,
    cookies: PathBuf,
}

impl Paths {
    fn with_root(output_root: &Path) -> Self {
        let base = output_root.to_path_buf();
        let metadata = base.join(METADATA_SUBDIR);
        let transcripts = base.join(TRANSCRIPTS_SUBDIR);
        let videos = base.join(VIDEOS_SUBDIR);
        let cookies = base.join(COOKIES_FILE);

        Self {
            base,
            metadata,
            transcripts,
            videos,
            cookies,
        }
    }

    /// Creates every directory we might write to so later steps can assume
    /// the tree exists.
    fn prepare(&self, with_media: bool) -> Result<()> {
        fs::create_dir_all(&self.metadata)
            .with_context(|| format!("creating {}", self.metadata.display()))?;
        fs::create_dir_all(&self.transcripts)
            .with_context(|| format!("creating {}", self.transcripts.display()))?;
        if with_media {
            fs::create_dir_all(&self.videos)
                .with_context(|| format!("creating {}", self.videos.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct HarvestArgs {
    input_csv: PathBuf,
    output_root: PathBuf,
    limit: Option<usize>,
    quality: MediaQuality,
    skip_media: bool,
}

impl HarvestArgs {
    fn parse() -> Result<Self> {
        Self::from_iter(env::args().skip(1))
    }

    #[cfg(test)]
    fn from_slice(values: &[&str]) -> Result<Self> {
        Self::from_iter(values.iter().map(|value| value.to_string()))
    }

    fn from_iter<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut input_csv_override: Option<PathBuf> = None;
        let mut output_root_override: Option<PathBuf> = None;
        let mut limit: Option<usize> = None;
        let mut quality = MediaQuality::Best;
        let mut skip_media = false;
        let mut args = iter.into_iter();

        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--input-csv=") {
                input_csv_override = Some(PathBuf::from(value));
                continue;
            }
            if let Some(value) = arg.strip_prefix("--output-root=") {
                output_root_override = Some(PathBuf::from(value));
                continue;
            }
            if let Some(value) = arg.strip_prefix("--limit=") {
                limit = Some(Self::parse_limit(value)?);
                continue;
            }
            if let Some(value) = arg.strip_prefix("--quality=") {
                quality = MediaQuality::parse(value)?;
                continue;
            }

            match arg.as_str() {
                "--input-csv" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--input-csv requires a value"))?;
                    input_csv_override = Some(PathBuf::from(value));
                }
                "--output-root" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--output-root requires a value"))?;
                    output_root_override = Some(PathBuf::from(value));
                }
                "--limit" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--limit requires a value"))?;
                    limit = Some(Self::parse_limit(&value)?);
                }
                "--quality" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--quality requires a value"))?;
                    quality = MediaQuality::parse(&value)?;
                }
                "--skip-media" => {
                    skip_media = true;
                }
                _ => {
                    bail!("unknown argument: {arg}");
                }
            }
        }

        let config = resolve_runtime_config(RuntimeOverrides {
            input_csv: input_csv_override.clone(),
            output_root: output_root_override.clone(),
            ..RuntimeOverrides::default()
        })?;

        Ok(Self {
            input_csv: config.input_csv,
            output_root: config.output_root,
            limit,
            quality,
            skip_media,
        })
    }

    fn parse_limit(value: &str) -> Result<usize> {
        value
            .parse::<usize>()
            .with_context(|| format!("invalid --limit value: {value}"))
    }
}

/// Everything one video contributes to the run's aggregates.
struct Harvested {
    record: VideoRecord,
    channel: ChannelRecord,
    transcripts: Option<TranscriptSet>,
}

fn main() -> Result<()> {
    ensure_not_root("harvest_videos")?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = HarvestArgs::parse()?;
    ytdlp::ensure_available()?;

    let paths = Paths::with_root(&args.output_root);
    paths.prepare(!args.skip_media)?;

    println!("===================================");
    println!("YouTube Video Harvester");
    println!("===================================");
    println!("Input CSV: {}", args.input_csv.display());
    println!("Output root: {}", paths.base.display());
    if args.skip_media {
        println!("Media: metadata and captions only");
    } else {
        println!("Media: downloading at quality {}", args.quality.label());
    }
    println!();

    let video_ids = read_video_ids(&args.input_csv, args.limit)?;
    if video_ids.is_empty() {
        bail!(
            "no video ids found in {}; run search_videos first",
            args.input_csv.display()
        );
    }
    println!("Found {} video id(s) to process", video_ids.len());
    println!();

    let mut videos: Vec<VideoRecord> = Vec::new();
    let mut channels: Vec<ChannelRecord> = Vec::new();
    let mut seen_channels: HashSet<String> = HashSet::new();
    let mut transcript_sets: Vec<TranscriptSet> = Vec::new();

    let total = video_ids.len();
    for (index, video_id) in video_ids.iter().enumerate() {
        println!("[{}/{}] Processing video: {}", index + 1, total, video_id);

        match process_video(video_id, &paths, &args) {
            Ok(harvested) => {
                videos.push(harvested.record);
                // First-seen channel snapshot wins; later videos from the
                // same channel do not overwrite it.
                if let Some(channel_id) = harvested.channel.channel_id.clone()
                    && seen_channels.insert(channel_id)
                {
                    channels.push(harvested.channel);
                }
                if let Some(set) = harvested.transcripts {
                    transcript_sets.push(set);
                }
            }
            Err(err) => {
                eprintln!("  Warning: failed to process {}: {:#}", video_id, err);
            }
        }

        if index + 1 < total {
            thread::sleep(pacing_delay(args.skip_media));
        }
    }

    println!();
    println!("Saving exports...");
    export::write_videos_csv(&paths.base.join(VIDEOS_CSV_FILE), &videos)?;
    export::write_channels_csv(&paths.base.join(CHANNELS_CSV_FILE), &channels)?;
    export::write_transcripts_json(&paths.base.join(TRANSCRIPTS_JSON_FILE), &transcript_sets)?;

    let media_dir = (!args.skip_media).then_some(paths.videos.as_path());
    let quality_label = (!args.skip_media).then_some(args.quality.label());
    let summary = export::build_summary(
        &videos,
        channels.len(),
        &transcript_sets,
        media_dir,
        quality_label,
    );
    export::write_summary(&paths.base.join(SUMMARY_FILE), &summary)?;

    println!();
    println!("===================================");
    println!("Harvest complete!");
    println!("===================================");
    println!("Videos processed: {}/{}", videos.len(), total);
    println!("Channels seen: {}", channels.len());
    println!("Videos with transcripts: {}", transcript_sets.len());
    println!();
    println!("Output files:");
    println!("  - {}", paths.base.join(VIDEOS_CSV_FILE).display());
    println!("  - {}", paths.base.join(CHANNELS_CSV_FILE).display());
    println!("  - {}", paths.base.join(TRANSCRIPTS_JSON_FILE).display());
    println!("  - {}", paths.base.join(SUMMARY_FILE).display());
    println!("  - {}/<video_id>_full.json", paths.metadata.display());

    Ok(())
}

/// Harvests a single video: metadata dump, caption (and optionally media)
/// download, normalization, transcript reconstruction, archival copy.
fn process_video(video_id: &str, paths: &Paths, args: &HarvestArgs) -> Result<Harvested> {
    // Captions sit next to the media when media is downloaded, otherwise in
    // the transcripts tree. Reconstruction probes both, in that order of
    // preference for metadata-only runs.
    let caption_root = if args.skip_media {
        &paths.transcripts
    } else {
        &paths.videos
    };

    let info_dir = caption_root.join(video_id);
    let info = ytdlp::fetch_video_info(video_id, &info_dir, &paths.cookies)?;

    if let Err(err) = ytdlp::download_captions(video_id, caption_root, &paths.cookies) {
        eprintln!("  Warning: caption download failed for {}: {:#}", video_id, err);
    }
    if !args.skip_media
        && let Err(err) = ytdlp::download_media(video_id, &paths.videos, args.quality, &paths.cookies)
    {
        eprintln!("  Warning: media download failed for {}: {:#}", video_id, err);
    }

    let record = records::extract_video(&info)?;
    let channel = records::extract_channel(&info)?;

    let search_roots = [paths.transcripts.clone(), paths.videos.clone()];
    let entries =
        transcripts::reconstruct_transcripts(video_id, caption_tracks(&info), &search_roots);
    let transcripts = (!entries.is_empty()).then(|| TranscriptSet {
        video_id: video_id.to_owned(),
        transcripts: entries,
    });

    let archived = sanitize(&RawValue::from_json(info));
    export::write_video_archive(&paths.metadata, video_id, &archived)?;

    Ok(Harvested {
        record,
        channel,
        transcripts,
    })
}

/// Manual subtitles when any exist, otherwise automatic captions.
fn caption_tracks(info: &Value) -> Option<&Map<String, Value>> {
    let non_empty = |key: &str| {
        info.get(key)
            .and_then(Value::as_object)
            .filter(|tracks| !tracks.is_empty())
    };
    non_empty("subtitles").or_else(|| non_empty("automatic_captions"))
}

fn pacing_delay(skip_media: bool) -> Duration {
    if skip_media {
        Duration::from_secs(1)
    } else {
        Duration::from_secs(2)
    }
}

/// Reads the `video_id` column from the search step's CSV. The header decides
/// the column position; a UTF-8 BOM from spreadsheet tools is tolerated.
fn read_video_ids(path: &Path, limit: Option<usize>) -> Result<Vec<String>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading id list {}", path.display()))?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);

    let mut rows = parse_csv(content).into_iter();
    let header = rows
        .next()
        .with_context(|| format!("{} is empty", path.display()))?;
    let column = header
        .iter()
        .position(|name| name == "video_id")
        .with_context(|| format!("{} has no video_id column", path.display()))?;

    let mut ids = Vec::new();
    for row in rows {
        let Some(id) = row.get(column) else {
            continue;
        };
        if id.is_empty() {
            continue;
        }
        ids.push(id.clone());
        if limit.is_some_and(|limit| ids.len() >= limit) {
            break;
        }
    }
    Ok(ids)
}

/// Minimal CSV reader: quoted fields, doubled-quote escapes, and line breaks
/// inside quotes. Enough for the listing files this pipeline writes.
fn parse_csv(content: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                // A lone empty field is a blank line, not a record.
                if row.len() > 1 || !row[0].is_empty() {
                    rows.push(std::mem::take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}
