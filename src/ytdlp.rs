//! Wrappers around the `yt-dlp` command-line extractor.
//!
//! Every harvested artifact comes from a separate invocation: a single-JSON
//! metadata dump, a caption download, and (optionally) the media itself.
//! Splitting the calls keeps each failure independently recoverable.

use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use serde_json::Value;

/// Caption languages requested from the extractor.
const CAPTION_LANGS: &str = "en,en-US,en-GB";

/// Media quality ceiling for downloads, mapped to extractor format selectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaQuality {
    Best,
    P1080,
    P720,
    P480,
}

impl MediaQuality {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "best" => Ok(MediaQuality::Best),
            "1080p" | "1080" => Ok(MediaQuality::P1080),
            "720p" | "720" => Ok(MediaQuality::P720),
            "480p" | "480" => Ok(MediaQuality::P480),
            _ => bail!("unknown media quality: {value}"),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MediaQuality::Best => "best",
            MediaQuality::P1080 => "1080p",
            MediaQuality::P720 => "720p",
            MediaQuality::P480 => "480p",
        }
    }

    /// Prefers muxable mp4 streams, falling back to whatever plays.
    fn format_selector(self) -> &'static str {
        match self {
            MediaQuality::Best => {
                "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/bestvideo+bestaudio/best"
            }
            MediaQuality::P1080 => {
                "bestvideo[ext=mp4][height<=1080]+bestaudio[ext=m4a]/best[ext=mp4][height<=1080]/bestvideo+bestaudio/best"
            }
            MediaQuality::P720 => {
                "bestvideo[ext=mp4][height<=720]+bestaudio[ext=m4a]/best[ext=mp4][height<=720]/best"
            }
            MediaQuality::P480 => {
                "bestvideo[ext=mp4][height<=480]+bestaudio[ext=m4a]/best[ext=mp4][height<=480]/best"
            }
        }
    }
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Runs `yt-dlp --version` to fail loudly when the extractor is missing.
pub fn ensure_available() -> Result<()> {
    let status = Command::new("yt-dlp")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => bail!("yt-dlp is installed but returned a failure status"),
        Err(err) => bail!("yt-dlp is not installed or not in PATH: {}", err),
    }
}

/// Dumps the full metadata payload for one video and caches the raw JSON as
/// `<video_id>.info.json` inside `target_dir`.
pub fn fetch_video_info(video_id: &str, target_dir: &Path, cookies: &Path) -> Result<Value> {
    let mut command = Command::new("yt-dlp");
    command
        .arg("--dump-single-json")
        .arg("--skip-download")
        .arg("--no-warnings")
        .arg("--no-progress")
        .arg(watch_url(video_id));
    add_cookies(&mut command, cookies);

    let output = command
        .output()
        .with_context(|| format!("fetching metadata for {video_id}"))?;

    if !output.status.success() {
        bail!("metadata dump failed for {} (status {})", video_id, output.status);
    }

    let raw_json =
        String::from_utf8(output.stdout).context("reading metadata dump as UTF-8")?;
    let info: Value =
        serde_json::from_str(&raw_json).with_context(|| format!("parsing metadata for {video_id}"))?;

    fs::create_dir_all(target_dir)
        .with_context(|| format!("creating {}", target_dir.display()))?;
    let info_path = target_dir.join(format!("{video_id}.info.json"));
    fs::write(&info_path, raw_json).with_context(|| format!("writing {}", info_path.display()))?;

    Ok(info)
}

/// Downloads segment-caption tracks (manual and automatic) for one video into
/// `target_dir/<video_id>/`.
pub fn download_captions(video_id: &str, target_dir: &Path, cookies: &Path) -> Result<()> {
    let video_dir = target_dir.join(video_id);
    fs::create_dir_all(&video_dir)
        .with_context(|| format!("creating {}", video_dir.display()))?;
    let output_pattern = video_dir.join("%(id)s.%(ext)s");

    let mut command = Command::new("yt-dlp");
    command
        .arg("--write-subs")
        .arg("--write-auto-subs")
        .arg("--sub-langs")
        .arg(CAPTION_LANGS)
        .arg("--sub-format")
        .arg(crate::transcripts::CAPTION_EXT)
        .arg("--skip-download")
        .arg("--no-warnings")
        .arg("--no-progress")
        .arg("--output")
        .arg(output_pattern.to_string_lossy().to_string())
        .arg(watch_url(video_id));
    add_cookies(&mut command, cookies);

    run_checked(command, &format!("caption download for {video_id}"))
}

/// Downloads the media file for one video into `target_dir/<video_id>/`,
/// merged to mp4 where possible.
pub fn download_media(
    video_id: &str,
    target_dir: &Path,
    quality: MediaQuality,
    cookies: &Path,
) -> Result<()> {
    let video_dir = target_dir.join(video_id);
    fs::create_dir_all(&video_dir)
        .with_context(|| format!("creating {}", video_dir.display()))?;
    let output_pattern = video_dir.join("%(id)s.%(ext)s");

    let mut command = Command::new("yt-dlp");
    command
        .arg("--format")
        .arg(quality.format_selector())
        .arg("--merge-output-format")
        .arg("mp4")
        .arg("--no-overwrites")
        .arg("--continue")
        .arg("--no-warnings")
        .arg("--no-progress")
        .arg("--output")
        .arg(output_pattern.to_string_lossy().to_string())
        .arg(watch_url(video_id));
    add_cookies(&mut command, cookies);

    run_checked(command, &format!("media download for {video_id}"))
}

fn add_cookies(command: &mut Command, cookies: &Path) {
    if cookies.exists() {
        command
            .arg("--cookies")
            .arg(cookies.to_string_lossy().to_string());
    }
}

fn run_checked(mut command: Command, label: &str) -> Result<()> {
    match command.status() {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => bail!("{} exited with status {}", label, status),
        Err(err) => bail!("{} could not be executed: {}", label, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_url_embeds_the_id() {
        assert_eq!(
            watch_url("dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn quality_parsing_accepts_both_spellings() {
        assert_eq!(MediaQuality::parse("best").unwrap(), MediaQuality::Best);
        assert_eq!(MediaQuality::parse("1080p").unwrap(), MediaQuality::P1080);
        assert_eq!(MediaQuality::parse("720").unwrap(), MediaQuality::P720);
        assert_eq!(MediaQuality::parse(" 480P ").unwrap(), MediaQuality::P480);
        assert!(MediaQuality::parse("potato").is_err());
    }

    #[test]
    fn quality_selectors_cap_height() {
        assert!(MediaQuality::P720.format_selector().contains("height<=720"));
        assert!(MediaQuality::P480.format_selector().contains("height<=480"));
        assert!(!MediaQuality::Best.format_selector().contains("height<="));
    }

    #[test]
    fn quality_labels_round_trip() {
        for quality in [
            MediaQuality::Best,
            MediaQuality::P1080,
            MediaQuality::P720,
            MediaQuality::P480,
        ] {
            assert_eq!(MediaQuality::parse(quality.label()).unwrap(), quality);
        }
    }
}
