#![forbid(unsafe_code)]

//! Command-line search step: queries the Data API for videos matching a
//! topic, pulls listing details for them and their channels, and writes the
//! `videos.csv` that the harvester consumes (plus `channels.csv`).

use anyhow::{Context, Result, bail};
use std::env;
use std::fs;
use std::path::PathBuf;
use tubeharvest_tools::config::{RuntimeOverrides, resolve_runtime_config};
use tubeharvest_tools::export;
use tubeharvest_tools::search::{SearchClient, SearchParams};
use tubeharvest_tools::security::ensure_not_root;

const VIDEOS_CSV_FILE: &str = "videos.csv";
const CHANNELS_CSV_FILE: &str = "channels.csv";
const DEFAULT_MAX_RESULTS: usize = 400;
const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone)]
struct SearchArgs {
    query: String,
    language: String,
    published_after: Option<String>,
    published_before: Option<String>,
    max_results: usize,
    search_root: PathBuf,
    api_key: String,
}

impl SearchArgs {
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
        let mut query: Option<String> = None;
        let mut language = DEFAULT_LANGUAGE.to_string();
        let mut published_after: Option<String> = None;
        let mut published_before: Option<String> = None;
        let mut max_results = DEFAULT_MAX_RESULTS;
        let mut search_root_override: Option<PathBuf> = None;
        let mut api_key_override: Option<String> = None;
        let mut args = iter.into_iter();

        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--language=") {
                language = value.to_string();
                continue;
            }
            if let Some(value) = arg.strip_prefix("--published-after=") {
                published_after = Some(value.to_string());
                continue;
            }
            if let Some(value) = arg.strip_prefix("--published-before=") {
                published_before = Some(value.to_string());
                continue;
            }
            if let Some(value) = arg.strip_prefix("--max-results=") {
                max_results = Self::parse_max_results(value)?;
                continue;
            }
            if let Some(value) = arg.strip_prefix("--search-root=") {
                search_root_override = Some(PathBuf::from(value));
                continue;
            }
            if let Some(value) = arg.strip_prefix("--api-key=") {
                api_key_override = Some(value.to_string());
                continue;
            }

            match arg.as_str() {
                "--language" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--language requires a value"))?;
                    language = value;
                }
                "--published-after" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--published-after requires a value"))?;
                    published_after = Some(value);
                }
                "--published-before" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--published-before requires a value"))?;
                    published_before = Some(value);
                }
                "--max-results" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--max-results requires a value"))?;
                    max_results = Self::parse_max_results(&value)?;
                }
                "--search-root" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--search-root requires a value"))?;
                    search_root_override = Some(PathBuf::from(value));
                }
                "--api-key" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--api-key requires a value"))?;
                    api_key_override = Some(value);
                }
                _ if arg.starts_with('-') => {
                    bail!("unknown argument: {arg}");
                }
                _ => {
                    Self::set_query(&mut query, arg)?;
                }
            }
        }

        let Some(query) = query else {
            bail!(
                "Usage: search_videos [--language <code>] [--published-after <rfc3339>] [--published-before <rfc3339>] [--max-results <n>] [--search-root <path>] [--api-key <key>] <query>"
            );
        };

        let config = resolve_runtime_config(RuntimeOverrides {
            search_root: search_root_override,
            api_key: api_key_override,
            ..RuntimeOverrides::default()
        })?;
        let Some(api_key) = config.api_key else {
            bail!("no Data API key; pass --api-key or set YOUTUBE_API_KEY");
        };

        Ok(Self {
            query,
            language,
            published_after,
            published_before,
            max_results,
            search_root: config.search_root,
            api_key,
        })
    }

    fn set_query(target: &mut Option<String>, value: String) -> Result<()> {
        if target.is_some() {
            bail!("query specified multiple times; quote multi-word queries");
        }
        *target = Some(value);
        Ok(())
    }

    fn parse_max_results(value: &str) -> Result<usize> {
        let parsed = value
            .parse::<usize>()
            .with_context(|| format!("invalid --max-results value: {value}"))?;
        if parsed == 0 {
            bail!("--max-results must be at least 1");
        }
        Ok(parsed)
    }
}

fn main() -> Result<()> {
    ensure_not_root("search_videos")?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = SearchArgs::parse()?;

    println!("===================================");
    println!("YouTube Video Search");
    println!("===================================");
    println!("Query: {}", args.query);
    println!("Language: {}", args.language);
    if let Some(after) = &args.published_after {
        println!("Published after: {}", after);
    }
    if let Some(before) = &args.published_before {
        println!("Published before: {}", before);
    }
    println!("Max results: {}", args.max_results);
    println!("Output directory: {}", args.search_root.display());
    println!();

    fs::create_dir_all(&args.search_root)
        .with_context(|| format!("creating {}", args.search_root.display()))?;

    let client = SearchClient::new(args.api_key.clone());
    let params = SearchParams {
        query: args.query.clone(),
        language: args.language.clone(),
        published_after: args.published_after.clone(),
        published_before: args.published_before.clone(),
        max_results: args.max_results,
    };

    println!("Searching for videos...");
    let video_ids = client.search_video_ids(&params)?;
    if video_ids.is_empty() {
        bail!("search returned no videos");
    }
    println!("Found {} video(s)", video_ids.len());

    println!("Fetching video details...");
    let videos = client.video_details(&video_ids)?;
    println!("Fetched details for {} video(s)", videos.len());

    println!("Fetching channel details...");
    let channel_ids: Vec<String> = videos
        .iter()
        .map(|listing| listing.channel_id.clone())
        .collect();
    let channels = client.channel_details(&channel_ids)?;
    println!("Fetched details for {} channel(s)", channels.len());

    let videos_csv = args.search_root.join(VIDEOS_CSV_FILE);
    let channels_csv = args.search_root.join(CHANNELS_CSV_FILE);
    export::write_video_listings_csv(&videos_csv, &videos)?;
    export::write_channel_listings_csv(&channels_csv, &channels)?;

    println!();
    println!("===================================");
    println!("Search complete!");
    println!("===================================");
    println!("Videos: {}", videos.len());
    println!("Channels: {}", channels.len());
    println!();
    println!("Output files:");
    println!("  - {}", videos_csv.display());
    println!("  - {}", channels_csv.display());
    println!();
    println!("Next step: harvest_videos --input-csv {}", videos_csv.display());

    Ok(())
}
