#![forbid(unsafe_code)]

//! Library shared by the tubeharvest binaries.
//!
//! The interesting parts are the normalization core: [`sanitize`] reduces an
//! arbitrary extractor payload to something JSON can hold, [`records`] maps
//! raw metadata onto stable video/channel schemas, and [`transcripts`]
//! rebuilds per-language transcripts from downloaded caption tracks. The
//! remaining modules are the plumbing around them (configuration, exports,
//! the Data API client, and yt-dlp subprocess wrappers).

pub mod config;
pub mod export;
pub mod records;
pub mod sanitize;
pub mod search;
pub mod security;
pub mod transcripts;
pub mod ytdlp;
