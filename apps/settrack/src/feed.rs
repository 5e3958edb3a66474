//! # Release Feed Fetch
//!
//! Downloads the release YAML document and hands it to the core parser.

use settrack_core::{ParsedFeed, SettrackError, parse_release_feed};
use std::time::Duration;

/// Request timeout for the feed download.
const FEED_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum feed document size (16 MB).
const MAX_FEED_SIZE: usize = 16 * 1024 * 1024;

/// Fetch and parse the release feed at `url`.
///
/// Skipped records are logged here and returned to the caller.
pub async fn fetch_release_feed(url: &str) -> Result<ParsedFeed, SettrackError> {
    let client = reqwest::Client::builder()
        .timeout(FEED_TIMEOUT)
        .user_agent(concat!("settrack/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| SettrackError::FeedError(format!("HTTP client: {}", e)))?;

    tracing::info!(url, "Fetching release feed");
    let mut response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| SettrackError::FeedError(format!("Fetch {}: {}", url, e)))?;

    if let Some(length) = response.content_length() {
        check_feed_size(length)?;
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| SettrackError::FeedError(format!("Read body: {}", e)))?
    {
        append_chunk(&mut body, &chunk)?;
    }

    let body = String::from_utf8(body)
        .map_err(|e| SettrackError::FeedError(format!("Feed is not UTF-8: {}", e)))?;
    parse_feed_body(&body)
}

fn check_feed_size(len: u64) -> Result<(), SettrackError> {
    if len > MAX_FEED_SIZE as u64 {
        return Err(SettrackError::FeedError(format!(
            "Feed size {} bytes exceeds maximum allowed {} bytes",
            len, MAX_FEED_SIZE
        )));
    }
    Ok(())
}

/// Append a downloaded chunk, failing as soon as the body passes the limit.
fn append_chunk(body: &mut Vec<u8>, chunk: &[u8]) -> Result<(), SettrackError> {
    check_feed_size((body.len() + chunk.len()) as u64)?;
    body.extend_from_slice(chunk);
    Ok(())
}

/// Parse a downloaded feed body, enforcing the size limit.
pub fn parse_feed_body(body: &str) -> Result<ParsedFeed, SettrackError> {
    check_feed_size(body.len() as u64)?;

    let parsed = parse_release_feed(body)?;
    for skipped in &parsed.skipped {
        tracing::warn!(
            event = "feed_record_skipped",
            record = %skipped.record,
            reason = %skipped.reason,
            "Skipping release feed record"
        );
    }
    tracing::info!(
        releases = parsed.releases.len(),
        skipped = parsed.skipped.len(),
        "Parsed release feed"
    );
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_body_is_rejected() {
        let body = " ".repeat(MAX_FEED_SIZE + 1);
        assert!(matches!(
            parse_feed_body(&body),
            Err(SettrackError::FeedError(msg)) if msg.contains("exceeds")
        ));
    }

    #[test]
    fn download_stops_once_body_passes_limit() {
        let mut body = Vec::new();
        let chunk = vec![b' '; MAX_FEED_SIZE / 2];
        append_chunk(&mut body, &chunk).expect("first half");
        append_chunk(&mut body, &chunk).expect("second half");
        assert_eq!(body.len(), MAX_FEED_SIZE);

        assert!(matches!(
            append_chunk(&mut body, b"x"),
            Err(SettrackError::FeedError(msg)) if msg.contains("exceeds")
        ));
        assert_eq!(body.len(), MAX_FEED_SIZE);
    }

    #[test]
    fn declared_length_over_limit_is_rejected() {
        assert!(check_feed_size(MAX_FEED_SIZE as u64).is_ok());
        assert!(check_feed_size(MAX_FEED_SIZE as u64 + 1).is_err());
    }

    #[test]
    fn body_is_parsed() {
        let parsed = parse_feed_body(
            "- release_name: v23.1.0\n  major_version: v23.1\n  release_date: '2023-05-15'\n  release_type: Production\n",
        )
        .expect("parse");
        assert_eq!(parsed.releases.len(), 1);
    }
}
