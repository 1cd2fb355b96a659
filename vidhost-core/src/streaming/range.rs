//! HTTP `Range` header interpretation for single-range video requests.
//!
//! Only the first range of a multi-range header is honored. Clients asking
//! for `bytes=0-10,20-30` receive `0-10` as a regular 206 response rather
//! than a `multipart/byteranges` body.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// How `Range` headers are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeMode {
    /// Lenient parsing that never rejects a request.
    ///
    /// Any unit prefix is accepted, a lone start (`bytes=12`) runs to the
    /// end of the file, and malformed or unsatisfiable ranges fall back to
    /// the full resource. A suffix range (`bytes=-N`) is not read as a
    /// suffix: its missing start reads as offset 0 and its length is
    /// ignored, so it covers the whole file as a 206.
    #[default]
    Permissive,
    /// RFC 7233 byte ranges: `bytes` unit only, suffix ranges select the last
    /// N bytes, and unsatisfiable ranges are reported as such (416).
    Strict,
}

/// Inclusive byte window `[start, end]` within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered by the range.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value for this window.
    ///
    /// ```
    /// use vidhost_core::ByteRange;
    ///
    /// let range = ByteRange { start: 0, end: 99 };
    /// assert_eq!(range.content_range(1000), "bytes 0-99/1000");
    /// ```
    pub fn content_range(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total_size)
    }
}

/// What to serve for a given `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeDecision {
    /// Whole resource, status 200.
    Full,
    /// Sub-range, status 206.
    Partial(ByteRange),
    /// No satisfiable byte in the request (strict mode only).
    Unsatisfiable,
}

/// Marker for header values that do not parse as a byte range.
#[derive(Debug)]
struct MalformedRange;

/// Interprets a raw `Range` header value against a resource of `total_size` bytes.
///
/// Never fails: malformed headers resolve to [`RangeDecision::Full`] in both
/// modes, matching how servers ignore ranges they cannot parse.
///
/// ```
/// use vidhost_core::streaming::{RangeDecision, RangeMode, resolve_range};
/// use vidhost_core::ByteRange;
///
/// let decision = resolve_range("bytes=500-", 1000, RangeMode::Permissive);
/// assert_eq!(decision, RangeDecision::Partial(ByteRange { start: 500, end: 999 }));
/// ```
pub fn resolve_range(header: &str, total_size: u64, mode: RangeMode) -> RangeDecision {
    let result = match mode {
        RangeMode::Permissive => resolve_permissive(header, total_size),
        RangeMode::Strict => resolve_strict(header, total_size),
    };

    match result {
        Ok(decision) => {
            debug!(header, total_size, ?mode, ?decision, "Resolved range header");
            decision
        }
        Err(MalformedRange) => {
            debug!(header, ?mode, "Ignoring malformed range header");
            RangeDecision::Full
        }
    }
}

fn resolve_permissive(header: &str, total_size: u64) -> Result<RangeDecision, MalformedRange> {
    let normalized = header.trim().to_lowercase();
    let spec = normalized
        .rsplit_once('=')
        .map_or(normalized.as_str(), |(_, spec)| spec);
    let (start_token, end_token) = first_range_lenient(spec)?;

    let start = parse_bound(start_token)?;
    let end = parse_bound(end_token)?;

    if total_size == 0 {
        return Ok(RangeDecision::Full);
    }
    let last = total_size - 1;

    // A missing start reads as 0 and the end is dropped with it, so `-N`
    // covers the whole file.
    let (start, end) = match start {
        Some(start) => (start, end.map_or(last, |end| end.min(last))),
        None => (0, last),
    };

    if start > end {
        return Ok(RangeDecision::Full);
    }

    Ok(RangeDecision::Partial(ByteRange { start, end }))
}

fn resolve_strict(header: &str, total_size: u64) -> Result<RangeDecision, MalformedRange> {
    let normalized = header.trim().to_ascii_lowercase();
    let Some(spec) = normalized.strip_prefix("bytes=") else {
        return Err(MalformedRange);
    };
    let (start_token, end_token) = first_range(spec)?;

    match (parse_bound(start_token)?, parse_bound(end_token)?) {
        (None, None) => Err(MalformedRange),
        (None, Some(suffix)) => {
            if suffix == 0 || total_size == 0 {
                return Ok(RangeDecision::Unsatisfiable);
            }
            Ok(RangeDecision::Partial(ByteRange {
                start: total_size.saturating_sub(suffix),
                end: total_size - 1,
            }))
        }
        (Some(start), end) => {
            if end.is_some_and(|end| end < start) {
                return Err(MalformedRange);
            }
            if start >= total_size {
                return Ok(RangeDecision::Unsatisfiable);
            }
            let last = total_size - 1;
            Ok(RangeDecision::Partial(ByteRange {
                start,
                end: end.map_or(last, |end| end.min(last)),
            }))
        }
    }
}

/// Like [`first_range`], but a spec without `-` is a start with no end.
fn first_range_lenient(spec: &str) -> Result<(&str, &str), MalformedRange> {
    let first = spec.split(',').next().unwrap_or_default().trim();
    if first.is_empty() {
        return Err(MalformedRange);
    }
    Ok(first
        .split_once('-')
        .map_or((first, ""), |(start, end)| (start.trim(), end.trim())))
}

/// Splits the first comma-separated range spec into its two tokens.
fn first_range(spec: &str) -> Result<(&str, &str), MalformedRange> {
    let first = spec.split(',').next().unwrap_or_default();
    first
        .split_once('-')
        .map(|(start, end)| (start.trim(), end.trim()))
        .ok_or(MalformedRange)
}

fn parse_bound(token: &str) -> Result<Option<u64>, MalformedRange> {
    if token.is_empty() {
        return Ok(None);
    }
    token.parse::<u64>().map(Some).map_err(|_| MalformedRange)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permissive(header: &str, total_size: u64) -> RangeDecision {
        resolve_range(header, total_size, RangeMode::Permissive)
    }

    fn strict(header: &str, total_size: u64) -> RangeDecision {
        resolve_range(header, total_size, RangeMode::Strict)
    }

    fn partial(start: u64, end: u64) -> RangeDecision {
        RangeDecision::Partial(ByteRange { start, end })
    }

    #[test]
    fn test_closed_range() {
        assert_eq!(permissive("bytes=0-99", 1000), partial(0, 99));
        assert_eq!(strict("bytes=0-99", 1000), partial(0, 99));
    }

    #[test]
    fn test_open_ended_range_clamps_to_last_byte() {
        assert_eq!(permissive("bytes=500-", 1000), partial(500, 999));
        assert_eq!(permissive("bytes=500-5000", 1000), partial(500, 999));
    }

    #[test]
    fn test_header_is_normalized() {
        assert_eq!(permissive("  BYTES=10 - 20 ", 1000), partial(10, 20));
        assert_eq!(strict("Bytes=10-20", 1000), partial(10, 20));
    }

    #[test]
    fn test_permissive_accepts_any_unit_or_none() {
        assert_eq!(permissive("items=5-9", 1000), partial(5, 9));
        assert_eq!(permissive("5-9", 1000), partial(5, 9));
        assert_eq!(strict("items=5-9", 1000), RangeDecision::Full);
    }

    #[test]
    fn test_only_first_range_is_honored() {
        assert_eq!(permissive("bytes=0-10,20-30", 1000), partial(0, 10));
        assert_eq!(strict("bytes=0-10, 20-30", 1000), partial(0, 10));
    }

    #[test]
    fn test_malformed_values_fall_back_to_full() {
        for header in ["bytes=abc-def", "bytes=", "garbage", "bytes=1-x"] {
            assert_eq!(permissive(header, 1000), RangeDecision::Full, "{header}");
            assert_eq!(strict(header, 1000), RangeDecision::Full, "{header}");
        }
    }

    #[test]
    fn test_lone_start_without_dash() {
        assert_eq!(permissive("bytes=12", 1000), partial(12, 999));
        assert_eq!(permissive("bytes=12,40-50", 1000), partial(12, 999));
        assert_eq!(permissive("bytes=1500", 1000), RangeDecision::Full);
        assert_eq!(strict("bytes=12", 1000), RangeDecision::Full);
    }

    #[test]
    fn test_permissive_suffix_range_covers_whole_file() {
        assert_eq!(permissive("bytes=-100", 1000), partial(0, 999));
        assert_eq!(permissive("bytes=-", 1000), partial(0, 999));
    }

    #[test]
    fn test_strict_suffix_range_selects_tail() {
        assert_eq!(strict("bytes=-100", 1000), partial(900, 999));
        assert_eq!(strict("bytes=-5000", 1000), partial(0, 999));
        assert_eq!(strict("bytes=-0", 1000), RangeDecision::Unsatisfiable);
    }

    #[test]
    fn test_start_past_end_of_file() {
        assert_eq!(permissive("bytes=1500-", 1000), RangeDecision::Full);
        assert_eq!(strict("bytes=1500-", 1000), RangeDecision::Unsatisfiable);
        assert_eq!(strict("bytes=1000-1200", 1000), RangeDecision::Unsatisfiable);
    }

    #[test]
    fn test_inverted_range() {
        assert_eq!(permissive("bytes=50-10", 1000), RangeDecision::Full);
        assert_eq!(strict("bytes=50-10", 1000), RangeDecision::Full);
    }

    #[test]
    fn test_empty_resource() {
        assert_eq!(permissive("bytes=0-10", 0), RangeDecision::Full);
        assert_eq!(strict("bytes=0-10", 0), RangeDecision::Unsatisfiable);
        assert_eq!(strict("bytes=-10", 0), RangeDecision::Unsatisfiable);
    }

    #[test]
    fn test_single_byte_ranges() {
        assert_eq!(permissive("bytes=0-0", 1), partial(0, 0));
        assert_eq!(permissive("bytes=999-999", 1000), partial(999, 999));
        assert_eq!(ByteRange { start: 7, end: 7 }.length(), 1);
    }

    #[test]
    fn test_content_range_format() {
        let range = ByteRange { start: 500, end: 999 };
        assert_eq!(range.content_range(1000), "bytes 500-999/1000");
        assert_eq!(range.length(), 500);
    }
}
