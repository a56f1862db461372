use std::sync::LazyLock;

use regex::Regex;

/// `start-end`, `start-` and `-suffix` tokens. Anything between matches
/// (the `bytes=` unit, commas, a trailing `/*`) is ignored.
static RANGE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)?-(\d+)?").expect("static regex"));

/// Represents a single byte range with inclusive start and end positions.
///
/// Not validated against the resource size; see [`ByteRange::is_satisfiable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Create a new byte range with inclusive start and end.
    pub fn new(start: u64, end: u64) -> Self {
        ByteRange { start, end }
    }

    /// Number of bytes covered, zero when `start > end`.
    pub fn len(&self) -> u64 {
        if self.start > self.end {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `start <= end < total_size`.
    pub fn is_satisfiable(&self, total_size: u64) -> bool {
        self.start <= self.end && self.end < total_size
    }
}

/// Parse a raw `Range` header value into byte ranges relative to
/// `total_size`.
///
/// Returns an empty list when the header is absent. Tokens without any
/// digits are dropped. Ranges keep header order and are neither merged,
/// sorted nor clamped:
///
/// ```
/// use ranged_download::{parse_range_header, ByteRange};
///
/// let ranges = parse_range_header(Some("bytes=0-9,500-,-20"), 1000);
/// assert_eq!(ranges, vec![
///     ByteRange::new(0, 9),
///     ByteRange::new(500, 999),
///     ByteRange::new(980, 999),
/// ]);
/// assert!(parse_range_header(None, 1000).is_empty());
/// ```
pub fn parse_range_header(range_header: Option<&str>, total_size: u64) -> Vec<ByteRange> {
    let Some(header) = range_header else {
        return Vec::new();
    };

    let last = total_size.saturating_sub(1);

    RANGE_TOKEN
        .captures_iter(header)
        .filter_map(|caps| {
            let start = caps.get(1).map(|m| parse_position(m.as_str()));
            let end = caps.get(2).map(|m| parse_position(m.as_str()));

            match (start, end) {
                (Some(start), Some(end)) => Some(ByteRange::new(start, end)),
                (Some(start), None) => Some(ByteRange::new(start, last)),
                // `-0` ends up with start > end, which the planner rejects
                (None, Some(suffix)) => {
                    Some(ByteRange::new(total_size.saturating_sub(suffix), last))
                }
                (None, None) => None,
            }
        })
        .collect()
}

// digits only, so the one failure mode is overflow
fn parse_position(digits: &str) -> u64 {
    digits.parse().unwrap_or(u64::MAX)
}
