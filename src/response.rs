use std::fmt;
use std::time::SystemTime;

use axum::http::StatusCode;

use crate::ByteRange;

/// Content type of every part in a multipart body.
pub const PART_CONTENT_TYPE: &str = "application/octet-stream";

/// Which response is produced. Derived from the resource availability and
/// the requested ranges, never chosen directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseMode {
    FullRange,
    SingleRange,
    MultiRange,
    RangeNotSatisfiable,
    NotFound,
}

impl ResponseMode {
    /// Decide the mode for a request.
    ///
    /// Any range failing [`ByteRange::is_satisfiable`] (`start <= end < size`)
    /// makes the whole request unsatisfiable, including `start > end`.
    pub fn resolve(available: bool, ranges: &[ByteRange], total_size: u64) -> ResponseMode {
        if !available {
            return ResponseMode::NotFound;
        }
        if ranges.iter().any(|range| !range.is_satisfiable(total_size)) {
            return ResponseMode::RangeNotSatisfiable;
        }
        match ranges.len() {
            0 => ResponseMode::FullRange,
            1 => ResponseMode::SingleRange,
            _ => ResponseMode::MultiRange,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ResponseMode::FullRange => StatusCode::OK,
            ResponseMode::SingleRange | ResponseMode::MultiRange => StatusCode::PARTIAL_CONTENT,
            ResponseMode::RangeNotSatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
            ResponseMode::NotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Reason phrase for the status line.
    pub fn reason(&self) -> &'static str {
        match self {
            ResponseMode::FullRange => "OK",
            ResponseMode::SingleRange | ResponseMode::MultiRange => "Partial Content",
            ResponseMode::RangeNotSatisfiable => "Requested Range Not Satisfiable",
            ResponseMode::NotFound => "Not Found",
        }
    }
}

/// Ordered header list. Order is preserved exactly as planned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    entries: Vec<(&'static str, String)>,
}

impl ResponseHeaders {
    pub(crate) fn push(&mut self, name: &'static str, value: impl Into<String>) {
        self.entries.push((name, value.into()));
    }

    /// First value for `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.entries.iter().map(|(n, v)| (*n, v.as_str()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(n, _)| *n).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ResponseHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

/// Framing for a `multipart/byteranges` body.
///
/// The same strings are used to compute `Content-Length` and to write the
/// body, so the two always agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPlan {
    boundary: String,
    ranges: Vec<ByteRange>,
    total_size: u64,
}

impl MultipartPlan {
    pub fn new(boundary: String, ranges: Vec<ByteRange>, total_size: u64) -> Self {
        MultipartPlan { boundary, ranges, total_size }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn ranges(&self) -> &[ByteRange] {
        &self.ranges
    }

    pub fn content_type(&self) -> String {
        format!("multipart/byteranges; boundary={}", self.boundary)
    }

    /// Boundary line and part headers written before a part's payload.
    pub fn part_header(&self, range: &ByteRange) -> String {
        format!(
            "--{}\r\nContent-Type: {PART_CONTENT_TYPE}\r\nContent-Range: bytes {}-{}/{}\r\n\r\n",
            self.boundary, range.start, range.end, self.total_size
        )
    }

    /// Line break after a part's payload.
    pub fn part_trailer(&self) -> &'static str {
        "\r\n"
    }

    /// Closing delimiter after the last part.
    pub fn closing(&self) -> String {
        format!("--{}--\r\n", self.boundary)
    }

    /// Exact number of body bytes, framing included.
    pub fn content_length(&self) -> u64 {
        let parts: u64 = self
            .ranges
            .iter()
            .map(|range| {
                self.part_header(range).len() as u64 + range.len() + self.part_trailer().len() as u64
            })
            .sum();
        parts + self.closing().len() as u64
    }
}

/// The planned status, headers and body shape for one request.
///
/// Built once by [`Ranged::plan`](crate::Ranged::plan) and not modified
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedResponse {
    pub(crate) mode: ResponseMode,
    pub(crate) headers: ResponseHeaders,
    pub(crate) ranges: Vec<ByteRange>,
    pub(crate) multipart: Option<MultipartPlan>,
    pub(crate) total_size: u64,
}

impl PlannedResponse {
    pub fn mode(&self) -> ResponseMode {
        self.mode
    }

    pub fn status(&self) -> StatusCode {
        self.mode.status()
    }

    /// e.g. `HTTP/1.1 206 Partial Content`
    pub fn status_line(&self) -> String {
        format!("HTTP/1.1 {} {}", self.status().as_u16(), self.mode.reason())
    }

    pub fn headers(&self) -> &ResponseHeaders {
        &self.headers
    }

    /// Requested ranges, in request order.
    pub fn ranges(&self) -> &[ByteRange] {
        &self.ranges
    }

    pub fn multipart(&self) -> Option<&MultipartPlan> {
        self.multipart.as_ref()
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Body length when resource bytes are streamed, `None` for 404/416.
    pub fn content_length(&self) -> Option<u64> {
        self.headers.get("Content-Length").and_then(|v| v.parse().ok())
    }
}

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn last_modified(time: SystemTime) -> String {
    httpdate::fmt_http_date(time)
}

/// Weak tag over the `Last-Modified` value and the size.
pub fn etag(last_modified: &str, total_size: u64) -> String {
    format!("W/\"{:x}:{}\"", md5::compute(last_modified.as_bytes()), total_size)
}

/// Fresh boundary token for a multipart body.
pub(crate) fn generate_boundary() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
