use std::fmt;
use std::sync::LazyLock;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use serde::{Deserialize, Serialize};

// RFC 3986 unreserved characters stay as they are
const FILENAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

static TRIDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)MSIE|Trident").expect("static regex"));
static FIREFOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Firefox").expect("static regex"));
static CHROME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Chrome").expect("static regex"));

/// Whether the client should render the body or save it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Inline,
    #[default]
    Attachment,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a `Content-Disposition` value, picking the filename encoding the
/// client's browser understands.
///
/// ```
/// use ranged_download::{content_disposition, Disposition};
///
/// let firefox = "Mozilla/5.0 (X11; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0";
/// assert_eq!(
///     content_disposition(Disposition::Attachment, Some(firefox), "a b.txt"),
///     "attachment; filename*=UTF-8''a%20b.txt",
/// );
/// ```
pub fn content_disposition(
    disposition: Disposition,
    user_agent: Option<&str>,
    file_name: &str,
) -> String {
    let ua = user_agent.unwrap_or_default();

    if TRIDENT.is_match(ua) {
        format!("{disposition}; filename=\"{}\"", percent_encode(file_name))
    } else if FIREFOX.is_match(ua) {
        format!("{disposition}; filename*=UTF-8''{}", percent_encode(file_name))
    } else if CHROME.is_match(ua) {
        format!("{disposition}; filename=\"{}\"", escape_quoted(file_name))
    } else {
        format!("{disposition}; filename=\"{}\"", percent_encode(file_name))
    }
}

fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, FILENAME_ENCODE_SET).to_string()
}

/// Backslash-escape `\\` and `"`. ASCII control characters are
/// percent-encoded so the result is always a valid header value.
fn escape_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_ascii_control() {
            escaped.push_str(&format!("%{:02X}", c as u32));
            continue;
        }
        if c == '\\' || c == '"' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
