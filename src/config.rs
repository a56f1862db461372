use serde::{Deserialize, Serialize};

use crate::{Disposition, RateLimit};

/// Integrator settings for a download.
///
/// Every field has a default, so partial documents deserialize:
///
/// ```
/// use ranged_download::{DownloadConfig, Disposition};
///
/// let config: DownloadConfig = serde_json::from_str(r#"{
///     "download_name": "report.pdf",
///     "disposition": "inline",
///     "rate": { "limit_kb_per_sec": 512 }
/// }"#).unwrap();
///
/// assert_eq!(Disposition::Inline, config.disposition);
/// assert_eq!(16 * 1024, config.rate.buffer_size);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Overrides the resource's own file name.
    pub download_name: Option<String>,
    pub disposition: Disposition,
    pub rate: RateLimit,
}
