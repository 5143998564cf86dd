//! Parameter validation and small helpers.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;

use crate::error::BackupError;

const MAX_VOLUME_NAME_LEN: usize = 64;

/// Lexical rule for volume names: 1 to 64 characters of
/// `[A-Za-z0-9._-]`, starting with an alphanumeric.
pub fn valid_volume_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_VOLUME_NAME_LEN {
        return false;
    }
    let mut chars = name.chars();
    let first = chars.next().expect("non-empty name");
    first.is_ascii_alphanumeric()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Parses `key=value` labels into a map.
///
/// Keys follow the same lexical rule as volume names; duplicates are
/// rejected.
pub fn parse_labels(labels: &[String]) -> Result<HashMap<String, String>, BackupError> {
    let mut map = HashMap::with_capacity(labels.len());
    for label in labels {
        let (key, value) = label
            .split_once('=')
            .ok_or_else(|| BackupError::InvalidLabel(label.clone()))?;
        if !valid_volume_name(key) {
            return Err(BackupError::InvalidLabel(label.clone()));
        }
        if map.insert(key.to_string(), value.to_string()).is_some() {
            return Err(BackupError::InvalidLabel(label.clone()));
        }
    }
    Ok(map)
}

/// Generates a `prefix-xxxxxxxx` name from a random 32-bit suffix.
pub fn generate_name(prefix: &str) -> String {
    format!("{prefix}-{:08x}", rand::random::<u32>())
}

/// Renders a job status (or any response object) as indented JSON for
/// tooling output.
pub fn response_output<T: serde::Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

/// Undoes the URL escaping applied to backup URLs in transport.
pub fn unescape_url(url: &str) -> Result<String, BackupError> {
    percent_decode_str(url)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|err| BackupError::InvalidUrl(format!("{url}: {err}")))
}
