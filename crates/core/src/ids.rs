//! Composite stream identifiers: `<series id>:<upstream episode id>`.

pub const DELIMITER: char = ':';

/// Join a series id (which must not contain the delimiter) and an upstream episode id.
pub fn compose_stream_id(series_id: &str, episode_id: &str) -> String {
    debug_assert!(!series_id.contains(DELIMITER));
    format!("{series_id}{DELIMITER}{episode_id}")
}

/// Split on the first delimiter, so the episode part may itself contain `:`.
pub fn decompose_stream_id(stream_id: &str) -> Option<(&str, &str)> {
    stream_id.split_once(DELIMITER)
}
