//! Positional splicing of delimiter-separated values.

use crate::types::SpliceRequest;

/// Compute the value produced by a splice.
///
/// Without a target or a position the insert value replaces the target.
/// Otherwise the target is split on the delimiter, the insert value goes in
/// as a new segment at the clamped position, and the segments are re-joined.
/// Existing segments are never dropped or overwritten.
pub fn splice(request: &SpliceRequest) -> String {
    let (Some(target), Some(position)) = (&request.target_value, request.position) else {
        return request.insert_value.clone();
    };
    if target.is_empty() {
        return request.insert_value.clone();
    }

    let mut segments: Vec<&str> = if request.delimiter.is_empty() {
        vec![target.as_str()]
    } else {
        target.split(request.delimiter.as_str()).collect()
    };
    let index = position.min(segments.len());
    segments.insert(index, request.insert_value.as_str());
    segments.join(request.delimiter.as_str())
}

/// Convert an ordinal position (0 = replace, 1 = first segment) to a splice index.
pub fn ordinal_position(ordinal: usize) -> Option<usize> {
    ordinal.checked_sub(1)
}
