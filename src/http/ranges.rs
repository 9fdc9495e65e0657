//! `Range: bytes=...` header parsing with the validating semantics.

/// Why a `Range` header was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    /// The header is not syntactically a byte-range set; answer `400`.
    Malformed,
    /// Well-formed but targets positions outside the file; answer `416`.
    Unsatisfiable,
}

/// Parses a `Range` header value against a file of `file_size` bytes.
///
/// An absent or empty header means the full file and yields an empty
/// list. Each returned pair is an inclusive `(start, end)` with
/// `end < file_size`. Every input produces either a range list or an
/// explicit error; nothing panics.
pub fn parse_ranges(range_str: &str, file_size: u64) -> Result<Vec<(u64, u64)>, RangeError> {
    let range_str = range_str.trim();
    if range_str.is_empty() {
        return Ok(Vec::new());
    }
    let list = range_str
        .strip_prefix("bytes=")
        .ok_or(RangeError::Malformed)?;
    if list.contains("--") {
        return Err(RangeError::Malformed);
    }
    if file_size == 0 {
        return Err(RangeError::Unsatisfiable);
    }
    if list.trim() == "-" {
        return Ok(vec![(0, file_size - 1)]);
    }

    let mut ranges = Vec::new();
    for part in list.split(',') {
        let part = part.trim();
        let (first, second) = match part.split_once('-') {
            Some(pair) => pair,
            None => (part, ""),
        };
        let first = first.trim();
        let second = second.trim();

        let start: Option<u64> = if first.is_empty() {
            None
        } else {
            Some(first.parse().map_err(|_| RangeError::Malformed)?)
        };
        let end: Option<u64> = if second.is_empty() {
            None
        } else {
            Some(second.parse().map_err(|_| RangeError::Malformed)?)
        };

        let (start, mut end) = match (start, end) {
            // suffix form: last `len` bytes
            (None, Some(len)) => (file_size.saturating_sub(len), file_size - 1),
            (Some(start), Some(end)) => (start, end),
            (Some(start), None) => (start, file_size - 1),
            (None, None) => return Err(RangeError::Malformed),
        };

        if start > 0 && (start >= file_size || start == end) {
            return Err(RangeError::Unsatisfiable);
        }
        if end >= file_size {
            end = file_size - 1;
        }
        if start > end {
            return Err(RangeError::Unsatisfiable);
        }

        ranges.push((start, end));
    }
    Ok(ranges)
}

/// Total byte count covered by a range list.
pub fn ranges_len(ranges: &[(u64, u64)]) -> u64 {
    ranges.iter().map(|(s, e)| e - s + 1).sum()
}
