/// How a `Range` header resolves against a file of known size.
#[derive(Debug, PartialEq, Eq)]
pub enum RangeOutcome {
    /// No header, or one we cannot parse; serve the whole file.
    Full,
    /// Inclusive byte range, both ends validated against the file size.
    Partial(u64, u64),
    /// Start or end beyond the file; answered with a client error before any
    /// bytes are read.
    Unsatisfiable,
}

/// Resolves a `bytes=start-end` header value. An omitted end means
/// "through the last byte".
pub fn resolve_range(header: Option<&str>, file_size: u64) -> RangeOutcome {
    let Some(header) = header else {
        return RangeOutcome::Full;
    };
    let header = header.trim().to_lowercase();
    let Some(spec) = header.strip_prefix("bytes=") else {
        return RangeOutcome::Full;
    };
    let Some((start_raw, end_raw)) = spec.split_once('-') else {
        return RangeOutcome::Full;
    };
    let Ok(start) = start_raw.parse::<u64>() else {
        return RangeOutcome::Full;
    };
    let end = if end_raw.is_empty() {
        file_size.saturating_sub(1)
    } else {
        match end_raw.parse::<u64>() {
            Ok(end) => end,
            Err(_) => return RangeOutcome::Full,
        }
    };

    if start >= file_size || end >= file_size || end < start {
        return RangeOutcome::Unsatisfiable;
    }
    RangeOutcome::Partial(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_range() {
        assert_eq!(
            resolve_range(Some("bytes=10-29"), 100),
            RangeOutcome::Partial(10, 29)
        );
        assert_eq!(
            resolve_range(Some("bytes=0-99"), 100),
            RangeOutcome::Partial(0, 99)
        );
    }

    #[test]
    fn open_ended_range_runs_to_last_byte() {
        assert_eq!(
            resolve_range(Some("bytes=90-"), 100),
            RangeOutcome::Partial(90, 99)
        );
    }

    #[test]
    fn out_of_bounds_is_unsatisfiable() {
        assert_eq!(resolve_range(Some("bytes=100-"), 100), RangeOutcome::Unsatisfiable);
        assert_eq!(
            resolve_range(Some("bytes=0-100"), 100),
            RangeOutcome::Unsatisfiable
        );
        assert_eq!(
            resolve_range(Some("bytes=50-10"), 100),
            RangeOutcome::Unsatisfiable
        );
        assert_eq!(resolve_range(Some("bytes=0-"), 0), RangeOutcome::Unsatisfiable);
    }

    #[test]
    fn absent_or_malformed_serves_full_file() {
        assert_eq!(resolve_range(None, 100), RangeOutcome::Full);
        assert_eq!(resolve_range(Some("bytes=abc-"), 100), RangeOutcome::Full);
        assert_eq!(resolve_range(Some("items=0-10"), 100), RangeOutcome::Full);
        assert_eq!(resolve_range(Some("bytes=10"), 100), RangeOutcome::Full);
    }

    #[test]
    fn header_is_case_and_whitespace_tolerant() {
        assert_eq!(
            resolve_range(Some("  Bytes=5-9 "), 100),
            RangeOutcome::Partial(5, 9)
        );
    }
}
