//! Row key allocation for the pre-split data table.
//!
//! Keys have the form `{bucket}_{namespace}_{sequence}` where the bucket is
//! `sequence % BUCKETS` rendered as two digits. Consecutive sequence numbers
//! therefore land in different regions of the table instead of piling onto
//! the last one.

/// Number of pre-split regions in the data table.
pub const BUCKETS: u64 = 30;

/// Compute the row key for `sequence` within `namespace`.
pub fn allocate(namespace: &str, sequence: u64) -> String {
    format!("{:02}_{namespace}_{sequence}", sequence % BUCKETS)
}

/// The parts of a key produced by [`allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowKeyParts<'a> {
    pub bucket: u64,
    pub namespace: &'a str,
    pub sequence: u64,
}

/// Split a data-table row key back into bucket, namespace and sequence.
///
/// Returns `None` for keys that [`allocate`] could not have produced.
pub fn parse(key: &str) -> Option<RowKeyParts<'_>> {
    let (bucket, rest) = key.split_once('_')?;
    let (namespace, sequence) = rest.rsplit_once('_')?;
    if bucket.len() != 2 || namespace.is_empty() {
        return None;
    }

    let bucket: u64 = bucket.parse().ok()?;
    let sequence: u64 = sequence.parse().ok()?;
    if sequence % BUCKETS != bucket {
        return None;
    }

    Some(RowKeyParts {
        bucket,
        namespace,
        sequence,
    })
}

/// Whether a data-table row key belongs to the given exhibit namespace.
pub fn in_namespace(key: &str, namespace: &str) -> bool {
    parse(key).is_some_and(|p| p.namespace == namespace)
}

/// Whether a data-table row key belongs to any exhibit of the given case.
pub fn in_case(key: &str, case_id: &str) -> bool {
    parse(key).is_some_and(|p| {
        p.namespace
            .strip_prefix(case_id)
            .is_some_and(|rest| rest.starts_with('_'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_keys() {
        assert_eq!(allocate("0_0", 1), "01_0_0_1");
        assert_eq!(allocate("0_0", 30), "00_0_0_30");
        assert_eq!(allocate("0_0", 35), "05_0_0_35");
        assert_eq!(allocate("0_0", 45), "15_0_0_45");
    }

    #[test]
    fn first_key_of_exhibit() {
        assert_eq!(allocate("3_2", 0), "00_3_2_0");
    }

    #[test]
    fn consecutive_sequences_spread_over_all_buckets() {
        let mut seen = [0u32; BUCKETS as usize];
        for seq in 0..(BUCKETS * 10) {
            let key = allocate("7_1", seq);
            let bucket: usize = key[..2].parse().unwrap();
            seen[bucket] += 1;
        }
        assert!(seen.iter().all(|&n| n == 10));
    }

    #[test]
    fn parse_round_trips_allocated_keys() {
        let key = allocate("12_4", 1234);
        let parts = parse(&key).unwrap();
        assert_eq!(parts.bucket, 1234 % BUCKETS);
        assert_eq!(parts.namespace, "12_4");
        assert_eq!(parts.sequence, 1234);
    }

    #[test]
    fn parse_rejects_foreign_keys() {
        assert!(parse("0").is_none());
        assert!(parse("0_1").is_none());
        assert!(parse("5_0_0_35").is_none());
        assert!(parse("06_0_0_35").is_none());
        assert!(parse("05__35").is_none());
    }

    #[test]
    fn case_membership_does_not_match_longer_ids() {
        let key = allocate("10_0", 3);
        assert!(in_case(&key, "10"));
        assert!(!in_case(&key, "1"));
        assert!(in_namespace(&key, "10_0"));
        assert!(!in_namespace(&key, "10_01"));
    }
}
