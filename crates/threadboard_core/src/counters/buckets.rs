//! crates/threadboard_core/src/counters/buckets.rs
//!
//! Rolling day buckets used to answer "posted less than a week ago" with a
//! single `array-contains today` query.

pub const DAY_MS: i64 = 86_400_000;
pub const WEEK_DAYS: i64 = 7;

/// Days-since-epoch `d..d+7` for a millisecond timestamp.
pub fn week_buckets(timestamp_ms: i64) -> Vec<i64> {
    let day = timestamp_ms.div_euclid(DAY_MS);
    (day..day + WEEK_DAYS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_start_on_the_posting_day() {
        assert_eq!(week_buckets(0), vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(week_buckets(DAY_MS - 1)[0], 0);
        assert_eq!(week_buckets(DAY_MS)[0], 1);
    }

    #[test]
    fn a_post_is_visible_for_seven_days() {
        let posted = 19_000 * DAY_MS + 5_000;
        let buckets = week_buckets(posted);
        assert_eq!(buckets.len(), 7);
        assert!(buckets.contains(&19_006));
        assert!(!buckets.contains(&19_007));
    }
}
