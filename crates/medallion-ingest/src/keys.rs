//! Object key derivation
//!
//! ```text
//! {tier}/{source}/[{k1}={v1}/.../]{source}_{YYYYMMDD_HHMMSS}.{ext}
//! ```
//!
//! Pure functions with no I/O. Partition segments keep the caller's order.

use chrono::NaiveDateTime;
use medallion_common::types::{Format, PartitionKey, Tier};

/// Timestamp layout embedded in object file names
pub const KEY_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub fn build_object_key(
    tier: Tier,
    source: &str,
    format: Format,
    processing: NaiveDateTime,
    partition: Option<&PartitionKey>,
) -> String {
    let mut key = tier_prefix(tier, source);

    if let Some(partition) = partition.filter(|p| !p.is_empty()) {
        key.push_str(&partition.to_path());
        key.push('/');
    }

    key.push_str(&format!(
        "{}_{}.{}",
        source,
        processing.format(KEY_TIMESTAMP_FORMAT),
        format.extension()
    ));
    key
}

/// Prefix under which every object of `source` in `tier` lives
pub fn tier_prefix(tier: Tier, source: &str) -> String {
    format!("{}/{}/", tier, source)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(hh, mm, ss)
            .unwrap()
    }

    #[test]
    fn test_unpartitioned_key() {
        let key = build_object_key(
            Tier::Bronze,
            "transactions",
            Format::Parquet,
            at(2024, 3, 2, 10, 15, 0),
            None,
        );
        assert_eq!(key, "bronze/transactions/transactions_20240302_101500.parquet");
    }

    #[test]
    fn test_partitioned_key_keeps_caller_order() {
        let date = at(2024, 3, 2, 0, 0, 0);
        let daily = PartitionKey::daily(date.date());
        let key = build_object_key(Tier::Raw, "kaggle", Format::Csv, date, Some(&daily));
        assert_eq!(
            key,
            "raw/kaggle/year=2024/month=03/day=02/kaggle_20240302_000000.csv"
        );

        let reversed = PartitionKey::new()
            .with("day", "02")
            .unwrap()
            .with("year", "2024")
            .unwrap();
        let key = build_object_key(Tier::Raw, "kaggle", Format::Csv, date, Some(&reversed));
        assert_eq!(key, "raw/kaggle/day=02/year=2024/kaggle_20240302_000000.csv");
    }

    #[test]
    fn test_empty_partition_is_omitted() {
        let date = at(2024, 3, 2, 0, 0, 0);
        let with_empty = build_object_key(
            Tier::Silver,
            "banking",
            Format::Json,
            date,
            Some(&PartitionKey::new()),
        );
        let without = build_object_key(Tier::Silver, "banking", Format::Json, date, None);
        assert_eq!(with_empty, without);
    }

    #[test]
    fn test_distinct_inputs_distinct_keys() {
        let date = at(2024, 3, 2, 10, 15, 0);
        let base = build_object_key(Tier::Bronze, "transactions", Format::Parquet, date, None);

        assert_ne!(base, build_object_key(Tier::Silver, "transactions", Format::Parquet, date, None));
        assert_ne!(base, build_object_key(Tier::Bronze, "transfers", Format::Parquet, date, None));
        assert_ne!(base, build_object_key(Tier::Bronze, "transactions", Format::Csv, date, None));
        assert_ne!(
            base,
            build_object_key(Tier::Bronze, "transactions", Format::Parquet, at(2024, 3, 2, 10, 15, 1), None)
        );
    }

    #[test]
    fn test_tier_prefix() {
        assert_eq!(tier_prefix(Tier::Raw, "transactions"), "raw/transactions/");
    }

    proptest! {
        #[test]
        fn prop_key_is_deterministic(
            source in "[a-z][a-z0-9_]{0,15}",
            secs in 0i64..4_000_000_000i64,
            year in 1990u32..2100,
        ) {
            let ts = chrono::DateTime::from_timestamp(secs, 0).unwrap().naive_utc();
            let partition = PartitionKey::new().with("year", year.to_string()).unwrap();

            let first = build_object_key(Tier::Silver, &source, Format::Parquet, ts, Some(&partition));
            let second = build_object_key(Tier::Silver, &source, Format::Parquet, ts, Some(&partition));

            prop_assert_eq!(&first, &second);
            let expected_prefix = format!("silver/{}/year={}/", source, year);
            prop_assert!(first.starts_with(&expected_prefix));
        }
    }
}
