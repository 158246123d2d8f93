/// A single time-series data point.
///
/// `timestamp_ns` is nanoseconds since the Unix epoch. `is_set` distinguishes
/// a materialized point from a placeholder slot reserved while decoding a
/// partially-written batch; readers never observe `is_set == false` records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    pub timestamp_ns: u64,
    pub value: f64,
    pub is_set: bool,
}

impl Record {
    pub fn new(timestamp_ns: u64, value: f64) -> Self {
        Record {
            timestamp_ns,
            value,
            is_set: true,
        }
    }

    /// Splits a nanosecond timestamp into its whole-second part and the
    /// nanosecond remainder within that second.
    pub fn split_ts(timestamp_ns: u64) -> (u64, u64) {
        (timestamp_ns / 1_000_000_000, timestamp_ns % 1_000_000_000)
    }
}

/// An ordered sequence of records sharing the same whole-second timestamp
/// part. Below [`LINEAR_THRESHOLD`] entries a linear scan is used to find a
/// timestamp; above it, binary search.
pub const LINEAR_THRESHOLD: usize = 192;

pub type RecordBucket = Vec<Record>;

/// Locates the insertion point for `timestamp_ns` within an ordered bucket,
/// returning `Ok(index)` if a record with that exact timestamp already
/// exists, or `Err(index)` with the index it should be inserted at to keep
/// the bucket sorted.
pub fn bucket_search(bucket: &[Record], timestamp_ns: u64) -> Result<usize, usize> {
    if bucket.len() < LINEAR_THRESHOLD {
        for (i, r) in bucket.iter().enumerate() {
            if r.timestamp_ns == timestamp_ns {
                return Ok(i);
            }
            if r.timestamp_ns > timestamp_ns {
                return Err(i);
            }
        }
        Err(bucket.len())
    } else {
        bucket.binary_search_by_key(&timestamp_ns, |r| r.timestamp_ns)
    }
}
