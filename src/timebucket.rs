use crate::error::ShardError;

pub const ONE_DAY: i64 = 86400;
pub const ONE_WEEK: i64 = 7 * ONE_DAY;
/// 1970-01-04 00:00:00 UTC, the first Sunday after the epoch.
pub const FIRST_SUNDAY: i64 = 3 * ONE_DAY;
pub const DEFAULT_BUCKET_COUNT: u32 = 24;

pub trait Timed {
    /// Seconds since the epoch.
    fn get_time(&self) -> i64;
}

/// Splits each day into `count` equal slots of `width` seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeBucketer {
    width: i64,
    count: u32,
}

impl TimeBucketer {
    pub fn new(count: u32) -> Result<TimeBucketer, ShardError> {
        if count == 0 || ONE_DAY % i64::from(count) != 0 {
            return Err(ShardError::config(format!(
                "{} buckets per day do not evenly divide a day",
                count
            )));
        }
        Ok(TimeBucketer {
            width: ONE_DAY / i64::from(count),
            count,
        })
    }

    pub fn with_width(width_secs: i64) -> Result<TimeBucketer, ShardError> {
        if width_secs <= 0 || ONE_DAY % width_secs != 0 {
            return Err(ShardError::config(format!(
                "bucket width of {}s does not evenly divide a day",
                width_secs
            )));
        }
        Ok(TimeBucketer {
            width: width_secs,
            count: (ONE_DAY / width_secs) as u32,
        })
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn label(&self, timestamp_secs: i64) -> usize {
        (timestamp_secs.rem_euclid(ONE_DAY) / self.width) as usize
    }

    pub fn label_of<T: Timed>(&self, item: &T) -> usize {
        self.label(item.get_time())
    }

    pub fn labels(&self) -> std::ops::Range<usize> {
        0..self.count as usize
    }
}

/// Start of the Sunday-aligned week containing `timestamp_secs`.
pub fn week_start(timestamp_secs: i64) -> i64 {
    (timestamp_secs - FIRST_SUNDAY).div_euclid(ONE_WEEK) * ONE_WEEK + FIRST_SUNDAY
}
