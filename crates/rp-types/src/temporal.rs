use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Wall-clock creation time of a restore point, in whole seconds since the
/// UNIX epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnixSeconds(pub i64);

impl UnixSeconds {
    /// The current wall-clock time, rounded to the nearest second.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;
        Self((millis + 500) / 1000)
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    /// Index of the fixed-width bucket this instant falls in.
    ///
    /// Uses floor division so instants before the epoch land in negative
    /// buckets instead of sharing bucket 0 with the first period after it.
    pub fn bucket(self, period_secs: u64) -> i64 {
        let period = period_secs.max(1) as i64;
        self.0.div_euclid(period)
    }
}

impl fmt::Display for UnixSeconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_produces_reasonable_timestamp() {
        // After 2020-01-01.
        assert!(UnixSeconds::now().0 > 1_577_836_800);
    }

    #[test]
    fn bucket_floors() {
        assert_eq!(UnixSeconds(0).bucket(3600), 0);
        assert_eq!(UnixSeconds(3599).bucket(3600), 0);
        assert_eq!(UnixSeconds(3600).bucket(3600), 1);
        assert_eq!(UnixSeconds(-1).bucket(3600), -1);
    }

    #[test]
    fn zero_period_does_not_panic() {
        assert_eq!(UnixSeconds(10).bucket(0), 10);
    }
}
