use chrono::{DateTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Date encoding understood by the transport worker.
///
/// `utc` is milliseconds since the epoch, `offset` the UTC offset in
/// milliseconds of the zone the date was expressed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportDate {
    pub utc: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tzid: Option<String>,
}

impl TransportDate {
    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        let offset_secs = dt.offset().fix().local_minus_utc();
        TransportDate {
            utc: dt.timestamp_millis(),
            offset: i64::from(offset_secs) * 1000,
            tzid: None,
        }
    }

    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.utc)
    }

    pub fn is_before(&self, other: &DateTime<Utc>) -> bool {
        self.utc < other.timestamp_millis()
    }
}

impl PartialOrd for TransportDate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TransportDate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.utc
            .cmp(&other.utc)
            .then_with(|| self.offset.cmp(&other.offset))
            .then_with(|| self.tzid.cmp(&other.tzid))
    }
}

impl From<DateTime<Utc>> for TransportDate {
    fn from(dt: DateTime<Utc>) -> Self {
        TransportDate::from_datetime(&dt)
    }
}
