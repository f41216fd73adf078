use std::cmp::Ordering;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// When a session ended, as recorded in the log row.
///
/// A blank `EndSession` cell means the session was still running when the
/// log window was exported. For the "most recent anomaly" comparison such a
/// session is newer than any session with a concrete end time, so `Open`
/// compares greater than every `At(_)` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEnd {
    /// The session had not ended yet (blank or unparsable end cell).
    Open,
    /// The session ended at the given local time.
    At(NaiveDateTime),
}

impl Ord for SessionEnd {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SessionEnd::Open, SessionEnd::Open) => Ordering::Equal,
            (SessionEnd::Open, SessionEnd::At(_)) => Ordering::Greater,
            (SessionEnd::At(_), SessionEnd::Open) => Ordering::Less,
            (SessionEnd::At(a), SessionEnd::At(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for SessionEnd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A single subscriber session parsed from one row of a PSX log file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier (`IdSession`).
    pub session_id: String,
    /// Subscriber identifier (`IdSubscriber`).
    pub subscriber_id: String,
    /// When the session started (`StartSession`). Rows whose start time
    /// fails every accepted format are dropped before a record is built.
    pub start: NaiveDateTime,
    /// When the session ended (`EndSession`).
    pub end: SessionEnd,
    /// Bytes uploaded by the subscriber (`UpTx`).
    pub up_bytes: f64,
    /// Bytes downloaded by the subscriber (`DownTx`).
    pub down_bytes: f64,
}

impl SessionRecord {
    /// Upload minus download. Positive means the session is anomalous.
    pub fn ratio(&self) -> f64 {
        self.up_bytes - self.down_bytes
    }

    /// Whether upload strictly exceeds download.
    pub fn is_anomalous(&self) -> bool {
        self.ratio() > 0.0
    }
}

/// An anomalous session together with its derived ratio value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyCandidate {
    pub record: SessionRecord,
    /// `up_bytes - down_bytes`, always strictly positive.
    pub ratio: f64,
}

impl AnomalyCandidate {
    /// Derive a candidate from a record, or `None` when the session is not
    /// anomalous.
    pub fn from_record(record: SessionRecord) -> Option<Self> {
        if !record.is_anomalous() {
            return None;
        }
        let ratio = record.ratio();
        Some(Self { record, ratio })
    }

    /// The subscriber this candidate belongs to.
    pub fn subscriber_id(&self) -> &str {
        &self.record.subscriber_id
    }

    /// Whether this candidate should replace `current` in the aggregate.
    ///
    /// Later end time wins; an open session beats any closed one. Exact end
    /// ties are broken by the greater session id so the winner does not
    /// depend on merge order.
    pub fn outranks(&self, current: &Self) -> bool {
        match self.record.end.cmp(&current.record.end) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.record.session_id > current.record.session_id,
        }
    }
}
