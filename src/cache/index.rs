use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub url: String,
    pub size: u64,
    pub timestamp: i64,
    /// Records written before expiry was tracked here never expire by index
    #[serde(default = "never")]
    pub expires_at: i64,
}

fn never() -> i64 {
    i64::MAX
}

impl IndexRecord {
    pub fn is_live(&self, now: i64) -> bool {
        now <= self.expires_at
    }
}

/// Size/age summary over every entry, persisted separately from the entries.
///
/// `total_size` is kept equal to the sum of `entries[..].size`, and there is
/// at most one record per URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheIndex {
    pub total_size: u64,
    pub entries: Vec<IndexRecord>,
}

impl CacheIndex {
    /// Replaces any record for the same URL. Returns the old one.
    pub fn upsert(&mut self, record: IndexRecord) -> Option<IndexRecord> {
        let old = self.remove(&record.url);
        self.total_size += record.size;
        self.entries.push(record);
        old
    }

    pub fn remove(&mut self, url: &str) -> Option<IndexRecord> {
        let pos = self.entries.iter().position(|r| r.url == url)?;
        let record = self.entries.remove(pos);
        self.total_size = self.total_size.saturating_sub(record.size);
        Some(record)
    }

    pub fn get(&self, url: &str) -> Option<&IndexRecord> {
        self.entries.iter().find(|r| r.url == url)
    }

    /// Removes the record with the smallest write timestamp. Ties go to the
    /// record that was indexed first.
    pub fn pop_oldest(&mut self) -> Option<IndexRecord> {
        let pos = self
            .entries
            .iter()
            .enumerate()
            .min_by_key(|(i, r)| (r.timestamp, *i))
            .map(|(i, _)| i)?;
        let record = self.entries.remove(pos);
        self.total_size = self.total_size.saturating_sub(record.size);
        Some(record)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn oldest_timestamp(&self) -> Option<i64> {
        self.entries.iter().map(|r| r.timestamp).min()
    }

    pub fn newest_timestamp(&self) -> Option<i64> {
        self.entries.iter().map(|r| r.timestamp).max()
    }

    /// Records whose entry has not expired at `now`.
    pub fn live(&self, now: i64) -> impl Iterator<Item = &IndexRecord> {
        self.entries.iter().filter(move |r| r.is_live(now))
    }

    pub fn live_size(&self, now: i64) -> u64 {
        self.live(now).map(|r| r.size).sum()
    }
}
