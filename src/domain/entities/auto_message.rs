use serde::{Deserialize, Serialize};

/// A message broadcast into the channel on a fixed timer
#[derive(Debug, Clone, PartialEq)]
pub struct AutoMessage {
    pub id: String,
    pub text: String,
    pub interval_minutes: u32,
    pub enabled: bool,
    /// Unix epoch seconds of the last broadcast, 0 when never sent.
    pub last_sent: f64,
    pub sent_count: u64,
}

impl AutoMessage {
    pub fn new(text: impl Into<String>, interval_minutes: u32) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            text: text.into(),
            interval_minutes,
            enabled: true,
            last_sent: 0.0,
            sent_count: 0,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn interval_secs(&self) -> f64 {
        f64::from(self.interval_minutes) * 60.0
    }

    /// Eligible iff `now - last_sent >= interval * 60`.
    pub fn is_due(&self, now: f64) -> bool {
        self.enabled && now - self.last_sent >= self.interval_secs()
    }

    pub fn mark_sent(&mut self, now: f64) {
        self.last_sent = now;
        self.sent_count += 1;
    }

    pub fn from_record(id: impl Into<String>, record: AutoMessageRecord) -> Self {
        Self {
            id: id.into(),
            text: record.message,
            interval_minutes: record.interval.max(1),
            enabled: record.enabled,
            last_sent: record.last_sent,
            sent_count: record.sent_count,
        }
    }

    pub fn to_record(&self) -> AutoMessageRecord {
        AutoMessageRecord {
            message: self.text.clone(),
            interval: self.interval_minutes,
            enabled: self.enabled,
            sent_count: self.sent_count,
            last_sent: self.last_sent,
        }
    }
}

fn default_interval() -> u32 {
    5
}

fn default_enabled() -> bool {
    true
}

/// On-disk shape of a single entry inside the `auto_messages` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoMessageRecord {
    pub message: String,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub sent_count: u64,
    #[serde(default)]
    pub last_sent: f64,
}
