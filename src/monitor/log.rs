use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use poise::serenity_prelude::GuildId;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// Bounded per-guild activity log, kept for operators.
///
/// Every entry is mirrored to `tracing`; the buffer only holds the newest
/// `capacity` entries of each guild.
#[derive(Debug)]
pub struct GuildLog {
    capacity: usize,
    entries: Mutex<HashMap<GuildId, VecDeque<LogEntry>>>,
}

impl GuildLog {
    pub fn new(capacity: usize) -> Self {
        GuildLog {
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn append(&self, guild: GuildId, level: LogLevel, message: impl Into<String>) {
        let message = message.into();

        match level {
            LogLevel::Debug => debug!(guild = %guild, "{}", message),
            LogLevel::Info => info!(guild = %guild, "{}", message),
            LogLevel::Warning => warn!(guild = %guild, "{}", message),
            LogLevel::Error => error!(guild = %guild, "{}", message),
        }

        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let buffer = entries.entry(guild).or_default();
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(LogEntry {
            timestamp: Utc::now(),
            level,
            message,
        });
    }

    /// Newest `count` entries of the guild, oldest first.
    pub fn recent(&self, guild: GuildId, count: usize) -> Vec<LogEntry> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries
            .get(&guild)
            .map(|buffer| {
                let skip = buffer.len().saturating_sub(count);
                buffer.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }
}
