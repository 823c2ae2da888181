use std::fs::File;
use std::io::{Error, Read, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::monitor::reconcile::DEFAULT_POLL_INTERVAL;

const CONFIGURATION_PATH: &str = "configuration.json";

#[derive(Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub general: General,
    pub monitor: Monitor,
    pub database: Database,
}

impl Configuration {
    fn save(&self) -> Result<(), Error> {
        let mut file = File::create(CONFIGURATION_PATH)?;
        let json = serde_json::to_string_pretty(&self)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    pub fn load() -> Result<Configuration, Error> {
        let mut file = match File::open(CONFIGURATION_PATH) {
            Ok(file) => file,
            Err(_) => {
                let configuration = Configuration::default();
                configuration.save()?;
                return Ok(configuration);
            },
        };

        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        Ok(serde_json::from_str(&buf)?)
    }

    /// Whether `reloaded` changes a value only read at startup: the framework
    /// prefix, the loop interval or the log buffer size.
    pub fn restart_required(&self, reloaded: &Configuration) -> bool {
        self.general.prefix != reloaded.general.prefix
            || self.monitor.poll_interval() != reloaded.monitor.poll_interval()
            || self.monitor.log_capacity != reloaded.monitor.log_capacity
    }
}

#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct General {
    pub embed_color: u32,
    pub prefix: String,
}

impl Default for General {
    fn default() -> Self {
        General {
            embed_color: 0x3498DB,
            prefix: "!".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct Monitor {
    /// Seconds between two reconciliation passes.
    pub poll_interval: u64,
    /// Log entries kept per guild.
    pub log_capacity: usize,
}

impl Monitor {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval.max(1))
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Monitor {
            poll_interval: DEFAULT_POLL_INTERVAL.as_secs(),
            log_capacity: 100,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    pub name: String,
}

impl Default for Database {
    fn default() -> Self {
        Database {
            name: "appmonitor".to_string(),
        }
    }
}
