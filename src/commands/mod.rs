pub mod appmonitor;
pub mod configuration;
