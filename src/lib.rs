pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod records;
pub mod report;
pub mod search;
pub mod storage;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use error::{StoreError, StoreResult};
pub use records::{DailySummary, Incident, IncidentDraft, IncidentStatus, RecordStore};
