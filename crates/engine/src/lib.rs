//! # Fieldmatch Engine
//!
//! Decides which profile key fills a form field.
//!
//! [`MatchCoordinator`] walks the tiers (heuristics, local cache, shared
//! cache, oracle), merges their answers through a [`ResolutionLedger`] and
//! writes confirmed matches back. [`ConfidenceThresholdGate`] turns the
//! result into a [`FillDecision`].

mod collaborators;
mod config;
mod coordinator;
mod error;
mod gate;
mod ledger;

pub use collaborators::{
    parse_flag, EnvSettings, ProfileStore, SettingsStore, StaticProfile, StaticSettings,
    ENV_ORACLE_ENABLED, ENV_ORACLE_KEY,
};
pub use config::{
    CacheConfig, GateConfig, HeuristicsConfig, MatcherConfig, ENV_MIN_CONFIDENCE, ENV_ORACLE_URL,
    ENV_SHARED_CACHE_URL,
};
pub use coordinator::{CacheStats, Collaborators, MatchCoordinator};
pub use error::{ConfigError, EngineError, Result};
pub use gate::{gate, ConfidenceThresholdGate, FillDecision};
pub use ledger::ResolutionLedger;
