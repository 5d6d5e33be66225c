use anyhow::{Context, Result};
use clap::Args;
use fieldmatch_engine::StaticProfile;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// Reads a JSON document from a file, or from stdin when `source` is `-`.
pub(crate) fn read_json<T: DeserializeOwned>(source: &str) -> Result<T> {
    let raw = if source == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        fs::read_to_string(Path::new(source))
            .with_context(|| format!("Failed to read {source}"))?
    };
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {source}"))
}

/// Where the available profile keys come from.
#[derive(Args, Debug, Clone)]
pub(crate) struct KeyArgs {
    /// Available profile keys, comma separated
    #[arg(long, value_delimiter = ',', conflicts_with = "profile")]
    pub keys: Vec<String>,

    /// Profile JSON document; its non-empty top-level fields are the keys
    #[arg(long)]
    pub profile: Option<String>,
}

impl KeyArgs {
    pub(crate) fn load(&self) -> Result<StaticProfile> {
        if let Some(source) = &self.profile {
            let document: serde_json::Value = read_json(source)?;
            return StaticProfile::from_profile_json(&document)
                .with_context(|| format!("Unusable profile {source}"));
        }
        Ok(StaticProfile::new(
            self.keys
                .iter()
                .map(|key| key.trim())
                .filter(|key| !key.is_empty()),
        ))
    }
}
