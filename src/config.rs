use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::types::Operation;
use crate::Result;

/// Run configuration assembled before the pipeline starts. The core
/// components take this as plain data and never prompt or read flags
/// themselves.
#[derive(Debug, Clone)]
pub struct AdaptorConfig {
    /// Month specifier (single, range, or comma list); required for uploads.
    pub months: Option<String>,
    pub operation: Operation,
    pub dry_run: bool,
    /// Where the CBF side-channel CSV is written.
    pub output: PathBuf,
}

impl Default for AdaptorConfig {
    fn default() -> Self {
        Self {
            months: None,
            operation: Operation::default(),
            dry_run: false,
            output: PathBuf::from("cbf_output.csv"),
        }
    }
}

/// Environment lookup backed by an optional dotenv file, falling back to the
/// process environment. Dotenv entries win so a run can be pinned to a file.
#[derive(Debug, Clone, Default)]
pub struct Env {
    pub dotenv: BTreeMap<String, String>,
}

impl Env {
    pub fn parse_dotenv(contents: &str) -> Self {
        Self {
            dotenv: parse_dotenv(contents),
        }
    }

    /// Load from a dotenv file when one is given and exists; otherwise the
    /// process environment alone.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(path)?;
                Ok(Self::parse_dotenv(&contents))
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.dotenv.get(key) {
            return Some(value.clone());
        }
        std::env::var(key)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }
}

pub fn parse_dotenv(contents: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::<String, String>::new();

    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line).trim();
        let Some((raw_key, raw_value)) = line.split_once('=') else {
            continue;
        };
        let key = raw_key.trim();
        if key.is_empty() {
            continue;
        }

        let mut value = raw_value.trim().to_string();
        if let Some(stripped) = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        {
            value = stripped.to_string();
        }

        if value.trim().is_empty() {
            continue;
        }

        out.insert(key.to_string(), value);
    }

    out
}
