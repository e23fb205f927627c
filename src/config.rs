//! Run configuration: the typed counterpart of the CLI surface in spec
//! §6.1. A higher-level CLI parses flags into this struct (or loads it
//! from TOML, when the `config-toml` feature is enabled); this crate never
//! touches `std::env::args` itself.

use serde::{Deserialize, Serialize};

use crate::error::{AggError, Result};

/// One `-O <field>[:asc]` sort-spec entry, kept as plain owned strings so
/// this struct stays serde-friendly independent of the view definition it
/// will later be resolved against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortFieldConfig {
    pub name: String,
    #[serde(default)]
    pub ascending: bool,
}

/// Output rendering mode (`-o`). The renderers themselves are outside this
/// crate's scope; this is only the selector a runner dispatches on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    #[default]
    Table,
    Json,
    Csv,
}

/// Typed configuration for one aggregation run (spec §6.1).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    /// `-r`: glob pattern(s) for input files.
    pub input_glob: String,
    /// `-a`: comma-separated key tokens.
    pub keys: String,
    /// `-s`: comma-separated value tokens.
    pub values: String,
    /// `-O`: sort specification, applied in order.
    #[serde(default)]
    pub sort: Vec<SortFieldConfig>,
    /// `-n`: top-N limit. `None` means unbounded (emit every group).
    #[serde(default)]
    pub top_n: Option<usize>,
    /// `-t`: worker thread count. `None` defers to the runner's default
    /// (spec §2.3: number of logical CPUs).
    #[serde(default)]
    pub threads: Option<usize>,
    /// `-o`: output rendering mode.
    #[serde(default)]
    pub output_mode: OutputMode,
    /// `-d`: translate IPs to hostnames. Outside this crate's scope to
    /// perform, but carried through so a CLI layer can act on it.
    #[serde(default)]
    pub translate_hostnames: bool,
    /// `-f` / `-F`: raw filter expression text. The expression compiler
    /// itself is an external collaborator (spec §6.4); this crate only
    /// carries the source text through to it.
    #[serde(default)]
    pub input_filter_expr: Option<String>,
    #[serde(default)]
    pub output_filter_expr: Option<String>,
}

impl RunConfig {
    /// Construct the minimal valid configuration: an input glob and a view
    /// definition, everything else defaulted.
    #[must_use]
    pub fn new(input_glob: impl Into<String>, keys: impl Into<String>, values: impl Into<String>) -> Self {
        Self {
            input_glob: input_glob.into(),
            keys: keys.into(),
            values: values.into(),
            sort: Vec::new(),
            top_n: None,
            threads: None,
            output_mode: OutputMode::default(),
            translate_hostnames: false,
            input_filter_expr: None,
            output_filter_expr: None,
        }
    }

    /// Reject configurations that can be ruled out before touching the IE
    /// dictionary or opening any file (spec §4.10: invalid configuration is
    /// fatal at startup).
    pub fn validate(&self) -> Result<()> {
        if self.input_glob.trim().is_empty() {
            return Err(AggError::config("input glob must not be empty"));
        }
        if self.keys.trim().is_empty() && self.values.trim().is_empty() {
            return Err(AggError::config("at least one key or value field is required"));
        }
        if let Some(0) = self.threads {
            return Err(AggError::config("thread count must be at least 1"));
        }
        Ok(())
    }

    #[must_use]
    pub fn resolved_thread_count(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

#[cfg(feature = "config-toml")]
impl RunConfig {
    /// Parse a `RunConfig` from a TOML document (spec §2.3).
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| AggError::config(format!("invalid run config: {e}")))
    }

    /// Load and parse a `RunConfig` from a TOML file on disk.
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| AggError::io(path, e))?;
        Self::from_toml_str(&text)
    }
}
