use std::fs;
use std::path::{Path, PathBuf};

use super::{select_active, RuleStore};
use crate::config::Config;
use crate::error::LookupError;
use crate::records::Module;
use crate::scoring::ScoringRule;

/// Rule store backed by a YAML file with a top-level `rules:` list.
///
/// The file is read on every fetch, so edits made by other tools show up on
/// the next call without a restart.
#[derive(Debug, Clone)]
pub struct FileRuleStore {
    path: PathBuf,
}

impl FileRuleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse every rule in the file, active or not
    pub fn load(&self) -> Result<Vec<ScoringRule>, LookupError> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            LookupError::StoreUnavailable(format!(
                "failed to read rules file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let config: Config = serde_saphyr::from_str(&content).map_err(|e| {
            LookupError::StoreUnavailable(format!(
                "failed to parse rules file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(config.rules)
    }
}

impl RuleStore for FileRuleStore {
    fn active_rules(&self, module: Module) -> Result<Vec<ScoringRule>, LookupError> {
        let rules = self.load()?;
        tracing::debug!(path = %self.path.display(), total = rules.len(), "read rules file");
        Ok(select_active(&rules, module))
    }
}
