use serde::{Deserialize, Serialize};

use crate::scoring::ScoringRule;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub rules: Vec<ScoringRule>,
}
