use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Business-entity category shared by records and the rules that score them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    Lead,
    Opportunity,
    Account,
    Contact,
}

impl Module {
    pub const ALL: [Module; 4] = [
        Module::Lead,
        Module::Opportunity,
        Module::Account,
        Module::Contact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Lead => "lead",
            Module::Opportunity => "opportunity",
            Module::Account => "account",
            Module::Contact => "contact",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Module {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Module::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "Unknown module '{}' (expected one of: lead, opportunity, account, contact)",
                    s
                )
            })
    }
}

/// Anything the scorer can read.
///
/// The module tag comes from the implementing type, so an application maps
/// its own entity types to modules once instead of the scorer guessing.
pub trait Scorable {
    fn module(&self) -> Module;

    /// Look up a field by name. Dotted names (`owner.email`) walk nested objects.
    fn field(&self, name: &str) -> Option<&Value>;
}

impl<T: Scorable + ?Sized> Scorable for &T {
    fn module(&self) -> Module {
        (**self).module()
    }

    fn field(&self, name: &str) -> Option<&Value> {
        (**self).field(name)
    }
}

/// Generic CRM record backed by a JSON object of fields.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Record {
    pub id: String,
    pub module: Module,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, module: Module) -> Self {
        Self {
            id: id.into(),
            module,
            name: None,
            fields: Map::new(),
        }
    }

    /// Builder-style field setter, mostly for tests and fixtures
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Name if set, otherwise the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

impl Scorable for Record {
    fn module(&self) -> Module {
        self.module
    }

    fn field(&self, name: &str) -> Option<&Value> {
        if let Some(value) = self.fields.get(name) {
            return Some(value);
        }

        let mut parts = name.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }
}
