//! Shared types for bizdesk-core

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical argument mapping: parameter name to JSON value
pub type Arguments = serde_json::Map<String, Value>;

/// Business area owning a set of capabilities
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Financial,
    Inventory,
    Purchase,
    Sales,
    Communication,
}

impl Domain {
    /// All domains in declared delegation order
    pub const ALL: [Domain; 5] = [
        Domain::Financial,
        Domain::Inventory,
        Domain::Purchase,
        Domain::Sales,
        Domain::Communication,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Financial => "financial",
            Self::Inventory => "inventory",
            Self::Purchase => "purchase",
            Self::Sales => "sales",
            Self::Communication => "communication",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "financial" | "finance" => Ok(Self::Financial),
            "inventory" => Ok(Self::Inventory),
            "purchase" | "purchasing" => Ok(Self::Purchase),
            "sales" => Ok(Self::Sales),
            "communication" | "comms" => Ok(Self::Communication),
            other => Err(format!("unknown domain '{}'", other)),
        }
    }
}

/// A single incoming request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    pub id: String,
    pub text: String,
    /// Arguments supplied explicitly by the caller; they win over extracted ones
    #[serde(default)]
    pub arguments: Arguments,
    /// Capability named explicitly by the caller (skips ranking)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    /// Domain forced by the caller (skips classification)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    /// Clock used to resolve relative dates like "tomorrow"
    pub reference_time: NaiveDateTime,
}

impl Instruction {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            arguments: Arguments::new(),
            capability: None,
            domain: None,
            reference_time: chrono::Local::now().naive_local(),
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn with_capability(mut self, name: impl Into<String>) -> Self {
        self.capability = Some(name.into());
        self
    }

    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn at(mut self, reference_time: NaiveDateTime) -> Self {
        self.reference_time = reference_time;
        self
    }
}

/// One agent asking another domain to act on its behalf.
///
/// Delegation always travels through the dispatcher so domains never call
/// each other directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationRequest {
    pub from: Domain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Domain>,
    pub instruction: Instruction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_roundtrip() {
        for domain in Domain::ALL {
            assert_eq!(domain.as_str().parse::<Domain>().unwrap(), domain);
        }
        assert_eq!("Finance".parse::<Domain>().unwrap(), Domain::Financial);
        assert!("marketing".parse::<Domain>().is_err());
    }

    #[test]
    fn test_domain_serde() {
        let json = serde_json::to_string(&Domain::Communication).unwrap();
        assert_eq!(json, "\"communication\"");
    }

    #[test]
    fn test_instruction_builder() {
        let instr = Instruction::new("check stock")
            .with_argument("item_name", "Bolt")
            .with_domain(Domain::Inventory);
        assert_eq!(instr.arguments.get("item_name").and_then(|v| v.as_str()), Some("Bolt"));
        assert_eq!(instr.domain, Some(Domain::Inventory));
        assert!(!instr.id.is_empty());
    }
}
