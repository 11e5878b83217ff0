//! Capability registry
//!
//! A capability is a named, schema-validated external action. Each one is
//! bound either to a single adapter verb or to a composite planner. The
//! registry is filled once at startup and is read-only afterwards, so it is
//! shared between requests behind an `Arc` without locking.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::types::Domain;

/// Type of a capability parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Text,
    Integer,
    Boolean,
    /// Calendar date, `YYYY-MM-DD`
    Date,
    /// ISO-8601 date-time, offset optional
    DateTime,
    Email,
    EmailList,
}

impl ParamKind {
    /// JSON schema fragment for this kind
    pub fn schema(&self) -> Value {
        match self {
            Self::Text => serde_json::json!({"type": "string"}),
            Self::Integer => serde_json::json!({"type": "integer"}),
            Self::Boolean => serde_json::json!({"type": "boolean"}),
            Self::Date => serde_json::json!({"type": "string", "format": "date"}),
            Self::DateTime => serde_json::json!({"type": "string", "format": "date-time"}),
            Self::Email => serde_json::json!({"type": "string", "format": "email"}),
            Self::EmailList => serde_json::json!({
                "type": "array",
                "items": {"type": "string", "format": "email"}
            }),
        }
    }

    /// Human readable name used in validation errors
    pub fn expected(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Date => "date (YYYY-MM-DD)",
            Self::DateTime => "ISO-8601 datetime",
            Self::Email => "email address",
            Self::EmailList => "list of email addresses",
        }
    }
}

/// How a parameter value is pulled out of free-form instruction text
#[derive(Debug, Clone, PartialEq)]
pub enum Extractor {
    /// Only explicit arguments can fill this parameter
    None,
    /// Every email address in the text
    Emails,
    /// The n-th email address (0-based)
    NthEmail(usize),
    /// Natural or ISO date with time of day ("tomorrow at 2 PM")
    DateTime,
    /// The n-th date mentioned (0-based)
    NthDate(usize),
    /// A duration, normalised to minutes ("for 45 minutes", "1 hour")
    DurationMinutes,
    /// First double-quoted span
    Quoted,
    /// Words following one of the marker phrases, up to a stop word
    After(Vec<String>),
    /// Everything after one of the marker phrases, to the end of the text
    Rest(Vec<String>),
    /// Integer following one of the marker phrases ("top 5", "last 3")
    IntegerAfter(Vec<String>),
    /// First matching keyword mapped to a fixed value
    Keyword(Vec<(String, Value)>),
    /// First of several extractors that finds something
    Any(Vec<Extractor>),
}

impl Extractor {
    pub fn after(markers: &[&str]) -> Self {
        Self::After(markers.iter().map(|m| m.to_lowercase()).collect())
    }

    pub fn rest(markers: &[&str]) -> Self {
        Self::Rest(markers.iter().map(|m| m.to_lowercase()).collect())
    }

    pub fn integer_after(markers: &[&str]) -> Self {
        Self::IntegerAfter(markers.iter().map(|m| m.to_lowercase()).collect())
    }

    pub fn keyword(pairs: &[(&str, Value)]) -> Self {
        Self::Keyword(
            pairs
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.clone()))
                .collect(),
        )
    }
}

/// Parameter declaration within a capability schema
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
    pub extractor: Extractor,
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            default: None,
            extractor: Extractor::None,
            description: String::new(),
        }
    }

    pub fn optional(name: &str, kind: ParamKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn extract(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// External system behind an adapter binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Mail,
    Calendar,
    Ledger,
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mail => write!(f, "mail"),
            Self::Calendar => write!(f, "calendar"),
            Self::Ledger => write!(f, "ledger"),
        }
    }
}

/// Multi-step actions that have a dedicated planner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeKind {
    MeetingInvitation,
}

/// What invoking a capability actually does
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Adapter { adapter: AdapterKind, verb: String },
    Composite(CompositeKind),
}

/// A named, schema-validated action
#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
    pub name: String,
    pub domain: Domain,
    pub description: String,
    pub params: Vec<ParamSpec>,
    pub binding: Binding,
    /// Phrases that make the router consider this capability
    pub triggers: Vec<String>,
}

impl Capability {
    /// Start a capability bound to an adapter verb
    pub fn adapter(name: &str, domain: Domain, adapter: AdapterKind, verb: &str) -> Self {
        Self {
            name: name.to_string(),
            domain,
            description: String::new(),
            params: Vec::new(),
            binding: Binding::Adapter {
                adapter,
                verb: verb.to_string(),
            },
            triggers: Vec::new(),
        }
    }

    /// Start a capability expanded by a composite planner
    pub fn composite(name: &str, domain: Domain, kind: CompositeKind) -> Self {
        Self {
            binding: Binding::Composite(kind),
            ..Self::adapter(name, domain, AdapterKind::Mail, "")
        }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn triggers(mut self, phrases: &[&str]) -> Self {
        self.triggers
            .extend(phrases.iter().map(|p| p.to_lowercase()));
        self
    }

    pub fn param_spec(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// JSON schema describing the capability input, for tool-calling front ends
    pub fn input_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for spec in &self.params {
            let mut prop = spec.kind.schema();
            if let Some(obj) = prop.as_object_mut() {
                if !spec.description.is_empty() {
                    obj.insert("description".into(), Value::String(spec.description.clone()));
                }
                if let Some(default) = &spec.default {
                    obj.insert("default".into(), default.clone());
                }
            }
            properties.insert(spec.name.clone(), prop);
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        json_schema(Value::Object(properties), required)
    }
}

/// Capability summary handed to callers (CLI listing, LLM tool definitions)
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityDefinition {
    pub name: String,
    pub domain: Domain,
    pub description: String,
    pub input_schema: Value,
}

/// Registry of available capabilities, in registration order
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<Capability>>,
    order: Vec<String>,
}

impl CapabilityRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability; the first registration of a name wins
    pub fn register(&mut self, capability: Capability) -> CoreResult<Arc<Capability>> {
        if self.capabilities.contains_key(&capability.name) {
            warn!("Rejecting duplicate capability: {}", capability.name);
            return Err(CoreError::DuplicateCapability {
                name: capability.name,
            });
        }
        debug!(
            "Registering capability: {} ({})",
            capability.name, capability.domain
        );
        let name = capability.name.clone();
        let capability = Arc::new(capability);
        self.capabilities.insert(name.clone(), Arc::clone(&capability));
        self.order.push(name);
        Ok(capability)
    }

    /// Look up a capability by name
    pub fn resolve(&self, name: &str) -> CoreResult<Arc<Capability>> {
        self.capabilities
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::UnknownCapability {
                name: name.to_string(),
            })
    }

    pub fn get(&self, name: &str) -> Option<Arc<Capability>> {
        self.capabilities.get(name).cloned()
    }

    /// Position in registration order, used as the routing tie-break
    pub fn registration_index(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }

    /// Capabilities owned by a domain, in registration order
    pub fn for_domain(&self, domain: Domain) -> Vec<Arc<Capability>> {
        self.all()
            .into_iter()
            .filter(|c| c.domain == domain)
            .collect()
    }

    /// All capabilities in registration order
    pub fn all(&self) -> Vec<Arc<Capability>> {
        self.order
            .iter()
            .filter_map(|name| self.capabilities.get(name).cloned())
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Number of registered capabilities
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Definitions for every capability, optionally limited to one domain
    pub fn definitions(&self, domain: Option<Domain>) -> Vec<CapabilityDefinition> {
        self.all()
            .into_iter()
            .filter(|c| domain.is_none_or(|d| c.domain == d))
            .map(|c| CapabilityDefinition {
                name: c.name.clone(),
                domain: c.domain,
                description: c.description.clone(),
                input_schema: c.input_schema(),
            })
            .collect()
    }
}

/// Helper function to create a JSON schema for capability input
pub fn json_schema(properties: Value, required: Vec<&str>) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send_mail() -> Capability {
        Capability::adapter("send_gmail_message", Domain::Communication, AdapterKind::Mail, "send")
            .describe("Send an email")
            .param(ParamSpec::required("to", ParamKind::Email).extract(Extractor::NthEmail(0)))
            .param(ParamSpec::required("subject", ParamKind::Text))
            .param(ParamSpec::optional("cc", ParamKind::EmailList))
            .triggers(&["Send Email", "email"])
    }

    fn stock() -> Capability {
        Capability::adapter("get_stock_summary", Domain::Inventory, AdapterKind::Ledger, "stock_summary")
            .param(ParamSpec::optional("godown", ParamKind::Text))
    }

    #[test]
    fn test_register_resolve_roundtrip() {
        let mut registry = CapabilityRegistry::new();
        let original = send_mail();
        let registered = registry.register(original.clone()).unwrap();
        let resolved = registry.resolve(&registered.name).unwrap();
        assert_eq!(*resolved, original);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_keeps_first() {
        let mut registry = CapabilityRegistry::new();
        registry.register(send_mail()).unwrap();

        let impostor = Capability::adapter("send_gmail_message", Domain::Sales, AdapterKind::Ledger, "x");
        let err = registry.register(impostor).unwrap_err();
        assert_eq!(
            err,
            CoreError::DuplicateCapability {
                name: "send_gmail_message".to_string()
            }
        );

        let kept = registry.resolve("send_gmail_message").unwrap();
        assert_eq!(kept.domain, Domain::Communication);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_capability() {
        let registry = CapabilityRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.resolve("nope"),
            Err(CoreError::UnknownCapability { .. })
        ));
    }

    #[test]
    fn test_for_domain_keeps_registration_order() {
        let mut registry = CapabilityRegistry::new();
        registry.register(stock()).unwrap();
        registry.register(send_mail()).unwrap();
        registry
            .register(Capability::adapter("get_top_items", Domain::Inventory, AdapterKind::Ledger, "top_items"))
            .unwrap();

        let names: Vec<String> = registry
            .for_domain(Domain::Inventory)
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(names, vec!["get_stock_summary", "get_top_items"]);
        assert_eq!(registry.registration_index("send_gmail_message"), Some(1));
    }

    #[test]
    fn test_input_schema() {
        let schema = send_mail().input_schema();
        let required: Vec<String> =
            serde_json::from_value(schema.get("required").cloned().unwrap()).unwrap();
        assert_eq!(required, vec!["to", "subject"]);
        assert_eq!(schema["properties"]["to"]["format"], "email");
    }

    #[test]
    fn test_triggers_lowercased() {
        assert_eq!(send_mail().triggers, vec!["send email", "email"]);
    }

    #[test]
    fn test_definitions_filter() {
        let mut registry = CapabilityRegistry::new();
        registry.register(send_mail()).unwrap();
        registry.register(stock()).unwrap();
        assert_eq!(registry.definitions(None).len(), 2);
        let inv = registry.definitions(Some(Domain::Inventory));
        assert_eq!(inv.len(), 1);
        assert_eq!(inv[0].name, "get_stock_summary");
    }
}
