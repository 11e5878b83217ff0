//! Intent router
//!
//! Ranks a domain's capabilities against an instruction, extracts their
//! arguments from the text and validates them against the parameter schema.
//!
//! Matching is purely lexical. Every capability declares trigger phrases;
//! a phrase matches when its tokens appear contiguously in the instruction,
//! and contributes its token count to the score. Longer phrases therefore
//! outweigh single words ("send invitation" beats "send").

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::capability::{Capability, CapabilityRegistry, Extractor, ParamKind, ParamSpec};
use crate::error::{CoreError, CoreResult};
use crate::extract::{self, DATE_FORMAT, DATETIME_FORMAT};
use crate::types::{Arguments, Domain, Instruction};

/// Router tuning
#[derive(Debug, Clone, Serialize)]
pub struct RouterConfig {
    /// Candidates scoring at least this fraction of the top score are
    /// considered equally plausible
    pub ambiguity_ratio: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            ambiguity_ratio: 0.75,
        }
    }
}

/// One ranked capability with the arguments found for it
#[derive(Debug, Clone)]
pub struct Candidate {
    pub capability: Arc<Capability>,
    pub arguments: Arguments,
    pub score: usize,
    pub confidence: f64,
}

impl Candidate {
    pub fn name(&self) -> &str {
        &self.capability.name
    }
}

/// Result of routing one instruction
#[derive(Debug, Clone)]
pub enum RouteOutcome {
    /// A single capability won; its arguments are validated
    Selected(Candidate),
    /// Several capabilities are comparably plausible, best first.
    /// Arguments are extracted but not yet validated.
    Ambiguous(Vec<Candidate>),
}

impl RouteOutcome {
    pub fn candidates(&self) -> Vec<&Candidate> {
        match self {
            Self::Selected(c) => vec![c],
            Self::Ambiguous(cs) => cs.iter().collect(),
        }
    }

    /// Highest score, earliest registration
    pub fn pick_default(self) -> Option<Candidate> {
        match self {
            Self::Selected(c) => Some(c),
            Self::Ambiguous(cs) => cs.into_iter().next(),
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous(_))
    }
}

/// Router over the capabilities of one domain
pub struct IntentRouter {
    registry: Arc<CapabilityRegistry>,
    domain: Domain,
    config: RouterConfig,
}

impl IntentRouter {
    pub fn new(registry: Arc<CapabilityRegistry>, domain: Domain, config: RouterConfig) -> Self {
        Self {
            registry,
            domain,
            config,
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Every capability of the domain with a non-zero score, best first
    pub fn rank(&self, instruction: &Instruction) -> Vec<Candidate> {
        let tokens = extract::tokenize(&instruction.text);
        let mut ranked: Vec<(usize, Candidate)> = self
            .registry
            .for_domain(self.domain)
            .into_iter()
            .enumerate()
            .filter_map(|(index, capability)| {
                let score = score(&capability, &tokens);
                if score == 0 {
                    return None;
                }
                let arguments = collect_arguments(&capability, instruction);
                Some((
                    index,
                    Candidate {
                        capability,
                        arguments,
                        score,
                        confidence: confidence(score),
                    },
                ))
            })
            .collect();

        // stable: equal scores keep registration order
        ranked.sort_by(|(ia, a), (ib, b)| b.score.cmp(&a.score).then(ia.cmp(ib)));
        ranked.into_iter().map(|(_, c)| c).collect()
    }

    /// Pick the capability for an instruction.
    ///
    /// An explicitly named capability skips ranking. A single winner is
    /// validated before it is returned, so a missing required argument
    /// fails here rather than at an adapter.
    pub fn route(&self, instruction: &Instruction) -> CoreResult<RouteOutcome> {
        if let Some(name) = &instruction.capability {
            let capability = self.registry.resolve(name)?;
            if capability.domain != self.domain {
                return Err(CoreError::DomainMismatch {
                    capability: name.clone(),
                    owner: capability.domain,
                    requested: self.domain,
                });
            }
            debug!("Instruction {} names capability {}", instruction.id, name);
            let arguments = collect_arguments(&capability, instruction);
            let candidate = Candidate {
                capability,
                arguments,
                score: 0,
                confidence: 1.0,
            };
            return Ok(RouteOutcome::Selected(self.validate(candidate)?));
        }

        let ranked = self.rank(instruction);
        let Some(top) = ranked.first().map(|c| c.score) else {
            debug!("No {} capability matched instruction {}", self.domain, instruction.id);
            return Err(CoreError::NoMatchingCapability {
                domain: self.domain,
            });
        };

        let threshold = self.config.ambiguity_ratio * top as f64;
        let mut comparable: Vec<Candidate> = ranked
            .into_iter()
            .filter(|c| c.score as f64 >= threshold)
            .collect();

        if comparable.len() > 1 {
            debug!(
                "Instruction {} is ambiguous between {}",
                instruction.id,
                comparable
                    .iter()
                    .map(|c| c.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            return Ok(RouteOutcome::Ambiguous(comparable));
        }

        let winner = comparable.remove(0);
        debug!(
            "Routed instruction {} to {} (score {}, confidence {:.2})",
            instruction.id,
            winner.name(),
            winner.score,
            winner.confidence
        );
        Ok(RouteOutcome::Selected(self.validate(winner)?))
    }

    /// Validate a candidate's arguments in place
    pub fn validate(&self, mut candidate: Candidate) -> CoreResult<Candidate> {
        candidate.arguments = validate_arguments(&candidate.capability, candidate.arguments)?;
        Ok(candidate)
    }
}

/// Sum of token counts of matched trigger phrases
pub fn score(capability: &Capability, tokens: &[String]) -> usize {
    capability
        .triggers
        .iter()
        .filter(|phrase| extract::contains_phrase(tokens, phrase))
        .map(|phrase| extract::tokenize(phrase).len())
        .sum()
}

/// Maps a raw score into (0, 1); 0 stays 0
pub fn confidence(score: usize) -> f64 {
    let s = score as f64;
    s / (s + 1.0)
}

/// Arguments extracted from the text, overridden by explicit ones
pub fn collect_arguments(capability: &Capability, instruction: &Instruction) -> Arguments {
    let mut arguments = Arguments::new();
    for spec in &capability.params {
        if let Some(value) = extract_param(spec, instruction) {
            arguments.insert(spec.name.clone(), value);
        }
    }
    for (name, value) in &instruction.arguments {
        arguments.insert(name.clone(), value.clone());
    }
    arguments
}

fn extract_param(spec: &ParamSpec, instruction: &Instruction) -> Option<Value> {
    run_extractor(&spec.extractor, spec.kind, instruction)
}

fn run_extractor(extractor: &Extractor, kind: ParamKind, instruction: &Instruction) -> Option<Value> {
    let text = instruction.text.as_str();
    let now = instruction.reference_time;
    match extractor {
        Extractor::None => None,
        Extractor::Emails => {
            let found = extract::emails(text);
            match kind {
                ParamKind::EmailList if !found.is_empty() => Some(Value::from(found)),
                _ => found.into_iter().next().map(Value::String),
            }
        }
        Extractor::NthEmail(n) => extract::emails(text).into_iter().nth(*n).map(Value::String),
        Extractor::DateTime => extract::datetime(text, now).map(|dt| match kind {
            ParamKind::Date => Value::String(dt.format(DATE_FORMAT).to_string()),
            _ => Value::String(dt.format(DATETIME_FORMAT).to_string()),
        }),
        Extractor::NthDate(n) => extract::dates(text, now.date())
            .into_iter()
            .nth(*n)
            .map(|d| Value::String(d.format(DATE_FORMAT).to_string())),
        Extractor::DurationMinutes => extract::duration_minutes(text).map(Value::from),
        Extractor::Quoted => extract::quoted(text).map(Value::String),
        Extractor::After(markers) => extract::after_marker(text, markers).map(Value::String),
        Extractor::Rest(markers) => extract::rest_after(text, markers).map(Value::String),
        Extractor::IntegerAfter(markers) => extract::integer_after(text, markers).map(Value::from),
        Extractor::Keyword(pairs) => {
            let tokens = extract::tokenize(text);
            pairs
                .iter()
                .find(|(phrase, _)| extract::contains_phrase(&tokens, phrase))
                .map(|(_, value)| value.clone())
        }
        Extractor::Any(extractors) => extractors
            .iter()
            .find_map(|e| run_extractor(e, kind, instruction)),
    }
}

/// Check arguments against the capability schema.
///
/// Fills defaults for absent optional parameters, normalises values to their
/// canonical JSON shape and rejects names the schema does not declare.
pub fn validate_arguments(capability: &Capability, arguments: Arguments) -> CoreResult<Arguments> {
    if let Some((name, value)) = arguments
        .iter()
        .find(|(name, _)| capability.param_spec(name).is_none())
    {
        return Err(CoreError::ArgumentFormat {
            capability: capability.name.clone(),
            parameter: name.clone(),
            expected: "a declared parameter".to_string(),
            found: describe(value),
        });
    }

    let mut validated = Arguments::new();
    for spec in &capability.params {
        match arguments.get(&spec.name).filter(|v| !v.is_null()) {
            Some(value) => {
                let normalised =
                    normalise(spec.kind, value).ok_or_else(|| CoreError::ArgumentFormat {
                        capability: capability.name.clone(),
                        parameter: spec.name.clone(),
                        expected: spec.kind.expected().to_string(),
                        found: describe(value),
                    })?;
                validated.insert(spec.name.clone(), normalised);
            }
            None if spec.required => {
                return Err(CoreError::MissingArgument {
                    capability: capability.name.clone(),
                    parameter: spec.name.clone(),
                });
            }
            None => {
                if let Some(default) = &spec.default {
                    validated.insert(spec.name.clone(), default.clone());
                }
            }
        }
    }
    Ok(validated)
}

/// Coerce a value into the canonical shape of `kind`, or `None` if it does
/// not fit
fn normalise(kind: ParamKind, value: &Value) -> Option<Value> {
    match kind {
        ParamKind::Text => match value {
            Value::String(s) if !s.trim().is_empty() => Some(Value::String(s.trim().to_string())),
            Value::Number(n) => Some(Value::String(n.to_string())),
            _ => None,
        },
        ParamKind::Integer => match value {
            Value::Number(n) => n.as_i64().map(Value::from),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
            _ => None,
        },
        ParamKind::Boolean => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Some(Value::Bool(true)),
                "false" | "no" | "n" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        ParamKind::Date => {
            let s = value.as_str()?.trim();
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .map(|d| Value::String(d.format(DATE_FORMAT).to_string()))
        }
        ParamKind::DateTime => {
            let s = value.as_str()?.trim();
            if DateTime::parse_from_rfc3339(s).is_ok() {
                return Some(Value::String(s.to_string()));
            }
            NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
                .ok()
                .map(|dt| Value::String(dt.format(DATETIME_FORMAT).to_string()))
        }
        ParamKind::Email => {
            let s = value.as_str()?.trim();
            extract::is_email(s).then(|| Value::String(s.to_string()))
        }
        ParamKind::EmailList => {
            let items: Vec<String> = match value {
                Value::Array(items) => items
                    .iter()
                    .map(|v| v.as_str().map(|s| s.trim().to_string()))
                    .collect::<Option<Vec<_>>>()?,
                Value::String(s) => s
                    .split([',', ';'])
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect(),
                _ => return None,
            };
            items
                .iter()
                .all(|s| extract::is_email(s))
                .then(|| Value::from(items))
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s),
        other => other.to_string(),
    }
}
