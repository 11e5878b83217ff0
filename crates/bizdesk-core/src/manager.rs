//! Manager, the top-level entry point
//!
//! Dispatches an instruction to its domain, routes it to a capability,
//! plans the invocation and runs the plan through the orchestrator.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::capability::CapabilityRegistry;
use crate::catalog;
use crate::composite;
use crate::dispatcher::{Dispatcher, DomainScore};
use crate::error::{CoreError, CoreResult};
use crate::orchestrator::{
    CompositeAction, CompositeReport, Orchestrator, OrchestratorConfig, StepInvoker,
};
use crate::router::{Candidate, IntentRouter, RouteOutcome, RouterConfig};
use crate::types::{Arguments, DelegationRequest, Domain, Instruction};

/// What to do when several capabilities match equally well
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Return the candidates and let the caller choose
    #[default]
    Ask,
    /// Take the best candidate, earliest registered first
    DeclaredOrder,
}

#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    pub router: RouterConfig,
    pub tie_break: TieBreak,
    pub orchestrator: OrchestratorConfig,
}

/// Ranked capability as reported to the caller
#[derive(Debug, Clone, Serialize)]
pub struct CandidateSummary {
    pub capability: String,
    pub score: usize,
    pub confidence: f64,
    pub arguments: Arguments,
}

impl From<&Candidate> for CandidateSummary {
    fn from(c: &Candidate) -> Self {
        Self {
            capability: c.name().to_string(),
            score: c.score,
            confidence: c.confidence,
            arguments: c.arguments.clone(),
        }
    }
}

/// A handled instruction
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub instruction_id: String,
    pub domain: Domain,
    pub capability: String,
    pub arguments: Arguments,
    pub report: CompositeReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Completed(Response),
    /// Several capabilities fit; nothing was executed
    NeedsClarification {
        instruction_id: String,
        domain: Domain,
        candidates: Vec<CandidateSummary>,
    },
}

/// Dispatch and ranking of an instruction, without execution
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub instruction_id: String,
    pub domain: Domain,
    pub domain_scores: Vec<DomainScore>,
    pub ambiguous: bool,
    pub candidates: Vec<CandidateSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<CompositeAction>,
}

pub struct Manager {
    registry: Arc<CapabilityRegistry>,
    dispatcher: Dispatcher,
    orchestrator: Orchestrator,
    config: ManagerConfig,
}

impl Manager {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        dispatcher: Dispatcher,
        invoker: Arc<dyn StepInvoker>,
        config: ManagerConfig,
    ) -> Self {
        info!(
            "Manager: {} capabilities across {} domains",
            registry.len(),
            dispatcher.domains().len()
        );
        let orchestrator =
            Orchestrator::new(Arc::clone(&registry), invoker, config.orchestrator.clone());
        Self {
            registry,
            dispatcher,
            orchestrator,
            config,
        }
    }

    /// Manager over the built-in catalog
    pub fn with_defaults(invoker: Arc<dyn StepInvoker>, config: ManagerConfig) -> CoreResult<Self> {
        let registry = Arc::new(catalog::default_registry()?);
        Ok(Self::new(
            registry,
            catalog::default_dispatcher(),
            invoker,
            config,
        ))
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn router(&self, domain: Domain) -> IntentRouter {
        IntentRouter::new(Arc::clone(&self.registry), domain, self.config.router.clone())
    }

    /// Forced domain, else the named capability's domain, else the dispatcher
    fn resolve_domain(&self, instruction: &Instruction) -> CoreResult<Domain> {
        if let Some(domain) = instruction.domain {
            return Ok(domain);
        }
        if let Some(name) = &instruction.capability {
            return Ok(self.registry.resolve(name)?.domain);
        }
        self.dispatcher.classify(&instruction.text)
    }

    pub async fn handle(&self, instruction: Instruction) -> CoreResult<Outcome> {
        self.handle_with_cancel(instruction, CancellationToken::new())
            .await
    }

    pub async fn handle_with_cancel(
        &self,
        instruction: Instruction,
        cancel: CancellationToken,
    ) -> CoreResult<Outcome> {
        let domain = self.resolve_domain(&instruction)?;
        info!("Handling instruction {} in {}", instruction.id, domain);

        let router = self.router(domain);
        let candidate = match router.route(&instruction)? {
            RouteOutcome::Selected(candidate) => candidate,
            outcome @ RouteOutcome::Ambiguous(_) => match self.config.tie_break {
                TieBreak::Ask => {
                    debug!("Instruction {} needs clarification", instruction.id);
                    return Ok(Outcome::NeedsClarification {
                        instruction_id: instruction.id,
                        domain,
                        candidates: outcome.candidates().into_iter().map(Into::into).collect(),
                    });
                }
                TieBreak::DeclaredOrder => {
                    let first = outcome
                        .pick_default()
                        .ok_or(CoreError::NoMatchingCapability { domain })?;
                    router.validate(first)?
                }
            },
        };

        let plan = composite::plan(&candidate.capability, &candidate.arguments)?;
        let report = self.orchestrator.execute_with_cancel(&plan, cancel).await?;
        Ok(Outcome::Completed(Response {
            instruction_id: instruction.id,
            domain: candidate.capability.domain,
            capability: candidate.name().to_string(),
            arguments: candidate.arguments,
            report,
        }))
    }

    /// Cross-domain delegation. A named target skips classification.
    pub async fn delegate(&self, request: DelegationRequest) -> CoreResult<Outcome> {
        info!(
            "Delegation from {} to {}",
            request.from,
            request
                .to
                .map(|d| d.to_string())
                .unwrap_or_else(|| "dispatcher".to_string())
        );
        let mut instruction = request.instruction;
        if let Some(to) = request.to {
            instruction.domain = Some(to);
        }
        self.handle(instruction).await
    }

    pub fn preview(&self, instruction: &Instruction) -> CoreResult<Preview> {
        let domain_scores = self.dispatcher.scores(&instruction.text);
        let domain = self.resolve_domain(instruction)?;
        let outcome = self.router(domain).route(instruction)?;

        let plan = match &outcome {
            RouteOutcome::Selected(c) => Some(composite::plan(&c.capability, &c.arguments)?),
            RouteOutcome::Ambiguous(_) => None,
        };
        Ok(Preview {
            instruction_id: instruction.id.clone(),
            domain,
            domain_scores,
            ambiguous: outcome.is_ambiguous(),
            candidates: outcome.candidates().into_iter().map(Into::into).collect(),
            plan,
        })
    }
}
