//! Pipeline driver.
//!
//! One compilation is a single sequential pass over every document:
//! validation, policy and capability matching each run for all documents
//! before the next stage starts, so a rejection in one document stops the
//! whole batch at that stage. Diagnostics accumulate in stage order and are
//! never dropped.

use crate::config::CompilerConfig;
use l2i_capability::{CapabilityMatcher, FoldStrategy};
use l2i_core::{Deployment, Diagnostic, Stage};
use l2i_emit::{Artifact, Backend};
use l2i_plan::{Composer, IrPlan, Synthesizer};
use l2i_policy::{PolicyConfig, PolicyEngine};
use l2i_spec::{CanonicalSpec, Validator};
use serde::Serialize;
use serde_json::Value;

/// Outcome of one compilation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineResult {
    /// Every stage passed
    Planned {
        /// The synthesized plan
        plan: IrPlan,
        /// Adjustments recorded on the way
        diagnostics: Vec<Diagnostic>,
    },
    /// A stage rejected at least one document
    Halted {
        /// Stage that stopped the pipeline
        stage: Stage,
        /// Everything recorded up to and including that stage
        diagnostics: Vec<Diagnostic>,
    },
}

impl PipelineResult {
    /// Stage at which the pipeline stopped; `synthesis` on success
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Planned { .. } => Stage::Synthesis,
            Self::Halted { stage, .. } => *stage,
        }
    }

    /// All diagnostics, in stage order
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Planned { diagnostics, .. } | Self::Halted { diagnostics, .. } => diagnostics,
        }
    }

    /// The plan, if compilation succeeded
    #[must_use]
    pub fn plan(&self) -> Option<&IrPlan> {
        match self {
            Self::Planned { plan, .. } => Some(plan),
            Self::Halted { .. } => None,
        }
    }

    /// Whether compilation succeeded
    #[must_use]
    pub fn is_planned(&self) -> bool {
        matches!(self, Self::Planned { .. })
    }
}

/// The compiler: stage configuration plus the driver loop
#[derive(Debug, Clone)]
pub struct Pipeline {
    validator: Validator,
    policy: PolicyEngine,
    matcher: CapabilityMatcher,
    composer: Composer,
    synthesizer: Synthesizer,
}

impl Pipeline {
    /// Create a pipeline with default policy and fold strategy
    #[must_use]
    pub fn new() -> Self {
        Self {
            validator: Validator::new(),
            policy: PolicyEngine::new(PolicyConfig::new()),
            matcher: CapabilityMatcher::new(),
            composer: Composer::new(),
            synthesizer: Synthesizer::new(),
        }
    }

    /// Create a pipeline from a compiler configuration
    #[must_use]
    pub fn from_config(config: &CompilerConfig) -> Self {
        Self::new()
            .with_policy(config.policy.clone())
            .with_fold_strategy(config.fold_strategy)
            .with_validator(config.limits.validator())
    }

    /// Replace the policy rules
    #[must_use]
    pub fn with_policy(mut self, config: PolicyConfig) -> Self {
        self.policy = PolicyEngine::new(config);
        self
    }

    /// Set the tier fold strategy
    #[must_use]
    pub fn with_fold_strategy(mut self, fold: FoldStrategy) -> Self {
        self.matcher = self.matcher.with_fold_strategy(fold);
        self
    }

    /// Replace the validator
    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    /// Active policy rules
    #[must_use]
    pub fn policy(&self) -> &PolicyConfig {
        self.policy.config()
    }

    /// Compile intent documents against a deployment
    #[must_use]
    pub fn compile(&self, documents: &[Value], deployment: &Deployment) -> PipelineResult {
        let mut diagnostics = Vec::new();

        // validation
        let mut specs = Vec::with_capacity(documents.len());
        let mut rejected = false;
        for doc in documents {
            match self.validator.validate(doc) {
                Ok(spec) => specs.push(spec),
                Err(found) => {
                    rejected = true;
                    diagnostics.extend(found);
                }
            }
        }
        if rejected {
            return halt(Stage::Validation, diagnostics);
        }

        // policy
        let specs = match self.run_stage(Stage::Policy, specs, &mut diagnostics, |spec| {
            let outcome = self.policy.apply(spec);
            (outcome.is_denied(), outcome.spec, outcome.diagnostics)
        }) {
            Some(specs) => specs,
            None => return halt(Stage::Policy, diagnostics),
        };

        // capability
        let specs = match self.run_stage(Stage::Capability, specs, &mut diagnostics, |spec| {
            let outcome = self.matcher.check_in(spec, deployment);
            (outcome.is_denied(), outcome.spec, outcome.diagnostics)
        }) {
            Some(specs) => specs,
            None => return halt(Stage::Capability, diagnostics),
        };

        let composed = match self.composer.compose(&specs, deployment) {
            Ok(plan) => plan,
            Err(conflict) => {
                diagnostics.push(conflict);
                return halt(Stage::Composition, diagnostics);
            }
        };

        match self.synthesizer.synthesize(&composed, deployment) {
            Ok(plan) => {
                tracing::info!(
                    specs = composed.specs.len(),
                    domains = plan.domains.len(),
                    actions = plan.action_count(),
                    adjustments = diagnostics.len(),
                    "compilation planned"
                );
                PipelineResult::Planned { plan, diagnostics }
            }
            Err(issues) => {
                diagnostics.extend(issues);
                halt(Stage::Synthesis, diagnostics)
            }
        }
    }

    /// Render `plan` for each requested backend, in the order given
    #[must_use]
    pub fn emit(&self, plan: &IrPlan, backends: &[Backend]) -> Vec<Artifact> {
        backends
            .iter()
            .map(|&backend| {
                tracing::debug!(backend = %backend, "emitting");
                Artifact::render(backend, plan)
            })
            .collect()
    }

    /// Run a per-spec stage over every spec; `None` if any spec was denied
    fn run_stage<F>(
        &self,
        stage: Stage,
        specs: Vec<CanonicalSpec>,
        diagnostics: &mut Vec<Diagnostic>,
        mut step: F,
    ) -> Option<Vec<CanonicalSpec>>
    where
        F: FnMut(&CanonicalSpec) -> (bool, CanonicalSpec, Vec<Diagnostic>),
    {
        let mut out = Vec::with_capacity(specs.len());
        let mut denied = false;
        for spec in &specs {
            let (is_denied, adjusted, found) = step(spec);
            tracing::debug!(
                stage = %stage,
                spec = %spec.id,
                denied = is_denied,
                diagnostics = found.len(),
                "stage outcome"
            );
            denied |= is_denied;
            diagnostics.extend(found);
            out.push(adjusted);
        }
        (!denied).then_some(out)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn halt(stage: Stage, diagnostics: Vec<Diagnostic>) -> PipelineResult {
    tracing::warn!(
        stage = %stage,
        diagnostics = diagnostics.len(),
        "compilation halted"
    );
    PipelineResult::Halted { stage, diagnostics }
}
