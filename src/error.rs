//! Error taxonomy for the engine.
//!
//! Two propagation regimes exist and never mix:
//!
//! - **Per-item errors** ([`BuildError`], [`OptimizeError`],
//!   [`EvaluateError`], [`PipelineError`]) are contained to the candidate
//!   they occurred on. Dispatchers log them and continue; the pipeline
//!   converts them into the candidate's `failed` flag.
//! - **Configuration errors** ([`ConfigError`]) are fatal and surface
//!   immediately, before any run starts.

use std::time::Duration;
use thiserror::Error;

/// A structure-builder (crossover or mutation operator) failure.
///
/// Raised by domain operator functions when two parents cannot be
/// recombined or a candidate cannot be perturbed. Always recovered
/// locally: the dispatcher logs the parents and the operator name, then
/// moves on to the next draw.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct BuildError(pub String);

impl BuildError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A structure-optimizer failure for a single candidate.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct OptimizeError(pub String);

impl OptimizeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A fitness-evaluator failure for a single candidate.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct EvaluateError(pub String);

impl EvaluateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// What went wrong while the pipeline processed one candidate.
///
/// Timeouts and worker panics are folded into the same per-item regime
/// as collaborator errors: the candidate is marked failed, the run
/// continues.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Optimize(#[from] OptimizeError),

    #[error(transparent)]
    Evaluate(#[from] EvaluateError),

    /// The worker exceeded the configured per-item time limit.
    #[error("worker exceeded the {}ms per-item timeout", limit.as_millis())]
    TimedOut { limit: Duration },

    /// The worker panicked; the payload is the panic message when one
    /// could be extracted.
    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// A fatal configuration problem.
///
/// Everything in here is detected when dispatchers, tools, or run
/// configurations are constructed — never deferred to run time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("operator list is empty")]
    NoOperators,

    #[error("expected {expected} operator weights, got {actual}")]
    WeightCountMismatch { expected: usize, actual: usize },

    #[error("operator weights must sum to 1, got {sum}")]
    WeightSum { sum: f64 },

    #[error("operator weight at index {index} must be finite and positive, got {weight}")]
    InvalidWeight { index: usize, weight: f64 },

    #[error("unknown {kind} operator '{name}'")]
    UnknownOperator { kind: &'static str, name: String },

    #[error("population_size must be at least 1")]
    PopulationSize,

    #[error("max_generations must be at least 1")]
    MaxGenerations,

    #[error("worker pool size must be non-zero")]
    PoolSize,

    #[error("per-item timeout must be non-zero")]
    ZeroTimeout,

    #[error("tournament size must be at least 1")]
    TournamentSize,

    #[error("seed population has no GA tools attached")]
    MissingTools,
}

/// A population dump/load failure.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed population dump: {0}")]
    Format(#[from] serde_json::Error),
}
