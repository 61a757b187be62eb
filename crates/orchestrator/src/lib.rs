//! Intent lifecycle orchestration: intake, analysis, netting rounds,
//! serialized on-chain execution and bridge recovery.

pub mod collaborators;
pub mod executor;
pub mod locks;
pub mod orchestrator;
pub mod recovery;
pub mod submitter;
pub mod validator;


// Re-export main types
pub use collaborators::{
    ClassifierError, IntentClassifier, KeywordClassifier, PoolDescriptor, PoolDiscovery,
    StaticPoolDiscovery, StructuredIntent, DEFAULT_FEE_TIER_PPM,
};
pub use executor::{
    ExecutionConfig, ExecutionCoordinator, ExecutionError, PaymentResult, SwapResult,
};
pub use locks::{LockError, NetworkLockGuard, NetworkLocks};
pub use orchestrator::{
    BuilderError, IntentOrchestrator, IntentOrchestratorBuilder, NettingReport,
    OrchestratorConfig, OrchestratorError,
};
pub use recovery::{
    BridgeRecovery, FinalizeError, FinalizeOutcome, RecoveryConfig, SweepReport,
};
pub use submitter::{Accounts, SubmitError, Submitted, TxSubmitter, DEFAULT_SUBMIT_TIMEOUT};
pub use validator::{IntentValidator, ValidationError};
