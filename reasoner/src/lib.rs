pub mod binding;
pub mod config;
pub mod error;
pub mod matching;
pub mod reasoning;
pub mod rule;
pub mod rule_store;

pub use binding::{Binding, BindingSet, TripleVarBinding, TripleVarBindingSet};
pub use config::ReasonerConfig;
pub use error::{HandlerError, ReasonerError};
pub use matching::{Match, MatchFlags, MatchStrategy};
pub use reasoning::{KnowledgeGap, ReactionNode, ReasonerPlan, ReasoningNode, ReasoningResult};
pub use rule::{BindingSetHandler, Rule, RuleId};
pub use rule_store::RuleStore;
