pub use reasoner;
pub use shared;

pub use reasoner::{
    Binding, BindingSet, BindingSetHandler, HandlerError, KnowledgeGap, Match, MatchFlags,
    MatchStrategy, ReasonerConfig, ReasonerError, ReasonerPlan, ReasoningResult, Rule, RuleStore,
};
pub use shared::triple::{GraphPattern, TriplePattern};
