//! Declarative gate: schema, loader with inheritance, the evaluation
//! engine, and the enforcer that maps evaluations to terminal decisions.

pub mod enforcer;
pub mod engine;
pub mod loader;
pub mod model;

pub use enforcer::{enforce, Decision, Enforcement};
pub use engine::{evaluate, glob_match, Evaluation, TriggeredRule};
pub use loader::PolicyLoader;
pub use model::{Exception, Policy, PolicyDocument, RuleDefinition, Thresholds};
