mod engine;

pub use engine::{
    Edge, EdgeKind, Gate, GateContext, ParallelStage, TransitionEffect, TransitionError,
    TransitionPlan, WorkflowEngine,
};
