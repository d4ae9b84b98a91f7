//! Core modules for Facebind

pub mod logic;
pub mod diagnostics;
pub mod dispatch;
pub mod evaluator;
pub mod engine;
pub mod store;
pub mod api;

pub use logic::{LogicCompiler, ExpressionCompiler, CompiledLogic, FlagCompiler, FlagPredicate};
pub use diagnostics::{DiagnosticSink, TracingSink, CollectingSink, TeeSink};
pub use dispatch::{ActionDispatcher, ActionEvent, ConsoleDispatcher, BroadcastDispatcher, GatedDispatcher, RecordingDispatcher};
pub use evaluator::{BindingEvaluator, EdgeStep, step_edge, step_simple, subject};
pub use engine::{BindingEngine, BindingEdit};
pub use store::{save_profiles, load_profiles, load_profiles_or_default, load_settings};
pub use api::{create_router, routes, run_server, AppState, ServerOptions};
