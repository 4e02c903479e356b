pub mod analyzer;
pub mod ast;
pub mod collision;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod eval;
pub mod forces;
pub mod mesh;
pub mod parser;
pub mod particle;
pub mod runtime;
pub mod simulation;
pub mod spatial;
pub mod spring;
pub mod topology;

pub use analyzer::analyze_scene;
pub use collision::{Axis, CapsuleDescriptor, Collider, ContactParams, ContactReport, SphereDescriptor};
pub use config::{Features, SimParams};
pub use diagnostics::{Diagnostic, DiagnosticSeverity, Diagnostics, SourceLocation, Span};
pub use error::{SimError, SimResult};
pub use mesh::{FlagMesh, MeshHost};
pub use parser::parse_scene;
pub use particle::Particle;
pub use runtime::{
    build_scene_context, build_scene_context_from_source, evaluate_detectors, read_scene,
    run_scene, step_scene, DetectorResult, SceneContext, SceneResult,
};
pub use simulation::{Simulation, StepReport};
pub use spatial::{SpatialConfig, SpatialIndex, SpatialStrategy};
pub use spring::{Spring, SpringKind};
pub use topology::SpringNetwork;
