//! Scene runtime: turns a parsed scene into a running `Simulation` and
//! evaluates its detectors.

use crate::analyzer::analyze_scene;
use crate::ast::{DetectorDecl, DetectorKind, Scene, SetValue, VecExpr};
use crate::collision::{CapsuleDescriptor, SphereDescriptor};
use crate::config::SimParams;
use crate::diagnostics::Diagnostics;
use crate::error::{SimError, SimResult};
use crate::eval::{eval_finite, eval_vec3, evaluate_lets, EvalContext};
use crate::mesh::FlagMesh;
use crate::parser::parse_scene;
use crate::simulation::{Simulation, StepReport};
use glam::{Affine3A, Quat, Vec3};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Result of a detector evaluation
#[derive(Debug, Clone)]
pub struct DetectorResult {
    pub name: String,
    pub value: f32,
}

/// Final result of running a scene
#[derive(Debug)]
pub struct SceneResult {
    pub detectors: Vec<DetectorResult>,
    /// Non-fatal diagnostics reported by the analyzer
    pub warnings: Diagnostics,
    pub steps: usize,
}

/// A scene ready to be stepped frame by frame
pub struct SceneContext {
    pub simulation: Simulation,
    /// The host mesh, kept in sync with the simulation after every step
    pub mesh: FlagMesh,
    pub detectors: Vec<DetectorDecl>,
    pub dt: f32,
    pub steps: usize,
    pub current_step: usize,
    /// `(step, duration)` pairs sorted by step
    bursts: Vec<(usize, f32)>,
}

impl SceneContext {
    pub fn is_finished(&self) -> bool {
        self.current_step >= self.steps
    }
}

/// Main entry point: parse, analyze and run a scene to completion
pub fn run_scene(source: &str) -> SimResult<SceneResult> {
    let (mut ctx, warnings) = build_scene_context_from_source(source)?;

    while !ctx.is_finished() {
        step_scene(&mut ctx);
    }

    let detectors = evaluate_detectors(&ctx)?;
    info!(steps = ctx.steps, detectors = detectors.len(), "scene finished");

    Ok(SceneResult {
        detectors,
        warnings,
        steps: ctx.steps,
    })
}

/// Read a scene file from disk
pub fn read_scene(path: &Path) -> SimResult<String> {
    Ok(fs::read_to_string(path)?)
}

/// Parse and analyze `source`, then build its context.
///
/// Analyzer errors abort with `SimError::Analysis`; warnings are returned
/// alongside the context.
pub fn build_scene_context_from_source(source: &str) -> SimResult<(SceneContext, Diagnostics)> {
    let scene = parse_scene(source)?;
    let diagnostics = analyze_scene(&scene);
    if diagnostics.has_errors() {
        return Err(SimError::Analysis(diagnostics));
    }
    for warning in diagnostics.warnings() {
        warn!(message = %warning.message, "scene warning");
    }
    let ctx = build_scene_context(&scene)?;
    Ok((ctx, diagnostics))
}

/// Build the mesh, parameters, colliders and burst schedule of a scene
pub fn build_scene_context(scene: &Scene) -> SimResult<SceneContext> {
    let (env, let_diagnostics) = evaluate_lets(&scene.lets);
    if !let_diagnostics.is_empty() {
        return Err(SimError::Analysis(let_diagnostics.into()));
    }

    let mesh = build_mesh(scene, &env)?;
    let params = build_params(scene, &env)?;
    let mut simulation = Simulation::initialize(&mesh, params)?;

    let (spheres, capsules) = build_colliders(scene, &env)?;
    simulation.set_colliders(&spheres, &capsules);

    let dt = eval_finite(&scene.simulate.dt, &env, "dt")?;
    if dt <= 0.0 {
        return Err(SimError::InvalidConfig(format!("dt must be positive, got {}", dt)));
    }
    let steps = eval_finite(&scene.simulate.steps, &env, "steps")?;
    if steps < 0.0 {
        return Err(SimError::InvalidConfig(format!(
            "steps must not be negative, got {}",
            steps
        )));
    }

    let mut bursts = Vec::with_capacity(scene.bursts.len());
    for burst in &scene.bursts {
        let step = eval_finite(&burst.step, &env, "burst step")?;
        let duration = eval_finite(&burst.duration, &env, "burst duration")?;
        if step < 0.0 || duration < 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "burst at step {} with duration {} is invalid",
                step, duration
            )));
        }
        bursts.push((step as usize, duration));
    }
    bursts.sort_by_key(|&(step, _)| step);

    debug!(
        particles = simulation.particles().len(),
        colliders = simulation.colliders().len(),
        bursts = bursts.len(),
        dt,
        "scene built"
    );

    Ok(SceneContext {
        simulation,
        mesh,
        detectors: scene.detectors.clone(),
        dt,
        steps: steps as usize,
        current_step: 0,
        bursts,
    })
}

fn build_mesh(scene: &Scene, env: &EvalContext<'_>) -> SimResult<FlagMesh> {
    let flag = scene.flag.as_ref().ok_or(SimError::MissingMesh)?;

    let cols = eval_finite(&flag.cols, env, "cols")?;
    let rows = eval_finite(&flag.rows, env, "rows")?;
    if cols < 2.0 || rows < 2.0 {
        return Err(SimError::InvalidMesh(format!(
            "flag grid must be at least 2 x 2, got {} x {}",
            cols, rows
        )));
    }
    let width = eval_finite(&flag.width, env, "width")?;
    let height = eval_finite(&flag.height, env, "height")?;
    if width <= 0.0 || height <= 0.0 {
        return Err(SimError::InvalidMesh(format!(
            "flag size must be positive, got ({}, {})",
            width, height
        )));
    }

    let levels = match &scene.subdivide {
        Some(subdivide) => eval_finite(&subdivide.levels, env, "subdivide")?.max(0.0) as u32,
        None => 0,
    };

    let position = eval_vec3(&flag.position, env, "flag position")?;
    let scale = eval_scale(flag.scale.as_ref(), env, "flag scale")?;

    let mesh = FlagMesh::grid(cols as usize, rows as usize, width, height)
        .subdivide(levels)
        .with_transform(Affine3A::from_scale_rotation_translation(
            scale,
            Quat::IDENTITY,
            position,
        ));
    Ok(mesh)
}

fn build_params(scene: &Scene, env: &EvalContext<'_>) -> SimResult<SimParams> {
    let mut params = SimParams::default();

    for setting in &scene.settings {
        match (&setting.value, setting.name.as_str()) {
            (SetValue::Vector(v), "wind_direction") => {
                params.wind_direction = eval_vec3(v, env, &setting.name)?;
            }
            (SetValue::Scalar(expr), name) => {
                let value = eval_finite(expr, env, name)?;
                if !params.set(name, value) {
                    return Err(SimError::InvalidConfig(format!("unknown setting '{}'", name)));
                }
            }
            (SetValue::Vector(_), name) => {
                return Err(SimError::InvalidConfig(format!(
                    "setting '{}' does not take a vector",
                    name
                )));
            }
        }
    }

    for feature in &scene.features {
        if !params.features.set(&feature.name, feature.enabled) {
            return Err(SimError::InvalidConfig(format!(
                "unknown feature '{}'",
                feature.name
            )));
        }
    }

    if let Some(strategy) = scene.index {
        params.set_strategy(strategy);
    }

    Ok(params)
}

/// Scene colliders are placed with a translate-and-scale transform around a
/// local origin
fn build_colliders(
    scene: &Scene,
    env: &EvalContext<'_>,
) -> SimResult<(Vec<SphereDescriptor>, Vec<CapsuleDescriptor>)> {
    let mut spheres = Vec::with_capacity(scene.spheres.len());
    for sphere in &scene.spheres {
        let at = eval_vec3(&sphere.center, env, &sphere.name)?;
        let scale = eval_scale(sphere.scale.as_ref(), env, &sphere.name)?;
        spheres.push(SphereDescriptor {
            center: Vec3::ZERO,
            radius: eval_finite(&sphere.radius, env, &sphere.name)?,
            transform: Affine3A::from_scale_rotation_translation(scale, Quat::IDENTITY, at),
        });
    }

    let mut capsules = Vec::with_capacity(scene.capsules.len());
    for capsule in &scene.capsules {
        let at = eval_vec3(&capsule.center, env, &capsule.name)?;
        let scale = eval_scale(capsule.scale.as_ref(), env, &capsule.name)?;
        capsules.push(CapsuleDescriptor {
            center: Vec3::ZERO,
            height: eval_finite(&capsule.height, env, &capsule.name)?,
            radius: eval_finite(&capsule.radius, env, &capsule.name)?,
            axis: capsule.axis,
            transform: Affine3A::from_scale_rotation_translation(scale, Quat::IDENTITY, at),
        });
    }

    Ok((spheres, capsules))
}

fn eval_scale(scale: Option<&VecExpr>, env: &EvalContext<'_>, name: &str) -> SimResult<Vec3> {
    match scale {
        Some(v) => Ok(eval_vec3(v, env, name)?),
        None => Ok(Vec3::ONE),
    }
}

/// Advance the scene by one frame, firing any bursts scheduled for it
pub fn step_scene(ctx: &mut SceneContext) -> StepReport {
    let step = ctx.current_step;
    for &(_, duration) in ctx.bursts.iter().filter(|&&(at, _)| at == step) {
        ctx.simulation.trigger_wind_burst(duration);
    }

    let report = ctx.simulation.step(ctx.dt);
    ctx.simulation.export_to(&mut ctx.mesh);
    ctx.current_step += 1;
    report
}

/// Evaluate all detectors on the current world-space particle positions
pub fn evaluate_detectors(ctx: &SceneContext) -> SimResult<Vec<DetectorResult>> {
    let particles = ctx.simulation.particles();
    let position = |index: usize, detector: &str| {
        particles.get(index).map(|p| p.position).ok_or_else(|| {
            SimError::InvalidConfig(format!(
                "particle index {} in detector '{}' is out of range",
                index, detector
            ))
        })
    };

    let mut results = Vec::with_capacity(ctx.detectors.len());
    for detector in &ctx.detectors {
        let value = match &detector.kind {
            DetectorKind::LowestY => particles
                .iter()
                .map(|p| p.position.y)
                .fold(f32::INFINITY, f32::min),
            DetectorKind::HighestY => particles
                .iter()
                .map(|p| p.position.y)
                .fold(f32::NEG_INFINITY, f32::max),
            DetectorKind::Extent(axis) => {
                let k = axis.index();
                let (min, max) = particles.iter().fold(
                    (f32::INFINITY, f32::NEG_INFINITY),
                    |(min, max), p| (min.min(p.position[k]), max.max(p.position[k])),
                );
                max - min
            }
            DetectorKind::Position { index, axis } => {
                position(*index, &detector.name)?[axis.index()]
            }
            DetectorKind::Distance { a, b } => position(*a, &detector.name)?
                .distance(position(*b, &detector.name)?),
        };

        results.push(DetectorResult {
            name: detector.name.clone(),
            value,
        });
    }

    Ok(results)
}
