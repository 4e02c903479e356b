//! Static checks for scene files
//!
//! Everything the runtime would otherwise trip over (unknown names, bad
//! grid sizes, detector indices past the end of the mesh) is reported here
//! before any particle is built.

use crate::ast::{DetectorKind, Expr, FuncName, LetDecl, Scene, SetValue, VecExpr};
use crate::config::{Features, SimParams, MAX_WIND_STRENGTH};
use crate::diagnostics::{Diagnostic, Diagnostics, Span};
use crate::eval::{eval_finite, evaluate_lets, EvalContext};
use crate::mesh::FlagMesh;
use std::collections::{HashMap, HashSet};

/// Deeper subdivision than this multiplies the triangle count past anything useful
pub const MAX_SUBDIVIDE_LEVELS: u32 = 4;

/// Vector-valued settings accepted by `set name = (x, y, z)`
const VECTOR_SETTINGS: &[&str] = &["wind_direction"];

/// Analyze a scene and return diagnostics
pub fn analyze_scene(scene: &Scene) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();

    // Duplicate let bindings
    let mut let_names = HashSet::new();
    for let_decl in &scene.lets {
        if !let_names.insert(let_decl.name.as_str()) {
            diagnostics.push(Diagnostic::error(
                format!("duplicate let binding '{}'", let_decl.name),
                let_decl.span,
            ));
        }
    }

    let env_lets: HashMap<String, &LetDecl> = scene
        .lets
        .iter()
        .map(|let_decl| (let_decl.name.clone(), let_decl))
        .collect();

    for let_decl in &scene.lets {
        diagnostics.extend(check_expr(&let_decl.expr, &env_lets));
    }

    // Values are only needed for range checks; evaluation failures surface
    // through check_expr or the runtime.
    let (ctx, _) = evaluate_lets(&scene.lets);

    let vertex_count = check_flag(scene, &env_lets, &ctx, &mut diagnostics);

    // Colliders
    let mut collider_names = HashSet::new();
    for sphere in &scene.spheres {
        if !collider_names.insert(sphere.name.as_str()) {
            diagnostics.push(Diagnostic::error(
                format!("duplicate collider name '{}'", sphere.name),
                sphere.span,
            ));
        }
        diagnostics.extend(check_vec(&sphere.center, &env_lets));
        diagnostics.extend(check_expr(&sphere.radius, &env_lets));
        if let Some(scale) = &sphere.scale {
            diagnostics.extend(check_vec(scale, &env_lets));
        }
        if let Some(radius) = value_of(&sphere.radius, &ctx) {
            if radius <= 0.0 {
                diagnostics.push(Diagnostic::error(
                    format!("sphere '{}' radius must be positive, got {}", sphere.name, radius),
                    sphere.span,
                ));
            }
        }
    }
    for capsule in &scene.capsules {
        if !collider_names.insert(capsule.name.as_str()) {
            diagnostics.push(Diagnostic::error(
                format!("duplicate collider name '{}'", capsule.name),
                capsule.span,
            ));
        }
        diagnostics.extend(check_vec(&capsule.center, &env_lets));
        diagnostics.extend(check_expr(&capsule.height, &env_lets));
        diagnostics.extend(check_expr(&capsule.radius, &env_lets));
        if let Some(scale) = &capsule.scale {
            diagnostics.extend(check_vec(scale, &env_lets));
        }
        if let Some(radius) = value_of(&capsule.radius, &ctx) {
            if radius <= 0.0 {
                diagnostics.push(Diagnostic::error(
                    format!("capsule '{}' radius must be positive, got {}", capsule.name, radius),
                    capsule.span,
                ));
            }
        }
        if let Some(height) = value_of(&capsule.height, &ctx) {
            if height < 0.0 {
                diagnostics.push(Diagnostic::error(
                    format!("capsule '{}' height must not be negative, got {}", capsule.name, height),
                    capsule.span,
                ));
            }
        }
    }

    // Settings
    for setting in &scene.settings {
        let is_vector_key = VECTOR_SETTINGS.contains(&setting.name.as_str());
        let is_scalar_key = SimParams::default().set(&setting.name, 0.0);

        match &setting.value {
            SetValue::Scalar(expr) => {
                diagnostics.extend(check_expr(expr, &env_lets));
                if is_vector_key {
                    diagnostics.push(Diagnostic::error(
                        format!("setting '{}' expects a vector (x, y, z)", setting.name),
                        setting.span,
                    ));
                } else if !is_scalar_key {
                    diagnostics.push(Diagnostic::error(
                        format!("unknown setting '{}'", setting.name),
                        setting.span,
                    ));
                } else if setting.name == "wind_strength" {
                    if let Some(strength) = value_of(expr, &ctx) {
                        if !(0.0..=MAX_WIND_STRENGTH).contains(&strength) {
                            diagnostics.push(Diagnostic::warning(
                                format!(
                                    "wind_strength {} is outside 0..={} and will be clamped",
                                    strength, MAX_WIND_STRENGTH
                                ),
                                setting.span,
                            ));
                        }
                    }
                }
            }
            SetValue::Vector(v) => {
                diagnostics.extend(check_vec(v, &env_lets));
                if is_scalar_key {
                    diagnostics.push(Diagnostic::error(
                        format!("setting '{}' expects a scalar", setting.name),
                        setting.span,
                    ));
                } else if !is_vector_key {
                    diagnostics.push(Diagnostic::error(
                        format!("unknown setting '{}'", setting.name),
                        setting.span,
                    ));
                }
            }
        }
    }

    // Settings must leave the solver with usable parameters
    let mut params = SimParams::default();
    let mut last_span = None;
    for setting in &scene.settings {
        if let SetValue::Scalar(expr) = &setting.value {
            if let Some(value) = value_of(expr, &ctx) {
                if params.set(&setting.name, value) {
                    last_span = setting.span;
                }
            }
        }
    }
    if let Err(reason) = params.validate() {
        diagnostics.push(Diagnostic::error(
            format!("invalid simulation settings: {}", reason),
            last_span,
        ));
    }

    // Features
    for feature in &scene.features {
        if !Features::default().set(&feature.name, feature.enabled) {
            diagnostics.push(Diagnostic::error(
                format!("unknown feature '{}'", feature.name),
                feature.span,
            ));
        }
    }

    // Simulate block
    diagnostics.extend(check_expr(&scene.simulate.dt, &env_lets));
    diagnostics.extend(check_expr(&scene.simulate.steps, &env_lets));
    if let Some(dt) = value_of(&scene.simulate.dt, &ctx) {
        if dt <= 0.0 {
            diagnostics.push(Diagnostic::error(
                format!("simulate dt must be positive, got {}", dt),
                None,
            ));
        }
    }
    let steps = value_of(&scene.simulate.steps, &ctx);
    if let Some(steps) = steps {
        if steps < 0.0 {
            diagnostics.push(Diagnostic::error(
                format!("simulate steps must not be negative, got {}", steps),
                None,
            ));
        }
    }

    // Bursts
    for burst in &scene.bursts {
        diagnostics.extend(check_expr(&burst.step, &env_lets));
        diagnostics.extend(check_expr(&burst.duration, &env_lets));
        if let Some(duration) = value_of(&burst.duration, &ctx) {
            if duration < 0.0 {
                diagnostics.push(Diagnostic::error(
                    format!("burst duration must not be negative, got {}", duration),
                    burst.span,
                ));
            }
        }
        if let Some(step) = value_of(&burst.step, &ctx) {
            if step < 0.0 {
                diagnostics.push(Diagnostic::error(
                    format!("burst step must not be negative, got {}", step),
                    burst.span,
                ));
            } else if let Some(steps) = steps {
                if step >= steps.max(0.0).floor() {
                    diagnostics.push(Diagnostic::warning(
                        format!("burst at step {} never fires (scene runs {} steps)", step, steps),
                        burst.span,
                    ));
                }
            }
        }
    }

    // Detectors
    let mut detector_names = HashSet::new();
    for detector in &scene.detectors {
        if !detector_names.insert(detector.name.as_str()) {
            diagnostics.push(Diagnostic::error(
                format!("duplicate detector name '{}'", detector.name),
                detector.span,
            ));
        }

        let Some(vertex_count) = vertex_count else {
            continue;
        };
        let indices = match &detector.kind {
            DetectorKind::Position { index, .. } => vec![*index],
            DetectorKind::Distance { a, b } => vec![*a, *b],
            DetectorKind::LowestY | DetectorKind::HighestY | DetectorKind::Extent(_) => Vec::new(),
        };
        for index in indices {
            if index >= vertex_count {
                diagnostics.push(Diagnostic::error(
                    format!(
                        "particle index {} in detector '{}' is out of range (flag has {} particles)",
                        index, detector.name, vertex_count
                    ),
                    detector.span,
                ));
            }
        }
    }

    diagnostics
}

/// Check the flag declaration and return the particle count when it can be
/// determined statically
fn check_flag(
    scene: &Scene,
    env_lets: &HashMap<String, &LetDecl>,
    ctx: &EvalContext<'_>,
    diagnostics: &mut Diagnostics,
) -> Option<usize> {
    let Some(flag) = &scene.flag else {
        diagnostics.push(Diagnostic::error("missing 'flag' declaration", None));
        return None;
    };

    diagnostics.extend(check_expr(&flag.cols, env_lets));
    diagnostics.extend(check_expr(&flag.rows, env_lets));
    diagnostics.extend(check_expr(&flag.width, env_lets));
    diagnostics.extend(check_expr(&flag.height, env_lets));
    diagnostics.extend(check_vec(&flag.position, env_lets));
    if let Some(scale) = &flag.scale {
        diagnostics.extend(check_vec(scale, env_lets));
    }

    let cols = check_grid_count(&flag.cols, "cols", flag.span, ctx, diagnostics);
    let rows = check_grid_count(&flag.rows, "rows", flag.span, ctx, diagnostics);
    check_positive(&flag.width, "width", flag.span, ctx, diagnostics);
    check_positive(&flag.height, "height", flag.span, ctx, diagnostics);

    let mut levels = 0;
    if let Some(subdivide) = &scene.subdivide {
        diagnostics.extend(check_expr(&subdivide.levels, env_lets));
        if let Some(value) = value_of(&subdivide.levels, ctx) {
            if value < 0.0 {
                diagnostics.push(Diagnostic::error(
                    format!("subdivide levels must not be negative, got {}", value),
                    subdivide.span,
                ));
                return None;
            }
            levels = value as u32;
            if levels > MAX_SUBDIVIDE_LEVELS {
                diagnostics.push(Diagnostic::error(
                    format!(
                        "subdivide levels {} exceeds the maximum of {}",
                        levels, MAX_SUBDIVIDE_LEVELS
                    ),
                    subdivide.span,
                ));
                return None;
            }
        }
    }

    let (cols, rows) = (cols?, rows?);
    if levels == 0 {
        return Some(cols * rows);
    }
    Some(FlagMesh::grid(cols, rows, 1.0, 1.0).subdivide(levels).vertex_count())
}

fn check_grid_count(
    expr: &Expr,
    label: &str,
    span: Option<Span>,
    ctx: &EvalContext<'_>,
    diagnostics: &mut Diagnostics,
) -> Option<usize> {
    let value = value_of(expr, ctx)?;
    if value < 2.0 {
        diagnostics.push(Diagnostic::error(
            format!("flag {} must be at least 2, got {}", label, value),
            span,
        ));
        return None;
    }
    Some(value as usize)
}

fn check_positive(
    expr: &Expr,
    label: &str,
    span: Option<Span>,
    ctx: &EvalContext<'_>,
    diagnostics: &mut Diagnostics,
) {
    if let Some(value) = value_of(expr, ctx) {
        if value <= 0.0 {
            diagnostics.push(Diagnostic::error(
                format!("flag {} must be positive, got {}", label, value),
                span,
            ));
        }
    }
}

fn value_of(expr: &Expr, ctx: &EvalContext<'_>) -> Option<f32> {
    eval_finite(expr, ctx, "").ok()
}

fn check_vec(v: &VecExpr, env_lets: &HashMap<String, &LetDecl>) -> Diagnostics {
    let mut diagnostics = check_expr(&v.x, env_lets);
    diagnostics.extend(check_expr(&v.y, env_lets));
    diagnostics.extend(check_expr(&v.z, env_lets));
    diagnostics
}

/// Check an expression for validity (unknown variables, function arity)
pub fn check_expr(expr: &Expr, env_lets: &HashMap<String, &LetDecl>) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();

    match expr {
        Expr::Literal(_) => {}
        Expr::Var(name) => {
            if !env_lets.contains_key(name) {
                diagnostics.push(Diagnostic::error(
                    format!("unknown variable '{}'", name),
                    None,
                ));
            }
        }
        Expr::UnaryMinus(e) => {
            diagnostics.extend(check_expr(e, env_lets));
        }
        Expr::Binary { left, right, .. } => {
            diagnostics.extend(check_expr(left, env_lets));
            diagnostics.extend(check_expr(right, env_lets));
        }
        Expr::Call { func, args } => {
            let expected_arity = match func {
                FuncName::Sin | FuncName::Cos | FuncName::Sqrt => 1,
                FuncName::Clamp => 3,
            };

            if args.len() != expected_arity {
                let func_name = match func {
                    FuncName::Sin => "sin",
                    FuncName::Cos => "cos",
                    FuncName::Sqrt => "sqrt",
                    FuncName::Clamp => "clamp",
                };
                diagnostics.push(Diagnostic::error(
                    format!(
                        "function '{}' expects {} argument(s), got {}",
                        func_name,
                        expected_arity,
                        args.len()
                    ),
                    None,
                ));
            }

            for arg in args {
                diagnostics.extend(check_expr(arg, env_lets));
            }
        }
    }

    diagnostics
}
