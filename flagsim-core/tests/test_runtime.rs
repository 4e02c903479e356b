use flagsim_core::tests::test_helpers::{
    approx_eq_f32, data_path, detector_value, result_to_json, results_approx_equal,
    run_scene_file, run_scene_source,
};
use flagsim_core::{build_scene_context_from_source, evaluate_detectors, step_scene, SpatialStrategy};

#[test]
fn test_calm_flag_sags_between_pinned_corners() {
    let result = run_scene_file(&data_path("calm_flag.flag")).expect("Failed to run scene");

    assert_eq!(result.detectors.len(), 5);
    assert_eq!(result.steps, 120);

    // The top-left corner is pinned at the flag's placement height
    let top_left = detector_value(&result, "top_left_y").unwrap();
    assert!(approx_eq_f32(top_left, 3.0, 1e-5));

    // Both top corners are pinned, so their distance is unchanged
    let span = detector_value(&result, "corner_span").unwrap();
    assert!(approx_eq_f32(span, 2.0, 1e-5));

    let lowest = detector_value(&result, "lowest").unwrap();
    let highest = detector_value(&result, "highest").unwrap();
    assert!(lowest < 3.0 - 1.5, "bottom edge should sag below its rest height");
    assert!(lowest > -10.0);
    assert!(highest <= 3.0 + 1e-5);

    let width = detector_value(&result, "width").unwrap();
    assert!(width >= 2.0 - 1e-5);
}

#[test]
fn test_windy_flag_blows_downwind() {
    let result = run_scene_file(&data_path("windy_flag.flag")).expect("Failed to run scene");

    let depth = detector_value(&result, "depth").unwrap();
    assert!(depth > 0.1, "wind should bend the flag out of its plane, depth {}", depth);
    let tip_z = detector_value(&result, "tip_z").unwrap();
    assert!(tip_z > 0.0);
}

#[test]
fn test_pole_flag_runs_with_octree() {
    let source = std::fs::read_to_string(data_path("pole_flag.flag")).unwrap();
    let (ctx, warnings) = build_scene_context_from_source(&source).unwrap();

    assert!(warnings.is_empty());
    assert_eq!(ctx.simulation.params().spatial.strategy, SpatialStrategy::Octree);
    assert_eq!(ctx.simulation.params().iterations, 6);
    assert_eq!(ctx.simulation.colliders().len(), 2);
    assert_eq!(ctx.simulation.particles().len(), ctx.mesh.vertex_count());

    let result = run_scene_source(&source).unwrap();
    for detector in &result.detectors {
        assert!(detector.value.is_finite(), "{} = {}", detector.name, detector.value);
    }
}

#[test]
fn test_same_scene_is_deterministic() {
    for file in ["calm_flag.flag", "windy_flag.flag", "pole_flag.flag"] {
        let path = data_path(file);
        let first = run_scene_file(&path).expect("First run failed");
        let second = run_scene_file(&path).expect("Second run failed");

        assert!(
            results_approx_equal(&first, &second, 0.0),
            "{} should produce identical results",
            file
        );
        assert_eq!(result_to_json(&first), result_to_json(&second));
    }
}

#[test]
fn test_step_scene_fires_bursts_on_schedule() {
    let source = r#"
flag grid 3 x 3 size (1.0, 1.0) at (0.0, 0.0, 0.0)
burst at step 2 duration 1.0
simulate dt = 0.01 steps = 5
"#;
    let (mut ctx, _) = build_scene_context_from_source(source).unwrap();

    step_scene(&mut ctx);
    step_scene(&mut ctx);
    assert!(!ctx.simulation.wind_burst().is_active());

    step_scene(&mut ctx);
    assert!(ctx.simulation.wind_burst().is_active());
    assert_eq!(ctx.current_step, 3);
    assert!(!ctx.is_finished());
}

#[test]
fn test_step_scene_keeps_mesh_in_sync() {
    let source = r#"
flag grid 3 x 3 size (1.0, 1.0) at (0.0, 2.0, 0.0)
simulate dt = 0.01 steps = 10
"#;
    let (mut ctx, _) = build_scene_context_from_source(source).unwrap();
    while !ctx.is_finished() {
        step_scene(&mut ctx);
    }

    let world = ctx.mesh.world_vertices();
    for (vertex, particle) in world.iter().zip(ctx.simulation.particles()) {
        assert!((*vertex - particle.position).length() < 1e-5);
    }
}

#[test]
fn test_settings_and_lets_reach_simulation() {
    let source = r#"
let g = 2.0 * 4.9
flag grid 3 x 3 size (1.0, 1.0) at (0.0, 0.0, 0.0) scale (2.0, 1.0, 1.0)
set gravity = g
set wind_control = 0.0
disable bending_springs
simulate dt = 0.01 steps = 0
detect width = extent(x)
"#;
    let (ctx, _) = build_scene_context_from_source(source).unwrap();
    let params = ctx.simulation.params();

    assert!(approx_eq_f32(params.gravity, 9.8, 1e-5));
    assert!(!params.features.bending_springs);
    assert!(approx_eq_f32(params.wind_direction.x, 0.0, 1e-6));

    // Flag scale stretches the 1.0 wide grid to 2.0
    let results = evaluate_detectors(&ctx).unwrap();
    assert!(approx_eq_f32(results[0].value, 2.0, 1e-5));
}

#[test]
fn test_warnings_are_returned_with_result() {
    let source = r#"
flag grid 3 x 3 size (1.0, 1.0) at (0.0, 0.0, 0.0)
set wind_strength = 40.0
simulate dt = 0.01 steps = 5
"#;
    let result = run_scene_source(source).unwrap();
    assert_eq!(result.warnings.warnings().count(), 1);
}
