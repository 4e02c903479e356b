use flagsim_core::{analyze_scene, parse_scene, Diagnostics};

const SIMULATE: &str = "simulate dt = 0.01 steps = 100\n";
const FLAG: &str = "flag grid 3 x 3 size (1.0, 1.0) at (0.0, 0.0, 0.0)\n";

fn analyze(body: &str) -> Diagnostics {
    let source = format!("{}{}", body, SIMULATE);
    let scene = parse_scene(&source).unwrap();
    analyze_scene(&scene)
}

fn has_error(diagnostics: &Diagnostics, needle: &str) -> bool {
    diagnostics.errors().any(|d| d.message.contains(needle))
}

#[test]
fn test_valid_scene_has_no_errors() {
    let diagnostics = analyze(&format!(
        "let r = 0.5\n{}sphere ball at (0.5, -0.5, 0.2) radius r\nset wind_direction = (1.0, 0.0, 0.0)\nenable wind\ndetect low = lowest_y\ndetect corner = position(8).y\n",
        FLAG
    ));
    assert!(
        !diagnostics.has_errors(),
        "Valid scene should have no errors: {:?}",
        diagnostics.errors().collect::<Vec<_>>()
    );
}

#[test]
fn test_missing_flag() {
    let diagnostics = analyze("detect low = lowest_y\n");
    assert!(has_error(&diagnostics, "missing 'flag'"));
}

#[test]
fn test_unknown_variable() {
    let diagnostics = analyze("flag grid cols x 3 size (1.0, 1.0) at (0.0, 0.0, 0.0)\n");
    assert!(has_error(&diagnostics, "unknown variable 'cols'"));
}

#[test]
fn test_duplicate_let_binding() {
    let diagnostics = analyze(&format!("let a = 1.0\nlet a = 2.0\n{}", FLAG));
    assert!(has_error(&diagnostics, "duplicate let binding 'a'"));
}

#[test]
fn test_function_arity() {
    let diagnostics = analyze(&format!("let a = clamp(1.0, 2.0)\n{}", FLAG));
    assert!(has_error(&diagnostics, "function 'clamp' expects 3 argument(s), got 2"));
}

#[test]
fn test_grid_too_small() {
    let diagnostics = analyze("flag grid 1 x 3 size (1.0, 1.0) at (0.0, 0.0, 0.0)\n");
    assert!(has_error(&diagnostics, "flag cols must be at least 2"));
}

#[test]
fn test_non_positive_flag_size() {
    let diagnostics = analyze("flag grid 3 x 3 size (0.0, 1.0) at (0.0, 0.0, 0.0)\n");
    assert!(has_error(&diagnostics, "flag width must be positive"));
}

#[test]
fn test_duplicate_collider_names() {
    let diagnostics = analyze(&format!(
        "{}sphere a at (0.0, 0.0, 0.0) radius 1.0\ncapsule a at (0.0, 0.0, 0.0) height 1.0 radius 0.1 axis x\n",
        FLAG
    ));
    assert!(has_error(&diagnostics, "duplicate collider name 'a'"));
}

#[test]
fn test_non_positive_collider_radius() {
    let diagnostics = analyze(&format!("{}sphere a at (0.0, 0.0, 0.0) radius -1.0\n", FLAG));
    assert!(has_error(&diagnostics, "radius must be positive"));
}

#[test]
fn test_unknown_setting_and_feature() {
    let diagnostics = analyze(&format!("{}set viscosity = 1.0\ndisable rain\n", FLAG));
    assert!(has_error(&diagnostics, "unknown setting 'viscosity'"));
    assert!(has_error(&diagnostics, "unknown feature 'rain'"));
}

#[test]
fn test_setting_shape_mismatch() {
    let diagnostics = analyze(&format!(
        "{}set gravity = (0.0, 1.0, 0.0)\nset wind_direction = 1.0\n",
        FLAG
    ));
    assert!(has_error(&diagnostics, "setting 'gravity' expects a scalar"));
    assert!(has_error(&diagnostics, "setting 'wind_direction' expects a vector"));
}

#[test]
fn test_excessive_wind_is_a_warning() {
    let diagnostics = analyze(&format!("{}set wind_strength = 50.0\n", FLAG));
    assert!(!diagnostics.has_errors());
    assert_eq!(diagnostics.warnings().count(), 1);
}

#[test]
fn test_detector_index_out_of_range() {
    let diagnostics = analyze(&format!("{}detect far = distance(0, 9)\n", FLAG));
    assert!(has_error(&diagnostics, "particle index 9 in detector 'far' is out of range"));
}

#[test]
fn test_detector_index_counts_subdivided_vertices() {
    // 3 x 3 grid subdivided once has 25 vertices
    let diagnostics = analyze(&format!("{}subdivide 1\ndetect mid = position(24).y\n", FLAG));
    assert!(!diagnostics.has_errors());

    let diagnostics = analyze(&format!("{}subdivide 1\ndetect mid = position(25).y\n", FLAG));
    assert!(diagnostics.has_errors());
}

#[test]
fn test_subdivide_limits() {
    let diagnostics = analyze(&format!("{}subdivide 9\n", FLAG));
    assert!(has_error(&diagnostics, "exceeds the maximum"));

    let diagnostics = analyze(&format!("{}subdivide -1\n", FLAG));
    assert!(has_error(&diagnostics, "must not be negative"));
}

#[test]
fn test_duplicate_detector_names() {
    let diagnostics = analyze(&format!("{}detect a = lowest_y\ndetect a = highest_y\n", FLAG));
    assert!(has_error(&diagnostics, "duplicate detector name 'a'"));
}

#[test]
fn test_burst_checks() {
    let diagnostics = analyze(&format!("{}burst at step 5 duration -1.0\n", FLAG));
    assert!(has_error(&diagnostics, "burst duration must not be negative"));

    let diagnostics = analyze(&format!("{}burst at step 500 duration 1.0\n", FLAG));
    assert!(!diagnostics.has_errors());
    assert!(diagnostics.warnings().any(|d| d.message.contains("never fires")));
}

#[test]
fn test_bad_simulate_values() {
    let source = format!("{}simulate dt = 0.0 steps = -5\n", FLAG);
    let diagnostics = analyze_scene(&parse_scene(&source).unwrap());
    assert!(has_error(&diagnostics, "dt must be positive"));
    assert!(has_error(&diagnostics, "steps must not be negative"));
}

#[test]
fn test_settings_that_would_stall_the_solver() {
    let tiny_cells = analyze(&format!("{}set cell_size_factor = 0.002\n", FLAG));
    assert!(has_error(&tiny_cells, "cell_size_factor"));

    let deep_octree = analyze(&format!("{}index octree\nset octree_max_depth = 1000000\n", FLAG));
    assert!(has_error(&deep_octree, "octree_max_depth"));

    let bad_stiffness = analyze(&format!("{}set stiffness = 2.0\n", FLAG));
    assert!(has_error(&bad_stiffness, "stiffness"));
}
