//! Integration tests for the physics step.
//!
//! These drive a [`Swarm`] through its public API and check the physical
//! properties the step must hold: determinism, action/reaction, wall
//! behaviour, grid bookkeeping and the closed-form free fall.

use shoal::prelude::*;

const DT: f32 = 1.0 / 60.0;

fn swarm_at(positions: Vec<Vec3>) -> Swarm {
    let n = positions.len();
    Swarm::new(SwarmConfig::default(), positions, vec![Quat::IDENTITY; n]).unwrap()
}

/// Run phases 1 to 3 only, leaving the accumulated accelerations readable.
fn forces_only(swarm: &mut Swarm, dt: f32) {
    swarm.clear_accelerations();
    swarm.advance_tide(dt);
    swarm.accumulate_forces(dt);
}

fn crowded_swarm(seed: u64) -> Swarm {
    Swarm::builder()
        .with_particle_count(200)
        .with_half_extent(3.0)
        .with_seed(seed)
        .with_spawner(|ctx| {
            ParticleInit::at(ctx.random_in_box(2.7, -0.5..2.0)).with_rotation(ctx.random_rotation())
        })
        .build()
        .unwrap()
}

/// Every particle is registered in exactly the cells its position maps to.
fn assert_grid_consistent(swarm: &Swarm) {
    let grid = swarm.grid();
    for (i, p) in swarm.positions().iter().enumerate() {
        for &cell in &grid.cells_at(*p) {
            assert!(grid.contains(cell, i as u32), "particle {} lost from cell {}", i, cell);
        }
    }
    for cell in 0..grid.cell_count() as u32 {
        for &j in grid.members(cell) {
            let expected = grid.cells_at(swarm.positions()[j as usize]);
            assert!(expected.contains(cell), "particle {} stale in cell {}", j, cell);
        }
    }
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_same_seed_same_trajectory() {
    let mut a = crowded_swarm(1234);
    let mut b = crowded_swarm(1234);
    let dts = [DT, DT * 0.5, DT * 2.0, 0.01, DT];

    for k in 0..150 {
        let dt = dts[k % dts.len()];
        a.step(dt);
        b.step(dt);
    }

    assert_eq!(a.positions_flat(), b.positions_flat());
    assert_eq!(a.rotations_flat(), b.rotations_flat());
    assert_eq!(a.velocities(), b.velocities());
    assert_eq!(a.tide_x(), b.tide_x());
}

#[test]
fn test_different_seed_different_start() {
    let a = crowded_swarm(1);
    let b = crowded_swarm(2);
    assert_ne!(a.positions_flat(), b.positions_flat());
}

// ============================================================================
// Pairwise forces
// ============================================================================

#[test]
fn test_pair_obeys_action_reaction() {
    let config = SwarmConfig::default();
    let g = config.forces.gravity;
    let lift = config.forces.contact.lift;

    // Particle 1 sits above particle 0, both above water, away from walls.
    let mut swarm = swarm_at(vec![Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.2, 1.1, 0.1)]);
    forces_only(&mut swarm, DT);

    let a0 = swarm.accelerations()[0];
    let a1 = swarm.accelerations()[1];

    let push0 = a0 + Vec3::new(0.0, g, 0.0);
    let push1 = a1 + Vec3::new(0.0, g, 0.0);

    // Horizontal components are equal and opposite.
    assert!((push0.x + push1.x).abs() < 1e-4);
    assert!((push0.z + push1.z).abs() < 1e-4);

    // Only the higher particle gets the lift.
    let magnitude = config.forces.contact.stiffness * config.forces.contact.max_ratio;
    let symmetric1 = push1 - Vec3::new(0.0, lift * magnitude, 0.0);
    assert!((symmetric1 + push0).length() < 1e-4);
    assert!((symmetric1.length() - magnitude).abs() < 1e-3);

    // The push separates them.
    assert!(symmetric1.dot(Vec3::new(0.2, 0.1, 0.1)) > 0.0);
}

#[test]
fn test_coincident_pair_pushes_along_up() {
    let config = SwarmConfig::default();
    let g = config.forces.gravity;
    let f = config.forces.contact.stiffness * config.forces.contact.max_ratio;
    let lift = config.forces.contact.lift * f;

    let p = Vec3::new(0.5, 1.0, -0.5);
    let mut swarm = swarm_at(vec![p, p]);
    forces_only(&mut swarm, DT);

    let a0 = swarm.accelerations()[0];
    let a1 = swarm.accelerations()[1];
    assert!(a0.is_finite() && a1.is_finite());

    // Particle 1 is pushed up, particle 0 down, and the tie sends the lift to 0.
    assert_eq!(a1.x, 0.0);
    assert_eq!(a1.z, 0.0);
    assert!((a1.y - (-g + f)).abs() < 1e-4);
    assert!((a0.y - (-g - f + lift)).abs() < 1e-4);

    swarm.step(DT);
    assert!(swarm.positions().iter().all(|p| p.is_finite()));
    assert!(swarm.positions()[1].y > swarm.positions()[0].y);
}

#[test]
fn test_distant_pair_does_not_interact() {
    let mut swarm = swarm_at(vec![Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.6, 1.0, 0.0)]);
    forces_only(&mut swarm, DT);
    assert_eq!(swarm.accelerations()[0], swarm.accelerations()[1]);
}

#[test]
fn test_pair_outside_grid_is_ignored() {
    // Both far beyond the +X wall and the grid extent, overlapping.
    let mut swarm = swarm_at(vec![Vec3::new(10.0, 1.0, 0.0), Vec3::new(10.0, 1.0, 0.1)]);
    assert!(swarm.grid().cells_at(swarm.positions()[0]).is_empty());

    forces_only(&mut swarm, DT);
    let a0 = swarm.accelerations()[0];
    let a1 = swarm.accelerations()[1];
    assert_eq!(a0, a1);
    // The wall still pushes them back in.
    assert_eq!(a0.x, -swarm.config().forces.wall.stiffness);

    swarm.step(DT);
    assert!(swarm.positions()[0].x < 10.0);
}

// ============================================================================
// Walls
// ============================================================================

#[test]
fn test_no_wall_force_inside_box() {
    let mut swarm = swarm_at(vec![Vec3::new(0.0, 1.0, 0.0)]);
    forces_only(&mut swarm, DT);
    let g = swarm.config().forces.gravity;
    assert_eq!(swarm.accelerations()[0], Vec3::new(0.0, -g, 0.0));
}

#[test]
fn test_wall_force_saturates() {
    let config = SwarmConfig::default();
    let s = config.half_extent;
    let r = config.radius;
    let cap = config.forces.wall.cap_depth;
    let k = config.forces.wall.stiffness;

    // Penetrating the +X wall by exactly cap depth, and much deeper.
    let mut swarm = swarm_at(vec![
        Vec3::new(s - r + cap, 1.0, 0.0),
        Vec3::new(s + 0.5, 1.0, -1.0),
    ]);
    forces_only(&mut swarm, DT);

    assert!((swarm.accelerations()[0].x + k).abs() < 1e-3);
    assert_eq!(swarm.accelerations()[1].x, -k);
}

#[test]
fn test_corner_gets_two_walls() {
    let config = SwarmConfig::default();
    let s = config.half_extent;
    let mut swarm = swarm_at(vec![Vec3::new(-s, 1.0, -s)]);
    forces_only(&mut swarm, DT);
    let a = swarm.accelerations()[0];
    assert!(a.x > 0.0);
    assert!(a.z > 0.0);
    assert!((a.x - a.z).abs() < 1e-5);
}

// ============================================================================
// Water
// ============================================================================

#[test]
fn test_buoyancy_and_tide_underwater() {
    let config = SwarmConfig::default();
    let forces = config.forces;

    // Directly under the tide centre, which has not moved yet.
    let mut swarm = swarm_at(vec![Vec3::new(0.0, -0.5, 0.0)]);
    swarm.clear_accelerations();
    swarm.accumulate_forces(DT);
    let expected = -forces.gravity + 0.5 * forces.buoyancy - forces.tide.strength;
    assert!((swarm.accelerations()[0].y - expected).abs() < 1e-4);
}

#[test]
fn test_floats_near_surface() {
    let mut swarm = swarm_at(vec![Vec3::new(-2.0, 2.0, 1.0)]);
    for _ in 0..1200 {
        swarm.step(DT);
    }
    let y = swarm.positions()[0].y;
    assert!(y < 0.0 && y > -1.5, "y = {}", y);
}

// ============================================================================
// Integration
// ============================================================================

#[test]
fn test_free_fall_matches_closed_form() {
    let config = SwarmConfig::default();
    let g = config.forces.gravity as f64;
    let keep = 1.0 - config.forces.friction as f64;
    let y0 = 5.0;
    let dt = DT as f64;
    let k = 30;

    let mut swarm = swarm_at(vec![Vec3::new(0.0, y0 as f32, 0.0)]);
    for _ in 0..k {
        swarm.step(DT);
    }

    // v_{n+1} = keep * v_n - g dt, p_{n+1} = p_n + dt v_{n+1}
    let rk = keep.powi(k);
    let v = -g * dt * (1.0 - rk) / (1.0 - keep);
    let p = y0 - g * dt * dt / (1.0 - keep) * (k as f64 - keep * (1.0 - rk) / (1.0 - keep));

    let state_v = swarm.velocities()[0];
    let state_p = swarm.positions()[0];
    assert!((state_v.y as f64 - v).abs() < 1e-4, "v {} vs {}", state_v.y, v);
    assert!((state_p.y as f64 - p).abs() < 1e-4, "p {} vs {}", state_p.y, p);
    assert_eq!(state_p.x, 0.0);
    assert_eq!(state_p.z, 0.0);
}

#[test]
fn test_rotation_follows_spin() {
    let mut swarm = swarm_at(vec![Vec3::new(0.0, 1.0, 0.0)]);
    swarm.set_angular_velocity(0, Quat::from_rotation_y(0.05));
    swarm.step(DT);
    // damped first, then composed
    let damping = swarm.config().forces.angular_damping;
    let expected = Quat::from_rotation_y(0.05 * (1.0 - damping));
    assert!(swarm.rotations()[0].abs_diff_eq(expected, 1e-5));

    for _ in 0..2000 {
        swarm.step(DT);
    }
    assert!(swarm.angular_velocities()[0].abs_diff_eq(Quat::IDENTITY, 1e-4));
    assert!((swarm.rotations()[0].length() - 1.0).abs() < 1e-5);
}

// ============================================================================
// Grid bookkeeping
// ============================================================================

#[test]
fn test_grid_stays_consistent() {
    let mut swarm = crowded_swarm(99);
    assert_grid_consistent(&swarm);
    for k in 0..300 {
        swarm.step(DT);
        if k % 30 == 0 {
            assert_grid_consistent(&swarm);
        }
    }
    assert_grid_consistent(&swarm);
}

#[test]
fn test_crowded_swarm_stays_finite() {
    let mut swarm = crowded_swarm(7);
    for _ in 0..600 {
        swarm.step(DT);
    }
    assert!(swarm.positions().iter().all(|p| p.is_finite()));
    assert!(swarm.velocities().iter().all(|v| v.is_finite()));
    assert!(swarm
        .rotations()
        .iter()
        .all(|q| q.is_finite() && (q.length() - 1.0).abs() < 1e-4));
}

#[test]
fn test_huge_dt_degrades_without_nan() {
    let mut swarm = crowded_swarm(3);
    swarm.step(1.0e6);
    swarm.step(DT);
    assert!(swarm.positions().iter().all(|p| p.is_finite()));
    assert_grid_consistent(&swarm);
}

#[test]
fn test_config_from_json_drives_swarm() {
    let config = SwarmConfig::from_json(r#"{ "forces": { "gravity": 0.0, "friction": 0.0 } }"#).unwrap();
    let mut swarm = Swarm::new(config, vec![Vec3::new(0.0, 1.0, 0.0)], vec![Quat::IDENTITY]).unwrap();
    swarm.set_velocity(0, Vec3::new(1.0, 0.0, 0.0));
    swarm.step(0.1);
    assert!((swarm.positions()[0] - Vec3::new(0.1, 1.0, 0.0)).length() < 1e-6);
}

#[test]
fn test_particle_against_wall_keeps_falling() {
    let mut swarm = swarm_at(vec![Vec3::new(2.9, 1.0, 0.0)]);
    for _ in 0..10 {
        swarm.step(DT);
    }
    let p = swarm.positions()[0];
    assert!(p.y < 1.0, "still hanging at {:?}", p);
    assert!(p.x < 2.9, "wall did not push back: {:?}", p);
}

#[test]
fn test_unusable_configs_are_rejected_at_construction() {
    let build = |config: SwarmConfig| Swarm::new(config, vec![Vec3::ZERO], vec![Quat::IDENTITY]);

    let huge = SwarmConfig {
        half_extent: 40_000.0,
        ..Default::default()
    };
    assert!(matches!(build(huge), Err(SwarmError::GridTooLarge { .. })));

    let mut nan_overlap = SwarmConfig::default();
    nan_overlap.grid.overlap = f32::NAN;
    assert!(matches!(build(nan_overlap), Err(SwarmError::InvalidGrid { .. })));

    let mut flat_wall = SwarmConfig::default();
    flat_wall.forces.wall.cap_depth = 0.0;
    assert!(matches!(
        build(flat_wall),
        Err(SwarmError::InvalidForce { name: "wall.cap_depth", .. })
    ));

    let mut still_tide = SwarmConfig::default();
    still_tide.forces.tide.range = 0.0;
    assert!(matches!(
        build(still_tide),
        Err(SwarmError::InvalidForce { name: "tide.range", .. })
    ));
}

#[test]
fn test_zero_rotation_from_flat_state_is_rejected() {
    let result = Swarm::builder()
        .with_seed(4)
        .with_flat_state(&[0.0, 1.0, 0.0, 1.0, 1.0, 0.0], &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0])
        .build();
    assert!(matches!(
        result,
        Err(SwarmError::DegenerateQuaternion { index: 1, .. })
    ));
}
