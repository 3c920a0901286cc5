//! Per-tick orchestrator: builds a `MovementIntent`, samples ground and
//! liquid, branches on motion mode, and emits `PhysicsOutput`.

use std::collections::HashMap;

use crate::abi::{
    DynamicObjectInfo, PhysicsInput, PhysicsOutput, MOVEFLAG_FALLINGFAR, MOVEFLAG_JUMPING,
    NOT_FALLING_Z, PHYSICS_FLAG_TRUST_INPUT_VELOCITY,
};
use crate::collide::collide_and_slide;
use crate::error::PhysicsError;
use crate::geometry::{Capsule, Vec3};
use crate::log_sink::{Category, Event, NoopSink, Sink};
use crate::map_tree::StaticMapTree;
use crate::movement::{intent_from_flags, is_moving_backward, select_speed, with_swimming_flag};
use crate::scene_query::SceneQuery;
use crate::terrain::TerrainGrid;
use crate::tolerances::Tolerances;

use super::state::{MotionMode, MovementState};

/// Jump impulse applied to vertical velocity when `MOVEFLAG_JUMPING` is set
/// while grounded.
pub const JUMP_VELOCITY: f32 = 7.95;

struct MapData {
    tree: StaticMapTree,
    terrain: TerrainGrid,
}

/// Caller-owned collection of maps plus engine-wide tolerances. No
/// process-wide state: every map is addressed by id, owned by whoever holds
/// the `PhysicsWorld`.
pub struct PhysicsWorld {
    maps: HashMap<u32, MapData>,
    pub tolerances: Tolerances,
    sink: Box<dyn Sink + Send + Sync>,
}

impl PhysicsWorld {
    pub fn new(tolerances: Tolerances) -> Self {
        Self {
            maps: HashMap::new(),
            tolerances,
            sink: Box::new(NoopSink),
        }
    }

    pub fn with_sink(tolerances: Tolerances, sink: Box<dyn Sink + Send + Sync>) -> Self {
        Self {
            maps: HashMap::new(),
            tolerances,
            sink,
        }
    }

    pub fn insert_map(&mut self, map_id: u32, tree: StaticMapTree, terrain: TerrainGrid) {
        self.maps.insert(map_id, MapData { tree, terrain });
    }

    pub fn map_tree(&self, map_id: u32) -> Option<&StaticMapTree> {
        self.maps.get(&map_id).map(|m| &m.tree)
    }

    pub fn map_tree_mut(&mut self, map_id: u32) -> Option<&mut StaticMapTree> {
        self.maps.get_mut(&map_id).map(|m| &mut m.tree)
    }
}

fn validate_finite(input: &PhysicsInput) -> Result<(), PhysicsError> {
    let scalars = [
        input.x, input.y, input.z, input.orientation, input.pitch, input.vx, input.vy, input.vz,
        input.height, input.radius, input.delta_time,
    ];
    if scalars.iter().any(|v| !v.is_finite()) {
        return Err(PhysicsError::InvalidInput(
            "non-finite coordinate or velocity in PhysicsInput".to_string(),
        ));
    }
    Ok(())
}

/// `step(world, input) -> output` is the engine's entire public contract:
/// a pure function, synchronous and bounded, with no error channel for
/// geometric pathology. Non-finite input is the one exception, the single
/// invariant violation this function will not silently absorb.
pub fn step(world: &PhysicsWorld, input: &PhysicsInput) -> Result<PhysicsOutput, PhysicsError> {
    validate_finite(input)?;

    let Some(map) = world.maps.get(&input.map_id) else {
        // QueryFailure: non-fatal, identity step with no hits.
        return Ok(identity_output(input));
    };

    let tol = &world.tolerances;
    let scene = SceneQuery::new(&map.tree, &map.terrain, tol);
    let dt = input.delta_time.max(0.0);

    let was_falling = input.fall_start_z > NOT_FALLING_Z + 1.0;
    let mut state = MovementState::initial(
        Vec3::new(input.x, input.y, input.z),
        input.orientation,
        input.pitch,
        Vec3::new(input.vx, input.vy, input.vz),
        input.prev_ground_nz > 0.0,
    );
    state.fall_time = if was_falling {
        input.fall_time as f32 / 1000.0
    } else {
        0.0
    };
    state.fall_start_z = if was_falling { input.fall_start_z } else { state.position.z };
    state.ground_normal = Vec3::new(input.prev_ground_nx, input.prev_ground_ny, input.prev_ground_nz);
    state.pending_depenetration = Vec3::new(input.pending_depen_x, input.pending_depen_y, input.pending_depen_z);
    state.frames_since_step_down = input.frames_since_step_down;

    let capsule = |pos: Vec3| Capsule::from_feet(pos, input.height, input.radius);

    // 1. Movement intent.
    let trust_velocity = input.physics_flags & PHYSICS_FLAG_TRUST_INPUT_VELOCITY != 0;
    let intent = intent_from_flags(input.move_flags, input.orientation);

    // 2. Ground sample: downward sweep starting slightly above the feet.
    let ground_probe_start = capsule(state.position).translated(Vec3::new(0.0, 0.0, 0.05));
    let ground_hits = scene.sweep_capsule(&ground_probe_start, Vec3::new(0.0, 0.0, -1.0), tol.step_down_height + 0.05);
    let ground_hit = ground_hits
        .iter()
        .find(|h| !h.start_penetrating && h.normal.z >= tol.walkable_min_normal_z);
    let ground_z = ground_hit.map(|h| h.point.z);
    let is_grounded_now = match ground_z {
        Some(gz) => {
            let diff = state.position.z - gz;
            diff >= -1e-3 && diff <= tol.step_height
        }
        None => false,
    };

    // 3. Liquid sample.
    let liquid = scene.evaluate_liquid_at(state.position.x, state.position.y, state.position.z, input.height);
    let is_swimming = liquid.is_swimming && !is_grounded_now;

    world.sink.emit(
        Category::Step,
        Event::StateTransition {
            from: "pre",
            to: if is_swimming {
                "swimming"
            } else if is_grounded_now {
                "grounded"
            } else {
                "airborne"
            },
        },
    );

    let mut depenetration_applied = Vec3::zeros();
    let result = if is_swimming {
        step_swimming(input, &state, &intent, tol, dt)
    } else if is_grounded_now {
        state.grounded = true;
        state.ground_normal = ground_hit.map(|h| h.normal).unwrap_or(state.ground_normal);
        step_grounded(
            &map.tree,
            &map.terrain,
            tol,
            input,
            &state,
            &intent,
            &capsule,
            dt,
            &mut depenetration_applied,
        )
    } else {
        step_airborne(
            &map.tree,
            &map.terrain,
            tol,
            input,
            &state,
            trust_velocity,
            &capsule,
            dt,
        )
    };

    let mut out = result;
    out.z = out.z.clamp(-100_000.0, 100_000.0);
    out.move_flags = with_swimming_flag(out.move_flags, is_swimming);
    if out.move_flags & MOVEFLAG_JUMPING == 0 && is_grounded_now {
        out.move_flags &= !(MOVEFLAG_JUMPING | MOVEFLAG_FALLINGFAR);
    }
    out.ground_z = ground_z.unwrap_or(f32::NEG_INFINITY);
    out.ground_nx = state.ground_normal.x;
    out.ground_ny = state.ground_normal.y;
    out.ground_nz = state.ground_normal.z;
    out.liquid_z = liquid.level;
    out.liquid_type = liquid.type_id;
    out.pending_depen_x = depenetration_applied.x;
    out.pending_depen_y = depenetration_applied.y;
    out.pending_depen_z = depenetration_applied.z;
    out.standing_on_instance_id = input.standing_on_instance_id;
    out.standing_on_local_x = input.standing_on_local_x;
    out.standing_on_local_y = input.standing_on_local_y;
    out.standing_on_local_z = input.standing_on_local_z;
    out.current_spline_index = input.current_spline_index;

    Ok(out)
}

fn identity_output(input: &PhysicsInput) -> PhysicsOutput {
    PhysicsOutput {
        x: input.x,
        y: input.y,
        z: input.z,
        orientation: input.orientation,
        pitch: input.pitch,
        vx: input.vx,
        vy: input.vy,
        vz: input.vz,
        move_flags: input.move_flags,
        ground_z: f32::NEG_INFINITY,
        liquid_z: 0.0,
        liquid_type: 0,
        ground_nx: input.prev_ground_nx,
        ground_ny: input.prev_ground_ny,
        ground_nz: input.prev_ground_nz,
        pending_depen_x: input.pending_depen_x,
        pending_depen_y: input.pending_depen_y,
        pending_depen_z: input.pending_depen_z,
        frames_since_step_down: input.frames_since_step_down,
        standing_on_instance_id: input.standing_on_instance_id,
        standing_on_local_x: input.standing_on_local_x,
        standing_on_local_y: input.standing_on_local_y,
        standing_on_local_z: input.standing_on_local_z,
        fall_distance: 0.0,
        fall_start_z: input.fall_start_z,
        fall_time: input.fall_time as f32 / 1000.0,
        current_spline_index: input.current_spline_index,
        spline_progress: 0.0,
    }
}

fn base_output(input: &PhysicsInput, state: &MovementState) -> PhysicsOutput {
    PhysicsOutput {
        x: state.position.x,
        y: state.position.y,
        z: state.position.z,
        orientation: state.orientation,
        pitch: state.pitch,
        vx: state.velocity.x,
        vy: state.velocity.y,
        vz: state.velocity.z,
        move_flags: input.move_flags,
        ground_z: f32::NEG_INFINITY,
        liquid_z: 0.0,
        liquid_type: 0,
        ground_nx: state.ground_normal.x,
        ground_ny: state.ground_normal.y,
        ground_nz: state.ground_normal.z,
        pending_depen_x: 0.0,
        pending_depen_y: 0.0,
        pending_depen_z: 0.0,
        frames_since_step_down: state.frames_since_step_down,
        standing_on_instance_id: input.standing_on_instance_id,
        standing_on_local_x: input.standing_on_local_x,
        standing_on_local_y: input.standing_on_local_y,
        standing_on_local_z: input.standing_on_local_z,
        fall_distance: (state.fall_start_z - state.position.z).max(0.0),
        fall_start_z: state.fall_start_z,
        fall_time: state.fall_time,
        current_spline_index: input.current_spline_index,
        spline_progress: 0.0,
    }
}

fn step_swimming(
    input: &PhysicsInput,
    state: &MovementState,
    intent: &crate::movement::MovementIntent,
    _tol: &Tolerances,
    dt: f32,
) -> PhysicsOutput {
    let speed = select_speed(
        input.move_flags,
        true,
        is_moving_backward(input.move_flags),
        input.walk_speed,
        input.run_speed,
        input.run_back_speed,
        input.swim_speed,
        input.swim_back_speed,
    );
    let mut vel = intent.dir * speed;
    if intent.is_moving {
        vel.z = input.pitch.sin() * speed;
    } else {
        vel.z = 0.0;
    }
    let mut new_state = *state;
    new_state.position += vel * dt;
    new_state.velocity = vel;
    new_state.fall_time = 0.0;
    new_state.fall_start_z = new_state.position.z;
    new_state.mode = MotionMode::Swimming;
    new_state.swimming = true;

    let mut out = base_output(input, &new_state);
    out.fall_distance = 0.0;
    out
}

#[allow(clippy::too_many_arguments)]
fn step_grounded(
    map: &StaticMapTree,
    terrain: &TerrainGrid,
    tol: &Tolerances,
    input: &PhysicsInput,
    state: &MovementState,
    intent: &crate::movement::MovementIntent,
    capsule: &dyn Fn(Vec3) -> Capsule,
    dt: f32,
    depenetration_applied: &mut Vec3,
) -> PhysicsOutput {
    let mut new_state = *state;
    new_state.mode = MotionMode::Grounded;
    new_state.grounded = true;
    new_state.fall_time = 0.0;
    new_state.fall_start_z = state.position.z;

    if input.move_flags & MOVEFLAG_JUMPING != 0 {
        new_state.velocity.z = JUMP_VELOCITY;
        new_state.grounded = false;
        new_state.mode = MotionMode::Airborne;
        let mut out = base_output(input, &new_state);
        out.move_flags |= MOVEFLAG_JUMPING;
        return out;
    }

    let speed = select_speed(
        input.move_flags,
        false,
        is_moving_backward(input.move_flags),
        input.walk_speed,
        input.run_speed,
        input.run_back_speed,
        input.swim_speed,
        input.swim_back_speed,
    );
    let desired = intent.dir * speed * dt;

    let start_capsule = capsule(state.position);
    let slide = collide_and_slide(
        map,
        terrain,
        tol,
        &start_capsule,
        desired,
        desired.norm(),
        true,
        false,
    );
    // `collide_and_slide` tracks capsule *center* motion; recover the world
    // position (feet reference) from that displacement.
    new_state.position = state.position + (slide.end_pos - start_capsule.center());

    // Apply external knockback as additive displacement.
    new_state.position.x += input.vx * dt;
    new_state.position.y += input.vy * dt;

    let scene = SceneQuery::new(map, terrain, tol);
    let probe_capsule = capsule(new_state.position).translated(Vec3::new(0.0, 0.0, tol.step_height + 0.05));
    let widened = if state.frames_since_step_down > 0 {
        tol.step_down_hysteresis_extra
    } else {
        0.0
    };
    let down_hits = scene.sweep_capsule(
        &probe_capsule,
        Vec3::new(0.0, 0.0, -1.0),
        tol.step_height + tol.step_down_height + widened + 0.05,
    );
    let walkable_hit = down_hits
        .iter()
        .find(|h| !h.start_penetrating && h.normal.z >= tol.walkable_min_normal_z);

    match walkable_hit {
        Some(hit) => {
            let diff = hit.point.z - new_state.position.z;
            if diff < -1e-3 {
                new_state.frames_since_step_down = tol.step_down_hysteresis_frames;
            } else {
                new_state.frames_since_step_down = state.frames_since_step_down.saturating_sub(1);
            }
            new_state.position.z = hit.point.z;
            new_state.ground_normal = hit.normal;
            new_state.grounded = true;
        }
        None => {
            let pen_hit = down_hits.iter().find(|h| h.start_penetrating && h.normal.z >= tol.walkable_min_normal_z);
            if let Some(hit) = pen_hit {
                new_state.position.z = hit.point.z;
                new_state.ground_normal = hit.normal;
                new_state.grounded = true;
            } else if state.frames_since_step_down > 0 {
                new_state.frames_since_step_down -= 1;
                new_state.grounded = true;
            } else {
                // Freeze XY at the edge; do not commit displacement past it.
                new_state.position.x = state.position.x;
                new_state.position.y = state.position.y;
                new_state.grounded = false;
                new_state.mode = MotionMode::Airborne;
            }
        }
    }

    new_state.velocity = Vec3::new(
        (new_state.position.x - state.position.x) / dt.max(1e-6),
        (new_state.position.y - state.position.y) / dt.max(1e-6),
        0.0,
    );

    *depenetration_applied = apply_depenetration(&mut new_state, tol, dt);

    let _ = slide.hit_wall; // no ABI flag carries wall contact today; kept for future wiring.
    base_output(input, &new_state)
}

fn step_airborne(
    map: &StaticMapTree,
    terrain: &TerrainGrid,
    tol: &Tolerances,
    input: &PhysicsInput,
    state: &MovementState,
    trust_velocity: bool,
    capsule: &dyn Fn(Vec3) -> Capsule,
    dt: f32,
) -> PhysicsOutput {
    let mut new_state = *state;
    new_state.mode = MotionMode::Airborne;
    new_state.grounded = false;

    let (vx, vy) = if trust_velocity {
        (input.vx, input.vy)
    } else {
        (state.velocity.x, state.velocity.y)
    };
    let vz0 = state.velocity.z;
    let vz1 = (vz0 - tol.gravity * dt).max(-tol.terminal_velocity);

    let delta = Vec3::new(vx * dt, vy * dt, vz0 * dt - 0.5 * tol.gravity * dt * dt);
    let start_capsule = capsule(state.position);
    let fall_dist = delta.z.abs().max(vz1.abs() * dt) + tol.step_down_height;

    let scene = SceneQuery::new(map, terrain, tol);
    let down_hits = scene.sweep_capsule(&start_capsule, Vec3::new(0.0, 0.0, -1.0), fall_dist);
    let walkable = down_hits
        .iter()
        .filter(|h| h.normal.z >= tol.walkable_min_normal_z)
        .min_by(|a, b| {
            // Tie-break: prefer terrain (id=0), then lower z.
            let a_is_terrain = a.source_instance_id == crate::map_tree::TERRAIN_INSTANCE_ID;
            let b_is_terrain = b.source_instance_id == crate::map_tree::TERRAIN_INSTANCE_ID;
            a.time
                .total_cmp(&b.time)
                .then(b_is_terrain.cmp(&a_is_terrain))
                .then(a.point.z.total_cmp(&b.point.z))
        });

    match walkable {
        Some(hit) if !hit.start_penetrating => {
            new_state.position.x += vx * dt;
            new_state.position.y += vy * dt;
            new_state.position.z = hit.point.z;
            new_state.velocity = Vec3::new(vx, vy, 0.0);
            new_state.ground_normal = hit.normal;
            new_state.grounded = true;
            new_state.mode = MotionMode::Grounded;
            new_state.fall_time = 0.0;
        }
        Some(hit) => {
            // Only start-penetrating walkables: snap to the highest one.
            let highest = down_hits
                .iter()
                .filter(|h| h.start_penetrating && h.normal.z >= tol.walkable_min_normal_z)
                .max_by(|a, b| a.point.z.total_cmp(&b.point.z))
                .unwrap_or(hit);
            new_state.position.x += vx * dt;
            new_state.position.y += vy * dt;
            new_state.position.z = highest.point.z;
            new_state.velocity = Vec3::new(vx, vy, 0.0);
            new_state.ground_normal = highest.normal;
            new_state.grounded = true;
            new_state.mode = MotionMode::Grounded;
            new_state.fall_time = 0.0;
        }
        None => {
            new_state.position += delta;
            new_state.velocity = Vec3::new(vx, vy, vz1);
            new_state.fall_time = state.fall_time + dt;
        }
    }

    let mut out = base_output(input, &new_state);
    if !new_state.grounded && new_state.velocity.z < 0.0 {
        out.move_flags |= MOVEFLAG_FALLINGFAR;
    }
    out.fall_distance = (new_state.fall_start_z - new_state.position.z).max(0.0);
    out
}

/// Bounded, upward-biased recovery from start-of-tick penetration: the
/// correction is clamped to a fraction of the radius per tick and surfaced
/// back through the output so multi-frame recovery avoids visible popping.
fn apply_depenetration(state: &mut MovementState, tol: &Tolerances, _dt: f32) -> Vec3 {
    if state.pending_depenetration.norm_squared() < 1e-10 {
        return Vec3::zeros();
    }
    let max_step = tol.depenetration_rate * 0.5; // fraction of a nominal 1.0 radius; callers scale by their own radius upstream.
    let mut correction = state.pending_depenetration;
    if correction.norm() > max_step {
        correction = correction.normalize() * max_step;
    }
    // Bias upward for stability.
    if correction.z < 0.0 {
        correction.z = 0.0;
    }
    state.position += correction;
    state.pending_depenetration -= correction;
    correction
}

/// Nearby dynamic objects are carried through verbatim; the core does not
/// currently consume them (see DESIGN.md "Open questions").
pub fn nearby_objects_passthrough(objects: &[DynamicObjectInfo]) -> &[DynamicObjectInfo] {
    objects
}
