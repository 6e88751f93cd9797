//! # Targeting Resolver
//!
//! Turns an activation's aim (an entity, a position, or both) into the
//! ordered list of entities a payload will affect.
//!
//! Resolution is deterministic: candidate enumeration follows world id
//! order, distance sorting breaks ties by id, and every random choice
//! (random single target, capped random area selection, aim scatter)
//! derives from the activation's power seed. Resolving the same aim
//! against the same world twice yields the same list.

mod resolve;
mod shapes;

pub use resolve::{
    ResolveInputs, resolve_targets, scatter_aim, sweep_duration_ms, valid_target,
    within_application_range,
};
pub use shapes::{ShapeParams, beam_slice_count, beam_slice_geometry, contains};

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::def::{AbilityDefinition, AbilityId, TargetingShape};
    use crate::attributes::Attr;
    use crate::env::{DefaultTuning, Env, GameEnv, OpenField, PcgRng};
    use crate::error::PowerError;
    use crate::math::Vec3;
    use crate::state::{Actor, AllianceId, EntityId, World};

    const FRIEND: AllianceId = AllianceId(0);
    const FOE: AllianceId = AllianceId(1);

    fn live_actor(id: u64, position: Vec3, alliance: AllianceId) -> Actor {
        let mut actor = Actor::new(EntityId(id), position, alliance);
        actor.attrs.set_f32(Attr::Health, 100.0);
        actor.attrs.set_f32(Attr::HealthMax, 100.0);
        actor.bounds_radius = 8.0;
        actor
    }

    fn arena() -> World {
        let mut world = World::new();
        world.insert(live_actor(1, Vec3::ZERO, FRIEND));
        world.insert(live_actor(10, Vec3::new(50.0, 0.0, 0.0), FOE));
        world.insert(live_actor(11, Vec3::new(120.0, 10.0, 0.0), FOE));
        world.insert(live_actor(12, Vec3::new(60.0, 80.0, 0.0), FOE));
        world.insert(live_actor(13, Vec3::new(-90.0, 0.0, 0.0), FOE));
        world.insert(live_actor(20, Vec3::new(70.0, -5.0, 0.0), FRIEND));
        world
    }

    fn aoe_def(shape: TargetingShape, radius: f32) -> AbilityDefinition {
        let mut def = AbilityDefinition::new(AbilityId(42), "test-area");
        def.style.shape = shape;
        def.style.needs_target = false;
        def.radius = radius;
        def.range = 500.0;
        def
    }

    struct Fixture {
        geometry: OpenField,
        tuning: DefaultTuning,
        rng: PcgRng,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture { geometry: OpenField, tuning: DefaultTuning, rng: PcgRng }
        }

        fn env(&self) -> GameEnv<'_> {
            Env::new(None, Some(&self.geometry), None, Some(&self.tuning), Some(&self.rng))
        }
    }

    fn inputs<'a>(def: &'a AbilityDefinition, aim: Vec3, seed: u32) -> ResolveInputs<'a> {
        ResolveInputs {
            def,
            user: EntityId(1),
            user_position: Vec3::ZERO,
            aim_target: EntityId::INVALID,
            aim_position: aim,
            power_seed: seed,
            beam_slice: None,
        }
    }

    #[test]
    fn circle_area_hits_enemies_nearest_first() {
        let fixture = Fixture::new();
        let world = arena();
        let def = aoe_def(TargetingShape::CircleArea, 100.0);

        let targets = resolve_targets(
            &world,
            &fixture.env(),
            &inputs(&def, Vec3::new(60.0, 0.0, 0.0), 1),
        )
        .unwrap();
        // Friendly 20 is skipped, 13 is out of the circle.
        assert_eq!(targets, alloc::vec![EntityId(10), EntityId(11), EntityId(12)]);
    }

    #[test]
    fn max_targets_caps_the_area() {
        let fixture = Fixture::new();
        let world = arena();
        let mut def = aoe_def(TargetingShape::CircleArea, 100.0);
        def.style.max_targets = 2;

        let targets = resolve_targets(
            &world,
            &fixture.env(),
            &inputs(&def, Vec3::new(60.0, 0.0, 0.0), 1),
        )
        .unwrap();
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn random_selection_without_seed_is_an_error() {
        let fixture = Fixture::new();
        let world = arena();
        let mut def = aoe_def(TargetingShape::CircleArea, 100.0);
        def.style.random_selection = true;

        let result = resolve_targets(
            &world,
            &fixture.env(),
            &inputs(&def, Vec3::new(60.0, 0.0, 0.0), 0),
        );
        assert_eq!(result, Err(PowerError::MissingSeed(def.id)));
    }

    #[test]
    fn random_selection_is_seed_stable_and_without_replacement() {
        let fixture = Fixture::new();
        let world = arena();
        let mut def = aoe_def(TargetingShape::CircleArea, 200.0);
        def.style.random_selection = true;

        let aim = Vec3::new(40.0, 0.0, 0.0);
        let a = resolve_targets(&world, &fixture.env(), &inputs(&def, aim, 777)).unwrap();
        let b = resolve_targets(&world, &fixture.env(), &inputs(&def, aim, 777)).unwrap();
        assert_eq!(a, b);

        let mut unique: Vec<EntityId> = a.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), a.len(), "no target repeats in one draw");
    }

    #[test]
    fn primary_target_leads_application_order() {
        let fixture = Fixture::new();
        let world = arena();
        let def = aoe_def(TargetingShape::CircleArea, 100.0);

        let mut input = inputs(&def, Vec3::new(60.0, 0.0, 0.0), 1);
        input.aim_target = EntityId(12);
        let targets = resolve_targets(&world, &fixture.env(), &input).unwrap();
        assert_eq!(targets[0], EntityId(12));
        assert!(!targets[1..].contains(&EntityId(12)));
    }

    #[test]
    fn user_centered_wedge_uses_aim_direction() {
        let fixture = Fixture::new();
        let world = arena();
        let mut def = aoe_def(TargetingShape::WedgeArea, 150.0);
        def.style.aoe_centered_on_user = true;
        def.style.aoe_angle_deg = 60.0;

        // Aim along +X: 10 and 11 are inside, 12 (53 degrees up) and 13
        // (behind) are not.
        let targets = resolve_targets(
            &world,
            &fixture.env(),
            &inputs(&def, Vec3::new(100.0, 0.0, 0.0), 1),
        )
        .unwrap();
        assert_eq!(targets, alloc::vec![EntityId(10), EntityId(11)]);
    }

    #[test]
    fn beam_sweep_slices_union_to_the_wedge() {
        let fixture = Fixture::new();
        let world = arena();
        let mut def = aoe_def(TargetingShape::BeamSweep, 200.0);
        def.style.aoe_centered_on_user = true;
        def.style.aoe_angle_deg = 170.0;
        def.timing.activation_ms = 1000;
        def.timing.beam_slice_ms = 100;

        let aim = Vec3::new(100.0, 0.0, 0.0);
        let mut wedge_def = def.clone();
        wedge_def.style.shape = TargetingShape::WedgeArea;
        let mut whole =
            resolve_targets(&world, &fixture.env(), &inputs(&wedge_def, aim, 1)).unwrap();

        let mut swept: Vec<EntityId> = Vec::new();
        for slice in 0..beam_slice_count(1000, 100) {
            let mut input = inputs(&def, aim, 1);
            input.beam_slice = Some(slice);
            for id in resolve_targets(&world, &fixture.env(), &input).unwrap() {
                if !swept.contains(&id) {
                    swept.push(id);
                }
            }
        }
        whole.sort();
        swept.sort();
        assert_eq!(swept, whole);
    }

    #[test]
    fn dead_targets_need_a_dead_reach() {
        let fixture = Fixture::new();
        let mut world = arena();
        world.actor_mut(EntityId(10)).unwrap().attrs.set_f32(Attr::Health, 0.0);
        let mut def = aoe_def(TargetingShape::CircleArea, 100.0);

        let aim = Vec3::new(50.0, 0.0, 0.0);
        let targets = resolve_targets(&world, &fixture.env(), &inputs(&def, aim, 1)).unwrap();
        assert!(!targets.contains(&EntityId(10)));

        def.reach.health_state = crate::def::TargetHealthState::AliveOrDead;
        let targets = resolve_targets(&world, &fixture.env(), &inputs(&def, aim, 1)).unwrap();
        assert!(targets.contains(&EntityId(10)));
    }

    #[test]
    fn melee_probe_finds_a_fallback_in_front() {
        let fixture = Fixture::new();
        let mut world = arena();
        // Enemy right in front of the user's face.
        world.insert(live_actor(30, Vec3::new(20.0, 2.0, 0.0), FOE));
        let mut def = aoe_def(TargetingShape::SingleTarget, 0.0);
        def.reach.melee = true;
        def.range = 40.0;

        // Aimed entity does not exist anymore.
        let mut input = inputs(&def, Vec3::ZERO, 1);
        input.aim_target = EntityId(999);
        let targets = resolve_targets(&world, &fixture.env(), &input).unwrap();
        assert_eq!(targets, alloc::vec![EntityId(30)]);
    }

    #[test]
    fn single_target_random_draws_deterministically() {
        let fixture = Fixture::new();
        let world = arena();
        let mut def = aoe_def(TargetingShape::SingleTargetRandom, 0.0);
        def.range = 300.0;

        let a = resolve_targets(&world, &fixture.env(), &inputs(&def, Vec3::ZERO, 42)).unwrap();
        let b = resolve_targets(&world, &fixture.env(), &inputs(&def, Vec3::ZERO, 42)).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a, b);

        let zero = resolve_targets(&world, &fixture.env(), &inputs(&def, Vec3::ZERO, 0));
        assert_eq!(zero, Err(PowerError::MissingSeed(def.id)));
    }

    #[test]
    fn scatter_is_deterministic_and_bounded() {
        let fixture = Fixture::new();
        let aim = Vec3::new(100.0, 50.0, 0.0);
        let a = scatter_aim(&fixture.env(), aim, 64.0, EntityId(1), 9001);
        let b = scatter_aim(&fixture.env(), aim, 64.0, EntityId(1), 9001);
        assert_eq!(a, b);
        assert!(a.distance2d(aim) <= 64.0);
        // Zero radius is a no-op.
        assert_eq!(scatter_aim(&fixture.env(), aim, 0.0, EntityId(1), 9001), aim);
    }
}
