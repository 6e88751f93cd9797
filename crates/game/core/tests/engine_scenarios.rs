//! End-to-end activation scenarios driven through the public engine API.

use std::collections::BTreeMap;

use game_core::attributes::Attr;
use game_core::def::{
    AbilityDefinition, AbilityId, BounceBlock, TargetingShape,
};
use game_core::env::{DefaultTuning, DefinitionOracle, Env, GameEnv, OpenField, PcgRng};
use game_core::math::Vec3;
use game_core::power::{ActivationSettings, EndFlags, EngineNotice, PowerPhase};
use game_core::state::{Actor, AllianceId, EntityId, GameTime, Millis};
use game_core::{PowerEngine, PowerUseResult};

// ----------------------------------------------------------------------------
// Fixture
// ----------------------------------------------------------------------------

struct StaticDefs(BTreeMap<AbilityId, AbilityDefinition>);

impl DefinitionOracle for StaticDefs {
    fn ability(&self, id: AbilityId) -> Option<&AbilityDefinition> {
        self.0.get(&id)
    }
}

struct Fixture {
    defs: StaticDefs,
    geometry: OpenField,
    tuning: DefaultTuning,
    rng: PcgRng,
}

impl Fixture {
    fn new(list: Vec<AbilityDefinition>) -> Self {
        Fixture {
            defs: StaticDefs(list.into_iter().map(|d| (d.id, d)).collect()),
            geometry: OpenField,
            tuning: DefaultTuning,
            rng: PcgRng,
        }
    }

    fn env(&self) -> GameEnv<'_> {
        Env::new(Some(&self.defs), Some(&self.geometry), None, Some(&self.tuning), Some(&self.rng))
    }
}

const USER: EntityId = EntityId(1);
const BOLT: AbilityId = AbilityId(100);

const FRIEND: AllianceId = AllianceId(0);
const FOE: AllianceId = AllianceId(1);

fn live_actor(id: u64, position: Vec3, alliance: AllianceId) -> Actor {
    let mut actor = Actor::new(EntityId(id), position, alliance);
    actor.attrs.set_f32(Attr::Health, 100.0);
    actor.attrs.set_f32(Attr::HealthMax, 100.0);
    actor
}

fn single_target_bolt() -> AbilityDefinition {
    let mut def = AbilityDefinition::new(BOLT, "bolt");
    def.range = 300.0;
    def.cooldown.base_ms = 5000;
    def.damage.base[0] = 40.0;
    def
}

fn health_of(engine: &PowerEngine, id: u64) -> f32 {
    engine.world.actor(EntityId(id)).unwrap().attrs.f32(Attr::Health)
}

// ----------------------------------------------------------------------------
// Single target with cooldown
// ----------------------------------------------------------------------------

#[test]
fn single_target_activation_hits_and_starts_cooldown() {
    let fixture = Fixture::new(vec![single_target_bolt()]);
    let env = fixture.env();
    let mut engine = PowerEngine::new();
    engine.world.insert(live_actor(1, Vec3::ZERO, FRIEND));
    engine.world.insert(live_actor(2, Vec3::new(80.0, 0.0, 0.0), FOE));
    engine.assign(USER, BOLT, &env).unwrap();

    let result =
        engine.activate(USER, BOLT, ActivationSettings::aimed_at(EntityId(2), 1234, 5678), &env);
    assert_eq!(result, PowerUseResult::Success);

    // Cooldown is recorded at activation, not at the end of the ability.
    assert_eq!(engine.cooldown_remaining(USER, BOLT), Millis(5000));
    assert!((health_of(&engine, 2) - 60.0).abs() < 1e-3);

    let notices = engine.drain_notices();
    let activated = notices.iter().find_map(|n| match n {
        EngineNotice::Activated { fx_seed, target, .. } => Some((*fx_seed, *target)),
        _ => None,
    });
    assert_eq!(activated, Some((5678, EntityId(2))));
    assert!(
        notices
            .iter()
            .any(|n| matches!(n, EngineNotice::ResultsApplied { target, .. } if *target == EntityId(2)))
    );

    // An immediate second request is refused with no side effects.
    let second =
        engine.activate(USER, BOLT, ActivationSettings::aimed_at(EntityId(2), 9, 9), &env);
    assert_eq!(second, PowerUseResult::Cooldown);
    assert!((health_of(&engine, 2) - 60.0).abs() < 1e-3);
}

// ----------------------------------------------------------------------------
// Beam sweep
// ----------------------------------------------------------------------------

#[test]
fn beam_sweep_covers_the_whole_aperture_across_slices() {
    let mut def = AbilityDefinition::new(BOLT, "sweep");
    def.style.shape = TargetingShape::BeamSweep;
    def.style.needs_target = false;
    def.style.aoe_centered_on_user = true;
    def.style.aoe_angle_deg = 170.0;
    def.radius = 120.0;
    def.range = 300.0;
    def.timing.activation_ms = 1000;
    def.timing.beam_slice_ms = 100;
    def.damage.base[0] = 5.0;

    let fixture = Fixture::new(vec![def]);
    let env = fixture.env();
    let mut engine = PowerEngine::new();
    engine.world.insert(live_actor(1, Vec3::ZERO, FRIEND));
    // Foes on a 60-unit ring at angles spanning the 170-degree aperture
    // around +X, plus one behind the user that must never be touched.
    for (id, angle_deg) in [(10, -80.0_f32), (11, -30.0), (12, 0.0), (13, 35.0), (14, 80.0)] {
        let a = angle_deg.to_radians();
        engine
            .world
            .insert(live_actor(id, Vec3::new(60.0 * a.cos(), 60.0 * a.sin(), 0.0), FOE));
    }
    engine.world.insert(live_actor(20, Vec3::new(-60.0, 0.0, 0.0), FOE));
    engine.assign(USER, BOLT, &env).unwrap();

    let aim = ActivationSettings::at_position(Vec3::new(100.0, 0.0, 0.0), 42, 43);
    assert_eq!(engine.activate(USER, BOLT, aim, &env), PowerUseResult::Success);

    // The first slice covers a tenth of the aperture, not all of it.
    let first_slice: Vec<EntityId> = engine
        .drain_notices()
        .iter()
        .filter_map(|n| match n {
            EngineNotice::ResultsApplied { target, .. } => Some(*target),
            _ => None,
        })
        .collect();
    assert!(first_slice.len() < 5, "one slice hit {first_slice:?}");

    engine.tick(GameTime(1000), &env);
    let mut hit: Vec<u64> = engine
        .drain_notices()
        .iter()
        .filter_map(|n| match n {
            EngineNotice::ResultsApplied { target, .. } => Some(target.0),
            _ => None,
        })
        .collect();
    hit.extend(first_slice.iter().map(|t| t.0));
    hit.sort_unstable();
    hit.dedup();
    assert_eq!(hit, vec![10, 11, 12, 13, 14], "slice union covers the aperture");
}

// ----------------------------------------------------------------------------
// Bounce
// ----------------------------------------------------------------------------

#[test]
fn bounce_count_two_delivers_three_times_without_repeats() {
    let mut def = single_target_bolt();
    def.cooldown.base_ms = 0;
    def.damage.base[0] = 10.0;
    def.bounce =
        Some(BounceBlock { count: 2, range: 200.0, speed: 0.0, allow_repeats: false });

    let fixture = Fixture::new(vec![def]);
    let env = fixture.env();
    let mut engine = PowerEngine::new();
    engine.world.insert(live_actor(1, Vec3::ZERO, FRIEND));
    engine.world.insert(live_actor(2, Vec3::new(50.0, 0.0, 0.0), FOE));
    engine.world.insert(live_actor(3, Vec3::new(90.0, 20.0, 0.0), FOE));
    engine.world.insert(live_actor(4, Vec3::new(110.0, -30.0, 0.0), FOE));
    engine.world.insert(live_actor(5, Vec3::new(140.0, 10.0, 0.0), FOE));
    engine.assign(USER, BOLT, &env).unwrap();

    engine.activate(USER, BOLT, ActivationSettings::aimed_at(EntityId(2), 777, 1), &env);
    // Instant hops land on the same tick.
    engine.tick(GameTime(0), &env);

    let hits: Vec<EntityId> = engine
        .drain_notices()
        .iter()
        .filter_map(|n| match n {
            EngineNotice::ResultsApplied { target, .. } => Some(*target),
            _ => None,
        })
        .collect();
    assert_eq!(hits.len(), 3, "count 2 means three deliveries, got {hits:?}");
    assert_eq!(hits[0], EntityId(2), "the chain starts at the aimed target");
    let mut unique = hits.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 3, "repeats are excluded: {hits:?}");
}

// ----------------------------------------------------------------------------
// Channel pipeline
// ----------------------------------------------------------------------------

#[test]
fn channel_runs_its_loops_then_ends() {
    let mut def = single_target_bolt();
    def.cooldown.base_ms = 0;
    def.damage.base[0] = 10.0;
    def.timing.channel_start_ms = 200;
    def.timing.channel_loop_ms = 500;
    def.timing.channel_loop_count = 3;

    let fixture = Fixture::new(vec![def]);
    let env = fixture.env();
    let mut engine = PowerEngine::new();
    engine.world.insert(live_actor(1, Vec3::ZERO, FRIEND));
    engine.world.insert(live_actor(2, Vec3::new(50.0, 0.0, 0.0), FOE));
    engine.assign(USER, BOLT, &env).unwrap();

    engine.activate(USER, BOLT, ActivationSettings::aimed_at(EntityId(2), 9, 9), &env);
    assert_eq!(engine.phase(USER, BOLT), PowerPhase::ChannelStarting);

    engine.tick(GameTime(200), &env);
    assert_eq!(engine.phase(USER, BOLT), PowerPhase::Channeling);

    // Initial application plus one per loop.
    engine.tick(GameTime(5000), &env);
    assert_eq!(engine.phase(USER, BOLT), PowerPhase::Inactive);
    assert!((health_of(&engine, 2) - 60.0).abs() < 1e-3, "4 applications of 10");

    let notices = engine.drain_notices();
    assert!(notices.iter().any(|n| matches!(
        n,
        EngineNotice::Ended { flags, .. } if flags.contains(EndFlags::CHANNEL_LOOP_END)
    )));
}

#[test]
fn channel_ends_when_recurring_cost_runs_dry() {
    let mut def = single_target_bolt();
    def.cooldown.base_ms = 0;
    def.damage.base[0] = 1.0;
    def.timing.channel_loop_ms = 500;
    def.timing.channel_infinite = true;
    def.costs.endurance_recurring = vec![(game_core::def::ResourceId(0), 20.0)];
    def.costs.recurring_interval_ms = 500;

    let fixture = Fixture::new(vec![def]);
    let env = fixture.env();
    let mut engine = PowerEngine::new();
    let mut user = live_actor(1, Vec3::ZERO, FRIEND);
    user.attrs.set_f32_p(Attr::Endurance, 0, 50.0);
    engine.world.insert(user);
    engine.world.insert(live_actor(2, Vec3::new(50.0, 0.0, 0.0), FOE));
    engine.assign(USER, BOLT, &env).unwrap();

    engine.activate(USER, BOLT, ActivationSettings::aimed_at(EntityId(2), 9, 9), &env);
    engine.tick(GameTime(10_000), &env);

    // Two loops paid (50 -> 30 -> 10), the third found the pool short.
    assert_eq!(engine.phase(USER, BOLT), PowerPhase::Inactive);
    let endurance = engine.world.actor(USER).unwrap().attrs.f32_p(Attr::Endurance, 0);
    assert!((endurance - 10.0).abs() < 1e-3, "got {endurance}");
    assert!(engine.drain_notices().iter().any(|n| matches!(
        n,
        EngineNotice::Ended { flags, .. } if flags.contains(EndFlags::NOT_ENOUGH_ENDURANCE)
    )));
}

// ----------------------------------------------------------------------------
// Determinism
// ----------------------------------------------------------------------------

#[test]
fn identical_inputs_replay_to_identical_notices() {
    let run = || {
        let mut def = single_target_bolt();
        def.damage.variance = 0.25;
        def.damage.can_crit = true;

        let fixture = Fixture::new(vec![def]);
        let env = fixture.env();
        let mut engine = PowerEngine::new();
        engine.world.insert(live_actor(1, Vec3::ZERO, FRIEND));
        engine.world.insert(live_actor(2, Vec3::new(50.0, 0.0, 0.0), FOE));
        engine.world.insert(live_actor(3, Vec3::new(70.0, 10.0, 0.0), FOE));
        engine.assign(USER, BOLT, &env).unwrap();
        engine.activate(USER, BOLT, ActivationSettings::aimed_at(EntityId(2), 31415, 42), &env);
        engine.tick(GameTime(6000), &env);
        engine.activate(USER, BOLT, ActivationSettings::aimed_at(EntityId(3), 27182, 43), &env);
        engine.tick(GameTime(12_000), &env);
        engine.drain_notices()
    };
    assert_eq!(run(), run());
}

// ----------------------------------------------------------------------------
// Suspension and reconciliation
// ----------------------------------------------------------------------------

#[test]
fn cooldown_survives_a_world_exit() {
    let fixture = Fixture::new(vec![single_target_bolt()]);
    let env = fixture.env();
    let mut engine = PowerEngine::new();
    engine.world.insert(live_actor(1, Vec3::ZERO, FRIEND));
    engine.world.insert(live_actor(2, Vec3::new(50.0, 0.0, 0.0), FOE));
    engine.assign(USER, BOLT, &env).unwrap();

    engine.activate(USER, BOLT, ActivationSettings::aimed_at(EntityId(2), 1, 2), &env);
    engine.tick(GameTime(2000), &env);
    engine.exit_world(USER, &env);

    // 1000ms pass while the owner is out of the world.
    engine.reconcile(USER, Millis(1000), &env);
    assert_eq!(engine.cooldown_remaining(USER, BOLT), Millis(2000));

    // The rebuilt expiry fires on schedule.
    engine.tick(GameTime(4000), &env);
    assert_eq!(engine.cooldown_remaining(USER, BOLT), Millis::ZERO);
    let result = engine.activate(USER, BOLT, ActivationSettings::aimed_at(EntityId(2), 3, 4), &env);
    assert_eq!(result, PowerUseResult::Success);
}
