//! End-to-end runtime scenarios: command handling, event fan-out, and
//! world-transition bookkeeping over a live worker task.

use std::sync::Arc;

use game_content::AbilityCatalog;
use game_core::attributes::Attr;
use game_core::def::{AbilityDefinition, AbilityId};
use game_core::math::Vec3;
use game_core::{
    ActivationSettings, Actor, AllianceId, EntityId, GameTime, Millis, PowerUseResult,
};
use runtime::{ActivationEvent, CombatEvent, Event, ProximityRelevance, Runtime, Topic};

const USER: EntityId = EntityId(1);
const FOE: EntityId = EntityId(2);
const BOLT: AbilityId = AbilityId(7);

fn live_actor(id: EntityId, position: Vec3, alliance: AllianceId) -> Actor {
    let mut actor = Actor::new(id, position, alliance);
    actor.attrs.set_f32(Attr::Health, 100.0);
    actor.attrs.set_f32(Attr::HealthMax, 100.0);
    actor
}

fn bolt_def() -> AbilityDefinition {
    let mut def = AbilityDefinition::new(BOLT, "bolt");
    def.cooldown.base_ms = 5000;
    def.damage.base[0] = 40.0;
    def.range = 200.0;
    def
}

fn arena() -> Runtime {
    let catalog: AbilityCatalog = [bolt_def()].into_iter().collect();
    Runtime::builder()
        .catalog(catalog)
        .actor(live_actor(USER, Vec3::ZERO, AllianceId(0)))
        .actor(live_actor(FOE, Vec3::new(50.0, 0.0, 0.0), AllianceId(1)))
        .build()
        .expect("runtime should build")
}

#[tokio::test]
async fn activation_flows_through_events_and_cooldown() {
    let rt = arena();
    let handle = rt.handle();

    handle.assign(USER, BOLT).await.unwrap();

    let mut activation_rx = handle.subscribe(Topic::Activation);
    let mut combat_rx = handle.subscribe(Topic::Combat);

    let result = handle
        .activate(USER, BOLT, ActivationSettings::aimed_at(FOE, 1234, 5678))
        .await
        .unwrap();
    assert_eq!(result, PowerUseResult::Success);

    match activation_rx.recv().await.unwrap() {
        Event::Activation(ActivationEvent::Started { owner, ability, target, .. }) => {
            assert_eq!(owner, USER);
            assert_eq!(ability, BOLT);
            assert_eq!(target, FOE);
        }
        other => panic!("expected activation start, got {other:?}"),
    }

    match combat_rx.recv().await.unwrap() {
        Event::Combat(CombatEvent::ResultsApplied { target, damage, .. }) => {
            assert_eq!(target, FOE);
            assert_eq!(damage[0], 40.0);
        }
        other => panic!("expected delivery, got {other:?}"),
    }

    // Instant abilities end on the same command.
    assert!(matches!(
        activation_rx.recv().await.unwrap(),
        Event::Activation(ActivationEvent::Ended { .. })
    ));

    let world = handle.world().await.unwrap();
    assert_eq!(world.actor(FOE).unwrap().attrs.f32(Attr::Health), 60.0);
    assert_eq!(
        handle.cooldown_remaining(USER, BOLT).await.unwrap(),
        Millis(5000)
    );

    // Re-request while the window is open: rejected, no damage.
    let again = handle
        .activate(USER, BOLT, ActivationSettings::aimed_at(FOE, 9, 9))
        .await
        .unwrap();
    assert_eq!(again, PowerUseResult::Cooldown);
    assert!(matches!(
        activation_rx.recv().await.unwrap(),
        Event::Activation(ActivationEvent::Rejected {
            result: PowerUseResult::Cooldown,
            ..
        })
    ));

    // Once the window closes the ability fires again.
    handle.advance_to(GameTime(5000)).await.unwrap();
    let after = handle
        .activate(USER, BOLT, ActivationSettings::aimed_at(FOE, 1234, 5678))
        .await
        .unwrap();
    assert_eq!(after, PowerUseResult::Success);

    rt.shutdown().await.unwrap();
}

#[tokio::test]
async fn observer_channels_respect_proximity() {
    let far = EntityId(3);
    let catalog: AbilityCatalog = [bolt_def()].into_iter().collect();
    let rt = Runtime::builder()
        .catalog(catalog)
        .relevance(Arc::new(ProximityRelevance { radius: 100.0 }))
        .actor(live_actor(USER, Vec3::ZERO, AllianceId(0)))
        .actor(live_actor(FOE, Vec3::new(50.0, 0.0, 0.0), AllianceId(1)))
        .actor(live_actor(far, Vec3::new(5000.0, 0.0, 0.0), AllianceId(1)))
        .build()
        .unwrap();
    let handle = rt.handle();

    handle.assign(USER, BOLT).await.unwrap();
    let mut foe_rx = handle.observe(FOE).await.unwrap();
    let mut far_rx = handle.observe(far).await.unwrap();

    handle
        .activate(USER, BOLT, ActivationSettings::aimed_at(FOE, 1234, 5678))
        .await
        .unwrap();

    // The bystander next to the impact hears about it.
    let mut saw_start = false;
    while let Ok(event) = foe_rx.try_recv() {
        if matches!(event, Event::Activation(ActivationEvent::Started { .. })) {
            saw_start = true;
        }
    }
    assert!(saw_start, "nearby observer missed the anchored event");

    // The distant one only gets the unanchored lifecycle events.
    while let Ok(event) = far_rx.try_recv() {
        assert!(
            !matches!(
                event,
                Event::Activation(ActivationEvent::Started { .. }) | Event::Combat(_)
            ),
            "anchored event leaked past the proximity filter"
        );
    }

    rt.shutdown().await.unwrap();
}

#[tokio::test]
async fn world_exit_freezes_the_cooldown_clock() {
    let rt = arena();
    let handle = rt.handle();

    handle.assign(USER, BOLT).await.unwrap();
    handle
        .activate(USER, BOLT, ActivationSettings::aimed_at(FOE, 1234, 5678))
        .await
        .unwrap();
    handle.advance_to(GameTime(2000)).await.unwrap();

    handle.exit_world(USER).await.unwrap();
    handle.enter_world(USER, Millis(1000)).await.unwrap();

    // 3000ms were left; 1000ms passed offline.
    assert_eq!(
        handle.cooldown_remaining(USER, BOLT).await.unwrap(),
        Millis(2000)
    );

    handle.advance_to(GameTime(4000)).await.unwrap();
    assert_eq!(
        handle.cooldown_remaining(USER, BOLT).await.unwrap(),
        Millis(0)
    );

    rt.shutdown().await.unwrap();
}

#[tokio::test]
async fn events_serialize_for_the_wire() {
    let rt = arena();
    let handle = rt.handle();

    handle.assign(USER, BOLT).await.unwrap();
    let mut combat_rx = handle.subscribe(Topic::Combat);
    handle
        .activate(USER, BOLT, ActivationSettings::aimed_at(FOE, 1234, 5678))
        .await
        .unwrap();

    let event = combat_rx.recv().await.unwrap();
    let json = serde_json::to_string(&event).unwrap();
    let back: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);

    rt.shutdown().await.unwrap();
}
