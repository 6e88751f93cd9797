//! Target resolution: from an aim to an ordered list of affected
//! entities.

use alloc::vec::Vec;

use crate::attributes::Attr;
use crate::def::{
    AbilityDefinition, TargetHealthState, TargetRestriction, TargetingShape, HeightConstraint,
};
use crate::env::{GameEnv, SweepResult, compute_seed, stream};
use crate::error::PowerError;
use crate::math::{self, Vec3, to_radians};
use crate::state::{Actor, EntityId, World};

use super::shapes::{self, ShapeParams};

/// How far past the user's bounds a melee swing probes for a fallback
/// target when the aimed entity is gone.
const MELEE_PROBE_RANGE: f32 = 25.0;

/// Everything the resolver needs about one application.
#[derive(Debug, Clone, Copy)]
pub struct ResolveInputs<'a> {
    pub def: &'a AbilityDefinition,
    pub user: EntityId,
    /// User position captured at activation, the shape's anchor.
    pub user_position: Vec3,
    pub aim_target: EntityId,
    pub aim_position: Vec3,
    pub power_seed: u32,
    /// Beam sweep slice index being delivered.
    pub beam_slice: Option<u32>,
}

/// Resolve the affected entities, in application order: primary target
/// first, then area targets nearest-first (or by seeded draw for random
/// selection styles).
pub fn resolve_targets(
    world: &World,
    env: &GameEnv<'_>,
    inputs: &ResolveInputs<'_>,
) -> Result<Vec<EntityId>, PowerError> {
    let def = inputs.def;
    let user = world.actor(inputs.user).ok_or(PowerError::UnknownEntity(inputs.user))?;

    match def.style.shape {
        TargetingShape::SelfOnly => Ok(alloc::vec![inputs.user]),
        TargetingShape::SingleTargetOwner => {
            let owner = user.summoner.unwrap_or(inputs.user);
            Ok(alloc::vec![owner])
        }
        TargetingShape::SingleTarget => resolve_single(world, env, inputs, user),
        TargetingShape::SingleTargetRandom => resolve_single_random(world, env, inputs, user),
        _ => resolve_area(world, env, inputs, user),
    }
}

fn resolve_single(
    world: &World,
    env: &GameEnv<'_>,
    inputs: &ResolveInputs<'_>,
    user: &Actor,
) -> Result<Vec<EntityId>, PowerError> {
    if let Some(aimed) = world.actor(inputs.aim_target)
        && valid_target(inputs.def, user, aimed, env)
    {
        return Ok(alloc::vec![aimed.id]);
    }
    // Melee swings don't whiff just because the target died mid-wind-up:
    // probe a short sphere in front of the user.
    if inputs.def.reach.melee {
        let probe = user.position + user.forward * (user.bounds_radius + MELEE_PROBE_RANGE);
        let fallback = world
            .actors()
            .filter(|c| valid_target(inputs.def, user, c, env))
            .filter(|c| c.position.distance2d(probe) <= MELEE_PROBE_RANGE + c.bounds_radius)
            .min_by(|a, b| {
                let da = a.position.distance_sq2d(probe);
                let db = b.position.distance_sq2d(probe);
                da.partial_cmp(&db).unwrap_or(core::cmp::Ordering::Equal).then(a.id.cmp(&b.id))
            });
        if let Some(found) = fallback {
            return Ok(alloc::vec![found.id]);
        }
    }
    Ok(Vec::new())
}

fn resolve_single_random(
    world: &World,
    env: &GameEnv<'_>,
    inputs: &ResolveInputs<'_>,
    user: &Actor,
) -> Result<Vec<EntityId>, PowerError> {
    if inputs.power_seed == 0 {
        return Err(PowerError::MissingSeed(inputs.def.id));
    }
    let reach = inputs.def.application_range();
    let eligible: Vec<EntityId> = world
        .actors()
        .filter(|c| valid_target(inputs.def, user, c, env))
        .filter(|c| c.position.distance2d(user.position) <= reach + c.bounds_radius)
        .filter(|c| has_line_of_sight(env, inputs.def, user.position, c.position))
        .map(|c| c.id)
        .collect();
    if eligible.is_empty() {
        return Ok(Vec::new());
    }
    let rng = env.rng().map_err(|_| PowerError::MissingSeed(inputs.def.id))?;
    let seed = compute_seed(inputs.power_seed as u64, inputs.user.0, stream::AOE_PICK);
    let pick = rng.below(seed, eligible.len() as u32) as usize;
    Ok(alloc::vec![eligible[pick]])
}

fn resolve_area(
    world: &World,
    env: &GameEnv<'_>,
    inputs: &ResolveInputs<'_>,
    user: &Actor,
) -> Result<Vec<EntityId>, PowerError> {
    let def = inputs.def;
    let style = &def.style;
    if style.random_selection && inputs.power_seed == 0 {
        return Err(PowerError::MissingSeed(def.id));
    }

    let params = area_params(def, inputs, user)?;
    let mut out: Vec<EntityId> = Vec::new();

    // The aimed entity is always first in application order when valid,
    // shape containment notwithstanding.
    if !def.reach.excludes_primary_target
        && let Some(aimed) = world.actor(inputs.aim_target)
        && aimed.id != user.id
        && valid_target(def, user, aimed, env)
    {
        out.push(aimed.id);
    }

    let mut candidates: Vec<&Actor> = world
        .actors()
        .filter(|c| !out.contains(&c.id))
        .filter(|c| !(def.reach.excludes_primary_target && c.id == inputs.aim_target))
        .filter(|c| valid_target(def, user, c, env))
        .filter(|c| shapes::contains(&params, c.position, c.bounds_radius))
        .filter(|c| has_line_of_sight(env, def, user.position, c.position))
        .collect();

    let cap = style.max_targets as usize;
    if style.random_selection {
        // Seeded draw without replacement until the cap (or exhaustion).
        let rng = env.rng().map_err(|_| PowerError::MissingSeed(def.id))?;
        let base = inputs.power_seed as u64;
        let mut draw = 0u32;
        while !candidates.is_empty() && (cap == 0 || out.len() < cap) {
            let seed = compute_seed(base, inputs.user.0, stream::AOE_PICK + draw);
            let pick = rng.below(seed, candidates.len() as u32) as usize;
            out.push(candidates.swap_remove(pick).id);
            draw += 1;
        }
    } else {
        candidates.sort_by(|a, b| {
            let da = a.position.distance_sq2d(params.center);
            let db = b.position.distance_sq2d(params.center);
            da.partial_cmp(&db).unwrap_or(core::cmp::Ordering::Equal).then(a.id.cmp(&b.id))
        });
        for candidate in candidates {
            if cap != 0 && out.len() >= cap {
                break;
            }
            out.push(candidate.id);
        }
    }

    Ok(out)
}

/// Build the footprint geometry for an area application.
fn area_params(
    def: &AbilityDefinition,
    inputs: &ResolveInputs<'_>,
    user: &Actor,
) -> Result<ShapeParams, PowerError> {
    let style = &def.style;
    let center =
        if style.aoe_centered_on_user { inputs.user_position } else { inputs.aim_position };

    let mut direction = if style.aoe_centered_on_user {
        let to_aim = (inputs.aim_position - inputs.user_position).flattened();
        if to_aim.length_sq2d() > f32::EPSILON { to_aim.normalized2d() } else { user.forward }
    } else {
        (inputs.aim_position - inputs.user_position).normalized2d()
    };
    if style.orientation_offset_deg != 0.0 {
        direction = direction.rotated2d(to_radians(style.orientation_offset_deg));
    }

    let mut angle_deg = style.aoe_angle_deg;
    if style.shape == TargetingShape::BeamSweep {
        let slice = inputs.beam_slice.unwrap_or(0);
        let total_ms = sweep_duration_ms(def);
        let (offset_deg, aperture) = shapes::beam_slice_geometry(
            style.aoe_angle_deg,
            total_ms,
            def.timing.beam_slice_ms,
            slice,
            def.timing.beam_clockwise,
        )
        .ok_or(PowerError::PhaseDesync { ability: def.id, phase: "beam-sweep".into() })?;
        direction = direction.rotated2d(to_radians(offset_deg));
        angle_deg = aperture;
    }

    Ok(ShapeParams {
        shape: style.shape,
        center,
        radius: def.radius,
        direction,
        angle_deg,
        width: style.width,
        length: if style.length > 0.0 { style.length } else { def.radius },
    })
}

/// Total time a beam sweep covers: the channel loop for channeled
/// abilities, otherwise the active phase.
pub fn sweep_duration_ms(def: &AbilityDefinition) -> u64 {
    if def.is_channeled() { def.timing.channel_loop_ms } else { def.timing.activation_ms }
}

// ============================================================================
// Eligibility
// ============================================================================

/// Reach and restriction filter: is `candidate` a legal target of `def`
/// cast by `user`, geometry aside?
pub fn valid_target(
    def: &AbilityDefinition,
    user: &Actor,
    candidate: &Actor,
    env: &GameEnv<'_>,
) -> bool {
    let reach = &def.reach;

    if !candidate.is_targetable() {
        return false;
    }
    if candidate.attrs.flag_p(Attr::ImmuneToAbility, def.id.0) {
        return false;
    }

    match reach.health_state {
        TargetHealthState::Alive => {
            if candidate.is_dead() {
                return false;
            }
        }
        TargetHealthState::Dead => {
            if !candidate.is_dead() {
                return false;
            }
        }
        TargetHealthState::AliveOrDead => {}
    }

    if candidate.id == user.id {
        return reach.targets_self;
    }

    if candidate.destructible {
        return reach.targets_destructibles && user.is_hostile_to(candidate);
    }

    if user.is_hostile_to(candidate) {
        if !reach.targets_enemies {
            return false;
        }
    } else {
        if !reach.targets_allies {
            return false;
        }
        // Players only buff their own party.
        if reach.party_only
            && user.is_player()
            && (user.party().is_none() || user.party() != candidate.party())
        {
            return false;
        }
    }

    match reach.height {
        HeightConstraint::Any => {}
        HeightConstraint::GroundOnly => {
            if candidate.high_flying {
                return false;
            }
        }
        HeightConstraint::AirborneOnly => {
            if !candidate.high_flying {
                return false;
            }
        }
    }

    if reach.front_only {
        let to_candidate = (candidate.position - user.position).flattened();
        if user.forward.dot2d(to_candidate) <= 0.0 {
            return false;
        }
    }

    def.restrictions.iter().all(|r| restriction_holds(r, candidate, env))
}

fn restriction_holds(restriction: &TargetRestriction, candidate: &Actor, env: &GameEnv<'_>) -> bool {
    match restriction {
        TargetRestriction::HealthAbovePct(pct) => health_pct(candidate) > *pct,
        TargetRestriction::HealthBelowPct(pct) => health_pct(candidate) < *pct,
        TargetRestriction::HasKeyword(kw) => {
            candidate.has_keyword(kw.0)
                || env.conditions().is_ok_and(|c| c.has_keyword(candidate.id, *kw))
        }
        TargetRestriction::MissingKeyword(kw) => {
            !candidate.has_keyword(kw.0)
                && !env.conditions().is_ok_and(|c| c.has_keyword(candidate.id, *kw))
        }
        TargetRestriction::RankAtLeast(rank) => candidate.rank >= *rank,
        TargetRestriction::RankAtMost(rank) => candidate.rank <= *rank,
    }
}

fn health_pct(actor: &Actor) -> f32 {
    let max = actor.attrs.f32(Attr::HealthMax);
    if max <= 0.0 { 0.0 } else { actor.attrs.f32(Attr::Health) / max }
}

fn has_line_of_sight(env: &GameEnv<'_>, def: &AbilityDefinition, from: Vec3, to: Vec3) -> bool {
    if !def.reach.requires_line_of_sight {
        return true;
    }
    env.geometry().is_ok_and(|g| g.line_of_sight(from, to))
}

// ============================================================================
// Aim Helpers
// ============================================================================

/// Scatter an aim point uniformly inside `radius`, then let geometry
/// reject or clip the result.
pub fn scatter_aim(
    env: &GameEnv<'_>,
    aim: Vec3,
    radius: f32,
    user: EntityId,
    power_seed: u32,
) -> Vec3 {
    if radius <= 0.0 {
        return aim;
    }
    let Ok(rng) = env.rng() else {
        return aim;
    };
    let angle_seed = compute_seed(power_seed as u64, user.0, stream::AOE_POSITION);
    let dist_seed = compute_seed(power_seed as u64, user.0, stream::AOE_POSITION + 1);
    let angle = rng.next_f32(angle_seed) * 2.0 * math::PI;
    // sqrt keeps the distribution uniform over the disc area.
    let dist = math::sqrt(rng.next_f32(dist_seed)) * radius;
    let (sin, cos) = math::sin_cos(angle);
    let scattered = aim + Vec3::new(cos * dist, sin * dist, 0.0);

    match env.geometry().map(|g| g.sweep(aim, scattered, 0.0)) {
        Ok(SweepResult::Clear) => scattered,
        Ok(SweepResult::Clipped(clipped)) => clipped,
        Ok(SweepResult::Invalid) | Err(_) => aim,
    }
}

/// Application-range gate: the aim must be reachable from where the
/// user stood at activation.
pub fn within_application_range(def: &AbilityDefinition, user_position: Vec3, aim: Vec3) -> bool {
    if def.range <= 0.0 {
        return true;
    }
    user_position.distance2d(aim) <= def.application_range()
}
