//! Hazards: gravity wells, moving bumpers and portals
//!
//! Each hazard owns one sensor body in the physics world. The registry maps
//! body ids back to hazard state so contacts can be dispatched; it never owns
//! the body's lifecycle beyond creating and removing it on request. Contacts
//! naming an unknown body are ignored.

use std::collections::BTreeMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::REFERENCE_FRAME_MS;
use crate::direction_or;
use crate::physics::{BodyDesc, BodyId, Falloff, ForceField, PhysicsWorld};
use crate::rng::Mulberry32;

/// Direction used when a hazard vector degenerates to zero length
pub const FALLBACK_DIRECTION: Vec2 = Vec2::NEG_Y;
/// Velocity kept through a portal
pub const PORTAL_MOMENTUM_CARRY: f32 = 0.85;
/// Speed added along the portal axis on exit
pub const PORTAL_EXIT_BOOST: f32 = 2.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HazardKind {
    GravityWell,
    MovingBumper,
    Portal,
}

/// Static description of a hazard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum HazardDescriptor {
    GravityWell {
        position: Vec2,
        radius: f32,
        /// Positive pulls, negative pushes
        strength: f32,
        falloff: Falloff,
    },
    MovingBumper {
        start: Vec2,
        end: Vec2,
        radius: f32,
        /// Travel speed in pixels per reference frame
        speed: f32,
        impulse: f32,
        /// Kick direction when the contact geometry is degenerate
        direction: Vec2,
    },
    Portal {
        position: Vec2,
        exit: Vec2,
        radius: f32,
        cooldown_seconds: f64,
    },
}

impl HazardDescriptor {
    pub fn kind(&self) -> HazardKind {
        match self {
            HazardDescriptor::GravityWell { .. } => HazardKind::GravityWell,
            HazardDescriptor::MovingBumper { .. } => HazardKind::MovingBumper,
            HazardDescriptor::Portal { .. } => HazardKind::Portal,
        }
    }

    fn sensor(&self) -> BodyDesc {
        match *self {
            HazardDescriptor::GravityWell {
                position, radius, ..
            } => BodyDesc::hazard_sensor(position, radius),
            HazardDescriptor::MovingBumper { start, radius, .. } => {
                BodyDesc::hazard_sensor(start, radius)
            }
            HazardDescriptor::Portal {
                position, radius, ..
            } => BodyDesc::hazard_sensor(position, radius),
        }
    }
}

/// Live state that changes while the run plays
#[derive(Debug, Clone, PartialEq)]
enum HazardRuntime {
    Well,
    Bumper {
        /// Distance travelled from `start` along the path
        progress: f32,
        forward: bool,
        position: Vec2,
        direction: Vec2,
    },
    Portal {
        last_trigger_ms: Option<f64>,
    },
}

#[derive(Debug, Clone)]
struct HazardEntry {
    descriptor: HazardDescriptor,
    runtime: HazardRuntime,
    contacts: u32,
    triggers: u32,
}

/// What a hazard did to the ball
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HazardEffect {
    /// Contact counted, nothing applied
    None,
    Impulse { velocity: Vec2 },
    Teleport { from: Vec2, to: Vec2, velocity: Vec2 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardOutcome {
    pub kind: HazardKind,
    pub triggered: bool,
    pub effect: HazardEffect,
}

/// Per-hazard totals for the run result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HazardSummary {
    pub body: BodyId,
    pub kind: HazardKind,
    pub descriptor: HazardDescriptor,
    pub contacts: u32,
    /// Bumper kicks or portal transports
    pub triggers: u32,
}

/// Hazards keyed by their sensor body
#[derive(Debug, Clone, Default)]
pub struct HazardRegistry {
    entries: BTreeMap<BodyId, HazardEntry>,
}

impl HazardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn kind_of(&self, body: BodyId) -> Option<HazardKind> {
        self.entries.get(&body).map(|e| e.descriptor.kind())
    }

    /// Spawn the hazard's sensor body and start tracking it
    pub fn register<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        descriptor: HazardDescriptor,
    ) -> BodyId {
        let body = world.create_body(descriptor.sensor());
        let runtime = match descriptor {
            HazardDescriptor::GravityWell {
                position,
                radius,
                strength,
                falloff,
            } => {
                world.add_force_field(
                    body,
                    ForceField {
                        center: position,
                        radius,
                        strength,
                        falloff,
                    },
                );
                HazardRuntime::Well
            }
            HazardDescriptor::MovingBumper {
                start,
                end,
                direction,
                ..
            } => HazardRuntime::Bumper {
                progress: 0.0,
                forward: true,
                position: start,
                direction: direction_or(start, end, direction.normalize_or(FALLBACK_DIRECTION)),
            },
            HazardDescriptor::Portal { .. } => HazardRuntime::Portal {
                last_trigger_ms: None,
            },
        };
        log::debug!("Registered {:?} hazard as body {:?}", descriptor.kind(), body);
        self.entries.insert(
            body,
            HazardEntry {
                descriptor,
                runtime,
                contacts: 0,
                triggers: 0,
            },
        );
        body
    }

    /// Remove a hazard and its body; unknown ids are ignored
    pub fn remove<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W, body: BodyId) -> bool {
        if self.entries.remove(&body).is_some() {
            world.remove_body(body);
            true
        } else {
            false
        }
    }

    /// Move bumpers along their paths
    pub fn advance<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W, dt_ms: f64) {
        let scale = (dt_ms / REFERENCE_FRAME_MS) as f32;
        for (&body, entry) in self.entries.iter_mut() {
            let HazardDescriptor::MovingBumper {
                start, end, speed, ..
            } = entry.descriptor
            else {
                continue;
            };
            let HazardRuntime::Bumper {
                progress,
                forward,
                position,
                direction,
            } = &mut entry.runtime
            else {
                continue;
            };

            let length = start.distance(end);
            if length < 1e-3 || speed <= 0.0 {
                continue;
            }
            let axis = (end - start) / length;
            let mut next = *progress + if *forward { speed * scale } else { -speed * scale };
            // Ping-pong, folding any overshoot back into the path
            if next > length {
                next = (2.0 * length - next).max(0.0);
                *forward = false;
            } else if next < 0.0 {
                next = (-next).min(length);
                *forward = true;
            }
            *progress = next;
            *position = start + axis * next;
            *direction = if *forward { axis } else { -axis };
            world.set_position(body, *position);
        }
    }

    /// Current position of a bumper, if `body` is one
    pub fn bumper_position(&self, body: BodyId) -> Option<Vec2> {
        match self.entries.get(&body)?.runtime {
            HazardRuntime::Bumper { position, .. } => Some(position),
            _ => None,
        }
    }

    /// Current travel direction of a bumper, if `body` is one
    pub fn bumper_direction(&self, body: BodyId) -> Option<Vec2> {
        match self.entries.get(&body)?.runtime {
            HazardRuntime::Bumper { direction, .. } => Some(direction),
            _ => None,
        }
    }

    /// Apply a ball contact to the hazard owning `hazard`
    ///
    /// Returns `None` when `hazard` or `ball` is not known to the registry or
    /// the world.
    pub fn handle_contact<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        hazard: BodyId,
        ball: BodyId,
        ball_radius: f32,
        now_ms: f64,
    ) -> Option<HazardOutcome> {
        let entry = self.entries.get_mut(&hazard)?;
        let ball_pos = world.position(ball)?;
        let ball_vel = world.velocity(ball)?;
        entry.contacts += 1;
        let kind = entry.descriptor.kind();

        let effect = match (&entry.descriptor, &mut entry.runtime) {
            (HazardDescriptor::GravityWell { .. }, _) => HazardEffect::None,
            (
                HazardDescriptor::MovingBumper { impulse, .. },
                HazardRuntime::Bumper {
                    position,
                    direction,
                    ..
                },
            ) => {
                let center = world.position(hazard).unwrap_or(*position);
                let kick = direction_or(center, ball_pos, *direction);
                let velocity = ball_vel + kick * *impulse;
                world.set_velocity(ball, velocity);
                HazardEffect::Impulse { velocity }
            }
            (
                HazardDescriptor::Portal {
                    position,
                    exit,
                    radius,
                    cooldown_seconds,
                },
                HazardRuntime::Portal { last_trigger_ms },
            ) => {
                let ready = (*last_trigger_ms)
                    .is_none_or(|last| now_ms - last >= cooldown_seconds * 1000.0);
                if ready {
                    let axis = direction_or(*position, *exit, FALLBACK_DIRECTION);
                    let safe_offset = (ball_radius * 1.75).max(radius * 0.65 + 8.0);
                    let to = *exit + axis * safe_offset;
                    let velocity = ball_vel * PORTAL_MOMENTUM_CARRY + axis * PORTAL_EXIT_BOOST;
                    world.set_position(ball, to);
                    world.set_velocity(ball, velocity);
                    *last_trigger_ms = Some(now_ms);
                    log::debug!("Portal {:?} moved ball {:?} -> {:?}", hazard, ball_pos, to);
                    HazardEffect::Teleport {
                        from: ball_pos,
                        to,
                        velocity,
                    }
                } else {
                    HazardEffect::None
                }
            }
            _ => HazardEffect::None,
        };

        let triggered = !matches!(effect, HazardEffect::None);
        if triggered {
            entry.triggers += 1;
        }
        Some(HazardOutcome {
            kind,
            triggered,
            effect,
        })
    }

    /// Totals per hazard in body order
    pub fn summaries(&self) -> Vec<HazardSummary> {
        self.entries
            .iter()
            .map(|(&body, entry)| HazardSummary {
                body,
                kind: entry.descriptor.kind(),
                descriptor: entry.descriptor.clone(),
                contacts: entry.contacts,
                triggers: entry.triggers,
            })
            .collect()
    }
}

/// Vertical band hazards may occupy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardBand {
    pub width: f32,
    pub min_y: f32,
    pub max_y: f32,
}

/// Roll the hazards for a round
///
/// Round 1 is hazard-free; wells arrive at round 2, bumpers at 3 and
/// portals at 4.
pub fn plan_hazards(round: u32, rng: &mut Mulberry32, band: HazardBand) -> Vec<HazardDescriptor> {
    let w = band.width as f64;
    let min_y = band.min_y as f64;
    let max_y = (band.max_y as f64).max(min_y + 1.0);
    let mut hazards = Vec::new();

    if round >= 2 {
        let position = Vec2::new(
            rng.range(w * 0.3, w * 0.7) as f32,
            rng.range(min_y, max_y) as f32,
        );
        let falloff = if rng.boolean() {
            Falloff::Linear
        } else {
            Falloff::Quadratic
        };
        hazards.push(HazardDescriptor::GravityWell {
            position,
            radius: 110.0,
            strength: 0.05 + 0.01 * (round.min(8) - 2) as f32,
            falloff,
        });
    }

    if round >= 3 {
        let y = rng.range(min_y, max_y) as f32;
        hazards.push(HazardDescriptor::MovingBumper {
            start: Vec2::new(band.width * 0.2, y),
            end: Vec2::new(band.width * 0.8, y),
            radius: 18.0,
            speed: 1.5,
            impulse: 6.0,
            direction: FALLBACK_DIRECTION,
        });
    }

    if round >= 4 {
        let entry = Vec2::new(
            rng.range(w * 0.1, w * 0.3) as f32,
            rng.range(min_y, max_y) as f32,
        );
        let exit = Vec2::new(
            rng.range(w * 0.7, w * 0.9) as f32,
            rng.range(min_y, max_y) as f32,
        );
        hazards.push(HazardDescriptor::Portal {
            position: entry,
            exit,
            radius: 22.0,
            cooldown_seconds: 0.75,
        });
    }

    hazards
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT_MS;
    use crate::physics::{ArcadeWorld, BodyDesc};

    fn portal() -> HazardDescriptor {
        HazardDescriptor::Portal {
            position: Vec2::new(100.0, 300.0),
            exit: Vec2::new(500.0, 300.0),
            radius: 20.0,
            cooldown_seconds: 0.5,
        }
    }

    #[test]
    fn test_bumper_kicks_resting_ball() {
        let mut world = ArcadeWorld::new();
        let mut registry = HazardRegistry::new();
        let bumper = registry.register(
            &mut world,
            HazardDescriptor::MovingBumper {
                start: Vec2::new(200.0, 300.0),
                end: Vec2::new(400.0, 300.0),
                radius: 18.0,
                speed: 1.5,
                impulse: 6.0,
                direction: FALLBACK_DIRECTION,
            },
        );
        let ball = world.create_body(BodyDesc::ball(Vec2::new(200.0, 280.0), 8.0));

        let outcome = registry
            .handle_contact(&mut world, bumper, ball, 8.0, 0.0)
            .unwrap();
        assert!(outcome.triggered);
        let vel = world.velocity(ball).unwrap();
        assert!(vel.length() > 0.0);
        assert!((vel.length() - 6.0).abs() < 1e-4);
        assert!(vel.y < 0.0, "kick points from bumper to ball");
    }

    #[test]
    fn test_bumper_degenerate_contact_uses_live_direction() {
        let mut world = ArcadeWorld::new();
        let mut registry = HazardRegistry::new();
        let bumper = registry.register(
            &mut world,
            HazardDescriptor::MovingBumper {
                start: Vec2::new(200.0, 300.0),
                end: Vec2::new(400.0, 300.0),
                radius: 18.0,
                speed: 1.5,
                impulse: 6.0,
                direction: FALLBACK_DIRECTION,
            },
        );
        let ball = world.create_body(BodyDesc::ball(Vec2::new(200.0, 300.0), 8.0));
        registry.handle_contact(&mut world, bumper, ball, 8.0, 0.0);
        let vel = world.velocity(ball).unwrap();
        assert!(vel.is_finite());
        assert!((vel - Vec2::new(6.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_bumper_ping_pongs() {
        let mut world = ArcadeWorld::new();
        let mut registry = HazardRegistry::new();
        let bumper = registry.register(
            &mut world,
            HazardDescriptor::MovingBumper {
                start: Vec2::new(0.0, 0.0),
                end: Vec2::new(10.0, 0.0),
                radius: 5.0,
                speed: 4.0,
                impulse: 1.0,
                direction: Vec2::X,
            },
        );
        // 2 px per tick at 120 Hz; reaches the end after 5 ticks then turns
        for _ in 0..6 {
            registry.advance(&mut world, SIM_DT_MS);
        }
        let pos = registry.bumper_position(bumper).unwrap();
        assert!((pos.x - 8.0).abs() < 1e-3);
        assert_eq!(registry.bumper_direction(bumper), Some(-Vec2::X));
        assert_eq!(world.position(bumper), Some(pos));
    }

    #[test]
    fn test_portal_cooldown_allows_single_teleport() {
        let mut world = ArcadeWorld::new();
        let mut registry = HazardRegistry::new();
        let gate = registry.register(&mut world, portal());
        let ball = world.create_body(BodyDesc::ball(Vec2::new(100.0, 300.0), 9.0));
        world.set_velocity(ball, Vec2::new(4.0, -2.0));

        let first = registry.handle_contact(&mut world, gate, ball, 9.0, 1000.0).unwrap();
        world.set_position(ball, Vec2::new(100.0, 300.0));
        let second = registry.handle_contact(&mut world, gate, ball, 9.0, 1200.0).unwrap();
        assert!(first.triggered);
        assert!(!second.triggered);
        assert_eq!(registry.summaries()[0].triggers, 1);
        assert_eq!(registry.summaries()[0].contacts, 2);

        world.set_position(ball, Vec2::new(100.0, 300.0));
        let third = registry.handle_contact(&mut world, gate, ball, 9.0, 1500.0).unwrap();
        assert!(third.triggered);
    }

    #[test]
    fn test_portal_exit_geometry() {
        let mut world = ArcadeWorld::new();
        let mut registry = HazardRegistry::new();
        let gate = registry.register(&mut world, portal());
        let ball = world.create_body(BodyDesc::ball(Vec2::new(100.0, 300.0), 9.0));
        world.set_velocity(ball, Vec2::new(0.0, -10.0));

        registry.handle_contact(&mut world, gate, ball, 9.0, 0.0);
        // safe offset = max(9 * 1.75, 20 * 0.65 + 8) = 21
        let pos = world.position(ball).unwrap();
        assert!((pos - Vec2::new(521.0, 300.0)).length() < 1e-3);
        let vel = world.velocity(ball).unwrap();
        assert!((vel - Vec2::new(2.2, -8.5)).length() < 1e-4);
    }

    #[test]
    fn test_unknown_body_is_ignored() {
        let mut world = ArcadeWorld::new();
        let mut registry = HazardRegistry::new();
        let gate = registry.register(&mut world, portal());
        let ball = world.create_body(BodyDesc::ball(Vec2::ZERO, 9.0));
        assert_eq!(registry.kind_of(gate), Some(HazardKind::Portal));
        assert_eq!(registry.kind_of(ball), None);
        assert!(registry.handle_contact(&mut world, BodyId(999), ball, 9.0, 0.0).is_none());

        assert!(registry.remove(&mut world, gate));
        assert!(!world.contains(gate));
        assert_eq!(registry.kind_of(gate), None);
        assert!(registry.handle_contact(&mut world, gate, ball, 9.0, 0.0).is_none());
        assert!(!registry.remove(&mut world, gate));
    }

    #[test]
    fn test_gravity_well_registers_force_field() {
        let mut world = ArcadeWorld::new();
        let mut registry = HazardRegistry::new();
        let well = registry.register(
            &mut world,
            HazardDescriptor::GravityWell {
                position: Vec2::new(300.0, 300.0),
                radius: 150.0,
                strength: 0.3,
                falloff: Falloff::Quadratic,
            },
        );
        let ball = world.create_body(BodyDesc::ball(Vec2::new(250.0, 300.0), 8.0));
        world.step(SIM_DT_MS);
        assert!(world.velocity(ball).unwrap().x > 0.0);

        let outcome = registry.handle_contact(&mut world, well, ball, 8.0, 0.0).unwrap();
        assert_eq!(outcome.kind, HazardKind::GravityWell);
        assert!(!outcome.triggered);
    }

    #[test]
    fn test_plan_hazards_by_round() {
        let band = HazardBand {
            width: 800.0,
            min_y: 300.0,
            max_y: 420.0,
        };
        let kinds = |round| -> Vec<HazardKind> {
            plan_hazards(round, &mut Mulberry32::new(5), band)
                .iter()
                .map(HazardDescriptor::kind)
                .collect()
        };
        assert!(kinds(1).is_empty());
        assert_eq!(kinds(2), vec![HazardKind::GravityWell]);
        assert_eq!(kinds(4).len(), 3);
        assert_eq!(
            plan_hazards(6, &mut Mulberry32::new(8), band),
            plan_hazards(6, &mut Mulberry32::new(8), band)
        );
        for hazard in plan_hazards(9, &mut Mulberry32::new(1), band) {
            if let HazardDescriptor::GravityWell { position, .. } = hazard {
                assert!((300.0..=420.0).contains(&position.y));
            }
        }
    }
}
