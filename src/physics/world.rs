//! Physics world capability and a small deterministic solver
//!
//! The orchestrator only talks to [`PhysicsWorld`]. [`ArcadeWorld`] is the
//! built-in implementation: one or more circular dynamic bodies collided
//! against static/kinematic circles, boxes and diamonds, with substepping to
//! avoid tunneling. Iteration is ordered by body id, so two worlds fed the
//! same calls produce the same state bit for bit.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;

use super::body::{BodyDesc, BodyId, BodyKind, BodyLabel, ForceField, Shape};
use super::collision::{ball_shape_collision, reflect_velocity};
use crate::consts::REFERENCE_FRAME_MS;

/// Maximum substeps per step for fast bodies
pub const MAX_SUBSTEPS: u32 = 8;

/// A new contact reported by a step; `a` is the dynamic body
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ContactPair {
    pub a: BodyId,
    pub b: BodyId,
}

/// Rigid-body capability consumed by the orchestrator
///
/// Lookups on unknown ids return `None` and setters on unknown ids do
/// nothing, so stale handles are harmless.
pub trait PhysicsWorld {
    fn create_body(&mut self, desc: BodyDesc) -> BodyId;
    /// Remove a body with its force field and attachments
    fn remove_body(&mut self, id: BodyId) -> bool;
    fn contains(&self, id: BodyId) -> bool;
    fn label(&self, id: BodyId) -> Option<BodyLabel>;
    fn position(&self, id: BodyId) -> Option<Vec2>;
    fn velocity(&self, id: BodyId) -> Option<Vec2>;
    fn set_position(&mut self, id: BodyId, pos: Vec2);
    fn set_velocity(&mut self, id: BodyId, vel: Vec2);
    /// Advance by `dt_ms` simulated milliseconds
    fn step(&mut self, dt_ms: f64);
    /// Contacts that started during the last step(s), oldest first
    fn drain_contacts(&mut self) -> Vec<ContactPair>;
    /// Glue `child` to `parent` at a fixed offset
    fn attach(&mut self, child: BodyId, parent: BodyId, offset: Vec2);
    fn detach(&mut self, child: BodyId);
    fn is_attached(&self, child: BodyId) -> bool;
    /// Snap every attached body to its parent
    fn sync_attachments(&mut self);
    /// Register a force field owned by `owner`; removed with the owner
    fn add_force_field(&mut self, owner: BodyId, field: ForceField);
}

#[derive(Debug, Clone, Copy)]
struct Body {
    desc: BodyDesc,
    position: Vec2,
    velocity: Vec2,
}

#[derive(Debug, Clone, Copy)]
struct Attachment {
    parent: BodyId,
    offset: Vec2,
}

/// Built-in circle/box/diamond solver
#[derive(Debug, Clone, Default)]
pub struct ArcadeWorld {
    bodies: BTreeMap<BodyId, Body>,
    attachments: BTreeMap<BodyId, Attachment>,
    fields: BTreeMap<BodyId, ForceField>,
    /// Pairs in contact during the previous step
    touching: BTreeSet<(BodyId, BodyId)>,
    contacts: Vec<ContactPair>,
    next_id: u32,
}

impl ArcadeWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn shape(&self, id: BodyId) -> Option<Shape> {
        self.bodies.get(&id).map(|b| b.desc.shape)
    }

    fn integrate(&mut self, id: BodyId, scale: f32, touched: &mut BTreeSet<(BodyId, BodyId)>) {
        let Some(mut body) = self.bodies.get(&id).copied() else {
            return;
        };

        for field in self.fields.values() {
            body.velocity += field.acceleration_at(body.position) * scale;
        }

        let radius = body.desc.shape.bounding_radius().max(0.5);
        let travel = body.velocity.length() * scale;
        let substeps = ((travel / (radius * 0.5)).ceil() as u32).clamp(1, MAX_SUBSTEPS);
        let sub_scale = scale / substeps as f32;

        for _ in 0..substeps {
            body.position += body.velocity * sub_scale;

            for (&other_id, other) in &self.bodies {
                if other_id == id
                    || other.desc.kind == BodyKind::Dynamic
                    || self.attachments.contains_key(&other_id)
                {
                    continue;
                }
                let hit = ball_shape_collision(body.position, radius, other.position, &other.desc.shape);
                if !hit.hit {
                    continue;
                }
                touched.insert((id, other_id));
                if other.desc.is_sensor {
                    continue;
                }
                body.position += hit.normal * hit.penetration;
                let restitution = body.desc.restitution * other.desc.restitution;
                body.velocity = reflect_velocity(body.velocity, hit.normal, restitution);
            }
        }

        self.bodies.insert(id, body);
    }
}

impl PhysicsWorld for ArcadeWorld {
    fn create_body(&mut self, desc: BodyDesc) -> BodyId {
        self.next_id += 1;
        let id = BodyId(self.next_id);
        self.bodies.insert(
            id,
            Body {
                desc,
                position: desc.position,
                velocity: desc.velocity,
            },
        );
        id
    }

    fn remove_body(&mut self, id: BodyId) -> bool {
        let removed = self.bodies.remove(&id).is_some();
        if removed {
            self.fields.remove(&id);
            self.attachments.remove(&id);
            self.attachments.retain(|_, att| att.parent != id);
            self.touching.retain(|&(a, b)| a != id && b != id);
        }
        removed
    }

    fn contains(&self, id: BodyId) -> bool {
        self.bodies.contains_key(&id)
    }

    fn label(&self, id: BodyId) -> Option<BodyLabel> {
        self.bodies.get(&id).map(|b| b.desc.label)
    }

    fn position(&self, id: BodyId) -> Option<Vec2> {
        self.bodies.get(&id).map(|b| b.position)
    }

    fn velocity(&self, id: BodyId) -> Option<Vec2> {
        self.bodies.get(&id).map(|b| b.velocity)
    }

    fn set_position(&mut self, id: BodyId, pos: Vec2) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.position = pos;
        }
    }

    fn set_velocity(&mut self, id: BodyId, vel: Vec2) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.velocity = vel;
        }
    }

    fn step(&mut self, dt_ms: f64) {
        let scale = (dt_ms / REFERENCE_FRAME_MS) as f32;
        self.sync_attachments();

        let dynamic: Vec<BodyId> = self
            .bodies
            .iter()
            .filter(|(id, b)| b.desc.kind == BodyKind::Dynamic && !self.attachments.contains_key(id))
            .map(|(&id, _)| id)
            .collect();

        let mut touched = BTreeSet::new();
        for id in dynamic {
            self.integrate(id, scale, &mut touched);
        }

        for &(a, b) in touched.difference(&self.touching) {
            self.contacts.push(ContactPair { a, b });
        }
        self.touching = touched;
    }

    fn drain_contacts(&mut self) -> Vec<ContactPair> {
        std::mem::take(&mut self.contacts)
    }

    fn attach(&mut self, child: BodyId, parent: BodyId, offset: Vec2) {
        if self.bodies.contains_key(&child) && self.bodies.contains_key(&parent) {
            self.attachments.insert(child, Attachment { parent, offset });
            self.touching.retain(|&(a, _)| a != child);
            self.sync_attachments();
        }
    }

    fn detach(&mut self, child: BodyId) {
        self.attachments.remove(&child);
    }

    fn is_attached(&self, child: BodyId) -> bool {
        self.attachments.contains_key(&child)
    }

    fn sync_attachments(&mut self) {
        let snapped: Vec<(BodyId, Vec2)> = self
            .attachments
            .iter()
            .filter_map(|(&child, att)| {
                self.bodies
                    .get(&att.parent)
                    .map(|parent| (child, parent.position + att.offset))
            })
            .collect();
        for (child, pos) in snapped {
            if let Some(body) = self.bodies.get_mut(&child) {
                body.position = pos;
                body.velocity = Vec2::ZERO;
            }
        }
    }

    fn add_force_field(&mut self, owner: BodyId, field: ForceField) {
        if self.bodies.contains_key(&owner) {
            self.fields.insert(owner, field);
        }
    }
}
