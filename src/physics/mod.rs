//! Physics world adapter
//!
//! Bodies, fixed-step integration and contact events behind the
//! [`PhysicsWorld`] trait. The simulation never reaches past this trait.

pub mod body;
pub mod collision;
pub mod world;

pub use body::{BodyDesc, BodyId, BodyKind, BodyLabel, Falloff, ForceField, Shape, WallSide};
pub use collision::{CollisionResult, ball_shape_collision, reflect_velocity};
pub use world::{ArcadeWorld, ContactPair, PhysicsWorld};
