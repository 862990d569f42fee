//! Metadata model - entities and their field descriptions
//!
//! - `field`: column type, flags, default and foreign-key join
//! - `entity`: table name, ordered fields and current property values

pub mod entity;
pub mod field;

pub use entity::Entity;
pub use field::{DataType, Field, JoinColumn, JoinDirection, JoinSpec};
