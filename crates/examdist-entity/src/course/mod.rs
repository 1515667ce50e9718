//! Course domain entities.

pub mod model;

pub use model::Course;
