//! Core type definitions used across the ExamDist workspace.

pub mod id;

pub use id::*;
