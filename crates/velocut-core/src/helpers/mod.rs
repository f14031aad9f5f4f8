// crates/velocut-core/src/helpers/mod.rs
//
// Small pure utilities shared by the compositor and the frame types.

pub mod geometry;
pub mod pixel;
