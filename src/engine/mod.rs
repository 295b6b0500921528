pub mod crystal;
pub mod geometry;
pub mod operators;
