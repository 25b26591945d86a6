pub mod pattern;
pub mod stereogram;
