pub mod buffer;
pub mod random;
