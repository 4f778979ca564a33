pub mod generation;
pub mod session;
