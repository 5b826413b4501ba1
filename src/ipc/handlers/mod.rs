pub mod attendance;
pub mod core;
pub mod portal;
pub mod session;
pub mod students;
