pub mod attendance;
pub mod classes;
pub mod core;
pub mod insights;
pub mod notes;
pub mod reports;
pub mod students;
