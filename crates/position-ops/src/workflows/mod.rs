pub mod deactivation;
pub mod vacancy;
