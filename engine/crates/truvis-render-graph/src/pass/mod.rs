pub mod context;
pub mod dependency;
pub mod pass;
