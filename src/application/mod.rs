//! Application services layer scaffolding.

pub mod clock;
pub mod pagination;
pub mod repos;
pub mod snippets;
