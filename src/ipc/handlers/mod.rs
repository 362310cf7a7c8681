pub mod categories;
pub mod core;
pub mod gradebooks;
pub mod items;
pub mod setup;
