pub mod common;
pub mod drag_drop;
pub mod factory;
pub mod layout_engine;
pub mod model;
pub mod persistence;
