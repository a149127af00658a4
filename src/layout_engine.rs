mod arrange;
pub(crate) mod graph;
pub mod proportional;

pub use arrange::{Layout, arrange};
pub use graph::{Edge, Orientation};
