pub mod model;
pub mod snapshot;
pub mod sort;
