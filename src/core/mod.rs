pub mod client;
pub mod probe;
pub mod state;
pub mod util;
