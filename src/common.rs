//! Miscellaneous common structs used throughout the library.

mod distance_table;
mod id;
pub mod messages;
mod node;

pub use distance_table::*;
pub use id::*;
pub use messages::*;
pub use node::*;
