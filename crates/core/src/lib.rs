pub mod models;
pub mod symbols;
pub mod traits;

pub use models::*;
pub use symbols::*;
pub use traits::*;
