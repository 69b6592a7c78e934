pub mod auth;
pub mod journal;
pub mod market;
pub mod notification;
pub mod sentiment;
pub mod signal;

pub use auth::*;
pub use journal::*;
pub use market::*;
pub use notification::*;
pub use sentiment::*;
pub use signal::*;
