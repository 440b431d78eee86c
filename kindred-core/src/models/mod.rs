pub mod conversation;
pub mod interest;
pub mod moderation;
pub mod relation;
pub mod user;

pub use conversation::*;
pub use interest::*;
pub use moderation::*;
pub use relation::*;
pub use user::*;
