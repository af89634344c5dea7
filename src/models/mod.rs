mod call;
mod contact;
mod contact_log;
mod membership;
mod project;
mod user;

pub use call::*;
pub use contact::*;
pub use contact_log::*;
pub use membership::*;
pub use project::*;
pub use user::*;
