//! Auth-domain identifiers, token cache items, user information, and authentication results.

pub mod id;
pub mod result;
pub mod token;
pub mod user;

pub use id::*;
pub use result::*;
pub use token::{record::*, secret::*};
pub use user::*;
