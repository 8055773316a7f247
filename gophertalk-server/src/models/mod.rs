//! Domain models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod pagination;
pub mod post;
pub mod user;
pub mod validation;

pub use pagination::{Page, PageParams};
pub use post::PostText;
pub use user::{Password, PersonName, UserName};
pub use validation::{positive_id, ValidationError};
