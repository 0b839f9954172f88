//! # Handlers
//!
//! Request handlers driving claim resolution and consent on behalf of the
//! enclosing HTTP layer.

mod consent;
mod interaction;
mod release;
mod validation;

pub use self::consent::consent;
pub use self::interaction::interaction;
pub use self::release::release;
pub use self::validation::validation;
