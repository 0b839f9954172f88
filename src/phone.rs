//! Phone number normalization.
//!
//! Phone numbers are canonicalized to E.164 before assertion operands are
//! compared so that `07523 503388` and `+44 7523 503388` are the same value.

use phonenumber::country::Id;
use phonenumber::Mode;

/// Region assumed for numbers without an international prefix.
const DEFAULT_REGION: Id = Id::GB;

/// Normalize `number` to E.164 format. Returns `None` if the number cannot be
/// parsed.
#[must_use]
pub fn normalize(number: &str) -> Option<String> {
    match phonenumber::parse(Some(DEFAULT_REGION), number) {
        Ok(parsed) => Some(parsed.format().mode(Mode::E164).to_string()),
        Err(e) => {
            tracing::trace!("unable to parse phone number: {e}");
            None
        }
    }
}
