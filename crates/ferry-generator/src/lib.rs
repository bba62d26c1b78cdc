pub mod random;
pub mod seq;

pub use random::RandomGenerator;
pub use seq::SeqGenerator;

use ferry_core::{Code, ContentKind};

/// Trait for generating candidate codes.
///
/// Implementations are pure generators that don't interact with storage.
/// Uniqueness against live records is enforced by the caller, which checks the
/// record store and re-rolls on collision.
pub trait Generator: Send + Sync + 'static {
    /// Generates a candidate code drawn from the namespace of `kind`.
    fn generate(&self, kind: ContentKind) -> Code;
}
