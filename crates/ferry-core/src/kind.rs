use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Alphabet used for paste codes: upper-case letters and digits without the
/// visually confusable `I`, `O`, `0` and `1`.
pub const PASTE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of characters in every generated code.
pub const CODE_LENGTH: usize = 6;

/// Smallest numeric file code (inclusive).
pub const MIN_FILE_CODE: u32 = 100_000;
/// Largest numeric file code (inclusive).
pub const MAX_FILE_CODE: u32 = 999_999;

/// The kind of content a record holds. Each kind owns a separate code namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// An uploaded file, backed by a blob on disk.
    File,
    /// A text paste, stored inline with its metadata.
    Paste,
}

impl ContentKind {
    pub const ALL: [ContentKind; 2] = [ContentKind::File, ContentKind::Paste];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::File => "file",
            ContentKind::Paste => "paste",
        }
    }
}

impl Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
