use crate::error::CoreError;
use crate::kind::{ContentKind, CODE_LENGTH, PASTE_ALPHABET};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::Display;

/// A short public identifier addressing a content record.
///
/// File codes are six decimal digits without a leading zero (`100000` to
/// `999999`). Paste codes are six characters drawn from [`PASTE_ALPHABET`].
/// A code is only meaningful together with its [`ContentKind`]; the same
/// string may address a file and a paste at the same time.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Code(SmolStr);

impl Code {
    /// Parses user input into a code of the given kind.
    ///
    /// Surrounding whitespace is ignored. Paste codes are matched
    /// case-insensitively, so `abc234` and `ABC234` address the same paste.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferry_core::{Code, ContentKind};
    ///
    /// let file = Code::parse(ContentKind::File, "482913").unwrap();
    /// assert_eq!(file.as_str(), "482913");
    ///
    /// let paste = Code::parse(ContentKind::Paste, " hk7m2q ").unwrap();
    /// assert_eq!(paste.as_str(), "HK7M2Q");
    /// ```
    pub fn parse(kind: ContentKind, input: &str) -> Result<Self, CoreError> {
        let input = input.trim();

        if input.len() != CODE_LENGTH {
            return Err(CoreError::InvalidCode {
                kind,
                reason: format!("expected {} characters, got {}", CODE_LENGTH, input.len()),
            });
        }

        match kind {
            ContentKind::File => {
                let bytes = input.as_bytes();
                if !bytes.iter().all(u8::is_ascii_digit) {
                    return Err(CoreError::InvalidCode {
                        kind,
                        reason: format!("must contain only digits: '{}'", input),
                    });
                }
                if bytes[0] == b'0' {
                    return Err(CoreError::InvalidCode {
                        kind,
                        reason: format!("must not start with zero: '{}'", input),
                    });
                }
                Ok(Self(SmolStr::new(input)))
            }
            ContentKind::Paste => {
                let upper = input.to_ascii_uppercase();
                if !upper.bytes().all(|b| PASTE_ALPHABET.contains(&b)) {
                    return Err(CoreError::InvalidCode {
                        kind,
                        reason: format!("contains characters outside the paste alphabet: '{}'", input),
                    });
                }
                Ok(Self(SmolStr::new(upper)))
            }
        }
    }

    /// Creates a `Code` without validation.
    ///
    /// Use this only for codes produced by trusted internal sources
    /// (generators, rows read back from the record store).
    pub fn new_unchecked(code: impl AsRef<str>) -> Self {
        Self(SmolStr::new(code))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Code").field(&self.0).finish()
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Code {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Code {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // the kind is not known here; callers validate with `Code::parse` at the edge
        let s = SmolStr::deserialize(deserializer)?;
        Ok(Self(s))
    }
}
