use crate::Generator;
use ferry_core::kind::{CODE_LENGTH, MAX_FILE_CODE, MIN_FILE_CODE, PASTE_ALPHABET};
use ferry_core::{Code, ContentKind};
use std::sync::atomic::{AtomicU64, Ordering};

const FILE_SPACE: u64 = (MAX_FILE_CODE - MIN_FILE_CODE + 1) as u64;

/// A deterministic generator walking each namespace in order.
///
/// File codes run `100000`, `100001`, ... and paste codes `AAAAAA`, `AAAAAB`,
/// ... wrapping around at the end of the space. Each kind has its own counter.
/// Useful for reproducible fixtures; production uses
/// [`RandomGenerator`](crate::RandomGenerator) so codes are not guessable.
#[derive(Debug)]
pub struct SeqGenerator {
    files: AtomicU64,
    pastes: AtomicU64,
}

impl Clone for SeqGenerator {
    fn clone(&self) -> Self {
        Self {
            files: AtomicU64::new(self.files.load(Ordering::SeqCst)),
            pastes: AtomicU64::new(self.pastes.load(Ordering::SeqCst)),
        }
    }
}

impl Default for SeqGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SeqGenerator {
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    /// Creates a generator whose counters both start at `offset`.
    ///
    /// Useful for resuming from a known state.
    pub fn with_offset(offset: u64) -> Self {
        Self {
            files: AtomicU64::new(offset),
            pastes: AtomicU64::new(offset),
        }
    }

    fn file_code(n: u64) -> Code {
        let value = u64::from(MIN_FILE_CODE) + n % FILE_SPACE;
        Code::new_unchecked(value.to_string())
    }

    fn paste_code(n: u64) -> Code {
        let base = PASTE_ALPHABET.len() as u64;
        let mut rest = n;
        let mut digits = [PASTE_ALPHABET[0]; CODE_LENGTH];
        for slot in digits.iter_mut().rev() {
            *slot = PASTE_ALPHABET[(rest % base) as usize];
            rest /= base;
        }
        // every byte comes from the ASCII alphabet
        let code: String = digits.iter().copied().map(char::from).collect();
        Code::new_unchecked(code)
    }
}

impl Generator for SeqGenerator {
    fn generate(&self, kind: ContentKind) -> Code {
        match kind {
            ContentKind::File => Self::file_code(self.files.fetch_add(1, Ordering::SeqCst)),
            ContentKind::Paste => Self::paste_code(self.pastes.fetch_add(1, Ordering::SeqCst)),
        }
    }
}
