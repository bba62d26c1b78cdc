use crate::Generator;
use ferry_core::kind::{CODE_LENGTH, MAX_FILE_CODE, MIN_FILE_CODE, PASTE_ALPHABET};
use ferry_core::{Code, ContentKind};
use rand::Rng;

/// Draws codes uniformly at random from each kind's namespace.
///
/// Files get one of the 900,000 six-digit numbers, pastes one of 32^6
/// strings over the unambiguous paste alphabet.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomGenerator;

impl RandomGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Generator for RandomGenerator {
    fn generate(&self, kind: ContentKind) -> Code {
        let mut rng = rand::thread_rng();
        match kind {
            ContentKind::File => {
                let value = rng.gen_range(MIN_FILE_CODE..=MAX_FILE_CODE);
                Code::new_unchecked(value.to_string())
            }
            ContentKind::Paste => {
                let code: String = (0..CODE_LENGTH)
                    .map(|_| char::from(PASTE_ALPHABET[rng.gen_range(0..PASTE_ALPHABET.len())]))
                    .collect();
                Code::new_unchecked(code)
            }
        }
    }
}
