//! Token accounting.
//!
//! Chunk boundaries are only reproducible if token counts are, so counting is
//! a deterministic pure function of the text for a given scheme identifier.

use once_cell::sync::Lazy;
use tiktoken_rs::{cl100k_base, CoreBPE};

use crate::event::Event;

static CL100K: Lazy<CoreBPE> =
    Lazy::new(|| cl100k_base().expect("failed to load cl100k_base tokenizer"));

/// Tokenization scheme identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenScheme {
    /// OpenAI `cl100k_base` BPE.
    #[default]
    Cl100kBase,
}

impl TokenScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScheme::Cl100kBase => "cl100k_base",
        }
    }
}

/// Counts tokens under a fixed scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter {
    scheme: TokenScheme,
}

impl TokenCounter {
    pub fn new(scheme: TokenScheme) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> TokenScheme {
        self.scheme
    }

    pub fn count(&self, text: &str) -> usize {
        match self.scheme {
            TokenScheme::Cl100kBase => CL100K.encode_with_special_tokens(text).len(),
        }
    }

    /// Token cost of an event is charged against its compact JSON form.
    pub fn count_event(&self, event: &Event) -> usize {
        self.count(&event.to_compact_json())
    }
}
