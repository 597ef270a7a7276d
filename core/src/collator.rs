//! Pluggable locale collation.
//!
//! Locale initialization itself is an external collaborator (out of scope
//! for this engine); what the comparator needs is only a transform from a
//! display name to a byte key that sorts in collation order. Callers that
//! want real locale-aware collation supply their own [`Collator`]; the
//! engine's [`AsciiCollator`] is the identity/default used when none is
//! configured.
pub trait Collator: Send + Sync {
    fn sort_key(&self, name: &str) -> Vec<u8>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AsciiCollator;

impl Collator for AsciiCollator {
    fn sort_key(&self, name: &str) -> Vec<u8> {
        name.as_bytes().to_vec()
    }
}
