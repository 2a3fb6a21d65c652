use glyph_types::ContentHash;

/// BLAKE3 over `"<domain>:" || bytes`.
///
/// Payload digests and composed-document digests use different domains, so
/// the same bytes never produce the same [`ContentHash`] in both roles.
/// Digests are persisted in entries and must stay stable across releases.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Stored payloads. Entries record this digest.
    pub const BLOB: Self = Self {
        domain: "glyph-blob-v1",
    };
    /// Documents composed by the resolver.
    pub const DOCUMENT: Self = Self {
        domain: "glyph-document-v1",
    };

    pub fn hash(&self, data: &[u8]) -> ContentHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ContentHash::from_hash(*hasher.finalize().as_bytes())
    }

    pub fn verify(&self, data: &[u8], expected: &ContentHash) -> bool {
        self.hash(data) == *expected
    }
}
