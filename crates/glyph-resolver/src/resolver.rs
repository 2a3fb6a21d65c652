use std::sync::Arc;

use base64::Engine;
use glyph_crypto::ContentHasher;
use glyph_store::BlobStore;
use glyph_types::{ContentHash, LogicalId, ResolutionResult, UnreadableReason};
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ResolveError, ResolveResult};
use crate::placeholder::placeholder_svg;

const IMAGE_MIME: &str = "image/svg+xml";
const NAME_FIELD: &str = "name";
const IMAGE_FIELD: &str = "image";

/// A composed document as handed to presentation layers.
///
/// Serializes to `{ "healthy", "placeholder", "payload", "content_hash" }`,
/// with the payload base64-encoded and the hash hex-encoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Every underlying blob was read back intact.
    pub healthy: bool,
    /// The image was substituted with a placeholder.
    pub placeholder: bool,
    #[serde(serialize_with = "as_base64")]
    pub payload: Vec<u8>,
    #[serde(serialize_with = "as_hex")]
    pub content_hash: ContentHash,
    /// Why the image was substituted, when it was.
    #[serde(skip)]
    pub image_failure: Option<UnreadableReason>,
}

fn as_base64<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
}

fn as_hex<S: Serializer>(hash: &ContentHash, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hash.to_hex())
}

/// Composes document and image reads into a single document.
pub struct MetadataResolver {
    store: Arc<BlobStore>,
}

impl MetadataResolver {
    pub fn new(store: Arc<BlobStore>) -> Self {
        Self { store }
    }

    /// Read an image, substituting a placeholder when it is unreadable.
    ///
    /// Never returns [`ResolutionResult::Unreadable`].
    pub async fn resolve_image(
        &self,
        image_id: &LogicalId,
        display_name: Option<&str>,
    ) -> ResolutionResult {
        match self.store.read(image_id).await {
            ResolutionResult::Unreadable(reason) => {
                warn!(id = %image_id, %reason, "image unreadable; substituting placeholder");
                ResolutionResult::Placeholder {
                    payload: placeholder_svg(image_id, display_name),
                    logical_id: image_id.clone(),
                }
            }
            readable => readable,
        }
    }

    /// Resolve a `document/<n>` id into the document with its image embedded.
    pub async fn resolve(&self, document_id: &LogicalId) -> ResolveResult<Resolution> {
        let image_id = document_id
            .companion_image()
            .ok_or_else(|| ResolveError::NoCompanionImage(document_id.clone()))?;

        let raw = match self.store.read(document_id).await {
            ResolutionResult::Unreadable(reason) => {
                return Err(ResolveError::DocumentUnreadable {
                    id: document_id.clone(),
                    reason,
                })
            }
            ResolutionResult::Healthy(payload) | ResolutionResult::Placeholder { payload, .. } => {
                payload
            }
        };

        let mut document = match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(ResolveError::InvalidDocument {
                    id: document_id.clone(),
                    reason: format!("expected an object, found {}", json_kind(&other)),
                })
            }
            Err(e) => {
                return Err(ResolveError::InvalidDocument {
                    id: document_id.clone(),
                    reason: e.to_string(),
                })
            }
        };

        let display_name = document
            .get(NAME_FIELD)
            .and_then(Value::as_str)
            .map(str::to_owned);

        let (image_bytes, image_failure) = match self.store.read(&image_id).await {
            ResolutionResult::Unreadable(reason) => {
                warn!(id = %image_id, %reason, "image unreadable; substituting placeholder");
                (
                    placeholder_svg(&image_id, display_name.as_deref()),
                    Some(reason),
                )
            }
            ResolutionResult::Healthy(payload) | ResolutionResult::Placeholder { payload, .. } => {
                (payload, None)
            }
        };
        let placeholder = image_failure.is_some();

        document.insert(
            IMAGE_FIELD.to_string(),
            Value::String(data_uri(IMAGE_MIME, &image_bytes)),
        );
        let payload = serde_json::to_vec(&Value::Object(document))
            .map_err(|e| ResolveError::Serialization(e.to_string()))?;
        let content_hash = ContentHasher::DOCUMENT.hash(&payload);

        debug!(id = %document_id, placeholder, hash = %content_hash.short_hex(), "document resolved");
        Ok(Resolution {
            healthy: !placeholder,
            placeholder,
            payload,
            content_hash,
            image_failure,
        })
    }
}

fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyph_ledger::{FaultPlan, InMemoryLedger};
    use glyph_store::{InMemoryEntryStore, StoreConfig};
    use glyph_types::{Strategy, WriterId};
    use std::time::Duration;

    const SVG: &[u8] = b"<svg xmlns=\"http://www.w3.org/2000/svg\"><circle r=\"4\"/></svg>";

    fn fixture() -> (Arc<InMemoryLedger>, Arc<BlobStore>, MetadataResolver) {
        let ledger = Arc::new(InMemoryLedger::new(WriterId::derive("resolver")));
        let store = Arc::new(BlobStore::new(
            ledger.clone(),
            Arc::new(InMemoryEntryStore::new()),
            StoreConfig::new(Duration::from_secs(5)).with_fetch_retries(0, Duration::ZERO),
        ));
        let resolver = MetadataResolver::new(Arc::clone(&store));
        (ledger, store, resolver)
    }

    async fn write_document(store: &BlobStore, n: u64, doc: serde_json::Value) {
        store
            .write(
                &LogicalId::document(n),
                &serde_json::to_vec(&doc).unwrap(),
                Strategy::Sequential,
            )
            .await
            .unwrap();
    }

    fn embedded_image(resolution: &Resolution) -> Vec<u8> {
        let doc: Value = serde_json::from_slice(&resolution.payload).unwrap();
        let uri = doc["image"].as_str().unwrap();
        let b64 = uri.strip_prefix("data:image/svg+xml;base64,").unwrap();
        base64::engine::general_purpose::STANDARD.decode(b64).unwrap()
    }

    #[tokio::test]
    async fn healthy_document_embeds_image() {
        let (_, store, resolver) = fixture();
        write_document(&store, 1, serde_json::json!({"name": "Ace", "power": 9})).await;
        store
            .write(&LogicalId::image(1), SVG, Strategy::Sequential)
            .await
            .unwrap();

        let resolution = resolver.resolve(&LogicalId::document(1)).await.unwrap();
        assert!(resolution.healthy);
        assert!(!resolution.placeholder);
        assert_eq!(embedded_image(&resolution), SVG);
        let doc: Value = serde_json::from_slice(&resolution.payload).unwrap();
        assert_eq!(doc["power"], 9);
        assert_eq!(
            resolution.content_hash,
            ContentHasher::DOCUMENT.hash(&resolution.payload)
        );
    }

    #[tokio::test]
    async fn missing_image_entry_gets_placeholder() {
        let (_, store, resolver) = fixture();
        write_document(&store, 2, serde_json::json!({"name": "Knight"})).await;

        let resolution = resolver.resolve(&LogicalId::document(2)).await.unwrap();
        assert!(resolution.placeholder);
        assert!(!resolution.healthy);
        assert_eq!(resolution.image_failure, Some(UnreadableReason::NoEntry));
        assert_eq!(
            embedded_image(&resolution),
            placeholder_svg(&LogicalId::image(2), Some("Knight"))
        );
    }

    #[tokio::test]
    async fn dropped_image_placeholder_is_stable() {
        let (ledger, store, resolver) = fixture();
        write_document(&store, 3, serde_json::json!({"name": "Dragon"})).await;
        ledger.set_plan(FaultPlan::drop_all());
        store
            .write(&LogicalId::image(3), SVG, Strategy::Sequential)
            .await
            .unwrap();

        let first = resolver.resolve(&LogicalId::document(3)).await.unwrap();
        let second = resolver.resolve(&LogicalId::document(3)).await.unwrap();
        assert!(first.placeholder);
        assert_eq!(first.payload, second.payload);
        assert_eq!(first.content_hash, second.content_hash);
    }

    #[tokio::test]
    async fn unreadable_document_fails_resolution() {
        let (ledger, store, resolver) = fixture();
        store
            .write(&LogicalId::image(4), SVG, Strategy::Sequential)
            .await
            .unwrap();
        ledger.set_plan(FaultPlan::drop_all());
        write_document(&store, 4, serde_json::json!({"name": "Lost"})).await;

        let err = resolver.resolve(&LogicalId::document(4)).await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::DocumentUnreadable {
                reason: UnreadableReason::Missing { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn never_written_document_fails_resolution() {
        let (_, _, resolver) = fixture();
        let err = resolver.resolve(&LogicalId::document(5)).await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::DocumentUnreadable {
                reason: UnreadableReason::NoEntry,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn non_object_document_is_invalid() {
        let (_, store, resolver) = fixture();
        write_document(&store, 6, serde_json::json!(["not", "an", "object"])).await;
        let err = resolver.resolve(&LogicalId::document(6)).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidDocument { .. }));
    }

    #[tokio::test]
    async fn image_ids_have_no_companion() {
        let (_, _, resolver) = fixture();
        let err = resolver.resolve(&LogicalId::image(1)).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoCompanionImage(_)));
    }

    #[tokio::test]
    async fn resolve_image_never_unreadable() {
        let (_, _, resolver) = fixture();
        let result = resolver.resolve_image(&LogicalId::image(9), None).await;
        assert!(result.is_placeholder());
        assert_eq!(
            result.payload(),
            Some(placeholder_svg(&LogicalId::image(9), None).as_slice())
        );
    }

    #[tokio::test]
    async fn serialized_shape() {
        let (_, store, resolver) = fixture();
        write_document(&store, 7, serde_json::json!({"name": "Shape"})).await;
        let resolution = resolver.resolve(&LogicalId::document(7)).await.unwrap();
        let json = serde_json::to_value(&resolution).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert_eq!(obj["healthy"], false);
        assert_eq!(obj["placeholder"], true);
        assert_eq!(obj["content_hash"], resolution.content_hash.to_hex());
        assert!(obj["payload"].is_string());
    }
}
