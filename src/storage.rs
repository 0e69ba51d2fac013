//! Staging uploaded documents in object storage.
//!
//! The streaming endpoint does not send document bytes to the model.
//! It writes them to a bucket and passes the `gs://` URI instead.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use object_store::gcp::{GcpCredential, GoogleCloudStorage, GoogleCloudStorageBuilder};
use object_store::path::Path;
use object_store::{ObjectStore, PutOptions, PutPayload, StaticCredentialProvider};
use secrecy::ExposeSecret;
use tracing::info;
use uuid::Uuid;

use crate::error::ExtractError;
use crate::gemini::credentials::GcpCredentials;

enum Backend {
    /// Google Cloud Storage, rebuilt per upload with a fresh access token.
    Gcs,
    /// A fixed store (in-memory or local) used for tests and offline runs.
    Fixed(Arc<dyn ObjectStore>),
}

/// The bucket documents are staged in.
pub struct StagingBucket {
    bucket: String,
    backend: Backend,
}

impl fmt::Debug for StagingBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backend = match self.backend {
            Backend::Gcs => "gcs",
            Backend::Fixed(_) => "fixed",
        };
        f.debug_struct("StagingBucket")
            .field("bucket", &self.bucket)
            .field("backend", &backend)
            .finish()
    }
}

impl StagingBucket {
    /// A Google Cloud Storage bucket.
    pub fn gcs(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            backend: Backend::Gcs,
        }
    }

    /// A bucket backed by an existing store. URIs still use the `gs://` scheme.
    pub fn with_store(bucket: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            bucket: bucket.into(),
            backend: Backend::Fixed(store),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Unique object name for an uploaded file: `{uuid}_{basename}`.
    pub fn object_name(file_name: &str) -> String {
        let base = file_name
            .rsplit(['/', '\\'])
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
            .unwrap_or("document");
        format!("{}_{}", Uuid::new_v4().simple(), base)
    }

    /// `gs://` URI for an object in this bucket.
    pub fn uri(&self, name: &str) -> String {
        format!("gs://{}/{}", self.bucket, name)
    }

    /// Upload `bytes` under `name` and return its `gs://` URI.
    ///
    /// The object key is `name` as encoded by [`Path`], which percent-encodes
    /// characters such as `#`, `[`, `]` and `%`. The URI names that key.
    pub async fn upload(
        &self,
        name: &str,
        bytes: Bytes,
        credentials: &GcpCredentials,
    ) -> Result<String, ExtractError> {
        let store: Arc<dyn ObjectStore> = match &self.backend {
            Backend::Fixed(store) => store.clone(),
            Backend::Gcs => Arc::new(self.gcs_store(credentials).await?),
        };

        let size = bytes.len();
        let path = Path::from(name);
        store
            .put_opts(&path, PutPayload::from(bytes), PutOptions::default())
            .await
            .map_err(|e| ExtractError::UploadFailed(e.to_string()))?;

        let uri = self.uri(path.as_ref());
        info!(uri = %uri, size, "Document staged");
        Ok(uri)
    }

    async fn gcs_store(
        &self,
        credentials: &GcpCredentials,
    ) -> Result<GoogleCloudStorage, ExtractError> {
        // object_store only accepts a ready bearer token for GCS.
        let token = credentials.access_token().await?;
        GoogleCloudStorageBuilder::default()
            .with_bucket_name(&self.bucket)
            .with_credentials(Arc::new(StaticCredentialProvider::new(GcpCredential {
                bearer: token.expose_secret().to_string(),
            })))
            .build()
            .map_err(|e| ExtractError::UploadFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use object_store::memory::InMemory;
    use object_store::{GetOptions, ObjectMeta};

    use super::*;

    #[test]
    fn test_object_name_keeps_basename() {
        let name = StagingBucket::object_name("invoice-2024.pdf");
        let (prefix, rest) = name.split_once('_').unwrap();
        assert_eq!(prefix.len(), 32);
        assert!(prefix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(rest, "invoice-2024.pdf");
    }

    #[test]
    fn test_object_name_drops_directories() {
        assert!(StagingBucket::object_name("../../etc/passwd").ends_with("_passwd"));
        assert!(StagingBucket::object_name("C:\\scans\\ktp.pdf").ends_with("_ktp.pdf"));
        assert!(StagingBucket::object_name("").ends_with("_document"));
        assert!(StagingBucket::object_name("uploads/").ends_with("_document"));
    }

    #[test]
    fn test_object_names_are_unique() {
        assert_ne!(
            StagingBucket::object_name("a.pdf"),
            StagingBucket::object_name("a.pdf")
        );
    }

    #[tokio::test]
    async fn test_upload_to_fixed_store() {
        let store = Arc::new(InMemory::new());
        let bucket = StagingBucket::with_store("edii-ocr", store.clone());
        let creds = GcpCredentials::Unavailable("not needed".to_string());

        let uri = bucket
            .upload("abc_doc.pdf", Bytes::from_static(b"%PDF-1.4"), &creds)
            .await
            .unwrap();
        assert_eq!(uri, "gs://edii-ocr/abc_doc.pdf");

        let stored = store
            .get_opts(&Path::from("abc_doc.pdf"), GetOptions::default())
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(stored.as_ref(), b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_upload_uri_names_the_stored_key() {
        let store = Arc::new(InMemory::new());
        let bucket = StagingBucket::with_store("edii-ocr", store.clone());
        let creds = GcpCredentials::Unavailable("not needed".to_string());

        let name = StagingBucket::object_name("invoice #12 [final] 50%.pdf");
        let uri = bucket
            .upload(&name, Bytes::from_static(b"%PDF-1.4"), &creds)
            .await
            .unwrap();

        let metas: Vec<ObjectMeta> = store.list(None).try_collect().await.unwrap();
        assert_eq!(metas.len(), 1);
        let key = metas[0].location.as_ref();
        assert_eq!(uri, format!("gs://edii-ocr/{key}"));
        assert!(key.ends_with("invoice %2312 %5Bfinal%5D 50%25.pdf"), "{key}");

        let stored = store
            .get_opts(&metas[0].location, GetOptions::default())
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(stored.as_ref(), b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_gcs_upload_without_credentials_fails_on_token() {
        let bucket = StagingBucket::gcs("edii-ocr");
        let creds = GcpCredentials::Unavailable("no ADC".to_string());
        let err = bucket
            .upload("x.pdf", Bytes::from_static(b"x"), &creds)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::AccessToken(_)));
    }
}
