use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tracing::info;
use uuid::Uuid;

use tidings_types::api::UploadedFile;

use crate::artifacts::ArtifactStore;

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Signed uploads to Cloudinary. Video cards land under `folder`.
pub struct CloudinaryStore {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    folder: String,
}

#[derive(Deserialize)]
struct UploadResult {
    secure_url: String,
}

impl CloudinaryStore {
    pub fn new(cloud_name: String, api_key: String, api_secret: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            cloud_name,
            api_key,
            api_secret,
            folder: "christmas_cards".to_string(),
        }
    }

    /// Cloudinary request signature: params sorted by name, joined as
    /// `k=v&k=v`, secret appended, SHA-1 hex.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let joined = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha1::new();
        hasher.update(joined.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl ArtifactStore for CloudinaryStore {
    async fn upload(&self, file: UploadedFile) -> Result<String> {
        let public_id = format!("{}/{}", self.folder, Uuid::new_v4());
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", public_id.as_str()), ("timestamp", timestamp.as_str())]);
        let size = file.data.len();

        let content_type = if file.content_type.is_empty() {
            "application/octet-stream"
        } else {
            file.content_type.as_str()
        };
        let part = Part::bytes(file.data)
            .file_name(file.file_name.clone())
            .mime_str(content_type)?;

        let form = Form::new()
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("public_id", public_id.clone())
            .text("signature", signature)
            .part("file", part);

        let url = format!("{}/{}/auto/upload", API_BASE, self.cloud_name);
        let resp = self.client.post(&url).multipart(form).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Cloudinary upload returned {}: {}", status, body));
        }

        let result: UploadResult = resp.json().await?;
        info!("Uploaded {} ({} bytes) to Cloudinary", public_id, size);
        Ok(result.secure_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(secret: &str) -> CloudinaryStore {
        CloudinaryStore::new("demo".into(), "key".into(), secret.into())
    }

    #[test]
    fn signature_ignores_param_order() {
        let s = store("shh");
        let a = s.sign(&[("timestamp", "1315060510"), ("public_id", "sample")]);
        let b = s.sign(&[("public_id", "sample"), ("timestamp", "1315060510")]);

        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signature_depends_on_secret() {
        let params = [("public_id", "sample"), ("timestamp", "1315060510")];
        assert_ne!(store("one").sign(&params), store("two").sign(&params));
    }

    #[test]
    fn signature_is_sha1_of_sorted_query_and_secret() {
        let mut hasher = Sha1::new();
        hasher.update(b"public_id=sample&timestamp=1315060510abcd");
        let expected = hex::encode(hasher.finalize());

        let got = store("abcd").sign(&[("timestamp", "1315060510"), ("public_id", "sample")]);
        assert_eq!(got, expected);
    }
}
