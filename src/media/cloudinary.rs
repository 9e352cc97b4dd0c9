//! Signed REST client for a Cloudinary-compatible media host.
//!
//! Every request carries `api_key`, `timestamp` and a SHA-256 signature over
//! the other parameters: sorted by name, joined as `k=v` with `&`, with the
//! API secret appended before hashing.

use crate::media::{
    DestroyOutcome, ImageUpload, MediaConfig, MediaError, MediaResult, MediaStore, UploadedImage,
};
use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub struct CloudinaryClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_secret: String,
    folder: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    #[serde(default)]
    secure_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl CloudinaryClient {
    pub fn new(config: &MediaConfig) -> MediaResult<Self> {
        for (name, value) in [
            ("cloud_name", &config.cloud_name),
            ("api_key", &config.api_key),
            ("api_secret", &config.api_secret),
        ] {
            if value.trim().is_empty() {
                return Err(MediaError::Config(format!("{name} is not set")));
            }
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MediaError::Config(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!(
                "{}/v1_1/{}/image",
                config.base_url.trim_end_matches('/'),
                config.cloud_name
            ),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            folder: config.folder.clone(),
        })
    }

    fn sign(&self, params: &BTreeMap<&'static str, String>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(string_to_sign(params).as_bytes());
        hasher.update(self.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    async fn send_upload(
        &self,
        mut params: BTreeMap<&'static str, String>,
        image: ImageUpload,
    ) -> MediaResult<UploadedImage> {
        if image.data.is_empty() {
            return Err(MediaError::EmptyImage);
        }
        params.insert("timestamp", unix_timestamp());
        let signature = self.sign(&params);

        let mut file = reqwest::multipart::Part::bytes(image.data.to_vec())
            .file_name(image.file_name.unwrap_or_else(|| "image".to_string()));
        if let Some(content_type) = image.content_type.as_deref() {
            file = file
                .mime_str(content_type)
                .map_err(|e| MediaError::Transport(e.to_string()))?;
        }

        let mut form = reqwest::multipart::Form::new();
        for (key, value) in params {
            form = form.text(key, value);
        }
        let form = form
            .text("api_key", self.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256")
            .part("file", file);

        let response = self
            .http
            .post(format!("{}/upload", self.endpoint))
            .multipart(form)
            .send()
            .await
            .map_err(|e| MediaError::Transport(e.to_string()))?;

        let body: UploadResponse = read_json(response).await?;
        let url = body
            .secure_url
            .or(body.url)
            .ok_or_else(|| MediaError::Decode("upload response has no url".into()))?;

        Ok(UploadedImage {
            url,
            public_id: body.public_id,
        })
    }
}

#[async_trait]
impl MediaStore for CloudinaryClient {
    async fn upload(&self, image: ImageUpload) -> MediaResult<UploadedImage> {
        let mut params = BTreeMap::new();
        params.insert("folder", self.folder.clone());

        let uploaded = self.send_upload(params, image).await?;
        tracing::info!(public_id = %uploaded.public_id, "image uploaded");
        Ok(uploaded)
    }

    async fn replace(&self, public_id: &str, image: ImageUpload) -> MediaResult<UploadedImage> {
        if public_id.trim().is_empty() {
            return Err(MediaError::MissingPublicId);
        }
        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.to_string());
        params.insert("overwrite", "true".to_string());
        params.insert("invalidate", "true".to_string());

        let uploaded = self.send_upload(params, image).await?;
        tracing::info!(public_id = %uploaded.public_id, "image replaced");
        Ok(uploaded)
    }

    async fn destroy(&self, public_id: &str) -> MediaResult<DestroyOutcome> {
        if public_id.trim().is_empty() {
            return Err(MediaError::MissingPublicId);
        }
        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.to_string());
        params.insert("invalidate", "true".to_string());
        params.insert("timestamp", unix_timestamp());
        let signature = self.sign(&params);

        let mut fields: Vec<(&str, String)> = params.into_iter().collect();
        fields.push(("api_key", self.api_key.clone()));
        fields.push(("signature", signature));
        fields.push(("signature_algorithm", "sha256".to_string()));

        let response = self
            .http
            .post(format!("{}/destroy", self.endpoint))
            .form(&fields)
            .send()
            .await
            .map_err(|e| MediaError::Transport(e.to_string()))?;

        let outcome: DestroyOutcome = read_json(response).await?;
        tracing::info!(public_id, result = %outcome.result, "image destroy requested");
        Ok(outcome)
    }
}

/// `k=v` pairs in key order joined with `&`. Empty values are skipped.
pub(crate) fn string_to_sign(params: &BTreeMap<&'static str, String>) -> String {
    params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn unix_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
        .to_string()
}

async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> MediaResult<T> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| MediaError::Transport(e.to_string()))?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorEnvelope>(&text)
            .map(|envelope| envelope.error.message)
            .unwrap_or(text);
        return Err(MediaError::Upstream {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&text).map_err(|e| MediaError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaBackend;
    use axum::extract::{Form, Multipart, Path, State};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Requests seen by the stand-in host: (endpoint, form fields)
    type Captured = Arc<Mutex<Vec<(String, HashMap<String, String>)>>>;

    fn rejected() -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "Invalid Signature"}})),
        )
            .into_response()
    }

    async fn fake_upload(
        State(seen): State<Captured>,
        Path(cloud): Path<String>,
        mut multipart: Multipart,
    ) -> Response {
        let mut fields = HashMap::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.unwrap();
                fields.insert("file".to_string(), format!("{file_name}:{}", data.len()));
            } else {
                fields.insert(name, field.text().await.unwrap());
            }
        }
        if cloud == "broken" {
            return rejected();
        }
        let public_id = fields
            .get("public_id")
            .cloned()
            .unwrap_or_else(|| format!("{}/abc123", fields["folder"]));
        seen.lock().unwrap().push(("upload".to_string(), fields));
        Json(json!({
            "public_id": public_id,
            "secure_url": format!("https://media.test/{public_id}.png"),
        }))
        .into_response()
    }

    async fn fake_destroy(
        State(seen): State<Captured>,
        Path(cloud): Path<String>,
        Form(fields): Form<HashMap<String, String>>,
    ) -> Response {
        if cloud == "broken" {
            return rejected();
        }
        seen.lock().unwrap().push(("destroy".to_string(), fields));
        Json(json!({"result": "ok"})).into_response()
    }

    /// Serve a stand-in media host on an ephemeral port and return its base url.
    async fn spawn_host(seen: Captured) -> String {
        let app = Router::new()
            .route("/v1_1/{cloud}/image/upload", post(fake_upload))
            .route("/v1_1/{cloud}/image/destroy", post(fake_destroy))
            .with_state(seen);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client_for(base_url: &str, cloud_name: &str) -> CloudinaryClient {
        CloudinaryClient::new(&MediaConfig {
            base_url: base_url.to_string(),
            cloud_name: cloud_name.into(),
            ..config()
        })
        .unwrap()
    }

    /// Recompute the signature from the fields a request carried.
    fn expected_signature(fields: &HashMap<String, String>) -> String {
        let signed: BTreeMap<&str, &str> = fields
            .iter()
            .filter(|(k, _)| {
                !matches!(
                    k.as_str(),
                    "api_key" | "signature" | "signature_algorithm" | "file"
                )
            })
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let joined = signed
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        hex::encode(Sha256::digest(format!("{joined}secret").as_bytes()))
    }

    fn png(data: &'static [u8]) -> ImageUpload {
        ImageUpload::new(data)
            .with_file_name("mojito.png")
            .with_content_type("image/png")
    }

    fn config() -> MediaConfig {
        MediaConfig {
            backend: MediaBackend::Cloudinary,
            cloud_name: "demo".into(),
            api_key: "key".into(),
            api_secret: "secret".into(),
            ..MediaConfig::default()
        }
    }

    #[test]
    fn string_to_sign_sorts_and_skips_empty() {
        let mut params = BTreeMap::new();
        params.insert("timestamp", "1315060510".to_string());
        params.insert("public_id", "cocktails/mojito".to_string());
        params.insert("folder", String::new());
        params.insert("invalidate", "true".to_string());
        assert_eq!(
            string_to_sign(&params),
            "invalidate=true&public_id=cocktails/mojito&timestamp=1315060510"
        );
    }

    #[test]
    fn signature_is_hex_sha256() {
        let client = CloudinaryClient::new(&config()).unwrap();
        let mut params = BTreeMap::new();
        params.insert("timestamp", "1".to_string());
        let signature = client.sign(&params);
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(signature, client.sign(&params));
    }

    #[test]
    fn endpoint_includes_cloud_name() {
        let client = CloudinaryClient::new(&MediaConfig {
            base_url: "http://localhost:9000/".into(),
            ..config()
        })
        .unwrap();
        assert_eq!(client.endpoint, "http://localhost:9000/v1_1/demo/image");
    }

    #[tokio::test]
    async fn upload_sends_folder_and_signature() {
        let seen = Captured::default();
        let client = client_for(&spawn_host(seen.clone()).await, "demo");

        let uploaded = client.upload(png(b"\x89PNG")).await.unwrap();
        assert_eq!(uploaded.public_id, "cocktails/abc123");
        assert_eq!(uploaded.url, "https://media.test/cocktails/abc123.png");

        let requests = seen.lock().unwrap();
        let (endpoint, fields) = &requests[0];
        assert_eq!(endpoint, "upload");
        assert_eq!(fields["folder"], "cocktails");
        assert_eq!(fields["api_key"], "key");
        assert_eq!(fields["signature_algorithm"], "sha256");
        assert_eq!(fields["file"], "mojito.png:4");
        assert!(!fields.contains_key("public_id"));
        assert_eq!(fields["signature"], expected_signature(fields));
    }

    #[tokio::test]
    async fn replace_overwrites_and_invalidates() {
        let seen = Captured::default();
        let client = client_for(&spawn_host(seen.clone()).await, "demo");

        let replaced = client
            .replace("cocktails/mojito", png(b"v2"))
            .await
            .unwrap();
        assert_eq!(replaced.public_id, "cocktails/mojito");

        let requests = seen.lock().unwrap();
        let (_, fields) = &requests[0];
        assert_eq!(fields["public_id"], "cocktails/mojito");
        assert_eq!(fields["overwrite"], "true");
        assert_eq!(fields["invalidate"], "true");
        assert!(!fields.contains_key("folder"));
        assert_eq!(fields["signature"], expected_signature(fields));
    }

    #[tokio::test]
    async fn destroy_posts_signed_form() {
        let seen = Captured::default();
        let client = client_for(&spawn_host(seen.clone()).await, "demo");

        let outcome = client.destroy("cocktails/mojito").await.unwrap();
        assert_eq!(outcome.result, "ok");

        let requests = seen.lock().unwrap();
        let (endpoint, fields) = &requests[0];
        assert_eq!(endpoint, "destroy");
        assert_eq!(fields["public_id"], "cocktails/mojito");
        assert_eq!(fields["invalidate"], "true");
        assert!(fields.contains_key("timestamp"));
        assert_eq!(fields["signature"], expected_signature(fields));
    }

    #[tokio::test]
    async fn upstream_error_envelope_is_decoded() {
        let seen = Captured::default();
        let client = client_for(&spawn_host(seen.clone()).await, "broken");

        let err = client.upload(png(b"img")).await.unwrap_err();
        assert!(matches!(
            err,
            MediaError::Upstream { status: 401, ref message } if message == "Invalid Signature"
        ));

        let err = client.destroy("cocktails/mojito").await.unwrap_err();
        assert!(matches!(err, MediaError::Upstream { status: 401, .. }));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_credentials_are_a_config_error() {
        let err = CloudinaryClient::new(&MediaConfig {
            api_secret: " ".into(),
            ..config()
        })
        .err()
        .unwrap();
        assert!(matches!(err, MediaError::Config(msg) if msg.contains("api_secret")));
    }
}
