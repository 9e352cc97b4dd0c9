use crate::error::{ServerError, ServerResult};
use crate::routes::json_object;
use crate::state::ServerState;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use axum::Json;
use cocktails::{DestroyOutcome, ImageUpload, MediaError, UploadedImage};
use serde_json::{json, Value};
use std::sync::Arc;

/// Fields collected from an image form
#[derive(Debug, Default)]
struct ImageForm {
    image: Option<ImageUpload>,
    public_id: Option<String>,
}

async fn read_image_form(multipart: &mut Multipart) -> ServerResult<ImageForm> {
    let mut form = ImageForm::default();

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("image") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;

                let mut upload = ImageUpload::new(data);
                if let Some(name) = file_name {
                    upload = upload.with_file_name(name);
                }
                if let Some(content_type) = content_type {
                    upload = upload.with_content_type(content_type);
                }
                form.image = Some(upload);
            }
            Some("public_id") => {
                let value = field.text().await?;
                let value = value.trim();
                if !value.is_empty() {
                    form.public_id = Some(value.to_string());
                }
            }
            _ => {} // ignore unknown fields
        }
    }

    Ok(form)
}

fn require_image(form: &mut ImageForm) -> ServerResult<ImageUpload> {
    form.image
        .take()
        .ok_or_else(|| ServerError::BadRequest("multipart field 'image' is required".to_string()))
}

/// Upload a new image into the media folder
///
/// `POST /api/upload-image` (multipart, field `image`)
pub async fn upload_image(
    State(state): State<Arc<ServerState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ServerResult<Json<UploadedImage>> {
    let mut multipart = multipart?;
    let mut form = read_image_form(&mut multipart).await?;
    let image = require_image(&mut form)?;

    let uploaded = state.media.upload(image).await?;
    Ok(Json(uploaded))
}

/// Overwrite an existing image in place
///
/// `POST /api/edit-image` (multipart, fields `image` and `public_id`)
pub async fn edit_image(
    State(state): State<Arc<ServerState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ServerResult<impl IntoResponse> {
    let mut multipart = multipart?;
    let mut form = read_image_form(&mut multipart).await?;
    let public_id = form.public_id.take().ok_or(MediaError::MissingPublicId)?;
    let image = require_image(&mut form)?;

    let replaced = state.media.replace(&public_id, image).await?;
    Ok(Json(json!({
        "message": "Image updated",
        "url": replaced.url,
        "public_id": replaced.public_id,
    })))
}

/// Remove an image from the media store
///
/// `DELETE /api/delete-image` with `{"public_id": "..."}`
pub async fn delete_image(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> ServerResult<Json<DestroyOutcome>> {
    let payload = json_object(&body)?;
    let public_id = match payload.get("public_id") {
        Some(Value::String(id)) if !id.trim().is_empty() => id.trim(),
        _ => return Err(MediaError::MissingPublicId.into()),
    };

    let outcome = state.media.destroy(public_id).await?;
    Ok(Json(outcome))
}
