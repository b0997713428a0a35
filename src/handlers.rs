use std::{fmt, sync::Arc};

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Extension, Multipart, Path},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{any, get, post},
};
use headers::{ContentType, HeaderMapExt};
use serde::{
    Deserialize, Deserializer,
    de::{IgnoredAny, MapAccess, Visitor},
};
use tower_http::trace::TraceLayer;

use crate::{
    errors::ApiError,
    names, resize, sniff,
    storage::{Storage, base_name},
};

/// Multipart bodies above this size are rejected while they are read.
pub const MAX_UPLOAD_BYTES: usize = 10 << 20;

pub fn router(storage: Arc<dyn Storage>) -> Router {
    Router::new()
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/uploads/{*path}", get(get_file))
        .route("/delete/{*path}", any(delete_file))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(storage))
}

/// JSON carried in the `params` field, e.g. `{"Params":["resize","50","25"]}`.
///
/// The key is matched case-insensitively and the last matching key wins. A
/// `null` list is the same as no list.
#[derive(Debug, Default)]
pub struct UploadParams {
    pub params: Vec<String>,
}

impl<'de> Deserialize<'de> for UploadParams {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ParamsVisitor;

        impl<'de> Visitor<'de> for ParamsVisitor {
            type Value = UploadParams;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object with a Params list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut params = Vec::new();
                while let Some(key) = map.next_key::<String>()? {
                    if key.eq_ignore_ascii_case("params") {
                        params = map.next_value::<Option<Vec<String>>>()?.unwrap_or_default();
                    } else {
                        map.next_value::<IgnoredAny>()?;
                    }
                }
                Ok(UploadParams { params })
            }
        }

        deserializer.deserialize_map(ParamsVisitor)
    }
}

impl UploadParams {
    /// Invalid or missing JSON is logged and treated as no params at all.
    fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            tracing::debug!("No params field in upload");
            return Self::default();
        };

        serde_json::from_str(raw).unwrap_or_else(|err| {
            tracing::warn!("Error decoding upload params: {err}");
            Self::default()
        })
    }

    /// Width and height arguments when the operation is `resize`.
    fn resize_args(&self) -> Option<&[String]> {
        match self.params.split_first() {
            Some((op, rest)) if op == "resize" => Some(rest),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct UploadRequest {
    pub bytes: Bytes,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub params: UploadParams,
}

impl UploadRequest {
    async fn from_multipart(multipart: &mut Multipart) -> Result<Self, ApiError> {
        let mut image = None;
        let mut params = None;

        while let Some(field) = multipart.next_field().await? {
            let field_name = field.name().map(str::to_string);
            match field_name.as_deref() {
                Some("image") if image.is_none() => {
                    let filename = field.file_name().map(str::to_string);
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await?;
                    image = Some((bytes, filename, content_type));
                }
                Some("params") if params.is_none() => {
                    params = Some(field.text().await?);
                }
                _ => {}
            }
        }

        let (bytes, filename, content_type) = image.ok_or_else(|| {
            tracing::warn!("Upload without an image field");
            ApiError::BadRequest("missing multipart field: image".to_string())
        })?;

        Ok(Self {
            bytes,
            filename,
            content_type,
            params: UploadParams::parse(params.as_deref()),
        })
    }
}

pub async fn upload(
    Extension(storage): Extension<Arc<dyn Storage>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let request = UploadRequest::from_multipart(&mut multipart).await?;

    tracing::info!(
        filename = ?request.filename,
        size = request.bytes.len(),
        content_type = ?request.content_type,
        "Uploaded file"
    );

    let name = names::upload_file_name();

    let message = match request.params.resize_args() {
        Some(args) => {
            let args = args.to_vec();
            let bytes = request.bytes;
            let png =
                tokio::task::spawn_blocking(move || resize::resize_with_params(&bytes, &args))
                    .await
                    .map_err(|err| {
                        tracing::error!("Resize task failed: {err}");
                        ApiError::Internal
                    })??;

            storage.save(&name, &png).await?;
            "Successfully Uploaded and Resized File\n"
        }
        None => {
            storage.save(&name, &request.bytes).await?;
            "Successfully Uploaded File\n"
        }
    };

    tracing::info!("Stored upload as {name}");

    Ok(([(header::LOCATION, format!("/uploads/{name}"))], message))
}

pub async fn get_file(
    Path(path): Path<String>,
    Extension(storage): Extension<Arc<dyn Storage>>,
) -> Result<Response, ApiError> {
    let name = base_name(&path).ok_or(ApiError::NotFound)?;
    let bytes = storage.get(name).await?;

    let content_type = sniff::detect_content_type(&bytes);
    let mut response = Bytes::from(bytes).into_response();
    response
        .headers_mut()
        .typed_insert(ContentType::from(content_type));

    Ok(response)
}

pub async fn delete_file(
    Path(path): Path<String>,
    Extension(storage): Extension<Arc<dyn Storage>>,
) -> Result<impl IntoResponse, ApiError> {
    let name = base_name(&path).ok_or(ApiError::NotFound)?;
    storage.delete(name).await?;

    tracing::info!("Deleted {name}");
    Ok((StatusCode::OK, "Successfully Deleted File\n"))
}
