use crate::AppState;
use crate::api::error::AppError;
use crate::services::converter::Conversion;
use crate::services::workspace::ConversionJob;
use crate::utils::validation::{
    attachment_disposition, download_filename, validate_extension, validate_upload_size,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::Response,
};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct UnpackResponse {
    /// The unpacked item document as produced by the converter
    pub result: Value,
}

struct UploadedItem {
    original_name: String,
    data: Vec<u8>,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

/// Pulls the expected file field out of the multipart body, rejecting wrong
/// extensions and oversized payloads before anything touches disk.
async fn read_upload(
    multipart: &mut Multipart,
    field_name: &str,
    expected_ext: &str,
    max_size: usize,
) -> Result<UploadedItem, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(field_name) {
            continue;
        }

        let original_name = field
            .file_name()
            .ok_or_else(|| AppError::BadRequest("Upload is missing a filename".to_string()))?
            .to_string();

        validate_extension(&original_name, expected_ext)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let data = field.bytes().await.map_err(multipart_error)?;
        validate_upload_size(data.len(), max_size)
            .map_err(|e| AppError::PayloadTooLarge(e.to_string()))?;

        return Ok(UploadedItem {
            original_name,
            data: data.to_vec(),
        });
    }

    Err(AppError::BadRequest(format!(
        "No '{}' file field in request",
        field_name
    )))
}

fn download_response(data: Vec<u8>, filename: &str) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_DISPOSITION, attachment_disposition(filename))
        .body(Body::from(data))
        .unwrap()
}

async fn unpack_pipeline(
    state: &AppState,
    job: &ConversionJob,
    data: &[u8],
) -> Result<(), AppError> {
    job.store_packed_input(data).await?;
    state.converter.run(Conversion::Unpack).await?;
    Ok(())
}

#[utoipa::path(
    post,
    path = "/packfile",
    request_body(content = Multipart, description = "Multipart field 'unpackedItem' holding a .sfditem file"),
    responses(
        (status = 200, description = "Packed .xnb download stream"),
        (status = 400, description = "Missing field or wrong extension"),
        (status = 413, description = "Upload exceeds the size limit"),
        (status = 500, description = "Conversion failed")
    ),
    tag = "convert"
)]
pub async fn pack_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let item = read_upload(
        &mut multipart,
        "unpackedItem",
        ".sfditem",
        state.config.max_upload_size,
    )
    .await?;

    let job = ConversionJob::new(&state.config);
    info!("📦 Packing {} as {}", item.original_name, job.basename());

    // Capture the fallible pipeline so artifacts are removed on every exit path
    let result: Result<Vec<u8>, AppError> = async {
        job.store_unpacked_input(&item.data).await?;
        job.write_descriptor().await?;
        state.converter.run(Conversion::Pack).await?;

        tokio::fs::read(job.packed_file())
            .await
            .map_err(|e| AppError::Internal(format!("Converted output missing: {}", e)))
    }
    .await;

    job.cleanup().await;

    let packed = result?;
    Ok(download_response(
        packed,
        &download_filename(&item.original_name, ".xnb"),
    ))
}

#[utoipa::path(
    post,
    path = "/unpackfile",
    request_body(content = Multipart, description = "Multipart field 'packedItem' holding a .xnb file"),
    responses(
        (status = 200, description = "Unpacked .sfditem download stream"),
        (status = 400, description = "Missing field or wrong extension"),
        (status = 413, description = "Upload exceeds the size limit"),
        (status = 500, description = "Conversion failed")
    ),
    tag = "convert"
)]
pub async fn unpack_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let item = read_upload(
        &mut multipart,
        "packedItem",
        ".xnb",
        state.config.max_upload_size,
    )
    .await?;

    let job = ConversionJob::new(&state.config);
    info!("📂 Unpacking {} as {}", item.original_name, job.basename());

    let result: Result<Vec<u8>, AppError> = async {
        unpack_pipeline(&state, &job, &item.data).await?;

        tokio::fs::read(job.unpacked_file())
            .await
            .map_err(|e| AppError::Internal(format!("Converted output missing: {}", e)))
    }
    .await;

    job.cleanup().await;

    let unpacked = result?;
    Ok(download_response(
        unpacked,
        &download_filename(&item.original_name, ".sfditem"),
    ))
}

#[utoipa::path(
    post,
    path = "/unpack",
    request_body(content = Multipart, description = "Multipart field 'packedItem' holding a .xnb file"),
    responses(
        (status = 200, description = "Unpacked item document", body = UnpackResponse),
        (status = 400, description = "Missing field or wrong extension"),
        (status = 413, description = "Upload exceeds the size limit"),
        (status = 500, description = "Conversion failed or output unparsable")
    ),
    tag = "convert"
)]
pub async fn unpack_json(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UnpackResponse>, AppError> {
    let item = read_upload(
        &mut multipart,
        "packedItem",
        ".xnb",
        state.config.max_upload_size,
    )
    .await?;

    let job = ConversionJob::new(&state.config);
    info!("📂 Unpacking {} as {}", item.original_name, job.basename());

    let result: Result<Value, AppError> = async {
        unpack_pipeline(&state, &job, &item.data).await?;

        let raw = tokio::fs::read_to_string(job.unpacked_file())
            .await
            .map_err(|e| AppError::Internal(format!("Converted output missing: {}", e)))?;

        serde_json::from_str(&raw)
            .map_err(|e| AppError::Internal(format!("Failed to parse converted output: {}", e)))
    }
    .await;

    job.cleanup().await;

    Ok(Json(UnpackResponse { result: result? }))
}
