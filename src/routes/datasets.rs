use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::analysis::{render_report, report_filename, ClientSummary};
use crate::middleware::CurrentUser;
use crate::models::{AppState, Dataset, DatasetDetail, DatasetListItem, Equipment, UploadResponse};
use crate::types::{AppError, AppResult, IngestError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/datasets", get(list_datasets))
        .route("/api/datasets/upload_csv", post(upload_csv))
        .route("/api/datasets/{id}", get(get_dataset).delete(delete_dataset))
        .route("/api/datasets/{id}/upload_csv", put(reingest_csv))
        .route("/api/datasets/{id}/equipment", get(dataset_equipment))
        .route("/api/datasets/{id}/summary", get(dataset_summary))
        .route("/api/datasets/{id}/report", get(dataset_report))
}

struct Upload {
    filename: String,
    content: Bytes,
}

/// Pull the `file` field out of a multipart body.
async fn read_upload(multipart: &mut Multipart) -> AppResult<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("Failed to read multipart field: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidRequest(format!("Failed to read file bytes: {e}")))?;

        return Ok(Upload { filename, content });
    }

    Err(AppError::InvalidRequest("No file provided".to_string()))
}

async fn owned_dataset(state: &AppState, user: &CurrentUser, id: Uuid) -> AppResult<Dataset> {
    state
        .store
        .get_dataset(user.id(), id)
        .await?
        .ok_or_else(|| IngestError::NotFound(id).into())
}

async fn detail(state: &AppState, user: &CurrentUser, dataset: Dataset) -> AppResult<DatasetDetail> {
    let equipment = state.store.list_equipment(dataset.id).await?;
    Ok(DatasetDetail::new(dataset, &user.0, equipment))
}

#[tracing::instrument(skip_all, fields(user_id = %user.id()))]
async fn upload_csv(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let upload = read_upload(&mut multipart).await?;
    let dataset = state
        .ingestor
        .upload(user.id(), &upload.filename, &upload.content)
        .await?;

    info!(dataset_id = %dataset.id, size = upload.content.len(), "CSV upload accepted");

    let response = UploadResponse {
        message: "File uploaded successfully".to_string(),
        dataset: detail(&state, &user, dataset).await?,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

#[tracing::instrument(skip_all, fields(user_id = %user.id(), dataset_id = %id))]
async fn reingest_csv(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<Json<DatasetDetail>> {
    let upload = read_upload(&mut multipart).await?;
    state.ingestor.ingest(user.id(), id, &upload.content).await?;

    let dataset = owned_dataset(&state, &user, id).await?;
    Ok(Json(detail(&state, &user, dataset).await?))
}

async fn list_datasets(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Vec<DatasetListItem>>> {
    let datasets = state.store.list_datasets(user.id()).await?;
    Ok(Json(datasets.into_iter().map(DatasetListItem::from).collect()))
}

async fn get_dataset(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DatasetDetail>> {
    let dataset = owned_dataset(&state, &user, id).await?;
    Ok(Json(detail(&state, &user, dataset).await?))
}

async fn delete_dataset(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.ingestor.delete_dataset(user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn dataset_equipment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Equipment>>> {
    let dataset = owned_dataset(&state, &user, id).await?;
    Ok(Json(state.store.list_equipment(dataset.id).await?))
}

async fn dataset_summary(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ClientSummary>> {
    let dataset = owned_dataset(&state, &user, id).await?;
    Ok(Json(ClientSummary::from(&dataset.summary_stats)))
}

async fn dataset_report(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let dataset = owned_dataset(&state, &user, id).await?;
    let equipment = state.store.list_equipment(dataset.id).await?;

    let body = render_report(&dataset, &equipment).map_err(anyhow::Error::from)?;
    let disposition = format!("attachment; filename=\"{}\"", report_filename(&dataset));

    Ok((
        [
            (header::CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
