use crate::adapters::http::error::ApiError;
use crate::adapters::http::SharedState;
use crate::domain::model::{Mode, UserId};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::{Html, IntoResponse, Response};
use axum::{Extension, Json};
use serde::Serialize;
use serde_json::{json, Value};

const INDEX_HTML: &str = include_str!("../../../static/index.html");
const CLEAR_HISTORY: &str = "clear";

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub annotated_text: String,
    pub tonality: String,
    pub filename: String,
}

/// 視為「沒有資料」的 JSON 值：null、false、0、空字串、空陣列、空物件
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// 解析 `/process` 的請求內容，取出 `text`
fn parse_process_request(body: &[u8]) -> Result<String, ApiError> {
    let data: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Error processing request: {}", e)))?;
    if is_falsy(&data) {
        return Err(ApiError::bad_request("Invalid data format. JSON expected."));
    }
    let Value::Object(mut fields) = data else {
        return Err(ApiError::bad_request(
            "Error processing request: expected a JSON object",
        ));
    };
    match fields.remove("text") {
        None => Ok(String::new()),
        Some(Value::String(text)) => Ok(text),
        Some(_) => Err(ApiError::bad_request(
            "Error processing request: 'text' must be a string",
        )),
    }
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn process(
    State(state): State<SharedState>,
    Extension(user): Extension<UserId>,
    body: Bytes,
) -> Result<Json<ProcessResponse>, ApiError> {
    let text = parse_process_request(&body)?;

    // 網頁流程一律自動判斷調性
    let annotation = state.service.annotate(&text, None, None)?;

    let filename = state
        .store
        .save(&user, &annotation.annotated_text)
        .await
        .map_err(|e| ApiError::internal(format!("Processing error: {}", e)))?;

    tracing::info!(
        "📝 Annotated {} bytes as {} -> {}",
        text.len(),
        annotation.tonality.display_name(),
        filename
    );

    Ok(Json(ProcessResponse {
        success: true,
        annotated_text: annotation.annotated_text,
        tonality: annotation.tonality.display_name(),
        filename,
    }))
}

pub async fn download(
    State(state): State<SharedState>,
    Extension(user): Extension<UserId>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let Some(bytes) = state.store.read_bytes(&user, &filename).await? else {
        return Err(ApiError::not_found("File not found"));
    };

    let content_type = if filename.ends_with(".txt") {
        "text/plain; charset=utf-8"
    } else {
        "application/octet-stream"
    };
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        filename.replace('"', "")
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

pub async fn tonalities(State(state): State<SharedState>) -> Json<Value> {
    let catalog = state.service.catalog();
    Json(json!({
        "major": catalog.labels(Mode::Major),
        "minor": catalog.labels(Mode::Minor),
    }))
}

pub async fn history(
    State(state): State<SharedState>,
    Extension(user): Extension<UserId>,
) -> Result<Json<Value>, ApiError> {
    let files = state.store.list(&user).await?;
    Ok(Json(json!({ "files": files })))
}

pub async fn clear_history(
    State(state): State<SharedState>,
    Extension(user): Extension<UserId>,
) -> Result<Json<Value>, ApiError> {
    let deleted = state
        .store
        .clear(&user)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to clear history: {}", e)))?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Deleted files: {}", deleted),
    })))
}

pub async fn history_file(
    State(state): State<SharedState>,
    Extension(user): Extension<UserId>,
    Path(filename): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.store.read_text(&user, &filename).await? {
        Some(content) => Ok(Json(json!({ "content": content, "filename": filename }))),
        None => Err(ApiError::not_found("File not found")),
    }
}

/// `DELETE /history/clear` 清空歷史；其餘檔名只刪除該檔。`GET /history/clear` 則當作一般檔名
pub async fn delete_history_file(
    State(state): State<SharedState>,
    Extension(user): Extension<UserId>,
    Path(filename): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if filename == CLEAR_HISTORY {
        return clear_history(State(state), Extension(user)).await;
    }

    let deleted = state
        .store
        .delete(&user, &filename)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to delete file: {}", e)))?;
    if deleted {
        Ok(Json(json!({ "success": true, "message": "File deleted" })))
    } else {
        Err(ApiError::not_found("File not found"))
    }
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("Page not found")
}
