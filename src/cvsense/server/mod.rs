// SPDX-License-Identifier: MIT

//! HTTP surface over the workflow engine, record store and retrieval agent

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::adk::cancel::CancellationFlag;
use crate::adk::error::{CvError, PipelineError, StoreError};
use crate::adk::trail::RunStatus;
use crate::cvsense::config::AppConfig;
use crate::cvsense::document::FileTextExtractor;
use crate::cvsense::factory;
use crate::cvsense::mapper::to_external;
use crate::cvsense::rag::{AgentEvent, KbDocument, KnowledgeBase, RetrievalAgent};
use crate::cvsense::store::{InMemoryRecordStore, InMemoryVectorStore, RecordStore};
use crate::cvsense::workflow::{AnalysisOutcome, AnalysisRequest, WorkflowEngine};

/// Shared handles behind every route
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub records: Arc<dyn RecordStore>,
    pub knowledge: Arc<KnowledgeBase>,
    pub agent: Arc<RetrievalAgent>,
}

impl AppState {
    /// Wire the default in-memory stores and configured model
    pub fn from_config(config: &AppConfig) -> Result<Self, CvError> {
        let client = factory::create_client(config)?;
        let embedder = factory::create_embedder(&config.rag.embedding)?;
        let knowledge = Arc::new(KnowledgeBase::new(
            embedder,
            Arc::new(InMemoryVectorStore::new()),
            config.rag.chunk_chars,
        ));
        Ok(Self {
            engine: Arc::new(WorkflowEngine::new(
                client.clone(),
                config.workflow.clone(),
                Arc::new(FileTextExtractor::new()),
            )),
            records: Arc::new(InMemoryRecordStore::new()),
            knowledge: knowledge.clone(),
            agent: Arc::new(RetrievalAgent::new(client, knowledge, config.rag.clone())),
        })
    }
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl std::fmt::Display) -> ApiError {
    (status, Json(json!({ "error": message.to_string() })))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/cv/analyze", post(analyze_cv))
        .route("/api/cv/upload", post(upload_cv))
        .route("/api/cv/records/{id}", get(get_record))
        .route("/api/kb/documents", post(add_document))
        .route("/api/rag/query", post(rag_query))
        .route("/api/rag/query/stream", post(stream_rag_query))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(config: AppConfig) -> Result<(), CvError> {
    let state = AppState::from_config(&config)?;
    let app = router(state);

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    document_text: String,
    #[serde(default)]
    source_ref: Option<String>,
    #[serde(default)]
    job_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadParams {
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    job_description: Option<String>,
}

/// Map and persist a usable result, then build the response body
async fn store_outcome(state: &AppState, outcome: AnalysisOutcome) -> Result<Json<Value>, ApiError> {
    let mut record_id = None;
    let mut record = None;
    if outcome.status != RunStatus::Failed {
        if let Some(result) = &outcome.result {
            let external = to_external(result);
            let id = state
                .records
                .save(external.clone())
                .await
                .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
            record_id = Some(id);
            record = Some(external);
        }
    }
    Ok(Json(json!({
        "outcome": outcome,
        "record_id": record_id,
        "record": record,
    })))
}

fn pipeline_error(err: PipelineError) -> ApiError {
    match err {
        PipelineError::Input(_) => api_error(StatusCode::BAD_REQUEST, err),
        other => api_error(StatusCode::INTERNAL_SERVER_ERROR, other),
    }
}

async fn analyze_cv(
    State(state): State<AppState>,
    Json(payload): Json<AnalyzeRequest>,
) -> Result<Json<Value>, ApiError> {
    let request = AnalysisRequest {
        document_text: payload.document_text,
        source_ref: payload.source_ref,
        job_description: payload.job_description,
    };
    let outcome = state
        .engine
        .run(request, &CancellationFlag::new())
        .await
        .map_err(pipeline_error)?;
    store_outcome(&state, outcome).await
}

async fn upload_cv(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let outcome = state
        .engine
        .run_document(
            &body,
            params.file_name.as_deref(),
            params.job_description,
            &CancellationFlag::new(),
        )
        .await
        .map_err(pipeline_error)?;
    store_outcome(&state, outcome).await
}

async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.records.load(&id).await {
        Ok(record) => Ok(Json(json!({ "id": id, "record": record }))),
        Err(StoreError::NotFound(_)) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Record '{}' not found", id),
        )),
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e)),
    }
}

async fn add_document(
    State(state): State<AppState>,
    Json(document): Json<KbDocument>,
) -> Result<Json<Value>, ApiError> {
    let report = state
        .knowledge
        .ingest(document)
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
    Ok(Json(json!(report)))
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    query: String,
}

async fn rag_query(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.query.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "query is empty"));
    }
    let answer = state
        .agent
        .run(&payload.query, &CancellationFlag::new())
        .await;
    Ok(Json(json!(answer)))
}

async fn stream_rag_query(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(100);

    tokio::spawn(async move {
        log::info!("Starting streaming query: {}", payload.query);
        let cancel = CancellationFlag::new();
        let answer = state.agent.run_stream(&payload.query, &cancel, tx).await;
        log::info!("Streaming query finished: {:?}", answer.status);
    });

    let stream = ReceiverStream::new(rx).map(|event: AgentEvent| {
        Ok(Event::default()
            .json_data(&event)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string())))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(std::time::Duration::from_secs(1)))
}
