use std::sync::Arc;

use actix_cors::Cors;
use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::http::StatusCode;
use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer, ResponseError, get, middleware::Logger, post, web,
};
use anyhow::Result;
use log::{debug, error, info, warn};

use crate::config::ServiceConfig;
use crate::download::{DownloadError, Downloader};
use crate::dto::{
    DEFAULT_LIST_LIMIT, ErrorDto, HealthDto, ListParams, TranscribeResponseDto,
    TranscriptionDetailDto, TranscriptionListDto, TranscriptionSummaryDto,
};
use crate::error::ServiceError;
use crate::pipeline::TranscriptionService;
use crate::store::{ListQuery, SqliteTranscriptionStore, TranscriptionStore};
use crate::transcript::TranscriptionRequest;
use crate::whisper::{Transcriber, WhisperModel};

pub struct AppState {
    pub service: TranscriptionService,
    pub whisper_model: String,
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Download(DownloadError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Download(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Transcription(_) | ServiceError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {self}");
        } else {
            warn!("Request rejected: {self}");
        }

        HttpResponse::build(status).json(ErrorDto {
            error: self.to_string(),
            status: "failed",
        })
    }
}

#[get("/health")]
pub async fn health_check(data: web::Data<AppState>) -> HttpResponse {
    debug!("Health check endpoint called");
    HttpResponse::Ok().json(HealthDto {
        status: "healthy".to_string(),
        whisper_model: data.whisper_model.clone(),
        database_connected: data.service.database_connected(),
        model_loaded: data.service.transcriber().is_loaded(),
    })
}

#[post("/transcribe-url")]
pub async fn transcribe_from_url(
    data: web::Data<AppState>,
    body: web::Json<TranscriptionRequest>,
) -> Result<HttpResponse, ServiceError> {
    let stored = data.service.process(body.into_inner()).await?;

    Ok(HttpResponse::Ok().json(TranscribeResponseDto {
        transcription_id: stored.id,
        segments_count: stored.result.segments.len(),
        transcription: stored.result.text,
        language: stored.result.language,
        duration: stored.result.duration,
        status: "success".to_string(),
    }))
}

#[get("/transcription/{transcription_id}")]
pub async fn get_transcription(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let record = data.service.get(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(TranscriptionDetailDto::from(record)))
}

#[get("/transcriptions")]
pub async fn list_transcriptions(
    data: web::Data<AppState>,
    params: web::Query<ListParams>,
) -> Result<HttpResponse, ServiceError> {
    let params = params.into_inner();
    let query = ListQuery {
        user_id: params.user_id.filter(|id| !id.is_empty()),
        limit: params.limit.unwrap_or(DEFAULT_LIST_LIMIT),
        offset: params.offset.unwrap_or(0),
    };

    let transcriptions: Vec<TranscriptionSummaryDto> = data
        .service
        .list(&query)
        .await?
        .into_iter()
        .map(TranscriptionSummaryDto::from)
        .collect();

    Ok(HttpResponse::Ok().json(TranscriptionListDto {
        count: transcriptions.len(),
        transcriptions,
        offset: query.offset,
        limit: query.limit,
    }))
}

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let message = match err {
        JsonPayloadError::ContentType => "Content-Type must be application/json".to_string(),
        other => format!("Invalid JSON body: {other}"),
    };
    ServiceError::Validation(message).into()
}

fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ServiceError::Validation(format!("Invalid query parameters: {err}")).into()
}

/// Routes plus the extractor settings that keep error bodies uniform.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(64 * 1024)
            .error_handler(json_error),
    )
    .app_data(web::QueryConfig::default().error_handler(query_error))
    .service(health_check)
    .service(transcribe_from_url)
    .service(get_transcription)
    .service(list_transcriptions);
}

pub async fn run_server(config: ServiceConfig) -> Result<()> {
    info!("Starting transcription service");
    info!(
        "Using configuration: model={}, model_path={:?}, use_gpu={}, language={}, num_threads={}",
        config.whisper.model,
        config.whisper.model_path,
        config.whisper.use_gpu,
        config.whisper.language,
        config.whisper.num_threads
    );

    let transcriber = Transcriber::loading();
    let whisper_config = config.whisper.clone();
    transcriber.load_in_background(move || WhisperModel::load(whisper_config));

    let store: Option<Arc<dyn TranscriptionStore>> = match SqliteTranscriptionStore::connect(
        &config.database_url,
        config.database_max_connections,
    )
    .await
    {
        Ok(store) => Some(Arc::new(store) as Arc<dyn TranscriptionStore>),
        Err(e) => {
            error!("Failed to connect to database {}: {e}", config.database_url);
            None
        }
    };

    let downloader = Downloader::new(config.download.clone())?;
    let app_state = web::Data::new(AppState {
        service: TranscriptionService::new(downloader, transcriber, store),
        whisper_model: config.whisper.model.clone(),
    });

    info!("Starting HTTP server on {}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .configure(configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
