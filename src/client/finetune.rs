//! Fine-tuning service client.
//!
//! Covers the three calls the pipeline needs: file upload, job creation, job
//! retrieval. Retries with exponential backoff, honors Retry-After on 429,
//! and never retries auth or not-found responses.

use crate::models::{ApiError, PreformError, Result, TrainingConfig, TrainingMethod};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// A file accepted by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFile {
    /// Opaque file identifier
    pub id: String,

    /// Size in bytes
    pub bytes: u64,

    /// Original filename
    pub filename: String,

    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

/// Status of a fine-tuning job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    ValidatingFiles,
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// A terminal status will never change on further polling.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// Failure detail attached to a failed job.
#[derive(Debug, Clone, Deserialize)]
pub struct JobFailure {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A fine-tuning job as reported by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct FineTuneJob {
    /// Opaque job identifier
    pub id: String,

    /// Base model (or prior fine-tuned model/checkpoint) being tuned
    pub model: String,

    pub status: JobStatus,

    /// Id of the resulting model, present once the job succeeds
    #[serde(default)]
    pub fine_tuned_model: Option<String>,

    #[serde(default)]
    pub trained_tokens: Option<u64>,

    #[serde(default)]
    pub error: Option<JobFailure>,

    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,

    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// A job request at the domain level; serialized into the service's tagged
/// method shape by the client.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Base model id, or a fine-tuned model/checkpoint id when chaining
    pub model: String,
    pub training_file: String,
    pub validation_file: Option<String>,
    pub suffix: Option<String>,
    pub method: TrainingMethod,
    /// DPO conservativeness; ignored for supervised jobs
    pub beta: Option<f64>,
    pub n_epochs: Option<u32>,
    pub learning_rate_multiplier: Option<f64>,
}

impl JobRequest {
    /// Build a request from training config plus uploaded file ids.
    pub fn from_training(
        training: &TrainingConfig,
        model: String,
        training_file: String,
        validation_file: Option<String>,
    ) -> Self {
        Self {
            model,
            training_file,
            validation_file,
            suffix: training.suffix.clone(),
            method: training.method,
            beta: match training.method {
                TrainingMethod::Dpo => Some(training.beta),
                TrainingMethod::Supervised => None,
            },
            n_epochs: training.n_epochs,
            learning_rate_multiplier: training.learning_rate_multiplier,
        }
    }
}

/// Wire payload for job creation.
#[derive(Debug, Serialize)]
struct CreateJobPayload<'a> {
    model: &'a str,
    training_file: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation_file: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suffix: Option<&'a str>,
    method: MethodSpec,
}

#[derive(Debug, Serialize)]
struct MethodSpec {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    supervised: Option<MethodParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dpo: Option<MethodParams>,
}

#[derive(Debug, Serialize)]
struct MethodParams {
    hyperparameters: Hyperparameters,
}

#[derive(Debug, Serialize)]
struct Hyperparameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    beta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n_epochs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    learning_rate_multiplier: Option<f64>,
}

impl MethodSpec {
    fn from_request(request: &JobRequest) -> Self {
        let hyperparameters = Hyperparameters {
            beta: match request.method {
                TrainingMethod::Dpo => request.beta,
                TrainingMethod::Supervised => None,
            },
            n_epochs: request.n_epochs,
            learning_rate_multiplier: request.learning_rate_multiplier,
        };
        let params = MethodParams { hyperparameters };

        match request.method {
            TrainingMethod::Supervised => Self {
                kind: "supervised",
                supervised: Some(params),
                dpo: None,
            },
            TrainingMethod::Dpo => Self {
                kind: "dpo",
                supervised: None,
                dpo: Some(params),
            },
        }
    }
}

/// Service error response body.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Fine-tuning service client.
pub struct FineTuneClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
}

impl FineTuneClient {
    /// Create a new client.
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        timeout_secs: Option<u64>,
        max_retries: Option<u32>,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(180));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PreformError::Network)?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            timeout,
            max_retries: max_retries.unwrap_or(3),
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .unwrap_or_else(|_| HeaderValue::from_static(""));
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers
    }

    /// Send a request with retry, backoff, and error mapping.
    ///
    /// `build` is called once per attempt; multipart bodies cannot be cloned,
    /// so the request is rebuilt rather than reused.
    async fn execute<F>(&self, build: F, context: &str) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_error: Option<PreformError> = None;

        for attempt in 0..self.max_retries {
            let response = build().headers(self.headers()).send().await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(if e.is_timeout() {
                        PreformError::Timeout(self.timeout)
                    } else {
                        PreformError::Network(e)
                    });
                    if attempt < self.max_retries - 1 {
                        let backoff = Duration::from_secs(2u64.pow(attempt));
                        debug!(
                            attempt = attempt,
                            backoff_secs = backoff.as_secs(),
                            "Retrying after network error"
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    continue;
                }
            };

            let status = response.status().as_u16();

            if status == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<f64>().ok())
                    .unwrap_or(1.0);

                last_error = Some(PreformError::RateLimited {
                    retry_after_secs: retry_after,
                });

                if attempt < self.max_retries - 1 {
                    debug!(
                        attempt = attempt,
                        retry_after_secs = retry_after,
                        "Rate limited, waiting"
                    );
                    tokio::time::sleep(Duration::from_secs_f64(retry_after)).await;
                }
                continue;
            }

            if !response.status().is_success() {
                let error_body = response.text().await.unwrap_or_default();
                let error = if status == 401 {
                    ApiError::AuthenticationFailed
                } else if status == 404 {
                    ApiError::NotFound(context.to_string())
                } else if let Ok(api_error) =
                    serde_json::from_str::<ApiErrorResponse>(&error_body)
                {
                    ApiError::Api {
                        status,
                        message: api_error.error.message,
                    }
                } else {
                    ApiError::Api {
                        status,
                        message: error_body,
                    }
                };

                last_error = Some(PreformError::Api(error));

                // Auth and not-found responses will not improve on retry
                if status == 401 || status == 404 {
                    break;
                }

                if attempt < self.max_retries - 1 {
                    let backoff = Duration::from_secs(2u64.pow(attempt));
                    tokio::time::sleep(backoff).await;
                }
                continue;
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or_else(|| {
            PreformError::Api(ApiError::MaxRetriesExceeded {
                attempts: self.max_retries,
                last_error: "Unknown error".to_string(),
            })
        }))
    }

    /// Upload a local file for fine-tuning. Returns the opaque file id record.
    ///
    /// The service validates content against its own schema after upload.
    pub async fn upload_file(&self, path: &Path) -> Result<UploadedFile> {
        let bytes =
            std::fs::read(path).map_err(|e| PreformError::io("reading upload file", e))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.jsonl".to_string());

        info!(path = %path.display(), bytes = bytes.len(), "Uploading file");

        let url = format!("{}/files", self.base_url);
        let response = self
            .execute(
                || {
                    let part = reqwest::multipart::Part::bytes(bytes.clone())
                        .file_name(filename.clone());
                    let form = reqwest::multipart::Form::new()
                        .part("file", part)
                        .text("purpose", "fine-tune");
                    self.client.post(&url).multipart(form)
                },
                "file upload",
            )
            .await?;

        let uploaded: UploadedFile = response
            .json()
            .await
            .map_err(|e| PreformError::Parse(format!("Failed to parse upload response: {e}")))?;

        info!(file_id = %uploaded.id, "File uploaded");
        Ok(uploaded)
    }

    /// Create a fine-tuning job. Returns the job with its opaque id.
    pub async fn create_job(&self, request: &JobRequest) -> Result<FineTuneJob> {
        let payload = CreateJobPayload {
            model: &request.model,
            training_file: &request.training_file,
            validation_file: request.validation_file.as_deref(),
            suffix: request.suffix.as_deref(),
            method: MethodSpec::from_request(request),
        };

        let url = format!("{}/fine_tuning/jobs", self.base_url);
        let response = self
            .execute(|| self.client.post(&url).json(&payload), "job creation")
            .await?;

        let job: FineTuneJob = response
            .json()
            .await
            .map_err(|e| PreformError::Parse(format!("Failed to parse job response: {e}")))?;

        info!(job_id = %job.id, model = %job.model, "Fine-tuning job created");
        Ok(job)
    }

    /// Retrieve a job by id.
    pub async fn retrieve_job(&self, job_id: &str) -> Result<FineTuneJob> {
        let url = format!("{}/fine_tuning/jobs/{}", self.base_url, job_id);
        let response = self
            .execute(|| self.client.get(&url), "job retrieval")
            .await?;

        response
            .json()
            .await
            .map_err(|e| PreformError::Parse(format!("Failed to parse job response: {e}")))
    }

    /// Poll a job until it reaches a terminal status.
    pub async fn wait_for_job(&self, job_id: &str, poll_interval: Duration) -> Result<FineTuneJob> {
        loop {
            let job = self.retrieve_job(job_id).await?;
            if job.status.is_terminal() {
                info!(job_id = %job.id, status = ?job.status, "Job finished");
                return Ok(job);
            }

            debug!(job_id = %job.id, status = ?job.status, "Job still running");
            tokio::time::sleep(poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: TrainingMethod) -> JobRequest {
        JobRequest {
            model: "gpt-4o-mini-2024-07-18".to_string(),
            training_file: "file-abc".to_string(),
            validation_file: Some("file-def".to_string()),
            suffix: None,
            method,
            beta: Some(0.1),
            n_epochs: Some(1),
            learning_rate_multiplier: None,
        }
    }

    #[test]
    fn test_dpo_payload_shape() {
        let request = request(TrainingMethod::Dpo);
        let payload = CreateJobPayload {
            model: &request.model,
            training_file: &request.training_file,
            validation_file: request.validation_file.as_deref(),
            suffix: request.suffix.as_deref(),
            method: MethodSpec::from_request(&request),
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["method"]["type"], "dpo");
        assert_eq!(value["method"]["dpo"]["hyperparameters"]["beta"], 0.1);
        assert_eq!(value["method"]["dpo"]["hyperparameters"]["n_epochs"], 1);
        assert!(value["method"].get("supervised").is_none());
        assert_eq!(value["training_file"], "file-abc");
        assert_eq!(value["validation_file"], "file-def");
    }

    #[test]
    fn test_supervised_payload_has_no_beta() {
        let request = request(TrainingMethod::Supervised);
        let payload = CreateJobPayload {
            model: &request.model,
            training_file: &request.training_file,
            validation_file: None,
            suffix: None,
            method: MethodSpec::from_request(&request),
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["method"]["type"], "supervised");
        assert!(value["method"]["supervised"]["hyperparameters"]
            .get("beta")
            .is_none());
        assert!(value["method"].get("dpo").is_none());
        assert!(value.get("validation_file").is_none());
    }

    #[test]
    fn test_job_request_from_training_config() {
        let training = TrainingConfig {
            base_model: "gpt-4o-mini-2024-07-18".to_string(),
            method: TrainingMethod::Supervised,
            beta: 0.3,
            n_epochs: Some(2),
            learning_rate_multiplier: Some(1.5),
            suffix: Some("preform".to_string()),
            poll_interval_secs: 30,
        };

        let request = JobRequest::from_training(
            &training,
            training.base_model.clone(),
            "file-1".to_string(),
            None,
        );

        // Beta only applies to DPO
        assert_eq!(request.beta, None);
        assert_eq!(request.n_epochs, Some(2));
        assert_eq!(request.suffix.as_deref(), Some("preform"));
    }

    #[test]
    fn test_job_deserializes_from_wire() {
        let json = r#"{
            "id": "ftjob-abc123",
            "model": "gpt-4o-mini-2024-07-18",
            "status": "validating_files",
            "fine_tuned_model": null,
            "created_at": 1721764800,
            "finished_at": null
        }"#;

        let job: FineTuneJob = serde_json::from_str(json).unwrap();
        assert_eq!(job.id, "ftjob-abc123");
        assert_eq!(job.status, JobStatus::ValidatingFiles);
        assert!(!job.status.is_terminal());
        assert!(job.fine_tuned_model.is_none());
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn test_succeeded_job_is_terminal() {
        let json = r#"{
            "id": "ftjob-abc123",
            "model": "gpt-4o-mini-2024-07-18",
            "status": "succeeded",
            "fine_tuned_model": "ft:gpt-4o-mini-2024-07-18:org::xyz",
            "trained_tokens": 12345,
            "created_at": 1721764800,
            "finished_at": 1721768400
        }"#;

        let job: FineTuneJob = serde_json::from_str(json).unwrap();
        assert!(job.status.is_terminal());
        assert_eq!(
            job.fine_tuned_model.as_deref(),
            Some("ft:gpt-4o-mini-2024-07-18:org::xyz")
        );
        assert!(job.finished_at.unwrap() > job.created_at);
    }

    #[test]
    fn test_uploaded_file_deserializes() {
        let json = r#"{
            "id": "file-abc123",
            "bytes": 2048,
            "filename": "preference-train.jsonl",
            "created_at": 1721764800
        }"#;

        let file: UploadedFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.id, "file-abc123");
        assert_eq!(file.bytes, 2048);
    }
}
