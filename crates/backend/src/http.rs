use std::env;
use std::time::Duration;

use async_trait::async_trait;
use playback_core::model::{
    CourseElement, CourseId, DialogReply, ElementId, InputVerdict, MultiChoiceVerdict,
    QuestionVerdict, QuizVerdict, RevisionResult, TestResult,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::wire::{
    self, DialogMessageBody, IndexAnswerBody, InputAnswerBody, MultiChoiceAnswerBody,
    RevisionResultResponse,
};
use crate::{Advance, BackendError, CourseBackend, Endpoint};

const DEFAULT_BASE_URL: &str = "http://localhost:8000/";
const DEFAULT_TIMEOUT_MS: u64 = 15_000;

#[derive(Clone, Debug)]
pub struct HttpBackendConfig {
    /// Server root; course routes live under `api/mvp/courses`.
    pub base_url: Url,
    pub timeout: Duration,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default course API URL is valid"),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl HttpBackendConfig {
    /// Read `COURSE_API_URL` and `COURSE_API_TIMEOUT_MS`, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::InvalidConfig` when a variable is set but unusable.
    pub fn from_env() -> Result<Self, BackendError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env` with an explicit variable source.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::InvalidConfig` when a variable is set but unusable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BackendError> {
        let mut config = Self::default();
        if let Some(raw) = lookup("COURSE_API_URL").filter(|v| !v.trim().is_empty()) {
            config.base_url = parse_base_url(&raw)?;
        }
        if let Some(raw) = lookup("COURSE_API_TIMEOUT_MS") {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                BackendError::InvalidConfig(format!("COURSE_API_TIMEOUT_MS is not a number: {raw}"))
            })?;
            config.timeout = Duration::from_millis(millis);
        }
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `BackendError::InvalidConfig` when `raw` is not an http(s) URL.
    pub fn with_base_url(mut self, raw: &str) -> Result<Self, BackendError> {
        self.base_url = parse_base_url(raw)?;
        Ok(self)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, BackendError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| BackendError::InvalidConfig(format!("invalid course API URL {raw:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(BackendError::InvalidConfig(format!(
            "course API URL must be http(s): {raw}"
        )));
    }
    Ok(url)
}

/// `CourseBackend` over the course server's HTTP API.
///
/// The client keeps a cookie store; the server identifies the learner's run
/// by the cookie it sets on the first request.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns `BackendError::InvalidConfig` if the HTTP client cannot be built.
    pub fn new(config: HttpBackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| BackendError::InvalidConfig(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// # Errors
    ///
    /// Returns `BackendError::InvalidConfig` on bad environment values.
    pub fn from_env() -> Result<Self, BackendError> {
        Self::new(HttpBackendConfig::from_env()?)
    }

    #[must_use]
    pub fn config(&self) -> &HttpBackendConfig {
        &self.config
    }

    fn course_url(&self, course: &CourseId, tail: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.config.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                BackendError::InvalidConfig("course API URL cannot be a base".into())
            })?;
            segments
                .pop_if_empty()
                .extend(["api", "mvp", "courses", course.as_str()])
                .extend(tail);
        }
        Ok(url)
    }

    async fn send(&self, endpoint: Endpoint, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request.send().await.map_err(|err| {
            warn!(%endpoint, error = %err, "course server request failed");
            BackendError::from(err)
        })?;
        let status = response.status();
        debug!(%endpoint, status = status.as_u16(), "course server responded");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = wire::error_detail(&body);
        warn!(%endpoint, status = status.as_u16(), %message, "course server returned an error");
        Err(BackendError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: Endpoint, url: Url) -> Result<T, BackendError> {
        let response = self.send(endpoint, self.client.get(url)).await?;
        Ok(response.json().await?)
    }

    async fn post<B, T>(&self, endpoint: Endpoint, url: Url, body: Option<&B>) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let mut request = self.client.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = self.send(endpoint, request).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl CourseBackend for HttpBackend {
    async fn check_course_exists(&self, course: &CourseId) -> Result<bool, BackendError> {
        let url = self.course_url(course, &[])?;
        match self.send(Endpoint::CheckCourse, self.client.get(url)).await {
            Ok(_) => Ok(true),
            Err(BackendError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    async fn start_course(&self, course: &CourseId) -> Result<(), BackendError> {
        let url = self.course_url(course, &["start"])?;
        let _: Value = self.post(Endpoint::StartCourse, url, None::<&()>).await?;
        Ok(())
    }

    async fn current_element(&self, course: &CourseId) -> Result<CourseElement, BackendError> {
        let url = self.course_url(course, &["current"])?;
        let value: Value = self.get(Endpoint::CurrentElement, url).await?;
        wire::decode_element(value)
    }

    async fn advance_element(&self, course: &CourseId) -> Result<Advance, BackendError> {
        let url = self.course_url(course, &["next"])?;
        let value: Value = self.post(Endpoint::NextElement, url, None::<&()>).await?;
        wire::decode_advance(value)
    }

    async fn submit_quiz_answer(
        &self,
        course: &CourseId,
        element: &ElementId,
        answer_index: usize,
    ) -> Result<QuizVerdict, BackendError> {
        let url = self.course_url(course, &["quiz", "answer"])?;
        let body = IndexAnswerBody {
            element_id: element,
            selected_answer_index: answer_index,
        };
        self.post(Endpoint::QuizAnswer, url, Some(&body)).await
    }

    async fn submit_input_answer(
        &self,
        course: &CourseId,
        element: &ElementId,
        text: &str,
    ) -> Result<InputVerdict, BackendError> {
        let url = self.course_url(course, &["input", "answer"])?;
        let body = InputAnswerBody {
            element_id: element,
            user_answer: text,
        };
        self.post(Endpoint::InputAnswer, url, Some(&body)).await
    }

    async fn submit_question_answer(
        &self,
        course: &CourseId,
        element: &ElementId,
        answer_index: usize,
    ) -> Result<QuestionVerdict, BackendError> {
        let url = self.course_url(course, &["question", "answer"])?;
        let body = IndexAnswerBody {
            element_id: element,
            selected_answer_index: answer_index,
        };
        self.post(Endpoint::QuestionAnswer, url, Some(&body)).await
    }

    async fn submit_multi_choice_answer(
        &self,
        course: &CourseId,
        element: &ElementId,
        answer_indices: &[usize],
    ) -> Result<MultiChoiceVerdict, BackendError> {
        let url = self.course_url(course, &["multichoice", "answer"])?;
        let body = MultiChoiceAnswerBody {
            element_id: element,
            selected_answer_indices: answer_indices,
        };
        self.post(Endpoint::MultiChoiceAnswer, url, Some(&body)).await
    }

    async fn test_result(
        &self,
        course: &CourseId,
        element: &ElementId,
    ) -> Result<TestResult, BackendError> {
        let url = self.course_url(course, &["test", "result", element.as_str()])?;
        self.get(Endpoint::TestResult, url).await
    }

    async fn revision_result(
        &self,
        course: &CourseId,
        element: &ElementId,
    ) -> Result<RevisionResult, BackendError> {
        let url = self.course_url(course, &["revision", "result", element.as_str()])?;
        let response: RevisionResultResponse = self.get(Endpoint::RevisionResult, url).await?;
        Ok(response.into())
    }

    async fn start_revision(
        &self,
        course: &CourseId,
        element: &ElementId,
    ) -> Result<CourseElement, BackendError> {
        let url = self.course_url(course, &["revision", "start", element.as_str()])?;
        let value: Value = self.post(Endpoint::StartRevision, url, None::<&()>).await?;
        wire::decode_element(value)
    }

    async fn send_dialog_message(
        &self,
        course: &CourseId,
        element: &ElementId,
        message: &str,
    ) -> Result<DialogReply, BackendError> {
        let url = self.course_url(course, &["dialog", "message"])?;
        let body = DialogMessageBody {
            element_id: element,
            message,
        };
        self.post(Endpoint::DialogMessage, url, Some(&body)).await
    }
}
