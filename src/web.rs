use crate::{DetectorConfig, DetectorError, EmotionDetector, EmotionResult};
use askama::Template;
use axum::{
    Form, Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info};

type SharedState = Arc<AppState>;

pub const EMPTY_STATEMENT_MESSAGE: &str = "Please enter a valid statement.";
pub const INVALID_TEXT_MESSAGE: &str = "Invalid text! Please try again!";
pub const SERVICE_UNAVAILABLE_MESSAGE: &str =
    "The emotion service is unavailable right now. Please try again later.";

#[derive(Clone)]
pub struct AppState {
    pub detector: EmotionDetector,
    pub theme: WebTheme,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum WebTheme {
    #[default]
    Tailwind,
    Bootstrap,
}

impl fmt::Display for WebTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebTheme::Tailwind => write!(f, "tailwind"),
            WebTheme::Bootstrap => write!(f, "bootstrap"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Chrome {
    use_tailwind: bool,
    use_bootstrap: bool,
    body_class: &'static str,
    main_class: &'static str,
    card_class: &'static str,
    eyebrow_class: &'static str,
    headline_class: &'static str,
    lede_class: &'static str,
    input_class: &'static str,
    button_class: &'static str,
}

impl Chrome {
    fn new(theme: WebTheme) -> Self {
        match theme {
            WebTheme::Tailwind => Self {
                use_tailwind: true,
                use_bootstrap: false,
                body_class: "bg-slate-50 text-slate-900",
                main_class: "min-h-screen flex flex-col items-center justify-start py-10 px-4",
                card_class: "max-w-3xl w-full space-y-6",
                eyebrow_class: "uppercase tracking-wide text-sm text-slate-500",
                headline_class: "text-4xl font-extrabold tracking-tight",
                lede_class: "text-lg text-slate-600",
                input_class: "w-full rounded-md border border-slate-300 p-3 shadow-sm focus:border-slate-500 focus:outline-none",
                button_class: "inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors",
            },
            WebTheme::Bootstrap => Self {
                use_tailwind: false,
                use_bootstrap: true,
                body_class: "bg-light text-dark",
                main_class: "container py-5",
                card_class: "mx-auto col-lg-8",
                eyebrow_class: "text-uppercase text-muted mb-2",
                headline_class: "display-5 fw-bold",
                lede_class: "lead mb-4",
                input_class: "form-control",
                button_class: "btn btn-primary btn-lg px-4 py-2",
            },
        }
    }

    fn message_class(&self, tone: Tone) -> &'static str {
        match (self.use_bootstrap, tone) {
            (true, Tone::Result) => "alert alert-success",
            (true, Tone::Warning) => "alert alert-warning",
            (true, Tone::Error) => "alert alert-danger",
            (false, Tone::Result) => "rounded-md bg-emerald-50 p-4 text-emerald-900",
            (false, Tone::Warning) => "rounded-md bg-amber-50 p-4 text-amber-900",
            (false, Tone::Error) => "rounded-md bg-rose-50 p-4 text-rose-900",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Tone {
    Result,
    Warning,
    Error,
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub theme: WebTheme,
    pub detector: DetectorConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            theme: WebTheme::default(),
            detector: DetectorConfig::default(),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
    Detector(DetectorError),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
            WebError::Detector(err) => write!(f, "detector error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

impl From<DetectorError> for WebError {
    fn from(value: DetectorError) -> Self {
        WebError::Detector(value)
    }
}

pub async fn serve(config: WebConfig) -> Result<(), WebError> {
    let detector = EmotionDetector::new(config.detector.clone())?;
    let state = Arc::new(AppState {
        detector,
        theme: config.theme,
    });
    let router = build_router(state);
    info!(
        %config.addr,
        theme = ?config.theme,
        endpoint = %config.detector.endpoint,
        timeout = ?config.detector.timeout,
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<DetectorError> for ApiError {
    fn from(err: DetectorError) -> Self {
        error!(error = %err, "Emotion detection failed");
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/emotionDetector", get(index).post(emotion_detector))
        .route("/api/emotion", post(api_emotion))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn index(State(state): State<SharedState>) -> Html<String> {
    Html(render_page(state.theme, "", None))
}

#[derive(Debug, Deserialize)]
struct StatementForm {
    statement: Option<String>,
}

async fn emotion_detector(
    State(state): State<SharedState>,
    Form(form): Form<StatementForm>,
) -> (StatusCode, Html<String>) {
    let statement = form.statement.unwrap_or_default();
    if statement.trim().is_empty() {
        return page(
            state.theme,
            StatusCode::OK,
            &statement,
            Tone::Warning,
            EMPTY_STATEMENT_MESSAGE,
        );
    }
    match state.detector.detect(&statement).await {
        Ok(result) => match result.summary() {
            Some(sentence) => page(
                state.theme,
                StatusCode::OK,
                &statement,
                Tone::Result,
                &sentence,
            ),
            None => page(
                state.theme,
                StatusCode::OK,
                &statement,
                Tone::Warning,
                INVALID_TEXT_MESSAGE,
            ),
        },
        Err(err) => {
            error!(error = %err, remote = err.is_remote_service(), "Emotion detection failed");
            page(
                state.theme,
                StatusCode::BAD_GATEWAY,
                &statement,
                Tone::Error,
                SERVICE_UNAVAILABLE_MESSAGE,
            )
        }
    }
}

fn page(
    theme: WebTheme,
    status: StatusCode,
    statement: &str,
    tone: Tone,
    message: &str,
) -> (StatusCode, Html<String>) {
    (
        status,
        Html(render_page(theme, statement, Some((tone, message)))),
    )
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    text: String,
}

async fn api_emotion(
    State(state): State<SharedState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<EmotionResult>, ApiError> {
    if request.text.trim().is_empty() {
        return Err(ApiError::bad_request("Field `text` must not be blank"));
    }
    let result = state.detector.detect(&request.text).await?;
    Ok(Json(result))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "emotion-detector-web" }))
}

fn render_page(theme: WebTheme, statement: &str, message: Option<(Tone, &str)>) -> String {
    let chrome = Chrome::new(theme);
    let template = IndexTemplate {
        chrome,
        version: env!("CARGO_PKG_VERSION"),
        statement,
        has_message: message.is_some(),
        message: message.map(|(_, text)| text).unwrap_or_default(),
        message_class: message
            .map(|(tone, _)| chrome.message_class(tone))
            .unwrap_or_default(),
    };
    template
        .render()
        .unwrap_or_else(|err| render_error_page(theme, err.to_string()))
}

fn render_error_page(theme: WebTheme, message: impl Into<String>) -> String {
    let chrome = Chrome::new(theme);
    let (css_tag, js_tag) = match theme {
        WebTheme::Tailwind => (
            r#"<script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>"#,
            "",
        ),
        WebTheme::Bootstrap => (
            r#"<link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">"#,
            r#"<script src="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/js/bootstrap.bundle.min.js" integrity="sha384-FKyoEForCGlyvwx9Hj09JcYn3nv7wiPVlz7YYwJrWVcXK/BmnVDxM+D2scQbITxI" crossorigin="anonymous"></script>"#,
        ),
    };
    let message = html_escape(&message.into());
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Emotion Detector • Error</title>
    {css_tag}
    {js_tag}
  </head>
  <body class="{body_class}">
    <main class="{main_class}">
      <div class="{card_class}">
        <h1 class="{headline_class}">Something went wrong</h1>
        <p class="{lede_class}">{message}</p>
        <a href="/" class="{button_class}">Back to the form</a>
      </div>
    </main>
  </body>
</html>"#,
        css_tag = css_tag,
        js_tag = js_tag,
        body_class = chrome.body_class,
        main_class = chrome.main_class,
        card_class = chrome.card_class,
        headline_class = chrome.headline_class,
        lede_class = chrome.lede_class,
        button_class = chrome.button_class,
        message = message,
    )
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Emotion Detector</title>
    {% if chrome.use_tailwind %}
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% endif %}
    {% if chrome.use_bootstrap %}
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    <script src="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/js/bootstrap.bundle.min.js" integrity="sha384-FKyoEForCGlyvwx9Hj09JcYn3nv7wiPVlz7YYwJrWVcXK/BmnVDxM+D2scQbITxI" crossorigin="anonymous"></script>
    {% endif %}
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <div>
          <p class="{{ chrome.eyebrow_class }}">Emotion Detector v{{ version }}</p>
          <h1 class="{{ chrome.headline_class }}">How does this statement feel?</h1>
          <p class="{{ chrome.lede_class }}">Scores anger, disgust, fear, joy and sadness, then names the dominant emotion.</p>
        </div>
        <form method="post" action="/emotionDetector" class="space-y-4">
          <label for="statement" class="form-label font-semibold">Statement</label>
          <textarea id="statement" name="statement" rows="4" class="{{ chrome.input_class }}" placeholder="I am glad this happened">{{ statement }}</textarea>
          <button type="submit" class="{{ chrome.button_class }} mt-3">Run Sentiment Analysis</button>
        </form>
        {% if has_message %}
        <section id="system_response" class="{{ message_class }} mt-4">
          <p class="mb-0">{{ message }}</p>
        </section>
        {% endif %}
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct IndexTemplate<'a> {
    chrome: Chrome,
    version: &'a str,
    statement: &'a str,
    has_message: bool,
    message: &'a str,
    message_class: &'a str,
}
