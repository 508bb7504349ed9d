use crate::{Emotion, EmotionResult, EmotionScores};
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value, json};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_ENDPOINT: &str =
    "https://sn-watson-emotion.labs.skills.network/v1/watson.runtime.nlp.v1/NlpService/EmotionPredict";
pub const MODEL_ID_HEADER: &str = "grpc-metadata-mm-model-id";
pub const DEFAULT_MODEL_ID: &str = "emotion_aggregated-workflow_lang_en_stock";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where and how to reach the remote emotion service.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub endpoint: String,
    pub model_id: String,
    pub timeout: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("emotion service request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("emotion service returned {status}: {body}")]
    RemoteStatus { status: StatusCode, body: String },
    #[error("malformed emotion service response: {0}")]
    MalformedResponse(String),
}

impl DetectorError {
    /// True when the remote call failed or answered with an error status.
    pub fn is_remote_service(&self) -> bool {
        matches!(
            self,
            DetectorError::Transport(_) | DetectorError::RemoteStatus { .. }
        )
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, DetectorError::MalformedResponse(_))
    }
}

fn malformed(message: impl Into<String>) -> DetectorError {
    DetectorError::MalformedResponse(message.into())
}

/// Stateless client for the remote emotion service. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EmotionDetector {
    client: Client,
    config: DetectorConfig,
}

impl EmotionDetector {
    pub fn new(config: DetectorConfig) -> Result<Self, DetectorError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(DetectorError::Client)?;
        Ok(Self { client, config })
    }

    /// Sends `text` to the service and normalizes the reply.
    ///
    /// The text is forwarded untouched, empty strings included. A `400 Bad
    /// Request` answer yields [`EmotionResult::rejected`] instead of an error.
    pub async fn detect(&self, text: &str) -> Result<EmotionResult, DetectorError> {
        let payload = json!({ "raw_document": { "text": text } });
        debug!(
            endpoint = %self.config.endpoint,
            chars = text.chars().count(),
            "Sending emotion request"
        );
        let response = self
            .client
            .post(&self.config.endpoint)
            .header(MODEL_ID_HEADER, self.config.model_id.as_str())
            .json(&payload)
            .send()
            .await
            .map_err(DetectorError::Transport)?;
        let status = response.status();
        let body = response.text().await.map_err(DetectorError::Transport)?;
        debug!(%status, bytes = body.len(), "Received emotion response");
        interpret_response(status, &body)
    }
}

/// Maps a raw status and body from the service to an [`EmotionResult`].
pub fn interpret_response(status: StatusCode, body: &str) -> Result<EmotionResult, DetectorError> {
    if status == StatusCode::BAD_REQUEST {
        warn!("Emotion service rejected the text");
        return Ok(EmotionResult::rejected());
    }
    if !status.is_success() {
        return Err(DetectorError::RemoteStatus {
            status,
            body: body.to_string(),
        });
    }
    let scores = extract_scores(body)
        .inspect_err(|err| warn!(error = %err, "Unusable emotion payload"))?;
    Ok(EmotionResult::from_scores(scores))
}

/// Pulls the five scores out of a successful response body.
///
/// The service answers either with a `text` field holding a JSON-encoded
/// emotion object, or with an `emotionPredictions` array whose first element
/// carries an `emotion` object. `text` wins when both are present.
pub fn extract_scores(body: &str) -> Result<EmotionScores, DetectorError> {
    let document: Value =
        serde_json::from_str(body).map_err(|err| malformed(format!("body is not JSON: {err}")))?;
    let Some(fields) = document.as_object() else {
        return Err(malformed("body is not a JSON object"));
    };
    if let Some(text) = fields.get("text") {
        let emotions = decode_text_field(text)?;
        read_scores(&emotions)
    } else if let Some(predictions) = fields.get("emotionPredictions") {
        read_scores(first_prediction(predictions)?)
    } else {
        Err(malformed("expected a `text` or `emotionPredictions` field"))
    }
}

fn decode_text_field(text: &Value) -> Result<Map<String, Value>, DetectorError> {
    let encoded = text
        .as_str()
        .ok_or_else(|| malformed("`text` field is not a string"))?;
    let decoded: Value = serde_json::from_str(encoded)
        .map_err(|err| malformed(format!("failed to decode JSON from `text`: {err}")))?;
    match decoded {
        Value::Object(map) => Ok(map),
        _ => Err(malformed("`text` does not encode a JSON object")),
    }
}

fn first_prediction(predictions: &Value) -> Result<&Map<String, Value>, DetectorError> {
    predictions
        .as_array()
        .and_then(|items| items.first())
        .and_then(|prediction| prediction.get("emotion"))
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("could not extract emotion predictions"))
}

fn read_scores(emotions: &Map<String, Value>) -> Result<EmotionScores, DetectorError> {
    let mut scores = EmotionScores::default();
    for emotion in Emotion::ALL {
        let score = match emotions.get(emotion.as_str()) {
            None => 0.0,
            Some(value) => value.as_f64().ok_or_else(|| {
                malformed(format!("score for `{emotion}` is not a number: {value}"))
            })?,
        };
        scores.set(emotion, score);
    }
    Ok(scores)
}


#[cfg(test)]
mod tests {
    use super::fixtures::prediction_body;
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn detector_for(server: &MockServer) -> EmotionDetector {
        EmotionDetector::new(DetectorConfig {
            endpoint: format!("{}/emotion", server.uri()),
            ..DetectorConfig::default()
        })
        .unwrap()
    }

    fn request_for(text: &str) -> Value {
        json!({ "raw_document": { "text": text } })
    }

    #[tokio::test]
    async fn canned_statements_pick_expected_emotion() {
        let server = MockServer::start().await;
        let cases = [
            ("I am glad this happened", [0.006, 0.002, 0.009, 0.968, 0.049], Emotion::Joy),
            ("I am really mad about this", [0.886, 0.003, 0.034, 0.007, 0.026], Emotion::Anger),
            ("I feel disgusted just hearing about this", [0.021, 0.915, 0.092, 0.008, 0.027], Emotion::Disgust),
            ("I am so sad about this", [0.011, 0.004, 0.044, 0.018, 0.931], Emotion::Sadness),
            ("I am really afraid that this will happen", [0.034, 0.010, 0.936, 0.013, 0.079], Emotion::Fear),
        ];
        for (statement, scores, _) in &cases {
            Mock::given(method("POST"))
                .and(path("/emotion"))
                .and(body_json(request_for(statement)))
                .respond_with(ResponseTemplate::new(200).set_body_json(prediction_body(*scores)))
                .mount(&server)
                .await;
        }
        let detector = detector_for(&server);
        for (statement, _, expected) in cases {
            let result = detector.detect(statement).await.unwrap();
            assert_eq!(result.dominant_emotion, Some(expected), "statement: {statement}");
        }
    }

    #[tokio::test]
    async fn request_carries_model_header_and_document() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emotion"))
            .and(header(MODEL_ID_HEADER, DEFAULT_MODEL_ID))
            .and(body_json(request_for("")))
            .respond_with(ResponseTemplate::new(200).set_body_json(prediction_body([0.0; 5])))
            .expect(1)
            .mount(&server)
            .await;
        let result = detector_for(&server).detect("").await.unwrap();
        assert_eq!(result.dominant_emotion, Some(Emotion::Anger));
    }

    #[tokio::test]
    async fn bad_request_yields_rejected_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("{\"code\":3}"))
            .mount(&server)
            .await;
        let result = detector_for(&server).detect("   ").await.unwrap();
        assert_eq!(result, EmotionResult::rejected());
    }

    #[tokio::test]
    async fn server_error_propagates_as_remote_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;
        let err = detector_for(&server).detect("hello").await.unwrap_err();
        assert!(err.is_remote_service());
        match err {
            DetectorError::RemoteStatus { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "overloaded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let detector = EmotionDetector::new(DetectorConfig {
            endpoint: format!("http://127.0.0.1:{port}/emotion"),
            ..DetectorConfig::default()
        })
        .unwrap();
        let err = detector.detect("hello").await.unwrap_err();
        assert!(matches!(err, DetectorError::Transport(_)));
        assert!(err.is_remote_service());
    }

    #[tokio::test]
    async fn slow_service_hits_the_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(prediction_body([0.0; 5]))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;
        let detector = EmotionDetector::new(DetectorConfig {
            endpoint: format!("{}/emotion", server.uri()),
            timeout: Duration::from_millis(100),
            ..DetectorConfig::default()
        })
        .unwrap();
        let err = detector.detect("hello").await.unwrap_err();
        assert!(matches!(err, DetectorError::Transport(_)));
    }

    #[tokio::test]
    async fn repeated_calls_are_identical() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(prediction_body([0.12, 0.07, 0.31, 0.4, 0.1])),
            )
            .expect(2)
            .mount(&server)
            .await;
        let detector = detector_for(&server);
        let first = detector.detect("same words").await.unwrap();
        let second = detector.detect("same words").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.dominant_emotion, Some(Emotion::Joy));
    }

    #[test]
    fn text_shape_decodes_nested_json() {
        let inner = json!({ "anger": 0.1, "disgust": 0.2, "fear": 0.05, "joy": 0.6, "sadness": 0.05 });
        let body = json!({ "text": inner.to_string() }).to_string();
        let scores = extract_scores(&body).unwrap();
        assert_eq!(
            scores,
            EmotionScores { anger: 0.1, disgust: 0.2, fear: 0.05, joy: 0.6, sadness: 0.05 }
        );
    }

    #[test]
    fn prediction_shape_uses_first_element() {
        let mut body = prediction_body([0.3, 0.1, 0.2, 0.25, 0.15]);
        body["emotionPredictions"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "emotion": { "joy": 1.0 } }));
        let scores = extract_scores(&body.to_string()).unwrap();
        assert_eq!(
            scores,
            EmotionScores { anger: 0.3, disgust: 0.1, fear: 0.2, joy: 0.25, sadness: 0.15 }
        );
        assert_eq!(scores.dominant(), Emotion::Anger);
    }

    #[test]
    fn text_field_takes_precedence() {
        let body = json!({
            "text": json!({ "sadness": 0.9 }).to_string(),
            "emotionPredictions": [{ "emotion": { "joy": 0.9 } }],
        })
        .to_string();
        assert_eq!(extract_scores(&body).unwrap().dominant(), Emotion::Sadness);
    }

    #[test]
    fn missing_keys_default_to_zero() {
        let body = json!({ "emotionPredictions": [{ "emotion": { "fear": 0.4, "joy": 1 } }] }).to_string();
        let scores = extract_scores(&body).unwrap();
        assert_eq!(
            scores,
            EmotionScores { anger: 0.0, disgust: 0.0, fear: 0.4, joy: 1.0, sadness: 0.0 }
        );
    }

    #[test]
    fn tied_scores_resolve_in_declaration_order() {
        let body = prediction_body([0.1, 0.3, 0.3, 0.3, 0.0]).to_string();
        let result = interpret_response(StatusCode::OK, &body).unwrap();
        assert_eq!(result.dominant_emotion, Some(Emotion::Disgust));
    }

    #[test]
    fn malformed_bodies_are_reported() {
        let cases = [
            "not json".to_string(),
            json!([1, 2, 3]).to_string(),
            json!({ "result": {} }).to_string(),
            json!({ "text": "{not valid" }).to_string(),
            json!({ "text": 42 }).to_string(),
            json!({ "text": "[0.1, 0.2]" }).to_string(),
            json!({ "emotionPredictions": [] }).to_string(),
            json!({ "emotionPredictions": [{ "target": "x" }] }).to_string(),
            json!({ "emotionPredictions": [{ "emotion": { "joy": "high" } }] }).to_string(),
            json!({ "emotionPredictions": [{ "emotion": { "anger": null } }] }).to_string(),
        ];
        for body in cases {
            let err = interpret_response(StatusCode::OK, &body).unwrap_err();
            assert!(err.is_malformed(), "body {body} gave {err:?}");
        }
    }

    #[test]
    fn bad_request_status_ignores_body() {
        let result = interpret_response(StatusCode::BAD_REQUEST, "not json").unwrap();
        assert!(result.is_rejected());
        assert!(result.scores().is_none());
    }
}
