mod detector;
#[cfg(feature = "web")]
pub mod web;

pub use detector::{
    DEFAULT_ENDPOINT, DEFAULT_MODEL_ID, DetectorConfig, DetectorError, EmotionDetector,
    MODEL_ID_HEADER, extract_scores, interpret_response,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the five emotions scored by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Anger,
    Disgust,
    Fear,
    Joy,
    Sadness,
}

impl Emotion {
    /// Declaration order. Dominance ties resolve to the earlier entry.
    pub const ALL: [Emotion; 5] = [
        Emotion::Anger,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Joy,
        Emotion::Sadness,
    ];

    /// Key used by the remote payload and by serialized results.
    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Anger => "anger",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EmotionScores {
    pub anger: f64,
    pub disgust: f64,
    pub fear: f64,
    pub joy: f64,
    pub sadness: f64,
}

impl EmotionScores {
    pub fn get(&self, emotion: Emotion) -> f64 {
        match emotion {
            Emotion::Anger => self.anger,
            Emotion::Disgust => self.disgust,
            Emotion::Fear => self.fear,
            Emotion::Joy => self.joy,
            Emotion::Sadness => self.sadness,
        }
    }

    pub fn set(&mut self, emotion: Emotion, score: f64) {
        let slot = match emotion {
            Emotion::Anger => &mut self.anger,
            Emotion::Disgust => &mut self.disgust,
            Emotion::Fear => &mut self.fear,
            Emotion::Joy => &mut self.joy,
            Emotion::Sadness => &mut self.sadness,
        };
        *slot = score;
    }

    /// Returns the highest-scoring emotion, preferring the earliest in
    /// [`Emotion::ALL`] when scores tie.
    pub fn dominant(&self) -> Emotion {
        let mut best = Emotion::ALL[0];
        for emotion in Emotion::ALL.into_iter().skip(1) {
            if self.get(emotion) > self.get(best) {
                best = emotion;
            }
        }
        best
    }
}

/// Normalized outcome of one analysis.
///
/// Every field is `None` when the remote service rejected the text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionResult {
    pub anger: Option<f64>,
    pub disgust: Option<f64>,
    pub fear: Option<f64>,
    pub joy: Option<f64>,
    pub sadness: Option<f64>,
    pub dominant_emotion: Option<Emotion>,
}

impl EmotionResult {
    pub fn from_scores(scores: EmotionScores) -> Self {
        Self {
            anger: Some(scores.anger),
            disgust: Some(scores.disgust),
            fear: Some(scores.fear),
            joy: Some(scores.joy),
            sadness: Some(scores.sadness),
            dominant_emotion: Some(scores.dominant()),
        }
    }

    /// Result reported when the service answers `400 Bad Request`.
    pub fn rejected() -> Self {
        Self {
            anger: None,
            disgust: None,
            fear: None,
            joy: None,
            sadness: None,
            dominant_emotion: None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.dominant_emotion.is_none()
    }

    /// The five scores, or `None` for a rejected result.
    pub fn scores(&self) -> Option<EmotionScores> {
        Some(EmotionScores {
            anger: self.anger?,
            disgust: self.disgust?,
            fear: self.fear?,
            joy: self.joy?,
            sadness: self.sadness?,
        })
    }

    /// Human-readable sentence shown to users, `None` when rejected.
    pub fn summary(&self) -> Option<String> {
        let dominant = self.dominant_emotion?;
        let scores = self.scores()?;
        Some(format!(
            "For the given statement, the system response is 'anger': {}, 'disgust': {}, \
             'fear': {}, 'joy': {} and 'sadness': {}. The dominant emotion is {}.",
            scores.anger, scores.disgust, scores.fear, scores.joy, scores.sadness, dominant
        ))
    }
}
