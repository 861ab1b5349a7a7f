//! `classifier`: forwards JPEG frames to an HTTP inference endpoint and
//! emits the most probable label.
//!
//! The endpoint receives the raw image as the request body and answers with
//! `[{"label": "...", "probability": 0.0..1.0}, ...]`.

use std::sync::Arc;
use std::time::Duration;

use cortical_core::{Cortex, CortexFactory, Message, cortex};
use cortical_settings::ClassifierSettings;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::errors::{CortexError, Result};
use crate::frame::FramePayload;

/// Registry name.
pub const NAME: &str = "classifier";

/// One scored label from the inference endpoint.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Prediction {
    /// Class name.
    pub label: String,
    /// Score in `[0, 1]`.
    pub probability: f64,
}

impl Prediction {
    /// `"<label> (<pct>%)"`, the reply sent to the peer.
    pub fn to_message(&self) -> Message {
        Message::from(format!("{} ({:2.0}%)", self.label, self.probability * 100.0))
    }
}

/// The highest-probability prediction, if any.
pub fn best(predictions: &[Prediction]) -> Option<&Prediction> {
    predictions
        .iter()
        .filter(|p| p.probability.is_finite())
        .max_by(|a, b| a.probability.total_cmp(&b.probability))
}

/// HTTP client for the inference endpoint.
#[derive(Clone, Debug)]
pub struct Classifier {
    client: reqwest::Client,
    url: String,
    content_type: String,
}

impl Classifier {
    /// Build the client. Fails only if the TLS backend cannot be initialized.
    pub fn new(settings: &ClassifierSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            url: settings.url.clone(),
            content_type: settings.content_type.clone(),
        })
    }

    /// Classify one image.
    pub async fn classify(&self, image: Vec<u8>) -> Result<Vec<Prediction>> {
        let resp = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, &self.content_type)
            .body(image)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(CortexError::Status {
                status: resp.status().as_u16(),
            });
        }
        Ok(resp.json().await?)
    }

    /// Classify a client frame. `Ok(None)` when the frame carries no image
    /// of the configured type or the endpoint returned no usable label.
    pub async fn classify_frame(&self, msg: &Message) -> Result<Option<Message>> {
        let frame = FramePayload::decode(msg)?;
        let Some(image) = frame.content_of(&self.content_type) else {
            return Ok(None);
        };
        let predictions = self.classify(image.to_vec()).await?;
        Ok(best(&predictions).map(Prediction::to_message))
    }
}

/// Build the classifier factory.
pub fn factory(settings: &ClassifierSettings) -> Result<CortexFactory> {
    let classifier = Arc::new(Classifier::new(settings)?);
    Ok(cortex::factory(move |_session| {
        let (tx, rx) = mpsc::channel::<Message>(4);
        let rx = Arc::new(Mutex::new(rx));
        let classifier = classifier.clone();
        Cortex::new()
            .with_consumer(move |session, msg| {
                let classifier = classifier.clone();
                let tx = tx.clone();
                async move {
                    match classifier.classify_frame(&msg).await {
                        Ok(Some(reply)) => {
                            let _ = tx.send(reply).await;
                        }
                        Ok(None) => {}
                        Err(CortexError::Core(e)) => {
                            debug!(session_id = %session.id(), error = %e, "ignoring non-frame message");
                        }
                        Err(e) => warn!(session_id = %session.id(), error = %e, "classification failed"),
                    }
                }
            })
            .with_producer(move |_session| {
                let rx = rx.clone();
                async move { rx.lock().await.recv().await }
            })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use cortical_core::Session;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn jpeg(content: &[u8]) -> Message {
        let json = serde_json::json!({
            "dataURI": {"contentType": "image/jpeg", "content": STANDARD.encode(content)},
        });
        Message::from(json.to_string())
    }

    fn settings(server: &MockServer) -> ClassifierSettings {
        ClassifierSettings {
            url: format!("{}/v1/classify", server.uri()),
            timeout_ms: 2_000,
            content_type: "image/jpeg".into(),
        }
    }

    #[test]
    fn best_picks_highest_probability() {
        let preds = vec![
            Prediction { label: "cat".into(), probability: 0.2 },
            Prediction { label: "dog".into(), probability: 0.7 },
            Prediction { label: "nan".into(), probability: f64::NAN },
        ];
        assert_eq!(best(&preds).unwrap().label, "dog");
        assert!(best(&[]).is_none());
    }

    #[test]
    fn reply_format() {
        let p = Prediction { label: "golden retriever".into(), probability: 0.873 };
        assert_eq!(p.to_message(), Message::from("golden retriever (87%)"));
        let p = Prediction { label: "x".into(), probability: 0.05 };
        assert_eq!(p.to_message(), Message::from("x ( 5%)"));
    }

    #[tokio::test]
    async fn posts_image_and_emits_best_label() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/classify"))
            .and(header("content-type", "image/jpeg"))
            .and(body_bytes(b"\xff\xd8jpeg".to_vec()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"label": "cat", "probability": 0.1},
                {"label": "tabby", "probability": 0.9},
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let session = Session::new(None);
        let cortex = factory(&settings(&server)).unwrap()(&session);
        let consume = cortex.consumer.unwrap();
        let produce = cortex.producer.unwrap();

        consume(session.clone(), jpeg(b"\xff\xd8jpeg")).await;
        assert_eq!(produce(session).await, Some(Message::from("tabby (90%)")));
    }

    #[tokio::test]
    async fn non_image_messages_never_reach_the_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let classifier = Classifier::new(&settings(&server)).unwrap();
        assert!(classifier.classify_frame(&Message::from("hello")).await.is_err());
        let png = serde_json::json!({"dataURI": {"contentType": "image/png", "content": ""}});
        assert!(
            classifier
                .classify_frame(&Message::from(png.to_string()))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn endpoint_errors_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let classifier = Classifier::new(&settings(&server)).unwrap();
        let err = classifier.classify_frame(&jpeg(b"img")).await.unwrap_err();
        assert!(matches!(err, CortexError::Status { status: 503 }));
    }

    #[tokio::test]
    async fn failures_are_swallowed_by_the_cortex() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let session = Session::new(None);
        let cortex = factory(&settings(&server)).unwrap()(&session);
        (cortex.consumer.unwrap())(session.clone(), jpeg(b"img")).await;

        let produced = tokio::time::timeout(
            Duration::from_millis(50),
            (cortex.producer.unwrap())(session),
        )
        .await;
        assert!(produced.is_err());
    }
}
