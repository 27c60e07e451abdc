use std::time::Duration;

use {
    prophet_config::PredictionSettings,
    tracing::{debug, warn},
};

use crate::{error::PredictionError, request::PredictionRequest};

/// Calls `trainedmodels/{id}/predict` on the remote prediction service.
#[derive(Debug, Clone)]
pub struct PredictionClient {
    base_url: String,
    http: reqwest::Client,
}

impl PredictionClient {
    pub fn new(settings: &PredictionSettings) -> Result<Self, PredictionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn predict_url(&self, model_id: &str) -> String {
        format!(
            "{}/trainedmodels/{}/predict",
            self.base_url,
            urlencoding::encode(model_id)
        )
    }

    /// Run a prediction with `access_token` as the bearer credential.
    ///
    /// Returns the response body untouched so the browser sees exactly what
    /// the service produced.
    pub async fn predict(
        &self,
        request: &PredictionRequest,
        access_token: &str,
    ) -> Result<String, PredictionError> {
        let url = self.predict_url(&request.model_id);
        debug!(
            model_id = %request.model_id,
            features = request.csv_instance.len(),
            "requesting prediction"
        );

        let resp = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&request.body())
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            warn!(model_id = %request.model_id, status = status.as_u16(), "prediction failed");
            return Err(PredictionError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, mockito::Matcher};

    fn client_for(server: &mockito::ServerGuard) -> PredictionClient {
        PredictionClient::new(&PredictionSettings {
            base_url: format!("{}/prediction/v1.5/", server.url()),
            timeout_secs: 5,
            ..Default::default()
        })
        .unwrap()
    }

    fn request() -> PredictionRequest {
        PredictionRequest {
            model_id: "m1".into(),
            csv_instance: vec!["5".into()],
        }
    }

    #[tokio::test]
    async fn relays_response_body_verbatim() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"{"kind": "prediction#output", "outputLabel": "English",
  "outputMulti": [{"label": "English", "score": 0.92}]}"#;
        let mock = server
            .mock("POST", "/prediction/v1.5/trainedmodels/m1/predict")
            .match_header("authorization", "Bearer AT1")
            .match_body(Matcher::Json(
                serde_json::json!({"input": {"csvInstance": ["5"]}}),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let out = client_for(&server).predict(&request(), "AT1").await.unwrap();
        mock.assert_async().await;
        assert_eq!(out, body);
    }

    #[tokio::test]
    async fn non_success_status_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/prediction/v1.5/trainedmodels/m1/predict")
            .with_status(404)
            .with_body(r#"{"error":{"message":"Model not found"}}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .predict(&request(), "AT1")
            .await
            .unwrap_err();
        match err {
            PredictionError::Status { status, body } => {
                assert_eq!(status, 404);
                assert!(body.contains("Model not found"));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn model_id_is_escaped_in_path() {
        let client = PredictionClient::new(&PredictionSettings {
            base_url: "https://api.example.com/v1.5".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.predict_url("language_id.txt"),
            "https://api.example.com/v1.5/trainedmodels/language_id.txt/predict"
        );
        assert_eq!(
            client.predict_url("bucket/model id"),
            "https://api.example.com/v1.5/trainedmodels/bucket%2Fmodel%20id/predict"
        );
    }
}
