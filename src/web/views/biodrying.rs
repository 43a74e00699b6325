use poem::http::StatusCode;
use poem::web::{Data, Json};
use poem::{handler, IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::prelude::*;
use crate::reading::Reading;
use crate::web::state::State;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ClassificationResponse {
    pub classification: u8,
    pub buzzer_on: u8,
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
}

/// Classifies a sensor reading, relays it to ThingSpeak and tells the device whether to sound the buzzer.
#[handler]
#[instrument(skip_all, level = "info")]
pub async fn post_biodrying_data(body: Vec<u8>, Data(state): Data<&State>) -> Response {
    debug!(body = %String::from_utf8_lossy(&body), "received");

    let model = match &state.model {
        Some(model) => model,
        None => {
            warn!("the model is not loaded");
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Model not loaded");
        }
    };

    let (reading, verdict) = match Reading::from_json(&body)
        .and_then(|reading| Ok((reading, model.classify(&reading)?)))
    {
        Ok(classified) => classified,
        Err(error) => {
            warn!("invalid data: {:#}", error);
            return error_response(StatusCode::BAD_REQUEST, "Invalid data");
        }
    };
    info!(
        reading.temperature,
        reading.humidity,
        reading.ph,
        prediction = verdict.as_u8(),
        label = %verdict,
        "classified",
    );

    let buzzer_on = state.buzzer_strategy.is_buzzer_on(&reading, verdict);
    let buzzer = if buzzer_on { "ON" } else { "OFF" };
    info!(buzzer, "actuator");

    if let Err(error) = state.relay.send(&reading, verdict).await {
        error!("failed to update ThingSpeak: {:#}", error);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Failed to update ThingSpeak: {:#}", error),
        );
    }

    Json(ClassificationResponse {
        classification: verdict.as_u8(),
        buzzer_on: u8::from(buzzer_on),
    })
    .into_response()
}

fn error_response(status: StatusCode, error: &str) -> Response {
    Json(ErrorResponse { error }).with_status(status).into_response()
}

#[cfg(test)]
mod tests {
    use poem::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::reading::Verdict;
    use crate::web::test::create_test_client;

    #[tokio::test]
    async fn feasible_reading_ok() -> Result {
        let (client, relay) = create_test_client(true, false)?;
        let response = client
            .post("/biodrying_data")
            .body_json(&json!({"temperature": 55, "humidity": 20, "ph": 7.2}))
            .send()
            .await;
        response.assert_status_is_ok();
        response.assert_json(json!({"classification": 1, "buzzer_on": 1})).await;
        assert_eq!(relay.sent(), vec![(Reading::new(55.0, 20.0, 7.2), Verdict::Feasible)]);
        Ok(())
    }

    #[tokio::test]
    async fn not_feasible_reading_ok() -> Result {
        let (client, relay) = create_test_client(true, false)?;
        let response = client
            .post("/biodrying_data")
            .body_json(&json!({"temperature": 31, "humidity": 47, "ph": 5.4}))
            .send()
            .await;
        response.assert_status_is_ok();
        response.assert_json(json!({"classification": 0, "buzzer_on": 0})).await;
        assert_eq!(relay.sent().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn repeated_requests_agree() -> Result {
        let (client, relay) = create_test_client(true, false)?;
        let mut responses = Vec::new();
        for _ in 0..3 {
            let response = client
                .post("/biodrying_data")
                .body_json(&json!({"temperature": 52.5, "humidity": 24, "ph": 6.9}))
                .send()
                .await;
            response.assert_status_is_ok();
            responses.push(response.json().await.value().deserialize::<ClassificationResponse>());
        }
        assert!(responses.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(relay.sent().len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn empty_object_defaults_to_zeros() -> Result {
        let (client, relay) = create_test_client(true, false)?;
        let response = client.post("/biodrying_data").body_json(&json!({})).send().await;
        response.assert_status_is_ok();
        assert_eq!(relay.sent().len(), 1);
        assert_eq!(relay.sent()[0].0, Reading::new(0.0, 0.0, 0.0));
        Ok(())
    }

    #[tokio::test]
    async fn model_not_loaded() -> Result {
        let (client, relay) = create_test_client(false, false)?;
        let response = client
            .post("/biodrying_data")
            .body_json(&json!({"temperature": 55, "humidity": 20, "ph": 7.2}))
            .send()
            .await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        response.assert_json(json!({"error": "Model not loaded"})).await;
        assert!(relay.sent().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn relay_failure() -> Result {
        let (client, relay) = create_test_client(true, true)?;
        let response = client
            .post("/biodrying_data")
            .body_json(&json!({"temperature": 55, "humidity": 20, "ph": 7.2}))
            .send()
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.json().await;
        let error = body.value().object().get("error").string().to_string();
        assert!(error.starts_with("Failed to update ThingSpeak: "), "{}", error);
        assert!(error.contains("503"), "{}", error);
        assert!(relay.sent().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn malformed_body() -> Result {
        let (client, relay) = create_test_client(true, false)?;
        let response = client
            .post("/biodrying_data")
            .content_type("application/json")
            .body("{temperature: 55")
            .send()
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(json!({"error": "Invalid data"})).await;
        assert!(relay.sent().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn non_numeric_field() -> Result {
        let (client, relay) = create_test_client(true, false)?;
        let response = client
            .post("/biodrying_data")
            .body_json(&json!({"temperature": "hot", "humidity": 20, "ph": 7.2}))
            .send()
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(json!({"error": "Invalid data"})).await;
        assert!(relay.sent().is_empty());
        Ok(())
    }
}
