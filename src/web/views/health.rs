use poem::http::StatusCode;
use poem::{handler, IntoResponse, Response};

use crate::prelude::*;

const CACHE_CONTROL: &str = "no-cache";

#[handler]
#[instrument(skip_all, level = "debug")]
pub async fn get_health() -> impl IntoResponse {
    Response::from(StatusCode::NO_CONTENT).with_header("Cache-Control", CACHE_CONTROL)
}

#[cfg(test)]
mod tests {
    use poem::http::StatusCode;

    use crate::prelude::*;
    use crate::web::test::create_test_client;

    #[tokio::test]
    async fn get_health_ok() -> Result {
        let (client, _) = create_test_client(true, false)?;
        let response = client.get("/health").send().await;
        response.assert_status(StatusCode::NO_CONTENT);
        response.assert_header("Cache-Control", "no-cache");
        Ok(())
    }

    #[tokio::test]
    async fn unknown_route_not_found() -> Result {
        let (client, _) = create_test_client(true, false)?;
        client.get("/nope").send().await.assert_status(StatusCode::NOT_FOUND);
        client
            .get("/biodrying_data")
            .send()
            .await
            .assert_status(StatusCode::METHOD_NOT_ALLOWED);
        Ok(())
    }
}
