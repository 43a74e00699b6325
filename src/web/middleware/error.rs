use poem::error::{MethodNotAllowedError, NotFoundError, ReadBodyError};
use poem::http::StatusCode;
use poem::web::Json;
use poem::{Endpoint, IntoResponse, Middleware, Request, Response, Result};
use serde_json::json;

use crate::prelude::*;

/// Converts the framework errors into status responses.
///
/// An unreadable request body gets the same JSON error as an invalid reading.
pub struct ErrorMiddleware;

impl<E: Endpoint<Output = Response>> Middleware<E> for ErrorMiddleware {
    type Output = ErrorMiddlewareImpl<E>;

    fn transform(&self, ep: E) -> Self::Output {
        ErrorMiddlewareImpl { ep }
    }
}

pub struct ErrorMiddlewareImpl<E> {
    ep: E,
}

#[poem::async_trait]
impl<E: Endpoint<Output = Response>> Endpoint for ErrorMiddlewareImpl<E> {
    type Output = Response;

    async fn call(&self, request: Request) -> Result<Self::Output> {
        let method = request.method().clone();
        let uri = request.uri().clone();
        match self.ep.call(request).await {
            Err(error) if error.is::<NotFoundError>() => {
                info!(?method, ?uri, "{:#}", error);
                Ok(StatusCode::NOT_FOUND.into_response())
            }
            Err(error) if error.is::<MethodNotAllowedError>() => {
                info!(?method, ?uri, "{:#}", error);
                Ok(StatusCode::METHOD_NOT_ALLOWED.into_response())
            }
            Err(error) if error.is::<ReadBodyError>() => {
                info!(?method, ?uri, "{:#}", error);
                Ok(Json(json!({"error": "Invalid data"}))
                    .with_status(StatusCode::BAD_REQUEST)
                    .into_response())
            }
            Err(error) => {
                error!(?method, ?uri, "{:#}", error);
                Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response())
            }
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use poem::test::TestClient;
    use poem::{handler, EndpointExt, Route};

    use super::*;

    #[handler]
    fn body_taken() -> Result<()> {
        Err(ReadBodyError::BodyHasBeenTaken.into())
    }

    #[handler]
    fn broken() -> Result<()> {
        Err(poem::Error::from_string("boom", StatusCode::BAD_GATEWAY))
    }

    fn create_client() -> TestClient<impl Endpoint> {
        TestClient::new(
            Route::new()
                .at("/body", poem::post(body_taken))
                .at("/broken", poem::get(broken))
                .with(ErrorMiddleware),
        )
    }

    #[tokio::test]
    async fn unreadable_body_is_invalid_data() -> crate::prelude::Result {
        let response = create_client().post("/body").body("{}").send().await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(json!({"error": "Invalid data"})).await;
        Ok(())
    }

    #[tokio::test]
    async fn other_errors_are_internal() -> crate::prelude::Result {
        let client = create_client();
        client.get("/broken").send().await.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        client.get("/nope").send().await.assert_status(StatusCode::NOT_FOUND);
        client.get("/body").send().await.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        Ok(())
    }
}
