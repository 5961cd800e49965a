use http::header::{CONTENT_TYPE, HeaderValue};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioExecutor;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;

pub async fn run_http_service<S, E>(host: &str, port: u16, service: S) -> Result<(), E>
where
    S: Service<Request<Incoming>, Response = Response<BoxBody<Bytes, E>>, Error = E>
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
    E: From<std::io::Error> + std::error::Error + Send + Sync + 'static,
{
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    tracing::info!(host, port, "listening");
    let service_arc = Arc::new(service);

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let _ = stream.set_nodelay(true);
        let io = TokioIo::new(stream);
        let svc = service_arc.clone();

        // Hand the connection to hyper; auto-detect h1/h2 on this socket
        tokio::spawn(async move {
            if let Err(err) = Builder::new(TokioExecutor::new())
                .serve_connection(io, svc)
                .await
            {
                tracing::debug!(peer = %peer_addr, error = %err, "connection closed with error");
            }
        });
    }
}

/// Wraps a fully buffered payload into a boxed body of any error type.
pub fn full_body<E>(bytes: impl Into<Bytes>) -> BoxBody<Bytes, E> {
    Full::new(bytes.into()).map_err(|e| match e {}).boxed()
}

/// Plain text response carrying the canonical reason of the status code.
pub fn make_error_response<E>(status_code: StatusCode) -> Response<BoxBody<Bytes, E>> {
    let message = status_code
        .canonical_reason()
        .unwrap_or("an error occurred");

    let mut response = Response::new(full_body(message));
    *response.status_mut() = status_code;
    response
}

/// Serializes `value` as the JSON body of a response.
///
/// Falls back to a bare 500 if the value cannot be serialized.
pub fn json_response<E, T: Serialize>(
    status_code: StatusCode,
    value: &T,
) -> Response<BoxBody<Bytes, E>> {
    match serde_json::to_vec(value) {
        Ok(bytes) => with_content_type(status_code, bytes, "application/json"),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize response body");
            make_error_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub fn html_response<E>(status_code: StatusCode, html: String) -> Response<BoxBody<Bytes, E>> {
    with_content_type(status_code, html, "text/html; charset=utf-8")
}

fn with_content_type<E>(
    status_code: StatusCode,
    bytes: impl Into<Bytes>,
    content_type: &'static str,
) -> Response<BoxBody<Bytes, E>> {
    let mut response = Response::new(full_body(bytes));
    *response.status_mut() = status_code;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    async fn body_string(response: Response<BoxBody<Bytes, Infallible>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_error_response_uses_reason() {
        let response = make_error_response::<Infallible>(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_string(response).await, "Service Unavailable");
    }

    #[tokio::test]
    async fn test_json_response() {
        let response =
            json_response::<Infallible, _>(StatusCode::OK, &serde_json::json!({"ok": true}));
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(body_string(response).await, r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_html_response() {
        let response = html_response::<Infallible>(StatusCode::OK, "<p>hi</p>".to_string());
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
        assert_eq!(body_string(response).await, "<p>hi</p>");
    }
}
