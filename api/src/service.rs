use crate::endpoints::{Endpoint, Reply, RequestContext, handle};
use crate::errors::{ApiError, GatewayError};
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::query::QueryParams;
use chrono::{NaiveDate, Utc};
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use routing::{Resolution, RouteActions};
use shared::http::{html_response, json_response};
use shared::{gauge, histogram};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use upstream::Session;

const API_KEY_HEADER: &str = "x-api-key";
const API_KEY_PARAM: &str = "apiKey";

pub type GatewayResponse = Response<BoxBody<Bytes, GatewayError>>;

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

/// The public JSON API.
#[derive(Clone)]
pub struct GatewayService {
    inner: Arc<Inner>,
}

struct Inner {
    session: Arc<Session>,
    routes: RouteActions<Endpoint>,
    api_key: Option<String>,
    today: fn() -> NaiveDate,
}

impl GatewayService {
    /// An empty or missing `api_key` disables the key check.
    pub fn new(session: Arc<Session>, api_key: Option<String>) -> Self {
        Self::with_clock(session, api_key, utc_today)
    }

    pub fn with_clock(
        session: Arc<Session>,
        api_key: Option<String>,
        today: fn() -> NaiveDate,
    ) -> Self {
        GatewayService {
            inner: Arc::new(Inner {
                session,
                routes: Endpoint::routes(),
                api_key: api_key.filter(|key| !key.is_empty()),
                today,
            }),
        }
    }

    /// Answers one request. Every failure is turned into a JSON error body.
    pub async fn respond<B>(&self, req: &Request<B>) -> GatewayResponse {
        let started = Instant::now();
        gauge!(REQUESTS_INFLIGHT).increment(1.0);

        let (endpoint, result) = self.dispatch(req).await;
        let response = match result {
            Ok(Reply::Json(body)) => json_response(StatusCode::OK, &body),
            Ok(Reply::Html(html)) => html_response(StatusCode::OK, html),
            Err(e) => error_response(req, &e),
        };

        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
        histogram!(
            REQUEST_DURATION,
            "endpoint" => endpoint.map_or("unmatched", |e| e.name()),
            "status" => response.status().as_u16().to_string()
        )
        .record(started.elapsed().as_secs_f64());

        response
    }

    async fn dispatch<B>(&self, req: &Request<B>) -> (Option<Endpoint>, Result<Reply, ApiError>) {
        let query = QueryParams::parse(req.uri().query());
        if !self.is_authorized(req, &query) {
            return (None, Err(ApiError::Unauthorized));
        }

        let route_match = match self.inner.routes.resolve(req.method(), req.uri().path()) {
            Resolution::Matched(route_match) => route_match,
            Resolution::MethodNotAllowed => return (None, Err(ApiError::MethodNotAllowed)),
            Resolution::NotFound => return (None, Err(ApiError::NotFound)),
        };

        let endpoint = *route_match.action;
        tracing::debug!(endpoint = endpoint.name(), "matched route");

        let context = RequestContext {
            params: route_match.params,
            query,
            today: (self.inner.today)(),
        };
        let result = handle(endpoint, &self.inner.session, &context).await;
        (Some(endpoint), result)
    }

    fn is_authorized<B>(&self, req: &Request<B>, query: &QueryParams) -> bool {
        let Some(expected) = self.inner.api_key.as_deref() else {
            return true;
        };

        let header = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());
        header == Some(expected) || query.get(API_KEY_PARAM) == Some(expected)
    }
}

fn error_response<B>(req: &Request<B>, error: &ApiError) -> GatewayResponse {
    let status = error.status();
    if status.is_server_error() {
        tracing::error!(path = req.uri().path(), error = %error, "request failed");
    } else {
        tracing::debug!(path = req.uri().path(), status = status.as_u16(), "request rejected");
    }
    json_response(status, &error.body())
}

impl Service<Request<Incoming>> for GatewayService {
    type Response = GatewayResponse;
    type Error = GatewayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        // Every endpoint is a GET, the body is never read.
        let (parts, _body) = req.into_parts();
        let req = Request::from_parts(parts, ());
        Box::pin(async move { Ok(service.respond(&req).await) })
    }
}
