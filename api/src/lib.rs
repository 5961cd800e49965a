//! JSON API over a school gradebook.
//!
//! Upstream records come in many shapes. The normalizers in [`grades`],
//! [`homework`], [`messages`] and [`timetable`] fold them into one stable
//! schema; [`service`] exposes the result over HTTP.

pub mod config;
pub mod dates;
pub mod endpoints;
pub mod errors;
pub mod feed;
pub mod fields;
pub mod grades;
pub mod homework;
pub mod messages;
mod metrics_defs;
pub mod outcome;
pub mod query;
pub mod service;
pub mod timetable;

pub use errors::GatewayError;
pub use metrics_defs::ALL_METRICS;

use service::GatewayService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;
use upstream::Session;
use upstream::http_client::HttpGradebook;

pub async fn run(config: config::Config) -> Result<(), GatewayError> {
    let client = HttpGradebook::new(&config.upstream.base_url, config.upstream.timeout())?
        .with_capabilities(config.upstream.capabilities);
    let session = Arc::new(Session::new(
        Arc::new(client),
        config.credentials.clone(),
        config.student_index,
    ));

    if let Err(e) = session.ensure_authenticated().await {
        tracing::warn!(error = %e, "initial gradebook login failed, retrying on first request");
    }

    let gateway = GatewayService::new(session.clone(), config.api_key.clone());
    let gateway_task = run_http_service(&config.listener.host, config.listener.port, gateway);

    match &config.admin_listener {
        Some(admin_listener) => {
            let admin_service =
                AdminService::<_, GatewayError>::new(move || session.is_authenticated());
            let admin_task =
                run_http_service(&admin_listener.host, admin_listener.port, admin_service);
            tokio::try_join!(gateway_task, admin_task)?;
        }
        None => gateway_task.await?,
    }

    Ok(())
}
