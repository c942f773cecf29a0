//! Shipment Feed
//!
//! Stands in for the carrier/warehouse telemetry system the orchestrator's
//! `query_shipment` tool polls over HTTP. Bit-exact wire shapes for the
//! externally-visible endpoints; everything else (dashboard, admin toggle)
//! is free-form.

mod store;

use askama::Template;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use store::{ShipmentRecord, ShipmentStore};
use warp::http::{Method, StatusCode};
use warp::{Filter, Rejection, Reply};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdsField {
    One(String),
    Many(Vec<String>),
}

impl IdsField {
    fn into_vec(self) -> Vec<String> {
        match self {
            IdsField::One(id) => vec![id],
            IdsField::Many(ids) => ids,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    ids: IdsField,
}

#[derive(Debug, Serialize)]
struct QueryResponse {
    details: Vec<ShipmentRecord>,
}

#[derive(Debug, Deserialize)]
struct AddForm {
    id: String,
    status: String,
    location: String,
    notes: String,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    shipments: Vec<ShipmentRecord>,
    auto_add: bool,
}

#[derive(Debug)]
struct TemplateRenderError(String);
impl warp::reject::Reject for TemplateRenderError {}

async fn health_handler() -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&serde_json::json!({"status": "ok"})))
}

async fn query_handler(
    store: Arc<ShipmentStore>,
    req: QueryRequest,
) -> Result<impl Reply, Infallible> {
    let ids = req.ids.into_vec();
    let details = store.query_many(&ids);
    Ok(warp::reply::json(&QueryResponse { details }))
}

async fn add_handler(
    store: Arc<ShipmentStore>,
    form: AddForm,
) -> Result<impl Reply, Infallible> {
    store.add(form.id, form.status, form.location, form.notes);
    Ok(redirect_to_root())
}

async fn toggle_autoadd_handler(store: Arc<ShipmentStore>) -> Result<impl Reply, Infallible> {
    let enabled = store.toggle_auto_add();
    tracing::info!(enabled, "toggled auto-add");
    Ok(redirect_to_root())
}

fn redirect_to_root() -> warp::reply::WithStatus<warp::reply::WithHeader<&'static str>> {
    warp::reply::with_status(
        warp::reply::with_header("", "Location", "/"),
        StatusCode::SEE_OTHER,
    )
}

async fn dashboard_handler(store: Arc<ShipmentStore>) -> Result<impl Reply, Rejection> {
    let template = DashboardTemplate {
        shipments: store.all(),
        auto_add: store.auto_add_enabled(),
    };
    let body = template
        .render()
        .map_err(|e| warp::reject::custom(TemplateRenderError(e.to_string())))?;
    Ok(warp::reply::html(body))
}

fn with_store(
    store: Arc<ShipmentStore>,
) -> impl Filter<Extract = (Arc<ShipmentStore>,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

fn create_cors_filter() -> warp::cors::Builder {
    warp::cors()
        .allow_any_origin()
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(vec!["content-type"])
}

async fn handle_rejection(rej: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(err) = rej.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("invalid request body: {err}"))
    } else if let Some(err) = rej.find::<TemplateRenderError>() {
        tracing::error!(error = %err.0, "dashboard render failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
    } else if rej.is_not_found() {
        (StatusCode::NOT_FOUND, "endpoint not found".to_string())
    } else if rej.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        tracing::error!(?rej, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({ "error": message })),
        status,
    ))
}

fn create_routes(
    store: Arc<ShipmentStore>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let health = warp::path("health")
        .and(warp::get())
        .and_then(health_handler);

    let query = warp::path("query")
        .and(warp::post())
        .and(with_store(store.clone()))
        .and(warp::body::json())
        .and_then(query_handler);

    let add = warp::path("add")
        .and(warp::post())
        .and(with_store(store.clone()))
        .and(warp::body::form())
        .and_then(add_handler);

    let toggle_autoadd = warp::path("toggle_autoadd")
        .and(warp::post())
        .and(with_store(store.clone()))
        .and_then(toggle_autoadd_handler);

    let dashboard = warp::path::end()
        .and(warp::get())
        .and(with_store(store))
        .and_then(dashboard_handler);

    health
        .or(query)
        .or(add)
        .or(toggle_autoadd)
        .or(dashboard)
        .with(create_cors_filter())
        .recover(handle_rejection)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let store = Arc::new(ShipmentStore::new());
    let routes = create_routes(store);

    let addr: std::net::SocketAddr = std::env::var("SHIPMENT_FEED_BIND")
        .unwrap_or_else(|_| "127.0.0.1:8000".to_string())
        .parse()
        .expect("SHIPMENT_FEED_BIND must be a valid socket address");

    tracing::info!(%addr, "starting shipment feed");
    warp::serve(routes).run(addr).await;
}
