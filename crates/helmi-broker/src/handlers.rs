//! Open Service Broker API v2 handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use helmi_core::{Catalog, Credential};
use helmi_kube::{LastOperationState, Orchestrator};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{ApiError, Result};

/// Shared handler state
pub type AppState = Arc<Orchestrator>;

// ========== Request / response bodies ==========

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub services: Vec<ServiceEntry>,
}

#[derive(Debug, Serialize)]
pub struct ServiceEntry {
    pub id: String,
    pub name: String,
    pub description: String,
    pub bindable: bool,
    pub plan_updateable: bool,
    pub plans: Vec<PlanEntry>,
}

#[derive(Debug, Serialize)]
pub struct PlanEntry {
    pub id: String,
    pub name: String,
    pub description: String,
    pub free: bool,
    pub bindable: bool,
}

impl From<&Catalog> for CatalogResponse {
    fn from(catalog: &Catalog) -> Self {
        let services = catalog
            .services
            .iter()
            .map(|service| ServiceEntry {
                id: service.id.clone(),
                name: service.name.clone(),
                description: service.description.clone(),
                bindable: true,
                plan_updateable: false,
                plans: service
                    .plans
                    .iter()
                    .map(|plan| PlanEntry {
                        id: plan.id.clone(),
                        name: plan.name.clone(),
                        description: plan.description.clone(),
                        free: true,
                        bindable: true,
                    })
                    .collect(),
            })
            .collect();

        Self { services }
    }
}

/// Body of provision and bind requests
#[derive(Debug, Default, Deserialize)]
pub struct ServiceRequest {
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub plan_id: String,
}

impl ServiceRequest {
    fn validate(self) -> Result<Self> {
        if self.service_id.is_empty() || self.plan_id.is_empty() {
            return Err(ApiError::BadRequest("Invalid Request".to_string()));
        }
        Ok(self)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AsyncQuery {
    #[serde(default)]
    pub accepts_incomplete: Option<String>,
}

impl AsyncQuery {
    fn accepts_incomplete(&self) -> bool {
        self.accepts_incomplete
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

#[derive(Debug, Serialize)]
pub struct LastOperationResponse {
    pub state: LastOperationState,
}

#[derive(Debug, Serialize)]
pub struct BindingResponse {
    pub credentials: BTreeMap<String, Credential>,
}

/// Parse a JSON body, reporting any problem as a bad request
fn parse_body(body: &[u8]) -> Result<ServiceRequest> {
    serde_json::from_slice::<ServiceRequest>(body)
        .map_err(|_| ApiError::BadRequest("Invalid Request".to_string()))?
        .validate()
}

fn accepted_or_ok(accepts_incomplete: bool) -> StatusCode {
    if accepts_incomplete {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    }
}

fn empty() -> Json<Value> {
    Json(json!({}))
}

// ========== Handlers ==========

/// GET /v2/catalog
pub async fn catalog(State(orchestrator): State<AppState>) -> Json<CatalogResponse> {
    Json(CatalogResponse::from(orchestrator.catalog()))
}

/// PUT /v2/service_instances/:instance_id
pub async fn provision(
    State(orchestrator): State<AppState>,
    Path(instance_id): Path<String>,
    Query(query): Query<AsyncQuery>,
    body: axum::body::Bytes,
) -> Result<(StatusCode, Json<Value>)> {
    let request = parse_body(&body)?;
    let accepts_incomplete = query.accepts_incomplete();

    orchestrator
        .install(
            &request.service_id,
            &request.plan_id,
            &instance_id,
            accepts_incomplete,
        )
        .await?;

    Ok((accepted_or_ok(accepts_incomplete), empty()))
}

/// DELETE /v2/service_instances/:instance_id
pub async fn deprovision(
    State(orchestrator): State<AppState>,
    Path(instance_id): Path<String>,
    Query(query): Query<AsyncQuery>,
) -> Result<(StatusCode, Json<Value>)> {
    orchestrator.delete(&instance_id).await?;
    Ok((accepted_or_ok(query.accepts_incomplete()), empty()))
}

/// GET /v2/service_instances/:instance_id/last_operation
pub async fn last_operation(
    State(orchestrator): State<AppState>,
    Path(instance_id): Path<String>,
) -> Result<Json<LastOperationResponse>> {
    let instance = orchestrator.status(&instance_id).await?;
    Ok(Json(LastOperationResponse {
        state: instance.state(),
    }))
}

/// PUT /v2/service_instances/:instance_id/service_bindings/:binding_id
pub async fn bind(
    State(orchestrator): State<AppState>,
    Path((instance_id, binding_id)): Path<(String, String)>,
    body: axum::body::Bytes,
) -> Result<Json<BindingResponse>> {
    let request = parse_body(&body)?;

    let credentials = orchestrator
        .credentials(&request.service_id, &request.plan_id, &instance_id)
        .await?;

    tracing::info!(%instance_id, %binding_id, "binding created");
    Ok(Json(BindingResponse { credentials }))
}

/// DELETE /v2/service_instances/:instance_id/service_bindings/:binding_id
pub async fn unbind(
    State(orchestrator): State<AppState>,
    Path((instance_id, binding_id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    orchestrator.unbind(&instance_id).await?;

    tracing::info!(%instance_id, %binding_id, "binding removed");
    Ok(empty())
}

/// GET /liveness
pub async fn liveness() -> Json<Value> {
    empty()
}
