//! Versus workflow commands.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use hedgelink_core::{Side, VersusId};
use hedgelink_versus::VersusSpec;

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::CreateVersusRequest;

pub async fn list_versus(State(state): State<AppState>) -> Json<Value> {
    let records = state.versus_store.all();
    Json(json!({ "versus_list": records, "count": records.len() }))
}

pub async fn feature_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "enabled": state.settings.versus_enabled }))
}

/// Create a new pending Versus. Validation happens before any agent could
/// be contacted; a rejected request has no side effects at all.
pub async fn create_versus(
    State(state): State<AppState>,
    Json(request): Json<CreateVersusRequest>,
) -> Result<Json<Value>, ApiError> {
    let side: Side = request.side.parse()?;
    let record = state.engine.create(VersusSpec {
        account_a: request.account_a,
        account_b: request.account_b,
        symbol: request.symbol,
        lots: request.lots,
        side,
        tp_usd_a: request.tp_usd_a,
        sl_usd_a: request.sl_usd_a,
        tp_usd_b: request.tp_usd_b,
        sl_usd_b: request.sl_usd_b,
        scheduled_congelar: request.scheduled_congelar,
        scheduled_transferir: request.scheduled_transferir,
    })?;
    Ok(Json(json!({ "status": "success", "versus": record })))
}

pub async fn delete_versus(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = VersusId::from(id);
    state.engine.delete(&id)?;
    Ok(Json(json!({
        "status": "success",
        "message": format!("Versus {id} deleted"),
    })))
}

/// Step 1 now, regardless of any schedule on the record.
pub async fn congelar(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = VersusId::from(id);
    let record = state.engine.congelar(&id).await?;
    let tickets = record.tickets_a.clone();
    Ok(Json(json!({
        "status": "success",
        "message": "Congelado: BUY and SELL opened on account A",
        "versus": record,
        "tickets": tickets,
    })))
}

/// Step 2 now.
pub async fn transferir(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = VersusId::from(id);
    let record = state.engine.transferir(&id).await?;
    let message = format!(
        "Transferido: account A keeps 1 {} leg, account B holds 2 {} legs",
        record.side,
        record.side.opposite(),
    );
    let ticket_a = record.tickets_a.first().copied();
    let tickets_b = record.tickets_b.clone();
    Ok(Json(json!({
        "status": "success",
        "message": message,
        "versus": record,
        "account_a_ticket": ticket_a,
        "account_b_tickets": tickets_b,
    })))
}
