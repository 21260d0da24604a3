// HTTP handler for wallet reads

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::ApiError;
use crate::store::RideStore;
use crate::wallet::WalletResponse;
use crate::AppState;

/// Handler for GET /api/wallets/:user_id
/// Returns the wallet balance together with its ledger history
#[utoipa::path(
    get,
    path = "/api/wallets/{user_id}",
    params(
        ("user_id" = i32, Path, description = "Wallet owner")
    ),
    responses(
        (status = 200, description = "Wallet balance and ledger", body = WalletResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "wallets"
)]
pub async fn get_wallet_handler(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<Json<WalletResponse>, ApiError> {
    tracing::debug!("Fetching wallet for user {}", user_id);

    let balance = state.store.wallet_balance(user_id).await?;
    let history = state.store.wallet_history(user_id).await?;

    Ok(Json(WalletResponse {
        user_id,
        balance,
        history,
    }))
}
