use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WalletEntryType {
    Credit,
    Debit,
}

/// A user's wallet balance
///
/// Mutated only through ledger entries created in the same transaction as
/// the balance update, so the balance always equals the signed sum of its
/// history and never goes negative.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    pub user_id: i32,
    pub balance: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Immutable record of a single wallet balance change, linked back to the
/// ride that triggered it
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct WalletHistory {
    pub id: i32,
    pub user_id: i32,
    pub ride_id: Option<Uuid>,
    pub entry_type: WalletEntryType,
    pub amount: Decimal,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WalletHistory {
    /// Amount signed by entry type: credits add, debits subtract
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_type {
            WalletEntryType::Credit => self.amount,
            WalletEntryType::Debit => -self.amount,
        }
    }
}

/// Response DTO for the wallet read endpoint
#[derive(Debug, Serialize, ToSchema)]
pub struct WalletResponse {
    pub user_id: i32,
    pub balance: Decimal,
    pub history: Vec<WalletHistory>,
}
