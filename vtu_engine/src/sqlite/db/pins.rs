use sqlx::SqliteConnection;

use crate::{
    db_types::{NewRechargePin, RechargePin},
    traits::LedgerError,
};

/// Store the pins delivered for a pin-printing transaction. Pins are immutable once written.
pub async fn insert_pins(
    transaction_id: i64,
    pins: &[NewRechargePin],
    conn: &mut SqliteConnection,
) -> Result<Vec<RechargePin>, LedgerError> {
    let mut stored = Vec::with_capacity(pins.len());
    for pin in pins {
        let row = sqlx::query_as(
            r#"
                INSERT INTO recharge_pins (transaction_id, network, denomination, pin, serial)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *;
            "#,
        )
        .bind(transaction_id)
        .bind(&pin.network)
        .bind(pin.denomination)
        .bind(&pin.pin)
        .bind(&pin.serial)
        .fetch_one(&mut *conn)
        .await?;
        stored.push(row);
    }
    Ok(stored)
}

pub async fn fetch_pins(transaction_id: i64, conn: &mut SqliteConnection) -> Result<Vec<RechargePin>, LedgerError> {
    let pins = sqlx::query_as("SELECT * FROM recharge_pins WHERE transaction_id = $1 ORDER BY id ASC")
        .bind(transaction_id)
        .fetch_all(conn)
        .await?;
    Ok(pins)
}
