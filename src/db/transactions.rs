use super::{decimal_column, uuid_column, DatabasePool};
use crate::models::{Transaction, TransactionSide};
use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

fn map_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let side: String = row.get(2)?;
    let side = side
        .parse::<TransactionSide>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(Transaction {
        id: uuid_column(row, 0)?,
        holding_id: uuid_column(row, 1)?,
        side,
        quantity: decimal_column(row, 3)?,
        price_eur: decimal_column(row, 4)?,
        created_at: row.get(5)?,
    })
}

impl DatabasePool {
    /// Appends a ledger entry. Entries are never updated or deleted.
    pub async fn insert_transaction(&self, tx: &Transaction) -> rusqlite::Result<()> {
        let conn = self.0.lock().await;
        conn.execute(
            "INSERT INTO transactions (id, portfolio_id, type, quantity, price_eur, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                tx.id.to_string(),
                tx.holding_id.to_string(),
                tx.side.to_string(),
                tx.quantity.to_string(),
                tx.price_eur.to_string(),
                tx.created_at
            ],
        )?;
        Ok(())
    }

    /// Ledger of one holding, newest first.
    pub async fn list_transactions(&self, holding_id: Uuid) -> rusqlite::Result<Vec<Transaction>> {
        let conn = self.0.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, portfolio_id, type, quantity, price_eur, created_at
             FROM transactions
             WHERE portfolio_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;

        let transactions = stmt
            .query_map([holding_id.to_string()], map_transaction)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(transactions)
    }
}
