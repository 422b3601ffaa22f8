use super::{decimal_column, uuid_column, DatabasePool};
use crate::models::Holding;
use chrono::Utc;
use rusqlite::{OptionalExtension, Row};
use rust_decimal::Decimal;
use uuid::Uuid;

fn map_holding(row: &Row<'_>) -> rusqlite::Result<Holding> {
    Ok(Holding {
        id: uuid_column(row, 0)?,
        user_id: uuid_column(row, 1)?,
        crypto_id: row.get(2)?,
        quantity: decimal_column(row, 3)?,
    })
}

impl DatabasePool {
    pub async fn get_holding(
        &self,
        user_id: Uuid,
        crypto_id: &str,
    ) -> rusqlite::Result<Option<Holding>> {
        let conn = self.0.lock().await;
        conn.query_row(
            "SELECT id, user_id, crypto_id, quantity FROM portfolios
             WHERE user_id = ?1 AND crypto_id = ?2",
            [user_id.to_string(), crypto_id.to_string()],
            map_holding,
        )
        .optional()
    }

    /// Open positions of a user, i.e. holdings with a positive quantity.
    pub async fn list_holdings(&self, user_id: Uuid) -> rusqlite::Result<Vec<Holding>> {
        let conn = self.0.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, crypto_id, quantity FROM portfolios
             WHERE user_id = ?1
             ORDER BY crypto_id",
        )?;

        let holdings = stmt
            .query_map([user_id.to_string()], map_holding)?
            .collect::<Result<Vec<_>, _>>()?;

        // quantity is TEXT, so the positivity filter cannot live in SQL
        Ok(holdings
            .into_iter()
            .filter(|h| h.quantity > Decimal::ZERO)
            .collect())
    }

    pub async fn create_holding(&self, holding: &Holding) -> rusqlite::Result<()> {
        let conn = self.0.lock().await;
        conn.execute(
            "INSERT INTO portfolios (id, user_id, crypto_id, quantity, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                holding.id.to_string(),
                holding.user_id.to_string(),
                &holding.crypto_id,
                holding.quantity.to_string(),
                Utc::now()
            ],
        )?;
        Ok(())
    }

    /// Returns the number of rows touched, 0 when the holding does not exist.
    pub async fn update_holding_quantity(
        &self,
        holding_id: Uuid,
        quantity: Decimal,
    ) -> rusqlite::Result<usize> {
        let conn = self.0.lock().await;
        conn.execute(
            "UPDATE portfolios SET quantity = ?1 WHERE id = ?2",
            [quantity.to_string(), holding_id.to_string()],
        )
    }

    pub async fn delete_holding(&self, holding_id: Uuid) -> rusqlite::Result<usize> {
        let conn = self.0.lock().await;
        conn.execute(
            "DELETE FROM portfolios WHERE id = ?1",
            [holding_id.to_string()],
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{is_constraint_violation, DatabasePool, Schema};
    use crate::models::Holding;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn holding(user_id: Uuid, crypto_id: &str, quantity: &str) -> Holding {
        Holding {
            id: Uuid::new_v4(),
            user_id,
            crypto_id: crypto_id.to_string(),
            quantity: quantity.parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn quantities_survive_storage_exactly() {
        let pool = DatabasePool::open_in_memory(Schema::Portfolio).unwrap();
        let user = Uuid::new_v4();
        let btc = holding(user, "bitcoin", "0.123456789012345678");
        pool.create_holding(&btc).await.unwrap();

        let stored = pool.get_holding(user, "bitcoin").await.unwrap().unwrap();
        assert_eq!(stored, btc);
    }

    #[tokio::test]
    async fn listing_skips_empty_positions_and_other_users() {
        let pool = DatabasePool::open_in_memory(Schema::Portfolio).unwrap();
        let user = Uuid::new_v4();
        pool.create_holding(&holding(user, "solana", "3")).await.unwrap();
        pool.create_holding(&holding(user, "bitcoin", "0")).await.unwrap();
        pool.create_holding(&holding(Uuid::new_v4(), "ethereum", "1"))
            .await
            .unwrap();

        let listed = pool.list_holdings(user).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].crypto_id, "solana");
    }

    #[tokio::test]
    async fn update_and_delete_report_touched_rows() {
        let pool = DatabasePool::open_in_memory(Schema::Portfolio).unwrap();
        let user = Uuid::new_v4();
        let eth = holding(user, "ethereum", "1");
        pool.create_holding(&eth).await.unwrap();

        let two: Decimal = "2".parse().unwrap();
        assert_eq!(pool.update_holding_quantity(eth.id, two).await.unwrap(), 1);
        assert_eq!(
            pool.get_holding(user, "ethereum").await.unwrap().unwrap().quantity,
            two
        );
        assert_eq!(
            pool.update_holding_quantity(Uuid::new_v4(), two).await.unwrap(),
            0
        );

        assert_eq!(pool.delete_holding(eth.id).await.unwrap(), 1);
        assert_eq!(pool.delete_holding(eth.id).await.unwrap(), 0);
        assert!(pool.get_holding(user, "ethereum").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn one_holding_per_user_and_asset() {
        let pool = DatabasePool::open_in_memory(Schema::Portfolio).unwrap();
        let user = Uuid::new_v4();
        pool.create_holding(&holding(user, "bitcoin", "1")).await.unwrap();

        let err = pool
            .create_holding(&holding(user, "bitcoin", "2"))
            .await
            .unwrap_err();
        assert!(is_constraint_violation(&err));
    }
}
