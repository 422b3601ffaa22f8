use super::DatabasePool;
use chrono::Utc;
use uuid::Uuid;

impl DatabasePool {
    /// Adding an asset that is already watched is a no-op.
    pub async fn add_to_watchlist(&self, user_id: Uuid, crypto_id: &str) -> rusqlite::Result<()> {
        let conn = self.0.lock().await;
        conn.execute(
            "INSERT INTO watchlists (id, user_id, crypto_id, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id, crypto_id) DO NOTHING",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                user_id.to_string(),
                crypto_id,
                Utc::now()
            ],
        )?;
        Ok(())
    }

    pub async fn remove_from_watchlist(
        &self,
        user_id: Uuid,
        crypto_id: &str,
    ) -> rusqlite::Result<()> {
        let conn = self.0.lock().await;
        conn.execute(
            "DELETE FROM watchlists WHERE user_id = ?1 AND crypto_id = ?2",
            [user_id.to_string(), crypto_id.to_string()],
        )?;
        Ok(())
    }

    pub async fn list_watchlist(&self, user_id: Uuid) -> rusqlite::Result<Vec<String>> {
        let conn = self.0.lock().await;
        let mut stmt = conn.prepare(
            "SELECT crypto_id FROM watchlists WHERE user_id = ?1 ORDER BY created_at, rowid",
        )?;
        let ids = stmt
            .query_map([user_id.to_string()], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}
