use super::{uuid_column, DatabasePool};
use crate::models::User;
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_column(row, 0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
    })
}

impl DatabasePool {
    pub async fn get_user_by_email(&self, email: &str) -> rusqlite::Result<Option<User>> {
        let conn = self.0.lock().await;
        conn.query_row(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = ?1",
            [email],
            map_user,
        )
        .optional()
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> rusqlite::Result<Option<User>> {
        let conn = self.0.lock().await;
        conn.query_row(
            "SELECT id, email, password_hash, created_at FROM users WHERE id = ?1",
            [id.to_string()],
            map_user,
        )
        .optional()
    }

    pub async fn email_exists(&self, email: &str) -> rusqlite::Result<bool> {
        let conn = self.0.lock().await;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM users WHERE email = ?1", [email], |row| {
                row.get(0)
            })?;
        Ok(count > 0)
    }

    pub async fn create_user(&self, user: &User) -> rusqlite::Result<()> {
        let conn = self.0.lock().await;
        conn.execute(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                user.id.to_string(),
                &user.email,
                &user.password_hash,
                user.created_at
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{is_constraint_violation, DatabasePool, Schema};
    use crate::models::User;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: "$2b$04$not-a-real-hash".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn users_are_found_by_email_regardless_of_case() {
        let pool = DatabasePool::open_in_memory(Schema::Accounts).unwrap();
        let alice = user("alice@example.com");
        pool.create_user(&alice).await.unwrap();

        let found = pool.get_user_by_email("ALICE@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, alice.id);
        assert!(pool.email_exists("Alice@Example.com").await.unwrap());

        let by_id = pool.get_user_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "alice@example.com");
    }

    #[tokio::test]
    async fn duplicate_emails_violate_the_unique_constraint() {
        let pool = DatabasePool::open_in_memory(Schema::Accounts).unwrap();
        pool.create_user(&user("bob@example.com")).await.unwrap();

        let err = pool.create_user(&user("BOB@example.com")).await.unwrap_err();
        assert!(is_constraint_violation(&err));
    }

    #[tokio::test]
    async fn unknown_users_are_none() {
        let pool = DatabasePool::open_in_memory(Schema::Accounts).unwrap();
        assert!(pool.get_user_by_email("nobody@example.com").await.unwrap().is_none());
        assert!(pool.get_user_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }
}
