use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::RepositoryError;
use super::models::{NewUser, User};

#[derive(Clone, Debug)]
pub struct UserRepository {
    pool: SqlitePool,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let email = normalize_email(&user.email);
        log::info!("Creating user: {}", email);

        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, name, email, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.name.trim())
        .bind(&email)
        .bind(&user.password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(created) => Ok(created),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                log::warn!("Registration rejected, email already in use: {}", email);
                Err(RepositoryError::EmailTaken)
            }
            Err(e) => {
                log::error!("Failed to create user {}: {:?}", email, e);
                Err(e.into())
            }
        }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, created_at FROM users WHERE email = ?",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        log::info!("Password updated for user {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: " Rina Putri ".into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[actix_web::test]
    async fn create_and_look_up() {
        let users = UserRepository::new(connect("sqlite::memory:").await.unwrap());
        let created = users.create(&new_user("Rina@Example.com ")).await.unwrap();
        assert_eq!(created.email, "rina@example.com");
        assert_eq!(created.name, "Rina Putri");

        let by_email = users.find_by_email("RINA@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        let by_id = users.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, created.email);
        assert!(users.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn duplicate_email_is_rejected() {
        let users = UserRepository::new(connect("sqlite::memory:").await.unwrap());
        users.create(&new_user("a@example.com")).await.unwrap();
        assert!(matches!(
            users.create(&new_user("A@EXAMPLE.COM")).await,
            Err(RepositoryError::EmailTaken)
        ));
    }

    #[actix_web::test]
    async fn only_the_password_changes() {
        let users = UserRepository::new(connect("sqlite::memory:").await.unwrap());
        let created = users.create(&new_user("a@example.com")).await.unwrap();
        users.update_password(created.id, "new-hash").await.unwrap();

        let reloaded = users.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(reloaded.password_hash, "new-hash");
        assert_eq!(reloaded.email, created.email);
        assert!(matches!(
            users.update_password(Uuid::new_v4(), "x").await,
            Err(RepositoryError::NotFound)
        ));
    }
}
