use crate::config::{StorageConfig, USERS_FILE};
use crate::error::{AppError, AppResult};
use crate::models::eq_ignoring_case;
use crate::store::JsonCollection;
use crate::user_models::User;

/// Users are created at signup and never updated or deleted.
#[derive(Debug)]
pub struct UserRepository {
    users: JsonCollection<User>,
    hash_cost: u32,
}

impl UserRepository {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            users: JsonCollection::new("users", config.collection(USERS_FILE)),
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub async fn create(&self, email: &str, password: &str, name: &str) -> AppResult<User> {
        let mut users = self.users.read_all().await;
        if users.iter().any(|u| eq_ignoring_case(&u.email, email)) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = bcrypt::hash(password, self.hash_cost)
            .map_err(|error| AppError::Internal(format!("failed to hash password: {}", error)))?;
        let user = User::new(email.to_string(), password_hash, name.to_string());

        users.push(user.clone());
        self.users.write_all(&users).await?;
        tracing::info!(user_id = %user.id, "user created");
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        self.users
            .read_all()
            .await
            .into_iter()
            .find(|u| eq_ignoring_case(&u.email, email))
    }

    pub async fn find_by_id(&self, id: &str) -> Option<User> {
        self.users.read_all().await.into_iter().find(|u| u.id == id)
    }

    /// The user when the password matches, `None` otherwise.
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<Option<User>> {
        let Some(user) = self.find_by_email(email).await else {
            return Ok(None);
        };
        let valid = bcrypt::verify(password, &user.password_hash)
            .map_err(|error| AppError::Internal(format!("failed to verify password: {}", error)))?;
        Ok(valid.then_some(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(root: &tempfile::TempDir) -> UserRepository {
        UserRepository::new(&StorageConfig::new(root.path())).with_hash_cost(4 /* bcrypt minimum cost */)
    }

    #[tokio::test]
    async fn email_is_unique_ignoring_case() {
        let root = tempfile::tempdir().expect("temp root");
        let users = repo(&root);
        users.create("Ada@Example.com", "secret1", "Ada").await.expect("create");

        let err = users.create("ada@example.COM", "other12", "Imposter").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(users.find_by_email("ADA@example.com").await.is_some());
    }

    #[tokio::test]
    async fn accented_emails_collide_regardless_of_case() {
        let root = tempfile::tempdir().expect("temp root");
        let users = repo(&root);
        let emile = users.create("Émile@x.io", "secret1", "Émile").await.expect("create");

        let err = users.create("émile@x.io", "secret2", "Copy").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let found = users.find_by_email("ÉMILE@X.IO").await.expect("lookup");
        assert_eq!(found.id, emile.id);
    }

    #[tokio::test]
    async fn password_is_stored_hashed() {
        let root = tempfile::tempdir().expect("temp root");
        let users = repo(&root);
        let user = users.create("ada@example.com", "secret1", "Ada").await.expect("create");

        assert_ne!(user.password_hash, "secret1");
        let raw = std::fs::read_to_string(root.path().join("data").join(USERS_FILE)).expect("raw");
        assert!(!raw.contains("\"secret1\""));
        assert_eq!(users.find_by_id(&user.id).await, Some(user));
    }

    #[tokio::test]
    async fn authenticate_checks_the_password() {
        let root = tempfile::tempdir().expect("temp root");
        let users = repo(&root);
        let user = users.create("ada@example.com", "secret1", "Ada").await.expect("create");

        let ok = users.authenticate("ada@example.com", "secret1").await.expect("verify");
        assert_eq!(ok.map(|u| u.id), Some(user.id));
        assert!(users.authenticate("ada@example.com", "wrong").await.expect("verify").is_none());
        assert!(users.authenticate("nobody@example.com", "secret1").await.expect("verify").is_none());
    }
}
