use tracing::info;

use crate::data::entity_repository::EntityRepository;
use crate::domain::error::DomainError;
use crate::domain::user::{NewUserRequest, Role, User};

pub struct UserService {
    users: EntityRepository<User>,
}

impl UserService {
    pub(crate) fn new(users: EntityRepository<User>) -> Self {
        Self { users }
    }

    /// Email and username are unique, case-insensitively. The check runs
    /// inside the same guarded write as the append.
    pub async fn register_user(&self, req: NewUserRequest) -> Result<User, DomainError> {
        let req = req.validate()?;
        let user = self
            .users
            .create_checked(
                |id, now| User::new(id, req, now),
                |existing, new| {
                    if existing.iter().any(|u| u.has_email(&new.email)) {
                        return Err(DomainError::AlreadyExists(format!("email {}", new.email)));
                    }
                    if existing.iter().any(|u| u.has_username(&new.username)) {
                        return Err(DomainError::AlreadyExists(format!(
                            "username {}",
                            new.username
                        )));
                    }
                    Ok(())
                },
            )
            .await?;
        info!(user_id = %user.id, role = ?user.role, "user registered");
        Ok(user)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, DomainError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("user", user_id))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        self.users.find(|u| u.has_email(email)).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>, DomainError> {
        self.users.list().await
    }

    pub async fn touch_last_active(&self, user_id: &str) -> Result<User, DomainError> {
        let now = self.users.now();
        self.users
            .update(user_id, |user| {
                user.last_active = Some(now);
                Ok(())
            })
            .await?
            .ok_or_else(|| DomainError::not_found("user", user_id))
    }

    /// Deactivated users keep their id, so ledgers and content still resolve.
    pub async fn set_user_active(
        &self,
        actor_email: &str,
        user_id: &str,
        active: bool,
    ) -> Result<User, DomainError> {
        self.require_admin(actor_email).await?;
        self.users
            .update(user_id, |user| {
                if !active && user.has_email(actor_email) {
                    return Err(DomainError::Conflict(
                        "admins cannot deactivate themselves".to_string(),
                    ));
                }
                user.is_active = active;
                Ok(())
            })
            .await?
            .ok_or_else(|| DomainError::not_found("user", user_id))
    }

    pub async fn set_user_role(
        &self,
        actor_email: &str,
        user_id: &str,
        role: Role,
    ) -> Result<User, DomainError> {
        self.require_admin(actor_email).await?;
        let user = self
            .users
            .update(user_id, |user| {
                user.role = role;
                Ok(())
            })
            .await?
            .ok_or_else(|| DomainError::not_found("user", user_id))?;
        info!(user_id, role = ?role, "role changed");
        Ok(user)
    }

    async fn require_admin(&self, actor_email: &str) -> Result<(), DomainError> {
        match self.find_by_email(actor_email).await? {
            Some(user) if user.is_active && user.is_admin() => Ok(()),
            _ => Err(DomainError::Forbidden),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::error::DomainError;
    use crate::domain::user::{NewUserRequest, Role};
    use crate::test_support::{ADMIN_EMAIL, test_forum};

    fn request(username: &str, email: &str) -> NewUserRequest {
        NewUserRequest {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn register_normalizes_and_enforces_uniqueness() {
        let forum = test_forum().await;
        let users = forum.forum.users();

        let user = users
            .register_user(request("  dana  ", "  DANA@Example.com "))
            .await
            .expect("register");
        assert_eq!(user.username, "dana");
        assert_eq!(user.email, "dana@example.com");
        assert!(user.id.starts_with("user-"));

        let same_email = users.register_user(request("other", "dana@EXAMPLE.com")).await;
        assert!(matches!(same_email, Err(DomainError::AlreadyExists(_))));
        let same_name = users.register_user(request("DANA", "x@example.com")).await;
        assert!(matches!(same_name, Err(DomainError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn invalid_registration_is_rejected() {
        let forum = test_forum().await;
        let err = forum
            .forum
            .users()
            .register_user(request("ab", "not-an-email"))
            .await
            .expect_err("invalid");
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[tokio::test]
    async fn admin_manages_roles_and_activation() {
        let forum = test_forum().await;
        let users = forum.forum.users();
        let erin = forum.register("erin").await;

        let err = users
            .set_user_role(&erin.email, &erin.id, Role::Admin)
            .await
            .expect_err("members cannot promote");
        assert!(matches!(err, DomainError::Forbidden));

        let promoted = users
            .set_user_role(ADMIN_EMAIL, &erin.id, Role::Moderator)
            .await
            .expect("promote");
        assert!(promoted.is_staff());

        let deactivated = users
            .set_user_active(ADMIN_EMAIL, &erin.id, false)
            .await
            .expect("deactivate");
        assert!(!deactivated.is_active);

        let admin = users.find_by_email(ADMIN_EMAIL).await.expect("find").expect("seeded");
        let err = users
            .set_user_active(ADMIN_EMAIL, &admin.id, false)
            .await
            .expect_err("self deactivation");
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn touch_records_last_activity() {
        let forum = test_forum().await;
        let frank = forum.register("frank").await;
        assert!(frank.last_active.is_none());

        let touched = forum
            .forum
            .users()
            .touch_last_active(&frank.id)
            .await
            .expect("touch");
        assert_eq!(touched.last_active, Some(forum.clock.now()));
    }
}
