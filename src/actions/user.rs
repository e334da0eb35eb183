use chrono::Utc;
use entity::prelude::*;
use entity::{calendar_token, parse_log, plan, recipe, recipe_rating, user_account};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use validator::Validate;

use crate::error::ServerError;
use crate::utils::pass::{check_password, hash_password, verify_password, PasswordCheck};
use crate::utils::temporary_password;

/// The body of `POST /api/auth/register`.
#[derive(Debug, Validate, Deserialize)]
pub(crate) struct RegisterUser {
    #[validate(length(min = 1, max = 100, message = "Must be between 1 and 100 characters"))]
    pub(crate) first_name: String,
    #[validate(length(min = 1, max = 100, message = "Must be between 1 and 100 characters"))]
    pub(crate) last_name: String,
    #[validate(email(message = "Must be a valid email address."))]
    pub(crate) email: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Minimum length is 6 characters, maximum is 128"
    ))]
    pub(crate) password: String,
}

/// The body of `POST /api/auth/bootstrap`.
#[derive(Debug, Validate, Deserialize)]
pub(crate) struct BootstrapAdmin {
    #[validate(email(message = "Must be a valid email address."))]
    pub(crate) email: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Minimum length is 6 characters, maximum is 128"
    ))]
    pub(crate) password: String,
    pub(crate) token: Option<String>,
}

/// The body of `POST /api/admin/users`. Without a password a temporary one is generated.
#[derive(Debug, Validate, Deserialize)]
pub(crate) struct CreateUser {
    #[validate(email(message = "Must be a valid email address."))]
    pub(crate) email: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Minimum length is 6 characters, maximum is 128"
    ))]
    pub(crate) password: Option<String>,
    #[serde(default)]
    pub(crate) is_admin: bool,
}

/// The action by which an admin updates an account. Can be understood as a sort of changeset.
#[derive(Debug, Clone, Default, Validate, Deserialize)]
pub(crate) struct UpdateUser {
    pub(crate) is_active: Option<bool>,
    pub(crate) is_admin: Option<bool>,
}

/// The body of `POST /api/auth/change-password`.
#[derive(Debug, Validate, Deserialize)]
pub(crate) struct ChangePassword {
    #[validate(length(min = 1, message = "Must not be empty"))]
    pub(crate) current_password: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Minimum length is 6 characters, maximum is 128"
    ))]
    pub(crate) new_password: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn user_not_found() -> ServerError {
    ServerError::not_found("User not found")
}

pub(crate) async fn find_by_id(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<user_account::Model>, ServerError> {
    Ok(UserAccount::find_by_id(id).one(db).await?)
}

pub(crate) async fn find_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<user_account::Model>, ServerError> {
    Ok(UserAccount::find()
        .filter(user_account::Column::Email.eq(normalize_email(email)))
        .one(db)
        .await?)
}

async fn insert(
    db: &DatabaseConnection,
    email: String,
    password: &str,
    names: Option<(String, String)>,
    is_admin: bool,
    is_active: bool,
) -> Result<user_account::Model, ServerError> {
    let (first_name, last_name) = match names {
        Some((first, last)) => (Some(first), Some(last)),
        None => (None, None),
    };
    let user = user_account::ActiveModel {
        first_name: Set(first_name),
        last_name: Set(last_name),
        email: Set(email),
        hashed_password: Set(hash_password(password)?),
        is_admin: Set(is_admin),
        is_active: Set(is_active),
        created_at: Set(Utc::now()),
        last_login_at: Set(None),
        ..Default::default()
    };
    Ok(user.insert(db).await?)
}

/// Self-service sign-up. The account stays inactive until an admin enables it.
pub(crate) async fn register(
    db: &DatabaseConnection,
    input: RegisterUser,
) -> Result<user_account::Model, ServerError> {
    let email = normalize_email(&input.email);
    if find_by_email(db, &email).await?.is_some() {
        return Err(ServerError::bad_request("User already exists"));
    }

    let names = (
        input.first_name.trim().to_string(),
        input.last_name.trim().to_string(),
    );
    let user = insert(db, email, &input.password, Some(names), false, false).await?;
    tracing::info!("Registered user {}", user.id);
    Ok(user)
}

/// Create the first, active, admin account. Refused once any account exists.
pub(crate) async fn bootstrap_admin(
    db: &DatabaseConnection,
    input: BootstrapAdmin,
    expected_token: Option<&str>,
) -> Result<user_account::Model, ServerError> {
    if let Some(expected) = expected_token {
        if input.token.as_deref() != Some(expected) {
            return Err(ServerError::Forbidden("Invalid bootstrap token".to_string()));
        }
    }

    if UserAccount::find().one(db).await?.is_some() {
        return Err(ServerError::bad_request("An administrator already exists"));
    }

    insert(
        db,
        normalize_email(&input.email),
        &input.password,
        None,
        true,
        true,
    )
    .await
}

/// Admin-created account. Returns the generated password when none was supplied.
pub(crate) async fn create_by_admin(
    db: &DatabaseConnection,
    input: CreateUser,
) -> Result<(user_account::Model, Option<String>), ServerError> {
    let email = normalize_email(&input.email);
    if find_by_email(db, &email).await?.is_some() {
        return Err(ServerError::bad_request("User already exists"));
    }

    let (password, temporary) = match input.password {
        Some(password) => (password, None),
        None => {
            let generated = temporary_password();
            (generated.clone(), Some(generated))
        }
    };
    let user = insert(db, email, &password, None, input.is_admin, true).await?;
    Ok((user, temporary))
}

/// Check credentials and record the login.
pub(crate) async fn authenticate(
    db: &DatabaseConnection,
    email: &str,
    password: &str,
) -> Result<user_account::Model, ServerError> {
    let invalid = || ServerError::Unauthorized("Invalid email or password".to_string());

    let user = find_by_email(db, email).await?.ok_or_else(invalid)?;
    let check = check_password(password, &user.hashed_password);
    if check == PasswordCheck::Invalid {
        return Err(invalid());
    }
    if !user.is_active {
        return Err(ServerError::Forbidden(
            "Account is inactive. Contact an administrator".to_string(),
        ));
    }

    let mut active: user_account::ActiveModel = user.into();
    if check == PasswordCheck::ValidNeedsRehash {
        // password needs to be updated
        active.hashed_password = Set(hash_password(password)?);
    }
    active.last_login_at = Set(Some(Utc::now()));
    Ok(active.update(db).await?)
}

pub(crate) async fn change_password(
    db: &DatabaseConnection,
    user: user_account::Model,
    input: ChangePassword,
) -> Result<(), ServerError> {
    if !verify_password(&input.current_password, &user.hashed_password) {
        return Err(ServerError::bad_request("Current password is incorrect"));
    }
    if input.current_password == input.new_password {
        return Err(ServerError::bad_request(
            "New password must differ from the current one",
        ));
    }

    let mut active: user_account::ActiveModel = user.into();
    active.hashed_password = Set(hash_password(&input.new_password)?);
    active.update(db).await?;
    Ok(())
}

/// Delete the caller's own account after re-checking the password.
pub(crate) async fn delete_account(
    db: &DatabaseConnection,
    user: &user_account::Model,
    password: &str,
) -> Result<(), ServerError> {
    if !verify_password(password, &user.hashed_password) {
        return Err(ServerError::bad_request("Password is incorrect"));
    }
    delete_with_data(db, user.id).await
}

/// Remove an account and everything it owns in one transaction.
pub(crate) async fn delete_with_data(db: &DatabaseConnection, id: i32) -> Result<(), ServerError> {
    let txn = db.begin().await?;
    RecipeRating::delete_many()
        .filter(recipe_rating::Column::OwnerId.eq(id))
        .exec(&txn)
        .await?;
    ParseLog::delete_many()
        .filter(parse_log::Column::OwnerId.eq(id))
        .exec(&txn)
        .await?;
    Plan::delete_many()
        .filter(plan::Column::OwnerId.eq(id))
        .exec(&txn)
        .await?;
    CalendarToken::delete_many()
        .filter(calendar_token::Column::OwnerId.eq(id))
        .exec(&txn)
        .await?;
    Recipe::delete_many()
        .filter(recipe::Column::OwnerId.eq(id))
        .exec(&txn)
        .await?;
    let result = UserAccount::delete_by_id(id).exec(&txn).await?;
    if result.rows_affected == 0 {
        txn.rollback().await?;
        return Err(user_not_found());
    }
    txn.commit().await?;
    tracing::info!("Deleted user {} and owned data", id);
    Ok(())
}

pub(crate) async fn list_newest_first(
    db: &DatabaseConnection,
) -> Result<Vec<user_account::Model>, ServerError> {
    Ok(UserAccount::find()
        .order_by_desc(user_account::Column::CreatedAt)
        .all(db)
        .await?)
}

pub(crate) async fn update(
    db: &DatabaseConnection,
    id: i32,
    changes: UpdateUser,
) -> Result<user_account::Model, ServerError> {
    let user = find_by_id(db, id).await?.ok_or_else(user_not_found)?;
    let mut active: user_account::ActiveModel = user.into();
    if let Some(is_active) = changes.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(is_admin) = changes.is_admin {
        active.is_admin = Set(is_admin);
    }
    Ok(active.update(db).await?)
}

/// Replace the password with a generated one and return it.
pub(crate) async fn reset_password(db: &DatabaseConnection, id: i32) -> Result<String, ServerError> {
    let user = find_by_id(db, id).await?.ok_or_else(user_not_found)?;
    let password = temporary_password();
    let mut active: user_account::ActiveModel = user.into();
    active.hashed_password = Set(hash_password(&password)?);
    active.update(db).await?;
    Ok(password)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::test_db;

    pub(crate) fn register_input(email: &str, password: &str) -> RegisterUser {
        RegisterUser {
            first_name: " Ada ".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    /// An active user ready to own recipes.
    pub(crate) async fn active_user(db: &DatabaseConnection, email: &str) -> user_account::Model {
        let user = register(db, register_input(email, "correct-horse-1"))
            .await
            .unwrap();
        update(
            db,
            user.id,
            UpdateUser {
                is_active: Some(true),
                is_admin: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn registration_normalizes_and_starts_inactive() {
        let db = test_db().await;
        let user = register(&db, register_input(" Ada@Example.COM ", "correct-horse-1"))
            .await
            .unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.first_name.as_deref(), Some("Ada"));
        assert!(!user.is_active);
        assert!(!user.is_admin);
        assert_ne!(user.hashed_password, "correct-horse-1");
    }

    #[tokio::test]
    async fn registration_rejects_duplicate_email() {
        let db = test_db().await;
        register(&db, register_input("ada@example.com", "correct-horse-1"))
            .await
            .unwrap();
        let err = register(&db, register_input("ADA@example.com", "another-pass-2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let db = test_db().await;
        active_user(&db, "ada@example.com").await;
        let err = authenticate(&db, "ada@example.com", "wrong-password")
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Unauthorized(_)));

        let err = authenticate(&db, "nobody@example.com", "correct-horse-1")
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn login_requires_active_account_and_records_time() {
        let db = test_db().await;
        register(&db, register_input("ada@example.com", "correct-horse-1"))
            .await
            .unwrap();
        let err = authenticate(&db, "ada@example.com", "correct-horse-1")
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Forbidden(_)));

        let user = find_by_email(&db, "ada@example.com").await.unwrap().unwrap();
        update(
            &db,
            user.id,
            UpdateUser {
                is_active: Some(true),
                is_admin: None,
            },
        )
        .await
        .unwrap();
        let user = authenticate(&db, "Ada@Example.com", "correct-horse-1")
            .await
            .unwrap();
        assert!(user.last_login_at.is_some());
    }

    #[tokio::test]
    async fn bootstrap_only_once_and_checks_token() {
        let db = test_db().await;
        let input = |token: Option<&str>| BootstrapAdmin {
            email: "root@example.com".to_string(),
            password: "bootstrap-pass-1".to_string(),
            token: token.map(str::to_string),
        };

        let err = bootstrap_admin(&db, input(Some("nope")), Some("secret"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Forbidden(_)));

        let admin = bootstrap_admin(&db, input(Some("secret")), Some("secret"))
            .await
            .unwrap();
        assert!(admin.is_admin && admin.is_active);

        let err = bootstrap_admin(&db, input(None), None).await.unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
    }

    #[tokio::test]
    async fn change_password_checks_current_and_novelty() {
        let db = test_db().await;
        let user = active_user(&db, "ada@example.com").await;

        let err = change_password(
            &db,
            user.clone(),
            ChangePassword {
                current_password: "wrong-password".to_string(),
                new_password: "brand-new-pass-3".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));

        let err = change_password(
            &db,
            user.clone(),
            ChangePassword {
                current_password: "correct-horse-1".to_string(),
                new_password: "correct-horse-1".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));

        change_password(
            &db,
            user,
            ChangePassword {
                current_password: "correct-horse-1".to_string(),
                new_password: "brand-new-pass-3".to_string(),
            },
        )
        .await
        .unwrap();
        authenticate(&db, "ada@example.com", "brand-new-pass-3")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn admin_created_user_gets_temporary_password() {
        let db = test_db().await;
        let (user, temporary) = create_by_admin(
            &db,
            CreateUser {
                email: "cook@example.com".to_string(),
                password: None,
                is_admin: false,
            },
        )
        .await
        .unwrap();
        let temporary = temporary.unwrap();
        assert!(user.is_active);
        authenticate(&db, "cook@example.com", &temporary)
            .await
            .unwrap();

        let reset = reset_password(&db, user.id).await.unwrap();
        assert_ne!(reset, temporary);
        authenticate(&db, "cook@example.com", &reset).await.unwrap();
    }

    #[tokio::test]
    async fn deleting_account_requires_password() {
        let db = test_db().await;
        let user = active_user(&db, "ada@example.com").await;

        let err = delete_account(&db, &user, "wrong-password")
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));

        delete_account(&db, &user, "correct-horse-1").await.unwrap();
        assert!(find_by_id(&db, user.id).await.unwrap().is_none());

        let err = delete_with_data(&db, user.id).await.unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));
    }

    #[tokio::test]
    async fn six_character_passwords_are_enough() {
        let register = |password: &str| RegisterUser {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: password.to_string(),
        };
        assert!(register("abcde").validate().is_err());
        assert!(register("abcdef").validate().is_ok());

        let db = test_db().await;
        let user = super::register(&db, register("abcdef")).await.unwrap();
        assert!(!user.is_active);
    }
}
