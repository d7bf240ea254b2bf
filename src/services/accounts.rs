//! Accounts and sessions
//!
//! Registration, login, password changes and resets, and user profiles.
//! Accounts from the student mail domain are active students at once; any
//! other registration is a faculty account waiting for an administrator.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{
    hash_password, validate_password, verify_password, Actor, Role, TokenInput, TokenPurpose,
};
use crate::config::AdminSeed;
use crate::db::{mutate, AccountStatus, ApprovalDoc, Query, UserDoc, UserProfile, REGISTRATION_KIND};
use crate::services::mail::MailMessage;
use crate::services::files::content_type;
use crate::services::{require_staff, require_text, Context, FileArea, StoredFile, Upload};
use crate::types::{QuireError, Result};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "student_id")]
    pub user_id: String,
    pub mail: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// University id or mail address
    #[serde(alias = "user_id", alias = "mail")]
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct Session {
    pub token: String,
    pub expires_in: u64,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(alias = "user_id", alias = "mail")]
    pub identifier: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    #[serde(alias = "password")]
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, alias = "Name")]
    pub name: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub profile_pic: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub user: UserProfile,
    pub role: Role,
}

fn token_input(user: &UserDoc) -> TokenInput {
    TokenInput {
        user_id: user.user_id.clone(),
        name: user.name.clone(),
        role: user.role,
    }
}

fn validate_mail(mail: &str) -> Result<String> {
    let mail = mail.trim().to_lowercase();
    match mail.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(mail),
        _ => Err(QuireError::validation("A valid mail address is required")),
    }
}

/// Find an account by university id or mail address
pub(crate) async fn find_account(ctx: &Context, identifier: &str) -> Result<Option<UserDoc>> {
    let identifier = identifier.trim();
    if identifier.contains('@') {
        ctx.stores
            .users
            .find_one(&Query::all().eq("mail", identifier.to_lowercase()))
            .await
    } else {
        ctx.stores.users.get(&identifier.to_string()).await
    }
}

// =============================================================================
// Registration and sessions
// =============================================================================

pub async fn register(ctx: &Context, req: RegisterRequest) -> Result<UserProfile> {
    let name = require_text(&req.name, "name")?;
    let user_id = require_text(&req.user_id, "user_id")?;
    let mail = validate_mail(&req.mail)?;
    validate_password(&req.password)?;

    if find_account(ctx, &user_id).await?.is_some() || find_account(ctx, &mail).await?.is_some() {
        return Err(QuireError::conflict("An account with this id or mail already exists"));
    }

    let is_student = mail
        .rsplit_once('@')
        .is_some_and(|(_, domain)| domain.eq_ignore_ascii_case(ctx.settings.student_mail_domain.trim()));
    let (role, status) = if is_student {
        (Role::Student, AccountStatus::Active)
    } else {
        (Role::Faculty, AccountStatus::Pending)
    };

    let hash = hash_password(&req.password)?;
    let user = ctx
        .stores
        .users
        .insert(UserDoc::new(&user_id, name, mail, hash, role, status))
        .await?;

    if status == AccountStatus::Pending {
        let msg = format!("{} ({}) requests a faculty account", user.name, user.mail);
        ctx.stores
            .approvals
            .insert(ApprovalDoc::new(&user.user_id, REGISTRATION_KIND, msg))
            .await?;
    }

    ctx.audit.account(None, &user.user_id, "register").await;
    info!("Registered {} as {} ({:?})", user.user_id, user.role, user.status);
    Ok(user.profile())
}

pub async fn login(ctx: &Context, req: LoginRequest) -> Result<Session> {
    let invalid = || QuireError::Unauthorized("Invalid credentials".into());

    let Some(user) = find_account(ctx, &req.identifier).await? else {
        ctx.audit.auth_attempt(req.identifier.trim(), false).await;
        return Err(invalid());
    };

    if !verify_password(&req.password, &user.password_hash)? {
        ctx.audit.auth_attempt(&user.user_id, false).await;
        return Err(invalid());
    }

    match user.status {
        AccountStatus::Active => {}
        AccountStatus::Pending => {
            return Err(QuireError::forbidden("Account is awaiting administrator approval"))
        }
        AccountStatus::Disabled => return Err(QuireError::forbidden("Account is disabled")),
    }

    let token = ctx.jwt.generate_token(token_input(&user))?;
    ctx.audit.auth_attempt(&user.user_id, true).await;

    Ok(Session {
        token,
        expires_in: ctx.jwt.expiry_seconds(),
        user: user.profile(),
    })
}

async fn load_user(ctx: &Context, user_id: &str) -> Result<UserDoc> {
    ctx.stores
        .users
        .get(&user_id.to_string())
        .await?
        .ok_or_else(|| QuireError::not_found(format!("User {} not found", user_id)))
}

pub async fn me(ctx: &Context, actor: &Actor) -> Result<UserProfile> {
    Ok(load_user(ctx, &actor.user_id).await?.profile())
}

pub async fn change_password(ctx: &Context, actor: &Actor, req: ChangePasswordRequest) -> Result<()> {
    let user = load_user(ctx, &actor.user_id).await?;
    if !verify_password(&req.current_password, &user.password_hash)? {
        return Err(QuireError::Unauthorized("Current password is incorrect".into()));
    }
    validate_password(&req.new_password)?;
    let hash = hash_password(&req.new_password)?;

    mutate(ctx.stores.users.as_ref(), &user.user_id, "User", |u| {
        u.password_hash = hash.clone();
        Ok(())
    })
    .await?;

    ctx.audit.account(Some(actor), &user.user_id, "change_password").await;
    Ok(())
}

// =============================================================================
// Password reset
// =============================================================================

/// Mail a reset link. Unknown identifiers succeed silently.
pub async fn forgot_password(ctx: &Context, req: ForgotPasswordRequest) -> Result<()> {
    let Some(user) = find_account(ctx, &req.identifier).await? else {
        info!("Password reset requested for unknown account");
        return Ok(());
    };

    let ttl = ctx.settings.reset_token_ttl_seconds;
    let token = ctx.jwt.generate_reset_token(token_input(&user), ttl)?;
    let link = format!(
        "{}/reset-password?token={}",
        ctx.settings.frontend_url.trim_end_matches('/'),
        token
    );
    let text = format!(
        "Hello {},\n\nUse the link below to choose a new password. It expires in {} minutes.\n\n{}\n\n\
         If you did not ask for this, ignore this message.\n",
        user.name,
        ttl / 60,
        link
    );

    ctx.mailer
        .send(&MailMessage::new(vec![user.mail.clone()], "Password reset", text))
        .await?;
    ctx.audit.account(None, &user.user_id, "reset_requested").await;
    Ok(())
}

pub async fn reset_password(ctx: &Context, req: ResetPasswordRequest) -> Result<()> {
    let claims = ctx.jwt.claims_for(req.token.trim(), TokenPurpose::PasswordReset)?;
    validate_password(&req.new_password)?;
    let hash = hash_password(&req.new_password)?;

    let (user, ()) = mutate(ctx.stores.users.as_ref(), &claims.sub, "User", |u| {
        u.password_hash = hash.clone();
        Ok(())
    })
    .await?;

    ctx.audit.account(None, &user.user_id, "password_reset").await;

    let confirmation = MailMessage::new(
        vec![user.mail.clone()],
        "Your password was changed",
        format!("Hello {},\n\nYour password has been reset.\n", user.name),
    );
    if let Err(e) = ctx.mailer.send(&confirmation).await {
        warn!("Password reset confirmation for {} not sent: {}", user.user_id, e);
    }
    Ok(())
}

// =============================================================================
// Users
// =============================================================================

pub async fn list_users(ctx: &Context, actor: &Actor) -> Result<Vec<UserProfile>> {
    require_staff(actor)?;
    let users = ctx.stores.users.find(&Query::all()).await?;
    Ok(users.iter().map(UserDoc::profile).collect())
}

/// Look up a profile by university id or mail address
pub async fn get_user(ctx: &Context, identifier: &str) -> Result<UserProfile> {
    find_account(ctx, identifier)
        .await?
        .map(|u| u.profile())
        .ok_or_else(|| QuireError::not_found("User not found"))
}

pub async fn update_profile(
    ctx: &Context,
    actor: &Actor,
    user_id: &str,
    update: ProfileUpdate,
) -> Result<UserProfile> {
    if !actor.is_self_or_admin(user_id) {
        return Err(QuireError::forbidden("You can only update your own profile"));
    }

    let name = update.name.as_deref().map(|n| require_text(n, "name")).transpose()?;
    let mail = update.mail.as_deref().map(validate_mail).transpose()?;
    let profile_pic = update.profile_pic.map(|p| p.trim().to_string());

    if let Some(ref mail) = mail {
        if let Some(owner) = find_account(ctx, mail).await? {
            if owner.user_id != user_id {
                return Err(QuireError::conflict("Mail address is already in use"));
            }
        }
    }

    let (user, ()) = mutate(ctx.stores.users.as_ref(), &user_id.to_string(), "User", |u| {
        if let Some(ref name) = name {
            u.name = name.clone();
        }
        if let Some(ref mail) = mail {
            u.mail = mail.clone();
        }
        if let Some(ref pic) = profile_pic {
            u.profile_pic = pic.clone();
        }
        Ok(())
    })
    .await?;

    Ok(user.profile())
}

/// Store an uploaded image as the user's profile picture
///
/// The previous picture is removed when it was uploaded here; externally
/// hosted URLs are left alone.
pub async fn upload_picture(ctx: &Context, actor: &Actor, user_id: &str, image: Upload) -> Result<UserProfile> {
    if !actor.is_self_or_admin(user_id) {
        return Err(QuireError::forbidden("You can only update your own profile"));
    }
    if image.data.is_empty() {
        return Err(QuireError::validation("A non-empty image is required"));
    }
    if !content_type(&image.file_name).starts_with("image/") {
        return Err(QuireError::validation("Profile pictures must be PNG, JPEG, GIF or WebP images"));
    }
    load_user(ctx, user_id).await?;

    let stored = ctx
        .files
        .save(FileArea::ProfilePics, &image.file_name, &image.data)
        .await?;
    let path = stored.public_path();

    let saved = mutate(ctx.stores.users.as_ref(), &user_id.to_string(), "User", |u| {
        Ok(std::mem::replace(&mut u.profile_pic, path.clone()))
    })
    .await;

    match saved {
        Ok((user, previous)) => {
            if StoredFile::from_public_path(&previous).is_some() {
                ctx.files.remove(&previous).await;
            }
            info!("Profile picture of {} set to {}", user.user_id, path);
            Ok(user.profile())
        }
        Err(e) => {
            ctx.files.remove(&path).await;
            Err(e)
        }
    }
}

pub async fn dashboard(ctx: &Context, actor: &Actor, user_id: &str) -> Result<Dashboard> {
    if !actor.is_staff() && actor.user_id != user_id {
        return Err(QuireError::forbidden("You can only view your own dashboard"));
    }
    let user = load_user(ctx, user_id).await?;
    Ok(Dashboard {
        role: user.role,
        user: user.profile(),
    })
}

/// Create the configured administrator if it does not exist yet
pub async fn seed_admin(ctx: &Context, seed: &AdminSeed) -> Result<bool> {
    if find_account(ctx, &seed.user_id).await?.is_some() {
        return Ok(false);
    }
    validate_password(&seed.password)?;

    let admin = UserDoc::new(
        &seed.user_id,
        "Administrator",
        &seed.mail,
        hash_password(&seed.password)?,
        Role::Admin,
        AccountStatus::Active,
    );
    ctx.stores.users.insert(admin).await?;
    ctx.audit.account(None, &seed.user_id, "seed_admin").await;
    info!("Seeded administrator account {}", seed.user_id);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::*;

    fn signup(user_id: &str, mail: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Nadia Rahman".into(),
            user_id: user_id.into(),
            mail: mail.into(),
            password: TEST_PASSWORD.into(),
        }
    }

    #[tokio::test]
    async fn test_student_domain_is_active() {
        let (ctx, _mailer, _dir) = test_context().await;
        let profile = register(&ctx, signup("20101001", "nadia@G.BRACU.ac.bd")).await.unwrap();
        assert_eq!(profile.role, Role::Student);
        assert_eq!(profile.status, AccountStatus::Active);

        let session = login(
            &ctx,
            LoginRequest {
                identifier: "nadia@g.bracu.ac.bd".into(),
                password: TEST_PASSWORD.into(),
            },
        )
        .await
        .unwrap();
        let claims = ctx.jwt.claims_for(&session.token, TokenPurpose::Session).unwrap();
        assert_eq!(claims.sub, "20101001");
        assert_eq!(claims.role, Role::Student);
    }

    #[tokio::test]
    async fn test_faculty_waits_for_approval() {
        let (ctx, _mailer, _dir) = test_context().await;
        let profile = register(&ctx, signup("F100", "dr.karim@bracu.ac.bd")).await.unwrap();
        assert_eq!(profile.role, Role::Faculty);
        assert_eq!(profile.status, AccountStatus::Pending);

        let requests = ctx.stores.approvals.find(&Query::all()).await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].kind, REGISTRATION_KIND);

        let err = login(
            &ctx,
            LoginRequest {
                identifier: "F100".into(),
                password: TEST_PASSWORD.into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, QuireError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_duplicates_and_bad_credentials() {
        let (ctx, _mailer, _dir) = test_context().await;
        register(&ctx, signup("s1", "s1@g.bracu.ac.bd")).await.unwrap();

        let err = register(&ctx, signup("s1", "other@g.bracu.ac.bd")).await.unwrap_err();
        assert!(matches!(err, QuireError::Conflict(_)));
        let err = register(&ctx, signup("s2", "S1@g.bracu.ac.bd")).await.unwrap_err();
        assert!(matches!(err, QuireError::Conflict(_)));

        let wrong = LoginRequest {
            identifier: "s1".into(),
            password: "not-the-password".into(),
        };
        assert!(matches!(login(&ctx, wrong).await.unwrap_err(), QuireError::Unauthorized(_)));
        let unknown = LoginRequest {
            identifier: "nobody".into(),
            password: TEST_PASSWORD.into(),
        };
        assert!(matches!(login(&ctx, unknown).await.unwrap_err(), QuireError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_forgot_and_reset() {
        let (ctx, mailer, _dir) = test_context().await;
        seed_user(&ctx, "s1", Role::Student).await;

        forgot_password(&ctx, ForgotPasswordRequest { identifier: "ghost".into() })
            .await
            .unwrap();
        assert!(mailer.sent().await.is_empty());

        forgot_password(&ctx, ForgotPasswordRequest { identifier: "s1@uni.edu".into() })
            .await
            .unwrap();
        let sent = mailer.sent().await;
        assert_eq!(sent.len(), 1);
        let token = sent[0]
            .text
            .split("token=")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap()
            .to_string();

        // A reset token is not a session
        assert!(ctx.jwt.claims_for(&token, TokenPurpose::Session).is_err());

        reset_password(
            &ctx,
            ResetPasswordRequest {
                token,
                new_password: "brand-new-secret".into(),
            },
        )
        .await
        .unwrap();

        let session = login(
            &ctx,
            LoginRequest {
                identifier: "s1".into(),
                password: "brand-new-secret".into(),
            },
        )
        .await;
        assert!(session.is_ok());
        assert_eq!(mailer.sent().await.len(), 2);
    }

    #[tokio::test]
    async fn test_forgot_password_mail_failure_is_fatal() {
        let (ctx, mailer, _dir) = test_context().await;
        seed_user(&ctx, "s1", Role::Student).await;
        mailer.set_failing(true);
        let err = forgot_password(&ctx, ForgotPasswordRequest { identifier: "s1".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, QuireError::Mail(_)));
    }

    #[tokio::test]
    async fn test_change_password_and_profile() {
        let (ctx, _mailer, _dir) = test_context().await;
        seed_user(&ctx, "s1", Role::Student).await;
        seed_user(&ctx, "s2", Role::Student).await;
        let s1 = student("s1");

        let err = change_password(
            &ctx,
            &s1,
            ChangePasswordRequest {
                current_password: "wrong-password".into(),
                new_password: "another-secret".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, QuireError::Unauthorized(_)));

        let update = ProfileUpdate {
            mail: Some("s2@uni.edu".into()),
            ..Default::default()
        };
        let err = update_profile(&ctx, &s1, "s1", update).await.unwrap_err();
        assert!(matches!(err, QuireError::Conflict(_)));

        let update = ProfileUpdate {
            name: Some("Sadia".into()),
            profile_pic: Some("https://cdn.example/p.png".into()),
            ..Default::default()
        };
        let profile = update_profile(&ctx, &s1, "s1", update).await.unwrap();
        assert_eq!(profile.name, "Sadia");

        let err = update_profile(&ctx, &s1, "s2", ProfileUpdate::default()).await.unwrap_err();
        assert!(matches!(err, QuireError::Forbidden(_)));

        assert!(matches!(
            dashboard(&ctx, &s1, "s2").await.unwrap_err(),
            QuireError::Forbidden(_)
        ));
        assert_eq!(dashboard(&ctx, &s1, "s1").await.unwrap().role, Role::Student);
        assert!(matches!(list_users(&ctx, &s1).await.unwrap_err(), QuireError::Forbidden(_)));
        assert_eq!(get_user(&ctx, "S2@uni.edu").await.unwrap().user_id, "s2");
    }

    #[tokio::test]
    async fn test_seed_admin_once() {
        let (ctx, _mailer, _dir) = test_context().await;
        let seed = AdminSeed {
            user_id: "A1".into(),
            mail: "office@uni.edu".into(),
            password: "change-me-now".into(),
        };
        assert!(seed_admin(&ctx, &seed).await.unwrap());
        assert!(!seed_admin(&ctx, &seed).await.unwrap());
        let admin = ctx.stores.users.get(&"A1".to_string()).await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_profile_picture_upload() {
        let (ctx, _mailer, _dir) = test_context().await;
        seed_user(&ctx, "s1", Role::Student).await;
        let image = |name: &str| Upload {
            file_name: name.into(),
            data: bytes::Bytes::from_static(b"\x89PNG avatar"),
        };

        let err = upload_picture(&ctx, &student("s2"), "s1", image("me.png")).await.unwrap_err();
        assert!(matches!(err, QuireError::Forbidden(_)));
        let err = upload_picture(&ctx, &student("s1"), "s1", image("cv.pdf")).await.unwrap_err();
        assert!(matches!(err, QuireError::Validation(_)));

        let first = upload_picture(&ctx, &student("s1"), "s1", image("me.png")).await.unwrap();
        assert!(first.profile_pic.starts_with("/files/profile_pics/"));
        assert!(first.profile_pic.ends_with(".png"));
        let stored = StoredFile::from_public_path(&first.profile_pic).unwrap();
        assert_eq!(stored.area, FileArea::ProfilePics);
        ctx.files.read(stored.area, &stored.name).await.unwrap();

        let second = upload_picture(&ctx, &admin(), "s1", image("new.JPG")).await.unwrap();
        assert!(second.profile_pic.ends_with(".jpg"));
        let err = ctx.files.read(stored.area, &stored.name).await.unwrap_err();
        assert!(matches!(err, QuireError::NotFound(_)));

        let err = upload_picture(&ctx, &admin(), "nobody", image("x.png")).await.unwrap_err();
        assert!(matches!(err, QuireError::NotFound(_)));
    }
}
