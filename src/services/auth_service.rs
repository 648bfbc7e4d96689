use crate::config::AdminConfig;
use crate::entities::user_entity as users;
use crate::error::{AppError, AppResult};
use crate::external::*;
use crate::models::*;
use crate::utils::*;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// 验证码有效期（秒）
pub const CODE_TTL_SECONDS: i64 = 300;
/// 同一手机号两次发送的最小间隔（秒）
pub const RESEND_INTERVAL_SECONDS: i64 = 60;
/// 连续输错次数上限，达到后验证码作废
pub const MAX_VERIFY_ATTEMPTS: u32 = 5;
const INITIAL_PASSWORD_LENGTH: usize = 12;

#[derive(Debug, Clone)]
struct PendingCode {
    code: String,
    sent_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    failed_attempts: u32,
}

/// 内存中的短信验证码，按手机号索引
#[derive(Clone, Default)]
pub struct VerificationCodeStore {
    codes: Arc<RwLock<HashMap<String, PendingCode>>>,
}

impl VerificationCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 生成并登记新验证码；60 秒内重复请求会被拒绝
    pub async fn issue(&self, phone: &str, now: DateTime<Utc>) -> AppResult<String> {
        let mut codes = self.codes.write().await;
        // 顺带清理所有已过期的验证码
        codes.retain(|_, pending| pending.expires_at >= now);

        if let Some(pending) = codes.get(phone)
            && now.signed_duration_since(pending.sent_at)
                < Duration::seconds(RESEND_INTERVAL_SECONDS)
        {
            return Err(AppError::ValidationError(format!(
                "Verification code was sent recently, please retry in {RESEND_INTERVAL_SECONDS} seconds"
            )));
        }

        let code = generate_six_digit_code();
        codes.insert(
            phone.to_string(),
            PendingCode {
                code: code.clone(),
                sent_at: now,
                expires_at: now + Duration::seconds(CODE_TTL_SECONDS),
                failed_attempts: 0,
            },
        );
        Ok(code)
    }

    /// 校验成功后验证码即失效
    pub async fn verify(&self, phone: &str, code: &str, now: DateTime<Utc>) -> AppResult<()> {
        let mut codes = self.codes.write().await;
        let pending = codes.get_mut(phone).ok_or_else(|| {
            AppError::ValidationError("Verification code not found or expired".to_string())
        })?;

        if now > pending.expires_at {
            codes.remove(phone);
            return Err(AppError::ValidationError(
                "Verification code expired".to_string(),
            ));
        }
        if pending.code != code.trim() {
            pending.failed_attempts += 1;
            if pending.failed_attempts >= MAX_VERIFY_ATTEMPTS {
                codes.remove(phone);
                log::warn!(
                    "Verification code for {phone} revoked after {MAX_VERIFY_ATTEMPTS} failed attempts"
                );
                return Err(AppError::ValidationError(
                    "Too many failed attempts, please request a new verification code".to_string(),
                ));
            }
            return Err(AppError::ValidationError(
                "Invalid verification code".to_string(),
            ));
        }

        codes.remove(phone);
        Ok(())
    }

    /// 发送失败时撤销刚登记的验证码，允许立即重试
    pub async fn revoke(&self, phone: &str) {
        self.codes.write().await.remove(phone);
    }
}

#[derive(Clone)]
pub struct AuthService {
    pool: Arc<DatabaseConnection>,
    jwt_service: JwtService,
    twilio_service: TwilioService,
    codes: VerificationCodeStore,
}

impl AuthService {
    pub fn new(
        pool: impl Into<Arc<DatabaseConnection>>,
        jwt_service: JwtService,
        twilio_service: TwilioService,
    ) -> Self {
        Self {
            pool: pool.into(),
            jwt_service,
            twilio_service,
            codes: VerificationCodeStore::new(),
        }
    }

    /// 注册：建用户（随机初始密码）并发送验证码
    pub async fn register(&self, request: RegisterRequest) -> AppResult<RegisterResponse> {
        let phone = normalize_phone(&request.phone_number);
        validate_phone(&phone)?;

        let username = request.username.trim().to_string();
        if username.is_empty() || username.chars().count() > 150 {
            return Err(AppError::ValidationError(
                "Username must be between 1 and 150 characters".to_string(),
            ));
        }

        let txn = self.pool.begin().await?;

        let phone_taken = users::Entity::find()
            .filter(users::Column::PhoneNumber.eq(phone.as_str()))
            .one(&txn)
            .await?;
        if phone_taken.is_some() {
            return Err(AppError::ValidationError(
                "User with this phone number already exists".to_string(),
            ));
        }

        let username_taken = users::Entity::find()
            .filter(users::Column::Username.eq(username.as_str()))
            .one(&txn)
            .await?;
        if username_taken.is_some() {
            return Err(AppError::ValidationError(
                "User with this username already exists".to_string(),
            ));
        }

        let password_hash = hash_password(&generate_random_password(INITIAL_PASSWORD_LENGTH))?;
        let now = Utc::now();
        let user = users::ActiveModel {
            username: Set(username),
            phone_number: Set(Some(phone.clone())),
            is_phone_verified: Set(false),
            password_hash: Set(password_hash),
            is_staff: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        self.deliver_code(&phone, now).await?;
        txn.commit().await?;

        log::info!("User {} registered, verification pending", user.id);
        Ok(RegisterResponse {
            expires_in: CODE_TTL_SECONDS,
        })
    }

    /// 重新发送验证码
    pub async fn send_code(&self, request: SendCodeRequest) -> AppResult<RegisterResponse> {
        let phone = normalize_phone(&request.phone_number);
        validate_phone(&phone)?;

        self.find_by_phone(&phone).await?;
        self.deliver_code(&phone, Utc::now()).await?;

        Ok(RegisterResponse {
            expires_in: CODE_TTL_SECONDS,
        })
    }

    /// 校验验证码，标记手机号已验证并签发令牌
    pub async fn verify_phone(&self, request: VerifyPhoneRequest) -> AppResult<AuthResponse> {
        let phone = normalize_phone(&request.phone_number);
        validate_phone(&phone)?;

        let user = self.find_by_phone(&phone).await?;
        self.codes.verify(&phone, &request.code, Utc::now()).await?;

        let user = if user.is_phone_verified {
            user
        } else {
            let mut am = user.into_active_model();
            am.is_phone_verified = Set(true);
            am.updated_at = Set(Utc::now());
            am.update(self.pool.as_ref()).await?
        };

        log::info!("User {} verified phone number", user.id);
        self.issue_tokens(user)
    }

    /// 用户名密码登录（管理员账号）
    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(request.username.trim()))
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::AuthError("Invalid username or password".to_string()))?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AppError::AuthError(
                "Invalid username or password".to_string(),
            ));
        }

        self.issue_tokens(user)
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthResponse> {
        let claims = self.jwt_service.verify_refresh_token(refresh_token)?;
        let user_id = claims.user_id()?;

        let user = users::Entity::find_by_id(user_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::AuthError("Invalid token".to_string()))?;

        let access_token = self
            .jwt_service
            .generate_access_token(user.id, &user.username)?;

        Ok(AuthResponse {
            user: UserResponse::from(user),
            access_token,
            refresh_token: refresh_token.to_string(),
            expires_in: self.jwt_service.get_access_token_expires_in(),
        })
    }

    /// 启动时确保配置的管理员账号存在且为 staff
    pub async fn ensure_admin(&self, admin: &AdminConfig) -> AppResult<()> {
        if admin.username.trim().is_empty() || admin.password.is_empty() {
            return Err(AppError::ConfigError(
                "admin username and password must not be empty".to_string(),
            ));
        }

        let existing = users::Entity::find()
            .filter(users::Column::Username.eq(admin.username.as_str()))
            .one(self.pool.as_ref())
            .await?;

        match existing {
            Some(user) if user.is_staff => {
                log::debug!("Admin user {} already present", user.username);
            }
            Some(user) => {
                let mut am = user.into_active_model();
                am.is_staff = Set(true);
                am.updated_at = Set(Utc::now());
                let user = am.update(self.pool.as_ref()).await?;
                log::info!("User {} promoted to staff", user.username);
            }
            None => {
                let now = Utc::now();
                let user = users::ActiveModel {
                    username: Set(admin.username.clone()),
                    phone_number: Set(None),
                    is_phone_verified: Set(false),
                    password_hash: Set(hash_password(&admin.password)?),
                    is_staff: Set(true),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(self.pool.as_ref())
                .await?;
                log::info!("Admin user {} created", user.username);
            }
        }
        Ok(())
    }

    async fn deliver_code(&self, phone: &str, now: DateTime<Utc>) -> AppResult<()> {
        let code = self.codes.issue(phone, now).await?;
        if let Err(e) = self.twilio_service.send_verification_code(phone, &code).await {
            self.codes.revoke(phone).await;
            return Err(e);
        }
        Ok(())
    }

    async fn find_by_phone(&self, phone: &str) -> AppResult<users::Model> {
        users::Entity::find()
            .filter(users::Column::PhoneNumber.eq(phone))
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("User with this phone number not found".to_string()))
    }

    fn issue_tokens(&self, user: users::Model) -> AppResult<AuthResponse> {
        let access_token = self
            .jwt_service
            .generate_access_token(user.id, &user.username)?;
        let refresh_token = self
            .jwt_service
            .generate_refresh_token(user.id, &user.username)?;

        Ok(AuthResponse {
            user: UserResponse::from(user),
            access_token,
            refresh_token,
            expires_in: self.jwt_service.get_access_token_expires_in(),
        })
    }
}
