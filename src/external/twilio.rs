use crate::config::TwilioConfig;
use crate::error::{AppError, AppResult};
use reqwest::Client;
use serde::Deserialize;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

#[derive(Debug, Deserialize)]
pub struct SendSmsResponse {
    pub sid: String,
    pub status: String,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
}

#[derive(Clone)]
pub struct TwilioService {
    client: Client,
    config: TwilioConfig,
}

impl TwilioService {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{TWILIO_API_BASE}/Accounts/{}/Messages.json",
            self.config.account_sid
        )
    }

    /// 未配置 account_sid 时不真正发送，仅记录日志（本地开发）
    pub fn is_configured(&self) -> bool {
        !self.config.account_sid.is_empty() && !self.config.auth_token.is_empty()
    }

    pub async fn send_verification_code(&self, phone: &str, code: &str) -> AppResult<()> {
        if !self.is_configured() {
            log::warn!("Twilio is not configured, verification code for {phone} not sent");
            return Ok(());
        }

        let body = verification_message(code);
        let params = [
            ("To", phone),
            ("From", self.config.from_phone.as_str()),
            ("Body", body.as_str()),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await?;

        if response.status().is_success() {
            let sent: SendSmsResponse = response.json().await?;
            log::info!(
                "Verification code SMS queued: phone={phone}, sid={}, status={}",
                sent.sid,
                sent.status
            );
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("Verification code SMS failed to send: {phone}, Error: {error_text}");
            Err(AppError::ExternalApiError(format!(
                "SMS sending failed: {error_text}"
            )))
        }
    }
}

fn verification_message(code: &str) -> String {
    format!("Your Pizzapoint verification code is: {code}. Valid for 5 minutes.")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(sid: &str) -> TwilioConfig {
        TwilioConfig {
            account_sid: sid.to_string(),
            auth_token: "token".to_string(),
            from_phone: "+3612345678".to_string(),
        }
    }

    #[test]
    fn test_messages_url() {
        let service = TwilioService::new(config("AC42"));
        assert_eq!(
            service.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC42/Messages.json"
        );
    }

    #[test]
    fn test_unconfigured_service() {
        assert!(!TwilioService::new(config("")).is_configured());
        assert!(TwilioService::new(config("AC42")).is_configured());
    }

    #[test]
    fn test_verification_message_contains_code() {
        assert!(verification_message("123456").contains("123456"));
    }

    #[tokio::test]
    async fn test_unconfigured_send_is_noop() {
        let service = TwilioService::new(config(""));
        assert!(service.send_verification_code("+36201234567", "123456").await.is_ok());
    }
}
