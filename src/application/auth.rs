//! API Key 认证

use crate::application::error::GatewayError;

/// 认证失败时返回给客户端的消息
pub const AUTH_ERROR_MESSAGE: &str = "Invalid or missing API key";

/// API Key 校验器
#[derive(Clone)]
pub struct ApiKeyAuthenticator {
    expected: String,
}

impl ApiKeyAuthenticator {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }

    /// 比较耗时只取决于长度，不取决于第一个不同字节的位置
    pub fn matches(&self, provided: &str) -> bool {
        let expected = self.expected.as_bytes();
        let provided = provided.as_bytes();
        if expected.is_empty() || expected.len() != provided.len() {
            return false;
        }
        expected
            .iter()
            .zip(provided)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }

    pub fn verify(&self, provided: Option<&str>) -> Result<(), GatewayError> {
        match provided {
            Some(key) if self.matches(key) => Ok(()),
            _ => Err(GatewayError::auth(AUTH_ERROR_MESSAGE)),
        }
    }
}

impl std::fmt::Debug for ApiKeyAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuthenticator")
            .field("expected", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches() {
        let auth = ApiKeyAuthenticator::new("secret");
        assert!(auth.matches("secret"));
        assert!(!auth.matches("secreT"));
        assert!(!auth.matches("secret1"));
        assert!(!auth.matches(""));
    }

    #[test]
    fn test_empty_expected_rejects_everything() {
        let auth = ApiKeyAuthenticator::new("");
        assert!(!auth.matches(""));
    }

    #[test]
    fn test_verify_messages() {
        let auth = ApiKeyAuthenticator::new("k");
        assert!(auth.verify(Some("k")).is_ok());
        let err = auth.verify(None).unwrap_err();
        assert_eq!(err.to_string(), AUTH_ERROR_MESSAGE);
        assert!(matches!(err, GatewayError::Auth(_)));
    }

    #[test]
    fn test_debug_hides_key() {
        let auth = ApiKeyAuthenticator::new("topsecret");
        assert!(!format!("{:?}", auth).contains("topsecret"));
    }
}
