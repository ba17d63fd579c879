//! Token lifecycle for connected social accounts
//!
//! [`CredentialManager::get_valid_token`] is the only way the publisher and
//! lead discovery obtain credentials. It refreshes tokens that are about to
//! expire and writes the new ones back to the store before handing them out.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::PlatformError;
use crate::platforms::{PlatformResult, Publisher};
use crate::store::RecordStore;
use crate::types::{SocialAccount, TokenUpdate};

/// Tokens expiring within this window are refreshed before use
pub const REFRESH_MARGIN_MS: i64 = 5 * 60 * 1000;

/// Whether `account` must be refreshed at `now_ms`.
///
/// Accounts without an expiry are long-lived and never refreshed.
pub fn needs_refresh(account: &SocialAccount, now_ms: i64) -> bool {
    account
        .expires_at
        .is_some_and(|expires_at| now_ms > expires_at - REFRESH_MARGIN_MS)
}

pub struct CredentialManager {
    store: Arc<dyn RecordStore>,
}

impl CredentialManager {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Return an account whose access token is usable now
    pub async fn get_valid_token(
        &self,
        refresher: &dyn Publisher,
        account: SocialAccount,
    ) -> PlatformResult<SocialAccount> {
        self.get_valid_token_at(refresher, account, Utc::now().timestamp_millis())
            .await
    }

    /// [`get_valid_token`](Self::get_valid_token) with an explicit clock
    ///
    /// # Errors
    ///
    /// - `PlatformError::CredentialExpired` when a refresh is due but the
    ///   account has no refresh token
    /// - `PlatformError::RefreshFailed` when the platform rejects the refresh
    ///   or the new tokens cannot be saved
    pub async fn get_valid_token_at(
        &self,
        refresher: &dyn Publisher,
        account: SocialAccount,
        now_ms: i64,
    ) -> PlatformResult<SocialAccount> {
        if !needs_refresh(&account, now_ms) {
            return Ok(account);
        }

        let platform = account.platform.display_name();
        let Some(refresh_token) = account.refresh_token.as_deref().filter(|t| !t.is_empty())
        else {
            warn!("{} token for project {} expired", platform, account.project_id);
            return Err(PlatformError::CredentialExpired(format!(
                "{} token expired and no refresh token is available. Please reconnect.",
                platform
            )));
        };

        info!("Refreshing {} token for project {}", platform, account.project_id);

        let grant = refresher.refresh(refresh_token).await.map_err(|e| {
            warn!("{} token refresh failed: {}", platform, e);
            PlatformError::RefreshFailed(format!(
                "{} token refresh failed. Please reconnect. ({})",
                platform, e
            ))
        })?;

        let update = TokenUpdate {
            expires_at: Some(grant.expires_at(now_ms)),
            refresh_token: grant.refresh_token.or_else(|| account.refresh_token.clone()),
            access_token: grant.access_token,
        };

        let updated = self
            .store
            .update_social_account(&account.id, update)
            .await
            .map_err(|e| {
                PlatformError::RefreshFailed(format!(
                    "Refreshed {} token could not be saved: {}",
                    platform, e
                ))
            })?;

        info!("{} token refreshed", platform);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::TokenGrant;
    use crate::platforms::mock::MockPublisher;
    use crate::store::MemoryStore;
    use crate::types::{NewSocialAccount, Platform};

    const NOW: i64 = 1_700_000_000_000;

    async fn setup(
        expires_at: Option<i64>,
        refresh_token: Option<&str>,
    ) -> (Arc<MemoryStore>, CredentialManager, SocialAccount) {
        let store = Arc::new(MemoryStore::new());
        let account = store
            .connect_social_account(NewSocialAccount {
                project_id: "p1".to_string(),
                platform: Platform::Twitter,
                username: "orbit".to_string(),
                access_token: "old-access".to_string(),
                refresh_token: refresh_token.map(str::to_string),
                expires_at,
            })
            .await
            .unwrap();
        let manager = CredentialManager::new(store.clone());
        (store, manager, account)
    }

    fn grant(refresh_token: Option<&str>) -> TokenGrant {
        TokenGrant {
            access_token: "new-access".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            expires_in: 7200,
        }
    }

    #[test]
    fn test_needs_refresh_boundary() {
        let mut account = SocialAccount {
            id: "a".to_string(),
            project_id: "p".to_string(),
            platform: Platform::Twitter,
            username: "u".to_string(),
            access_token: "t".to_string(),
            refresh_token: None,
            expires_at: None,
            connected_at: Utc::now(),
        };
        assert!(!needs_refresh(&account, NOW));

        account.expires_at = Some(NOW + 10 * 60 * 1000);
        assert!(!needs_refresh(&account, NOW));

        account.expires_at = Some(NOW + REFRESH_MARGIN_MS);
        assert!(!needs_refresh(&account, NOW));

        account.expires_at = Some(NOW + REFRESH_MARGIN_MS - 1);
        assert!(needs_refresh(&account, NOW));
    }

    #[tokio::test]
    async fn test_token_ten_minutes_out_used_as_is() {
        let (_store, manager, account) = setup(Some(NOW + 10 * 60 * 1000), Some("r")).await;
        let refresher = MockPublisher::with_refresh(Platform::Twitter, Ok(grant(None)));

        let valid = manager
            .get_valid_token_at(&refresher, account.clone(), NOW)
            .await
            .unwrap();
        assert_eq!(valid, account);
        assert_eq!(refresher.refresh_call_count(), 0);
    }

    #[tokio::test]
    async fn test_expiring_token_is_refreshed_and_persisted() {
        let (store, manager, account) = setup(Some(NOW + 60 * 1000), Some("old-refresh")).await;
        let refresher =
            MockPublisher::with_refresh(Platform::Twitter, Ok(grant(Some("new-refresh"))));

        let valid = manager
            .get_valid_token_at(&refresher, account, NOW)
            .await
            .unwrap();
        assert_eq!(valid.access_token, "new-access");
        assert_eq!(valid.refresh_token.as_deref(), Some("new-refresh"));
        assert_eq!(valid.expires_at, Some(NOW + 7_200_000));

        let stored = store
            .get_social_account("p1", Platform::Twitter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, valid);
    }

    #[tokio::test]
    async fn test_unrotated_refresh_token_is_kept() {
        let (_store, manager, account) = setup(Some(NOW - 1), Some("old-refresh")).await;
        let refresher = MockPublisher::with_refresh(Platform::Twitter, Ok(grant(None)));

        let valid = manager
            .get_valid_token_at(&refresher, account, NOW)
            .await
            .unwrap();
        assert_eq!(valid.refresh_token.as_deref(), Some("old-refresh"));
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token() {
        let (_store, manager, account) = setup(Some(NOW - 1), None).await;
        let refresher = MockPublisher::with_refresh(Platform::Twitter, Ok(grant(None)));

        let err = manager
            .get_valid_token_at(&refresher, account, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::CredentialExpired(_)));
        assert_eq!(refresher.refresh_call_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_failure_requires_reconnect() {
        let (store, manager, account) = setup(Some(NOW - 1), Some("r")).await;
        let refresher = MockPublisher::with_refresh(
            Platform::Twitter,
            Err(PlatformError::Upstream {
                platform: "Twitter".to_string(),
                status: 400,
                message: "invalid_grant".to_string(),
            }),
        );

        let err = manager
            .get_valid_token_at(&refresher, account, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::RefreshFailed(_)));
        assert!(err.requires_reconnect());

        let stored = store
            .get_social_account("p1", Platform::Twitter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.access_token, "old-access");
    }

    #[tokio::test]
    async fn test_long_lived_account_skips_refresh() {
        let (_store, manager, account) = setup(None, None).await;
        let refresher = MockPublisher::success(Platform::Instagram);

        let valid = manager
            .get_valid_token_at(&refresher, account, NOW)
            .await
            .unwrap();
        assert_eq!(valid.access_token, "old-access");
    }
}
