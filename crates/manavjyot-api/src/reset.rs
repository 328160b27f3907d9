//! Password reset tokens: issue, check, consume.
//!
//! A token is 256 random bits rendered as unpadded URL-safe base64. Only its
//! SHA-256 digest is stored, next to an expiry; the raw token exists in the
//! reset email and nowhere else. Wrong and expired tokens are reported the
//! same way.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Duration;
use manavjyot_db::Database;
use manavjyot_mail::{Email, Mailer, templates};
use manavjyot_types::models::User;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::hash_password;
use crate::{SharedClock, run_blocking};

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct ResetSettings {
    pub ttl: Duration,
    /// Sender address on reset and confirmation mails.
    pub sender: String,
    /// Base URL the emailed link points at; the token is appended as `/reset/{token}`.
    pub public_url: String,
}

#[derive(Debug)]
pub enum IssueOutcome {
    /// The raw token. It is mailed to the account holder and must not be
    /// echoed back to the requester.
    Issued(String),
    UserNotFound,
}

#[derive(Debug)]
pub enum TokenCheck {
    Valid(User),
    InvalidOrExpired,
}

#[derive(Debug)]
pub enum ConsumeOutcome {
    Reset(User),
    InvalidOrExpired,
}

#[derive(Debug, Error)]
pub enum ResetError {
    #[error(transparent)]
    Store(#[from] anyhow::Error),
    #[error("password hashing failed")]
    Hash,
}

pub struct ResetTokenManager {
    db: Arc<Database>,
    mailer: Arc<dyn Mailer>,
    clock: SharedClock,
    settings: ResetSettings,
}

impl ResetTokenManager {
    pub fn new(
        db: Arc<Database>,
        mailer: Arc<dyn Mailer>,
        clock: SharedClock,
        settings: ResetSettings,
    ) -> Self {
        Self {
            db,
            mailer,
            clock,
            settings,
        }
    }

    /// Replaces any earlier token on the account. Issuance counts as done once
    /// the token is stored; the mail goes out in the background.
    pub async fn issue_token(&self, email: &str) -> Result<IssueOutcome, ResetError> {
        let token = generate_token();
        let digest = token_digest(&token);
        let expires_at = (self.clock.utc() + self.settings.ttl).timestamp_millis();

        let db = Arc::clone(&self.db);
        let lookup = email.to_string();
        let row = run_blocking(move || db.set_reset_token(&lookup, &digest, expires_at)).await?;

        let Some(row) = row else {
            info!("Password reset requested for unknown email {}", email);
            return Ok(IssueOutcome::UserNotFound);
        };

        let link = format!("{}/reset/{}", self.settings.public_url.trim_end_matches('/'), token);
        let mail = templates::password_reset(&row.email, &self.settings.sender, &link);
        self.notify(mail, "Password reset");

        Ok(IssueOutcome::Issued(token))
    }

    pub async fn validate_token(&self, token: &str) -> Result<TokenCheck, ResetError> {
        let digest = token_digest(token);
        let now = self.clock.utc().timestamp_millis();

        let db = Arc::clone(&self.db);
        let row = run_blocking(move || db.find_user_by_reset_token(&digest, now)).await?;

        match row {
            Some(row) => Ok(TokenCheck::Valid(row.to_user()?)),
            None => Ok(TokenCheck::InvalidOrExpired),
        }
    }

    /// Sets the new credential and clears the token in a single conditional
    /// write. Of several concurrent calls with one token, exactly one succeeds.
    pub async fn consume_token(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<ConsumeOutcome, ResetError> {
        // Cheap pre-check so bad tokens never pay for a hash.
        if let TokenCheck::InvalidOrExpired = self.validate_token(token).await? {
            return Ok(ConsumeOutcome::InvalidOrExpired);
        }

        let password = new_password.to_string();
        let password_hash = run_blocking(move || hash_password(&password))
            .await
            .map_err(|e| {
                warn!("Hashing reset password failed: {:#}", e);
                ResetError::Hash
            })?;

        let digest = token_digest(token);
        let now = self.clock.utc().timestamp_millis();
        let db = Arc::clone(&self.db);
        let row = run_blocking(move || db.consume_reset_token(&digest, now, &password_hash)).await?;

        let Some(row) = row else {
            return Ok(ConsumeOutcome::InvalidOrExpired);
        };

        info!("Password reset completed for {}", row.email);
        let mail = templates::password_changed(&row.email, &self.settings.sender);
        self.notify(mail, "Password change confirmation");

        Ok(ConsumeOutcome::Reset(row.to_user()?))
    }

    /// Fire-and-forget: delivery failures are logged and never reach the caller.
    fn notify(&self, mail: Email, kind: &'static str) {
        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            match mailer.send(&mail).await {
                Ok(()) => info!("{} e-mail sent to {}", kind, mail.to),
                Err(e) => warn!("{} e-mail to {} failed: {:#}", kind, mail.to, e),
            }
        });
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use argon2::{Argon2, PasswordHash, PasswordVerifier};
    use chrono::{DateTime, Local, Utc};
    use manavjyot_mail::MemoryMailer;
    use manavjyot_types::models::Profile;
    use mockable::Clock;
    use uuid::Uuid;

    use super::*;

    /// Wall clock that tests can push forward.
    struct TestClock {
        offset: Mutex<Duration>,
    }

    impl TestClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                offset: Mutex::new(Duration::zero()),
            })
        }

        fn advance(&self, by: Duration) {
            *self.offset.lock().unwrap() += by;
        }
    }

    impl Clock for TestClock {
        fn local(&self) -> DateTime<Local> {
            self.utc().with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            Utc::now() + *self.offset.lock().unwrap()
        }
    }

    struct Fixture {
        manager: ResetTokenManager,
        db: Arc<Database>,
        mailer: Arc<MemoryMailer>,
        clock: Arc<TestClock>,
        user_id: String,
    }

    /// Never completes a send.
    struct StalledMailer;

    #[async_trait::async_trait]
    impl Mailer for StalledMailer {
        async fn send(&self, _email: &Email) -> anyhow::Result<()> {
            std::future::pending().await
        }
    }

    fn fixture_with(mailer: MemoryMailer) -> Fixture {
        let mailer = Arc::new(mailer);
        fixture_sending_to(mailer.clone(), mailer)
    }

    fn fixture_sending_to(outbox: Arc<dyn Mailer>, mailer: Arc<MemoryMailer>) -> Fixture {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let user_id = Uuid::new_v4().to_string();
        db.create_user(&user_id, "Patient@Example.com", "old-hash", &Profile::default())
            .unwrap();

        let clock = TestClock::new();
        let manager = ResetTokenManager::new(
            Arc::clone(&db),
            outbox,
            clock.clone(),
            ResetSettings {
                ttl: Duration::seconds(3600),
                sender: "site@example.com".into(),
                public_url: "https://manavjyot.test/".into(),
            },
        );
        Fixture {
            manager,
            db,
            mailer,
            clock,
            user_id,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MemoryMailer::new())
    }

    /// Mail is sent from a background task; wait for it to land.
    async fn delivered(mailer: &MemoryMailer, count: usize) -> Vec<Email> {
        for _ in 0..100 {
            let sent = mailer.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        mailer.sent()
    }

    async fn issue(f: &Fixture) -> String {
        match f.manager.issue_token("patient@example.com").await.unwrap() {
            IssueOutcome::Issued(token) => token,
            IssueOutcome::UserNotFound => panic!("user should exist"),
        }
    }

    #[test]
    fn tokens_are_long_url_safe_and_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn unknown_email_mutates_nothing() {
        let f = fixture();
        let outcome = f.manager.issue_token("stranger@example.com").await.unwrap();

        assert!(matches!(outcome, IssueOutcome::UserNotFound));
        let row = f.db.get_user_by_id(&f.user_id).unwrap().unwrap();
        assert!(row.password_reset_token.is_none());
        assert!(row.password_reset_expires.is_none());
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn issued_token_is_stored_mailed_and_valid() {
        let f = fixture();
        let token = issue(&f).await;

        let row = f.db.get_user_by_id(&f.user_id).unwrap().unwrap();
        assert_eq!(row.password_reset_token.as_deref(), Some(token_digest(&token).as_str()));
        assert!(row.password_reset_expires.is_some());

        let sent = delivered(&f.mailer, 1).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "patient@example.com");
        assert!(sent[0].text.contains(&format!("https://manavjyot.test/reset/{token}")));

        let TokenCheck::Valid(user) = f.manager.validate_token(&token).await.unwrap() else {
            panic!("fresh token should validate");
        };
        assert_eq!(user.id.to_string(), f.user_id);
    }

    #[tokio::test]
    async fn mail_failure_does_not_fail_issuance() {
        let f = fixture_with(MemoryMailer::failing());
        let token = issue(&f).await;
        assert!(matches!(f.manager.validate_token(&token).await.unwrap(), TokenCheck::Valid(_)));
    }

    #[tokio::test]
    async fn slow_mail_does_not_hold_up_the_request() {
        let f = fixture_sending_to(Arc::new(StalledMailer), Arc::new(MemoryMailer::new()));

        let issued = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            f.manager.issue_token("patient@example.com"),
        )
        .await
        .expect("issuance must not wait for the mail");
        let IssueOutcome::Issued(token) = issued.unwrap() else {
            panic!("user should exist");
        };

        let consumed = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            f.manager.consume_token(&token, "new-secret"),
        )
        .await
        .expect("reset must not wait for the confirmation mail");
        assert!(matches!(consumed.unwrap(), ConsumeOutcome::Reset(_)));
    }

    #[tokio::test]
    async fn expired_and_wrong_tokens_look_the_same() {
        let f = fixture();
        let token = issue(&f).await;

        assert!(matches!(
            f.manager.validate_token("not-the-token").await.unwrap(),
            TokenCheck::InvalidOrExpired
        ));

        f.clock.advance(Duration::seconds(3601));
        assert!(matches!(
            f.manager.validate_token(&token).await.unwrap(),
            TokenCheck::InvalidOrExpired
        ));
        assert!(matches!(
            f.manager.consume_token(&token, "new-secret").await.unwrap(),
            ConsumeOutcome::InvalidOrExpired
        ));
        assert_eq!(f.db.get_user_by_id(&f.user_id).unwrap().unwrap().password, "old-hash");
    }

    #[tokio::test]
    async fn reissue_replaces_previous_token() {
        let f = fixture();
        let first = issue(&f).await;
        let second = issue(&f).await;

        assert!(matches!(f.manager.validate_token(&first).await.unwrap(), TokenCheck::InvalidOrExpired));
        assert!(matches!(f.manager.validate_token(&second).await.unwrap(), TokenCheck::Valid(_)));
    }

    #[tokio::test]
    async fn consume_sets_credential_and_clears_token() {
        let f = fixture();
        let token = issue(&f).await;

        let outcome = f.manager.consume_token(&token, "new-secret").await.unwrap();
        assert!(matches!(outcome, ConsumeOutcome::Reset(_)));

        let row = f.db.get_user_by_id(&f.user_id).unwrap().unwrap();
        assert!(row.password_reset_token.is_none());
        assert!(row.password_reset_expires.is_none());
        let parsed = PasswordHash::new(&row.password).unwrap();
        assert!(Argon2::default().verify_password(b"new-secret", &parsed).is_ok());

        let sent = delivered(&f.mailer, 2).await;
        assert_eq!(sent.len(), 2);
        assert!(sent[1].subject.contains("password has been changed"));
    }

    #[tokio::test]
    async fn token_is_single_use() {
        let f = fixture();
        let token = issue(&f).await;

        assert!(matches!(
            f.manager.consume_token(&token, "first").await.unwrap(),
            ConsumeOutcome::Reset(_)
        ));
        assert!(matches!(
            f.manager.consume_token(&token, "second").await.unwrap(),
            ConsumeOutcome::InvalidOrExpired
        ));

        let row = f.db.get_user_by_id(&f.user_id).unwrap().unwrap();
        let parsed = PasswordHash::new(&row.password).unwrap();
        assert!(Argon2::default().verify_password(b"first", &parsed).is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumers_cannot_both_win() {
        let f = Arc::new(fixture());
        let token = issue(&f).await;

        let tasks: Vec<_> = (0..4)
            .map(|i| {
                let f = Arc::clone(&f);
                let token = token.clone();
                tokio::spawn(async move {
                    f.manager.consume_token(&token, &format!("pass-{i}")).await.unwrap()
                })
            })
            .collect();

        let mut winners = 0;
        for task in tasks {
            if let ConsumeOutcome::Reset(_) = task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
