mod common;

use std::sync::Arc;

use chrono::Duration;
use chrono::Utc;
use common::TestDb;
use session_service::domain::principal::models::EmailAddress;
use session_service::domain::principal::models::Principal;
use session_service::domain::principal::models::PrincipalId;
use session_service::domain::principal::models::Role;
use session_service::domain::principal::ports::PrincipalRepository;
use session_service::domain::session::errors::RepositoryError;
use session_service::domain::session::models::MarkUsed;
use session_service::domain::session::models::StoredToken;
use session_service::domain::session::models::TokenKind;
use session_service::domain::session::ports::TokenRepository;
use session_service::outbound::repositories::principal::PostgresPrincipalRepository;
use session_service::outbound::repositories::token::PostgresTokenRepository;

struct Stores {
    _db: TestDb,
    principals: PostgresPrincipalRepository,
    tokens: Arc<PostgresTokenRepository>,
}

async fn stores() -> Stores {
    let db = TestDb::new().await;
    Stores {
        principals: PostgresPrincipalRepository::new(db.pool.clone()),
        tokens: Arc::new(PostgresTokenRepository::new(db.pool.clone())),
        _db: db,
    }
}

fn principal(email: &str, role: Role) -> Principal {
    Principal {
        id: PrincipalId::new(),
        name: "Grace".to_string(),
        email: EmailAddress::new(email.to_string()).unwrap(),
        password_hash: "$argon2id$stored".to_string(),
        role,
        verified: false,
        created_at: Utc::now(),
    }
}

async fn owner(stores: &Stores, email: &str) -> PrincipalId {
    stores
        .principals
        .create(principal(email, Role::User))
        .await
        .unwrap()
        .id
}

/// Token minted `age` ago with a seven day lifetime.
fn token(value: &str, subject_id: PrincipalId, kind: TokenKind, age: Duration) -> StoredToken {
    StoredToken::new(
        value.to_string(),
        subject_id,
        kind,
        Utc::now() - age,
        Duration::days(7),
    )
}

#[tokio::test]
#[ignore = "requires Postgres at DATABASE_URL"]
async fn test_mark_used_is_a_one_time_test_and_set() {
    let stores = stores().await;
    let subject = owner(&stores, "mark@example.com").await;

    stores
        .tokens
        .create(token("spend-me", subject, TokenKind::Refresh, Duration::zero()))
        .await
        .unwrap();

    assert_eq!(
        stores.tokens.mark_used("spend-me").await,
        Ok(MarkUsed::Marked)
    );
    assert_eq!(
        stores.tokens.mark_used("spend-me").await,
        Ok(MarkUsed::AlreadyUsed)
    );
    assert_eq!(
        stores.tokens.mark_used("never-issued").await,
        Err(RepositoryError::NotFound)
    );

    // Spent tokens stay behind as tombstones.
    let tombstone = stores.tokens.fetch_by_value("spend-me").await.unwrap();
    assert!(tombstone.used);
    assert_eq!(tombstone.subject_id, subject);
    assert_eq!(tombstone.kind, TokenKind::Refresh);
}

#[tokio::test]
#[ignore = "requires Postgres at DATABASE_URL"]
async fn test_concurrent_mark_used_has_one_winner() {
    let stores = stores().await;
    let subject = owner(&stores, "contended@example.com").await;

    stores
        .tokens
        .create(token("contended", subject, TokenKind::Refresh, Duration::zero()))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let tokens = Arc::clone(&stores.tokens);
        handles.push(tokio::spawn(async move { tokens.mark_used("contended").await }));
    }

    let mut marked = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(MarkUsed::Marked) => marked += 1,
            Ok(MarkUsed::AlreadyUsed) => {}
            Err(e) => panic!("unexpected store error: {}", e),
        }
    }
    assert_eq!(marked, 1);
}

#[tokio::test]
#[ignore = "requires Postgres at DATABASE_URL"]
async fn test_revoke_oldest_keeps_the_newest_live_tokens() {
    let stores = stores().await;
    let subject = owner(&stores, "cap@example.com").await;
    let other = owner(&stores, "bystander@example.com").await;

    for minutes in 1..=7 {
        let value = format!("session-{}", minutes);
        stores
            .tokens
            .create(token(&value, subject, TokenKind::Refresh, Duration::minutes(minutes)))
            .await
            .unwrap();
    }
    stores
        .tokens
        .create(token("bystander", other, TokenKind::Refresh, Duration::hours(1)))
        .await
        .unwrap();
    stores
        .tokens
        .create(token("verify", subject, TokenKind::Verification, Duration::hours(1)))
        .await
        .unwrap();

    assert_eq!(stores.tokens.count_active_for_subject(&subject).await, Ok(7));
    assert_eq!(stores.tokens.revoke_oldest(&subject, 5).await, Ok(2));
    assert_eq!(stores.tokens.count_active_for_subject(&subject).await, Ok(5));

    for evicted in ["session-6", "session-7"] {
        assert_eq!(
            stores.tokens.fetch_by_value(evicted).await,
            Err(RepositoryError::NotFound)
        );
    }
    for kept in ["session-1", "session-5", "bystander", "verify"] {
        assert!(stores.tokens.fetch_by_value(kept).await.is_ok());
    }

    // Already within the cap.
    assert_eq!(stores.tokens.revoke_oldest(&subject, 5).await, Ok(0));
}

#[tokio::test]
#[ignore = "requires Postgres at DATABASE_URL"]
async fn test_count_active_ignores_spent_expired_and_one_time_tokens() {
    let stores = stores().await;
    let subject = owner(&stores, "count@example.com").await;

    stores
        .tokens
        .create(token("live", subject, TokenKind::Refresh, Duration::zero()))
        .await
        .unwrap();
    stores
        .tokens
        .create(token("spent", subject, TokenKind::Refresh, Duration::zero()))
        .await
        .unwrap();
    stores.tokens.mark_used("spent").await.unwrap();
    stores
        .tokens
        .create(token("stale", subject, TokenKind::Refresh, Duration::days(8)))
        .await
        .unwrap();
    stores
        .tokens
        .create(token("reset", subject, TokenKind::PasswordReset, Duration::zero()))
        .await
        .unwrap();

    assert_eq!(stores.tokens.count_active_for_subject(&subject).await, Ok(1));
}

#[tokio::test]
#[ignore = "requires Postgres at DATABASE_URL"]
async fn test_sweep_expired_removes_only_expired_tokens() {
    let stores = stores().await;
    let subject = owner(&stores, "sweep@example.com").await;

    stores
        .tokens
        .create(token("stale-refresh", subject, TokenKind::Refresh, Duration::days(8)))
        .await
        .unwrap();
    stores
        .tokens
        .create(token("stale-verify", subject, TokenKind::Verification, Duration::days(8)))
        .await
        .unwrap();
    stores
        .tokens
        .create(token("fresh", subject, TokenKind::Refresh, Duration::zero()))
        .await
        .unwrap();

    assert_eq!(stores.tokens.sweep_expired().await, Ok(2));
    assert_eq!(stores.tokens.sweep_expired().await, Ok(0));
    assert!(stores.tokens.fetch_by_value("fresh").await.is_ok());
    assert_eq!(
        stores.tokens.fetch_by_value("stale-refresh").await,
        Err(RepositoryError::NotFound)
    );
}

#[tokio::test]
#[ignore = "requires Postgres at DATABASE_URL"]
async fn test_invalidate_all_spares_one_time_tokens() {
    let stores = stores().await;
    let subject = owner(&stores, "wipe@example.com").await;

    for value in ["a", "b"] {
        stores
            .tokens
            .create(token(value, subject, TokenKind::Refresh, Duration::zero()))
            .await
            .unwrap();
    }
    stores.tokens.mark_used("a").await.unwrap();
    stores
        .tokens
        .create(token("verify", subject, TokenKind::Verification, Duration::zero()))
        .await
        .unwrap();

    assert_eq!(stores.tokens.invalidate_all_for_subject(&subject).await, Ok(2));
    assert_eq!(stores.tokens.count_active_for_subject(&subject).await, Ok(0));
    assert!(stores.tokens.fetch_by_value("verify").await.is_ok());

    stores.tokens.invalidate_one("verify").await.unwrap();
    assert_eq!(
        stores.tokens.fetch_by_value("verify").await,
        Err(RepositoryError::NotFound)
    );
}

#[tokio::test]
#[ignore = "requires Postgres at DATABASE_URL"]
async fn test_duplicate_token_value_conflicts() {
    let stores = stores().await;
    let subject = owner(&stores, "dup@example.com").await;

    let record = token("same", subject, TokenKind::Refresh, Duration::zero());
    stores.tokens.create(record.clone()).await.unwrap();

    assert!(matches!(
        stores.tokens.create(record).await,
        Err(RepositoryError::Conflict(_))
    ));
}

#[tokio::test]
#[ignore = "requires Postgres at DATABASE_URL"]
async fn test_principal_store_round_trip() {
    let stores = stores().await;

    let created = stores
        .principals
        .create(principal("Grace@Example.com", Role::Company))
        .await
        .unwrap();
    assert!(matches!(
        stores
            .principals
            .create(principal("grace@example.com", Role::User))
            .await,
        Err(RepositoryError::Conflict(_))
    ));

    stores.principals.mark_verified(&created.id).await.unwrap();
    stores
        .principals
        .update_password_hash(&created.id, "$argon2id$rotated")
        .await
        .unwrap();

    let found = stores
        .principals
        .find_by_email(&created.email)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(found.role, Role::Company);
    assert!(found.verified);
    assert_eq!(found.password_hash, "$argon2id$rotated");

    assert!(stores
        .principals
        .find_by_id(&PrincipalId::new())
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        stores.principals.mark_verified(&PrincipalId::new()).await,
        Err(RepositoryError::NotFound)
    );
    assert_eq!(stores.principals.exists_with_role(Role::Company).await, Ok(true));
    assert_eq!(stores.principals.exists_with_role(Role::Admin).await, Ok(false));
}
