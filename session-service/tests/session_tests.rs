mod common;

use std::sync::Arc;

use chrono::Duration;
use common::TestSessionCore;
use common::STRONG_PASSWORD;
use session_service::domain::principal::models::EmailAddress;
use session_service::domain::principal::models::LoginCommand;
use session_service::domain::principal::models::PrincipalId;
use session_service::domain::principal::models::RegisterCommand;
use session_service::domain::principal::models::Role;
use session_service::domain::session::errors::SessionError;
use session_service::domain::session::models::ClientContext;
use session_service::domain::session::models::SessionPolicy;
use session_service::domain::session::ports::SessionServicePort;

fn client() -> ClientContext {
    ClientContext::new("198.51.100.7", Some("integration-test".to_string()))
}

fn login_command(email: &str, password: &str) -> LoginCommand {
    LoginCommand {
        email: email.to_string(),
        password: password.to_string(),
    }
}

async fn verified_principal(core: &TestSessionCore, email: &str) -> PrincipalId {
    let command = RegisterCommand::new(
        "Test Candidate".to_string(),
        EmailAddress::new(email.to_string()).unwrap(),
        STRONG_PASSWORD.to_string(),
        Role::User,
    )
    .unwrap();
    let principal = core.service.register(command).await.unwrap();

    let token = core.mailed_token("verification", email).await;
    core.service.verify_email(&token).await.unwrap();
    principal.id
}

#[tokio::test]
async fn test_replayed_refresh_token_revokes_every_session() {
    let core = TestSessionCore::new();
    let subject = verified_principal(&core, "replay@example.com").await;

    let first = core
        .service
        .login(login_command("replay@example.com", STRONG_PASSWORD), &client())
        .await
        .unwrap();
    let second = core
        .service
        .login(login_command("replay@example.com", STRONG_PASSWORD), &client())
        .await
        .unwrap();

    let rotated = core
        .service
        .refresh(&first.tokens.refresh.value, &client())
        .await
        .unwrap();
    assert_ne!(rotated.refresh.value, first.tokens.refresh.value);

    // The spent token comes back: treated as theft.
    let replay = core
        .service
        .refresh(&first.tokens.refresh.value, &client())
        .await;
    assert!(matches!(replay, Err(SessionError::InvalidCredentials)));
    assert_eq!(core.tokens.refresh_records(&subject), 0);

    for survivor in [&rotated.refresh.value, &second.tokens.refresh.value] {
        assert!(matches!(
            core.service.refresh(survivor, &client()).await,
            Err(SessionError::InvalidCredentials)
        ));
    }
    assert!(core.audit.kinds().contains(&"token_reuse"));
}

#[tokio::test]
async fn test_concurrent_refresh_has_exactly_one_winner() {
    let core = TestSessionCore::new();
    verified_principal(&core, "race@example.com").await;

    let outcome = core
        .service
        .login(login_command("race@example.com", STRONG_PASSWORD), &client())
        .await
        .unwrap();
    let presented = outcome.tokens.refresh.value;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&core.service);
        let presented = presented.clone();
        handles.push(tokio::spawn(async move {
            service.refresh(&presented, &client()).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_reuse_during_rotation_leaves_no_live_session() {
    let core = TestSessionCore::new();
    let subject = verified_principal(&core, "interleave@example.com").await;

    let outcome = core
        .service
        .login(login_command("interleave@example.com", STRONG_PASSWORD), &client())
        .await
        .unwrap();
    let presented = outcome.tokens.refresh.value;

    // The first refresh wins the mark, then stalls before minting.
    core.principals.delay_lookups(std::time::Duration::from_millis(100));
    let service = Arc::clone(&core.service);
    let first_presented = presented.clone();
    let winner = tokio::spawn(async move { service.refresh(&first_presented, &client()).await });

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let replay = core.service.refresh(&presented, &client()).await;
    assert!(matches!(replay, Err(SessionError::InvalidCredentials)));

    let winner = winner.await.unwrap();
    assert!(matches!(winner, Err(SessionError::InvalidCredentials)));
    assert_eq!(core.tokens.active_refresh_count(&subject), 0);

    let kinds = core.audit.kinds();
    assert!(kinds.contains(&"token_reuse"));
    assert!(!kinds.contains(&"refresh_success"));
}

#[tokio::test]
async fn test_concurrent_logins_never_exceed_session_cap() {
    let core = TestSessionCore::new();
    let subject = verified_principal(&core, "crowd@example.com").await;

    for _ in 0..4 {
        core.service
            .login(login_command("crowd@example.com", STRONG_PASSWORD), &client())
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    assert_eq!(core.tokens.active_refresh_count(&subject), 4);

    // Both logins observe the store before either trims it.
    core.tokens.delay_counts(std::time::Duration::from_millis(100));
    let left_client = client();
    let right_client = client();
    let (left, right) = tokio::join!(
        core.service
            .login(login_command("crowd@example.com", STRONG_PASSWORD), &left_client),
        core.service
            .login(login_command("crowd@example.com", STRONG_PASSWORD), &right_client),
    );

    assert!(left.is_ok());
    assert!(right.is_ok());
    assert_eq!(core.tokens.active_refresh_count(&subject), 5);
}

#[tokio::test]
async fn test_session_cap_evicts_oldest_refresh_token() {
    let core = TestSessionCore::new();
    let subject = verified_principal(&core, "cap@example.com").await;

    let mut refresh_tokens = Vec::new();
    for _ in 0..6 {
        let outcome = core
            .service
            .login(login_command("cap@example.com", STRONG_PASSWORD), &client())
            .await
            .unwrap();
        refresh_tokens.push(outcome.tokens.refresh.value);
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    assert_eq!(core.tokens.active_refresh_count(&subject), 5);
    assert!(matches!(
        core.service.refresh(&refresh_tokens[0], &client()).await,
        Err(SessionError::InvalidCredentials)
    ));
    assert!(core
        .service
        .refresh(&refresh_tokens[5], &client())
        .await
        .is_ok());
}

#[tokio::test]
async fn test_logout_revokes_access_token() {
    let core = TestSessionCore::new();
    verified_principal(&core, "logout@example.com").await;

    let outcome = core
        .service
        .login(login_command("logout@example.com", STRONG_PASSWORD), &client())
        .await
        .unwrap();
    let access = outcome.tokens.access.value;

    let principal = core.service.authenticate(&access).await.unwrap();
    core.service
        .logout(
            Some(&principal),
            Some(&outcome.tokens.refresh.value),
            &client(),
        )
        .await;

    assert!(matches!(
        core.service.authenticate(&access).await,
        Err(SessionError::InvalidCredentials)
    ));
    assert!(core.revocations.is_revoked(&principal.token_id).await);
    assert!(matches!(
        core.service
            .refresh(&outcome.tokens.refresh.value, &client())
            .await,
        Err(SessionError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn test_unverified_login_requires_verification() {
    let core = TestSessionCore::new();
    let command = RegisterCommand::new(
        "Pending".to_string(),
        EmailAddress::new("pending@example.com".to_string()).unwrap(),
        STRONG_PASSWORD.to_string(),
        Role::Company,
    )
    .unwrap();
    core.service.register(command).await.unwrap();

    let result = core
        .service
        .login(login_command("pending@example.com", STRONG_PASSWORD), &client())
        .await;
    assert!(matches!(result, Err(SessionError::VerificationRequired)));

    let wrong = core
        .service
        .login(login_command("pending@example.com", "Wrong-Password-1"), &client())
        .await;
    assert!(matches!(wrong, Err(SessionError::InvalidCredentials)));
}

#[tokio::test]
async fn test_password_reset_ends_all_sessions() {
    let core = TestSessionCore::new();
    let subject = verified_principal(&core, "reset@example.com").await;

    let outcome = core
        .service
        .login(login_command("reset@example.com", STRONG_PASSWORD), &client())
        .await
        .unwrap();

    core.service
        .request_password_reset("reset@example.com", &client())
        .await
        .unwrap();
    let token = core.mailed_token("password_reset", "reset@example.com").await;

    core.service
        .reset_password(&token, "Brand-New-Passw0rd".to_string(), &client())
        .await
        .unwrap();

    assert_eq!(core.tokens.refresh_records(&subject), 0);
    assert!(core
        .service
        .refresh(&outcome.tokens.refresh.value, &client())
        .await
        .is_err());

    // Spent reset token cannot be reused.
    assert!(matches!(
        core.service
            .reset_password(&token, "Another-Passw0rd!".to_string(), &client())
            .await,
        Err(SessionError::InvalidOneTimeToken)
    ));

    assert!(core
        .service
        .login(login_command("reset@example.com", "Brand-New-Passw0rd"), &client())
        .await
        .is_ok());
}

#[tokio::test]
async fn test_expired_refresh_token_is_rejected() {
    let policy = SessionPolicy {
        refresh_ttl: Duration::milliseconds(1),
        ..SessionPolicy::default()
    };
    let core = TestSessionCore::with_policy(policy);
    let subject = verified_principal(&core, "stale@example.com").await;

    let outcome = core
        .service
        .login(login_command("stale@example.com", STRONG_PASSWORD), &client())
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    assert!(matches!(
        core.service
            .refresh(&outcome.tokens.refresh.value, &client())
            .await,
        Err(SessionError::InvalidCredentials)
    ));
    assert_eq!(core.tokens.refresh_records(&subject), 0);
}

#[tokio::test]
async fn test_admin_bootstrap_runs_once() {
    let core = TestSessionCore::new();

    assert!(core
        .service
        .ensure_admin("Root", "admin@example.com", STRONG_PASSWORD)
        .await
        .unwrap());
    assert!(!core
        .service
        .ensure_admin("Root", "other-admin@example.com", STRONG_PASSWORD)
        .await
        .unwrap());

    // Bootstrapped admins are verified and can log in straight away.
    let outcome = core
        .service
        .login(login_command("admin@example.com", STRONG_PASSWORD), &client())
        .await
        .unwrap();
    assert_eq!(outcome.principal.role, Role::Admin);
}
