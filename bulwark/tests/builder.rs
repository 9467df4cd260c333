//! Tests for the Bulwark builder pattern

use bulwark::{BulwarkBuilder, FailureMode, LockoutConfig, LockoutPolicy};

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_builder_with_sqlite() {
    let bulwark = BulwarkBuilder::new()
        .with_sqlite("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite")
        .apply_migrations(true)
        .build()
        .await
        .expect("Failed to build Bulwark");

    // Health check should work
    bulwark.health_check().await.expect("Health check failed");

    for _ in 0..5 {
        bulwark.record_login_failure("a@b.com").await.unwrap();
    }
    assert!(bulwark.is_account_locked("a@b.com").await.unwrap());
    let remaining = bulwark
        .get_account_lock_remaining_time("a@b.com")
        .await
        .unwrap();
    assert!((1795..=1800).contains(&remaining));

    bulwark.unlock_account("a@b.com").await.unwrap();
    assert!(!bulwark.is_account_locked("a@b.com").await.unwrap());
    assert_eq!(bulwark.get_login_attempts("a@b.com").await.unwrap(), 5);
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_builder_with_sqlite_pool() {
    use sqlx::sqlite::SqlitePoolOptions;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create pool");

    let bulwark = BulwarkBuilder::new()
        .with_sqlite_pool(pool)
        .apply_migrations(true)
        .build()
        .await
        .expect("Failed to build Bulwark");

    bulwark
        .lock_account("a@b.com", Some("manual review"))
        .await
        .unwrap();
    let status = bulwark.get_lockout_status("a@b.com").await.unwrap();
    assert!(status.is_locked());
    assert_eq!(status.locked_until, None);
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_builder_manual_migration() {
    let bulwark = BulwarkBuilder::new()
        .with_sqlite("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite")
        .build()
        .await
        .expect("Failed to build Bulwark");

    // Tables do not exist yet
    assert!(bulwark.record_login_failure("a@b.com").await.is_err());

    bulwark.migrate().await.expect("Failed to migrate");
    // Running twice is a no-op
    bulwark.migrate().await.expect("Failed to migrate");

    assert_eq!(bulwark.record_login_failure("a@b.com").await.unwrap(), 1);
}

#[cfg(feature = "memory")]
#[tokio::test]
async fn test_builder_with_full_config() {
    let config = LockoutConfig::default()
        .with_policy(LockoutPolicy::from_secs(2, 60, 120).unwrap())
        .with_failure_mode(FailureMode::FailClosed);

    let bulwark = BulwarkBuilder::new()
        .with_config(config.clone())
        .with_memory()
        .build()
        .await
        .expect("Failed to build Bulwark");

    assert_eq!(bulwark.config(), &config);

    bulwark.record_login_failure("a@b.com").await.unwrap();
    bulwark.record_login_failure("a@b.com").await.unwrap();
    assert!(bulwark.is_account_locked("a@b.com").await.unwrap());
    assert_eq!(
        bulwark.get_account_lock_remaining_time("a@b.com").await.unwrap(),
        120
    );
}

#[cfg(feature = "memory")]
#[tokio::test]
async fn test_builder_disabled_still_allows_admin_lock() {
    let bulwark = BulwarkBuilder::new()
        .enabled(false)
        .with_memory()
        .build()
        .await
        .expect("Failed to build Bulwark");

    for _ in 0..10 {
        assert_eq!(bulwark.record_login_failure("a@b.com").await.unwrap(), 0);
    }
    assert!(!bulwark.is_account_locked("a@b.com").await.unwrap());

    bulwark.lock_account("a@b.com", None).await.unwrap();
    assert!(bulwark.is_account_locked("a@b.com").await.unwrap());
}

#[cfg(feature = "memory")]
#[tokio::test]
async fn test_invalid_identifier_is_validation_error() {
    let bulwark = BulwarkBuilder::new()
        .with_memory()
        .build()
        .await
        .expect("Failed to build Bulwark");

    let result = bulwark.record_login_failure("   ").await;
    assert!(matches!(result, Err(bulwark::BulwarkError::ValidationError(_))));
}
