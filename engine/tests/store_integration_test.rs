//! Integration tests for the profile store
//!
//! Round-trips profiles through SQLite in a temporary directory and verifies
//! the archive path persists the profile and clears conversation memory.

use std::time::Duration;
use tempfile::TempDir;

use sdk::profile::{Category, Field, UserProfile};
use yojana_engine::agent::{Session, SessionManager};
use yojana_engine::store::ProfileStore;

fn sample_profile() -> UserProfile {
    UserProfile {
        age: Some(Field::new(45, 0.9, 3)),
        annual_income: Some(Field::new(200_000, 0.7, 5)),
        category: Some(Field::new(Category::Obc, 0.95, 1)),
        state: Some(Field::new("Maharashtra".to_string(), 0.9, 1)),
        ..Default::default()
    }
}

async fn open_store(temp_dir: &TempDir) -> ProfileStore {
    let db_path = temp_dir.path().join("profiles.db");
    ProfileStore::new(&db_path).await.unwrap()
}

#[tokio::test]
async fn test_save_and_load_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;

    let profile = sample_profile();
    store.save("ravi", &profile).await.unwrap();

    let loaded = store.load("ravi").await.unwrap().unwrap();
    assert_eq!(loaded, profile);
    // Attribute-level metadata survives the round trip
    assert_eq!(loaded.category.as_ref().unwrap().last_updated_turn, 1);
    assert_eq!(loaded.annual_income.as_ref().unwrap().confidence, 0.7);
}

#[tokio::test]
async fn test_load_unknown_user_is_none() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;

    assert!(store.load("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn test_save_replaces_previous_profile() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;

    store.save("ravi", &sample_profile()).await.unwrap();

    let mut newer = sample_profile();
    newer.age = Some(Field::new(46, 0.9, 9));
    store.save("ravi", &newer).await.unwrap();

    let loaded = store.load("ravi").await.unwrap().unwrap();
    assert_eq!(loaded.age.as_ref().unwrap().value, 46);
}

#[tokio::test]
async fn test_delete_removes_profile() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;

    store.save("ravi", &sample_profile()).await.unwrap();
    store.delete("ravi").await.unwrap();

    assert!(store.load("ravi").await.unwrap().is_none());
}

#[tokio::test]
async fn test_archive_idle_persists_profile_and_clears_session() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;

    // Zero timeout: every session counts as idle immediately
    let mut manager = SessionManager::new(Duration::from_secs(0));
    let session = Session::new(Some("ravi".to_string()), sample_profile(), 10);
    manager.insert(session);

    let archived = manager.archive_idle(&store).await.unwrap();
    assert_eq!(archived, 1);
    assert!(manager.is_empty());

    // The archived profile is there for the next session start
    let loaded = store.load("ravi").await.unwrap().unwrap();
    assert_eq!(loaded, sample_profile());
}

#[tokio::test]
async fn test_anonymous_session_archives_without_persisting() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;

    let mut manager = SessionManager::new(Duration::from_secs(0));
    let session = Session::new(None, sample_profile(), 10);
    let id = manager.insert(session);

    manager.archive(&id, &store).await.unwrap();
    assert!(manager.is_empty());
}
