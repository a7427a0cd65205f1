use crate::auth::{AuthService, SignupProfile, TokenSigner};
use crate::catalog;
use crate::db::{Database, OwnerStatus, ThemeMode};
use crate::error::AppError;
use crate::listings::{ListingPatch, ListingService, NewListing};

fn test_db() -> Database {
    Database::open_memory().unwrap()
}

fn test_auth(db: &Database) -> AuthService {
    AuthService::new(db.clone(), TokenSigner::new("test-secret"), 30)
}

fn signup(auth: &AuthService, email: &str) -> crate::db::Owner {
    let profile = SignupProfile {
        name: "Test Owner".to_string(),
        email: email.to_string(),
        password: "password123".to_string(),
        kind: "author".to_string(),
        whatsapp_number: Some("+2348000000000".to_string()),
        ..Default::default()
    };
    auth.signup(profile, None).unwrap()
}

fn approve(db: &Database, email: &str) {
    assert!(db.set_owner_status(email, OwnerStatus::Approved, None).unwrap());
}

fn new_listing(title: &str) -> NewListing {
    NewListing {
        title: title.to_string(),
        price: "1500".to_string(),
        currency: "NGN".to_string(),
        format: "ebook".to_string(),
        author: Some("Ada".to_string()),
        description: None,
    }
}

// ---------------------------------------------------------------------------
// Accounts and approval lifecycle
// ---------------------------------------------------------------------------

#[test]
fn signup_is_always_pending() {
    let db = test_db();
    let auth = test_auth(&db);

    let owner = signup(&auth, "alice@example.com");
    assert_eq!(owner.status, OwnerStatus::Pending);

    let stored = db.get_owner_by_email("alice@example.com").unwrap().unwrap();
    assert_eq!(stored.status, OwnerStatus::Pending);
}

#[test]
fn signup_derives_username_when_absent() {
    let db = test_db();
    let auth = test_auth(&db);

    let owner = signup(&auth, "Bob.Marley@example.com");
    let username = owner.username.unwrap();
    assert!(username.starts_with("bobmarley-"));
}

#[test]
fn signup_rejects_missing_fields_and_bad_kind() {
    let db = test_db();
    let auth = test_auth(&db);

    let missing = SignupProfile {
        name: "X".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        auth.signup(missing, None),
        Err(AppError::Validation(_))
    ));

    let bad_kind = SignupProfile {
        name: "X".to_string(),
        email: "x@example.com".to_string(),
        password: "pw".to_string(),
        kind: "publisher".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        auth.signup(bad_kind, None),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn duplicate_email_is_a_conflict() {
    let db = test_db();
    let auth = test_auth(&db);

    signup(&auth, "dup@example.com");
    let again = SignupProfile {
        name: "Other".to_string(),
        email: "dup@example.com".to_string(),
        password: "pw".to_string(),
        kind: "bookstore".to_string(),
        ..Default::default()
    };
    match auth.signup(again, None) {
        Err(AppError::Conflict(msg)) => assert_eq!(msg, "Email already in use"),
        other => panic!("expected conflict, got {:?}", other.map(|o| o.email)),
    }
}

#[test]
fn storage_level_unique_violation_maps_to_conflict() {
    // Bypass the service pre-checks to exercise the race path: two records
    // with the same email hitting the UNIQUE constraint directly.
    let db = test_db();
    let auth = test_auth(&db);

    let first = signup(&auth, "race@example.com");
    let mut second = first.clone();
    second.id = "other-id".to_string();
    second.username = Some("other-handle".to_string());

    match db.create_owner(&second) {
        Err(AppError::Conflict(msg)) => assert_eq!(msg, "Email already in use"),
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[test]
fn storage_level_username_violation_maps_to_conflict() {
    let db = test_db();
    let auth = test_auth(&db);

    let first = signup(&auth, "a@example.com");
    let mut second = first.clone();
    second.id = "other-id".to_string();
    second.email = "b@example.com".to_string();

    match db.create_owner(&second) {
        Err(AppError::Conflict(msg)) => assert_eq!(msg, "Username already in use"),
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[test]
fn login_miss_and_mismatch_are_indistinguishable() {
    let db = test_db();
    let auth = test_auth(&db);

    signup(&auth, "carol@example.com");
    approve(&db, "carol@example.com");

    let unknown = auth.login("nobody@example.com", "password123");
    let mismatch = auth.login("carol@example.com", "wrong-password");

    match (unknown, mismatch) {
        (Err(AppError::Unauthenticated(a)), Err(AppError::Unauthenticated(b))) => {
            assert_eq!(a, b);
            assert_eq!(a, "Invalid credentials");
        }
        other => panic!("expected matching auth errors, got {:?}", other.0.is_ok()),
    }
}

#[test]
fn pending_owner_cannot_login_even_with_correct_password() {
    let db = test_db();
    let auth = test_auth(&db);

    signup(&auth, "dave@example.com");

    match auth.login("dave@example.com", "password123") {
        Err(AppError::Forbidden(msg)) => assert_eq!(msg, "Account not approved yet"),
        other => panic!("expected forbidden, got ok={}", other.is_ok()),
    }
}

#[test]
fn rejected_owner_cannot_login() {
    let db = test_db();
    let auth = test_auth(&db);

    signup(&auth, "eve@example.com");
    db.set_owner_status("eve@example.com", OwnerStatus::Rejected, Some("spam"))
        .unwrap();

    assert!(matches!(
        auth.login("eve@example.com", "password123"),
        Err(AppError::Forbidden(_))
    ));
}

#[test]
fn approved_owner_login_and_token_resolve() {
    let db = test_db();
    let auth = test_auth(&db);

    let owner = signup(&auth, "frank@example.com");
    approve(&db, "frank@example.com");

    let (logged_in, token) = auth.login("frank@example.com", "password123").unwrap();
    assert_eq!(logged_in.id, owner.id);

    let resolved = auth.resolve(&token).unwrap();
    assert_eq!(resolved.id, owner.id);
    // The resolved owner never carries a password hash.
    assert!(resolved.password_hash.is_empty());
}

#[test]
fn token_for_deleted_owner_is_rejected() {
    let db = test_db();
    let auth = test_auth(&db);

    signup(&auth, "gone@example.com");
    approve(&db, "gone@example.com");
    let (_, token) = auth.login("gone@example.com", "password123").unwrap();

    assert!(db.delete_owner("gone@example.com").unwrap());

    assert!(matches!(
        auth.resolve(&token),
        Err(AppError::Unauthenticated(_))
    ));
}

#[test]
fn approval_status_survives_profile_updates() {
    let db = test_db();
    let auth = test_auth(&db);

    let mut owner = signup(&auth, "grace@example.com");
    approve(&db, "grace@example.com");

    owner = db.get_owner_by_email("grace@example.com").unwrap().unwrap();
    owner.bio = Some("Updated bio".to_string());
    db.update_owner_profile(&owner).unwrap();

    let stored = db.get_owner_by_email("grace@example.com").unwrap().unwrap();
    assert_eq!(stored.status, OwnerStatus::Approved);
    assert_eq!(stored.bio.as_deref(), Some("Updated bio"));
}

// ---------------------------------------------------------------------------
// Listings and ownership
// ---------------------------------------------------------------------------

#[test]
fn create_and_list_own_books() {
    let db = test_db();
    let auth = test_auth(&db);
    let listings = ListingService::new(db.clone());

    let owner = signup(&auth, "seller@example.com");
    let created = listings
        .create(&owner, new_listing("Things Fall Apart"), "https://img/1".to_string())
        .unwrap();

    assert_eq!(created.owner_id, owner.id);
    // Contact snapshot is taken at creation.
    assert_eq!(created.owner_whats_app.as_deref(), Some("+2348000000000"));

    let mine = listings.list_mine(&owner).unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].title, "Things Fall Apart");
}

#[test]
fn create_rejects_invalid_currency_and_persists_nothing() {
    let db = test_db();
    let auth = test_auth(&db);
    let listings = ListingService::new(db.clone());

    let owner = signup(&auth, "seller@example.com");
    let mut input = new_listing("Bad Money");
    input.currency = "BTC".to_string();

    assert!(matches!(
        listings.create(&owner, input, "https://img/1".to_string()),
        Err(AppError::Validation(_))
    ));
    assert!(listings.list_mine(&owner).unwrap().is_empty());
}

#[test]
fn create_rejects_invalid_format_and_price() {
    let db = test_db();
    let auth = test_auth(&db);
    let listings = ListingService::new(db.clone());
    let owner = signup(&auth, "seller@example.com");

    let mut bad_format = new_listing("X");
    bad_format.format = "hardcover".to_string();
    assert!(listings
        .create(&owner, bad_format, "https://img/1".to_string())
        .is_err());

    let mut bad_price = new_listing("X");
    bad_price.price = "free".to_string();
    assert!(listings
        .create(&owner, bad_price, "https://img/1".to_string())
        .is_err());
}

#[test]
fn non_owner_cannot_update_or_delete() {
    let db = test_db();
    let auth = test_auth(&db);
    let listings = ListingService::new(db.clone());

    let owner = signup(&auth, "owner@example.com");
    let intruder = signup(&auth, "intruder@example.com");

    let listing = listings
        .create(&owner, new_listing("Mine"), "https://img/1".to_string())
        .unwrap();

    let patch = ListingPatch {
        title: Some("Stolen".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        listings.update(&intruder, &listing.id, patch, None),
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        listings.delete(&intruder, &listing.id),
        Err(AppError::Forbidden(_))
    ));

    // Untouched.
    let stored = db.get_listing(&listing.id).unwrap().unwrap();
    assert_eq!(stored.title, "Mine");
}

#[test]
fn missing_listing_is_not_found() {
    let db = test_db();
    let auth = test_auth(&db);
    let listings = ListingService::new(db.clone());
    let owner = signup(&auth, "owner@example.com");

    assert!(matches!(
        listings.delete(&owner, "no-such-id"),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn update_is_partial_and_owner_reference_is_immutable() {
    let db = test_db();
    let auth = test_auth(&db);
    let listings = ListingService::new(db.clone());
    let owner = signup(&auth, "owner@example.com");

    let listing = listings
        .create(&owner, new_listing("First Edition"), "https://img/1".to_string())
        .unwrap();

    let patch = ListingPatch {
        price: Some("2000".to_string()),
        ..Default::default()
    };
    let updated = listings
        .update(&owner, &listing.id, patch, Some("https://img/2".to_string()))
        .unwrap();

    assert_eq!(updated.title, "First Edition");
    assert_eq!(updated.price, 2000.0);
    assert_eq!(updated.cover_image, "https://img/2");
    assert_eq!(updated.owner_id, owner.id);
}

#[test]
fn delete_removes_the_listing() {
    let db = test_db();
    let auth = test_auth(&db);
    let listings = ListingService::new(db.clone());
    let owner = signup(&auth, "owner@example.com");

    let listing = listings
        .create(&owner, new_listing("Ephemeral"), "https://img/1".to_string())
        .unwrap();
    listings.delete(&owner, &listing.id).unwrap();

    assert!(db.get_listing(&listing.id).unwrap().is_none());
    assert!(listings.list_mine(&owner).unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Public catalog
// ---------------------------------------------------------------------------

#[test]
fn catalog_shows_only_approved_owners_and_tracks_status_flips() {
    let db = test_db();
    let auth = test_auth(&db);
    let listings = ListingService::new(db.clone());

    let owner = signup(&auth, "shop@example.com");
    listings
        .create(&owner, new_listing("Hidden Gem"), "https://img/1".to_string())
        .unwrap();

    // Pending owner: invisible.
    assert!(catalog::search(&db, None).unwrap().is_empty());

    // Approval exposes the existing listing with no listing-side change.
    approve(&db, "shop@example.com");
    let visible = catalog::search(&db, None).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].title, "Hidden Gem");
    assert_eq!(visible[0].owner.name, "Test Owner");

    // Rejection hides it again.
    db.set_owner_status("shop@example.com", OwnerStatus::Rejected, None)
        .unwrap();
    assert!(catalog::search(&db, None).unwrap().is_empty());
}

#[test]
fn catalog_search_matches_title_or_author_case_insensitive() {
    let db = test_db();
    let auth = test_auth(&db);
    let listings = ListingService::new(db.clone());

    let owner = signup(&auth, "shop@example.com");
    approve(&db, "shop@example.com");

    listings
        .create(&owner, new_listing("Purple Hibiscus"), "https://img/1".to_string())
        .unwrap();
    let mut by_author = new_listing("Other Title");
    by_author.author = Some("Chinua Achebe".to_string());
    listings
        .create(&owner, by_author, "https://img/2".to_string())
        .unwrap();

    let by_title = catalog::search(&db, Some("hibiscus")).unwrap();
    assert_eq!(by_title.len(), 1);
    assert_eq!(by_title[0].title, "Purple Hibiscus");

    let by_author = catalog::search(&db, Some("ACHEBE")).unwrap();
    assert_eq!(by_author.len(), 1);
    assert_eq!(by_author[0].title, "Other Title");

    assert!(catalog::search(&db, Some("zzzz")).unwrap().is_empty());
    // Blank queries return everything.
    assert_eq!(catalog::search(&db, Some("")).unwrap().len(), 2);
}

#[test]
fn catalog_json_never_exposes_owner_status() {
    let db = test_db();
    let auth = test_auth(&db);
    let listings = ListingService::new(db.clone());

    let owner = signup(&auth, "shop@example.com");
    approve(&db, "shop@example.com");
    listings
        .create(&owner, new_listing("Open Book"), "https://img/1".to_string())
        .unwrap();

    let results = catalog::search(&db, None).unwrap();
    let json = serde_json::to_string(&results).unwrap();
    assert!(!json.contains("status"));
    assert!(!json.contains("password"));
    assert!(json.contains("\"owner\""));
}

// ---------------------------------------------------------------------------
// Theme setting
// ---------------------------------------------------------------------------

#[test]
fn theme_is_a_singleton_row() {
    let db = test_db();

    assert!(db.get_theme().unwrap().is_none());

    db.upsert_theme(ThemeMode::Dark).unwrap();
    db.upsert_theme(ThemeMode::Light).unwrap();

    assert_eq!(db.get_theme().unwrap(), Some(ThemeMode::Light));
    assert_eq!(db.theme_row_count().unwrap(), 1);
}
