use crate::helpers::spawn_harness;
use anyhow::Result;
use bytes::Bytes;
use davit::dav::{DavTarget, LockArgs, PutOptions};

#[tokio::test]
async fn test_lock_put_unlock_cycle() -> Result<()> {
    // Arrange
    let mut harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let dav = harness.dav();
    dav.put(
        &admin,
        &DavTarget::Old,
        "guarded.txt",
        Bytes::from_static(b"v1"),
        &PutOptions::default(),
    )
    .await?
    .assert_status(201)?;

    // Act: lock and record the token
    harness
        .lock_and_record("admin", &DavTarget::Old, "guarded.txt", &LockArgs::default())
        .await?;
    harness.scenario.last_response()?.assert_status(200)?;
    let token = harness
        .scenario
        .locks
        .token_for("admin", "guarded.txt")?
        .to_owned();
    assert!(token.starts_with("opaquelocktoken:"));

    // Assert: writes without the token bounce, with it they pass
    dav.put(
        &admin,
        &DavTarget::Old,
        "guarded.txt",
        Bytes::from_static(b"v2"),
        &PutOptions::default(),
    )
    .await?
    .assert_status(423)?;

    let options = PutOptions {
        lock_token: Some(token),
        ..Default::default()
    };
    dav.put(
        &admin,
        &DavTarget::Old,
        "guarded.txt",
        Bytes::from_static(b"v2"),
        &options,
    )
    .await?
    .assert_status(204)?;

    // Tidy: unlock frees the resource again
    harness
        .unlock_and_forget("admin", &DavTarget::Old, "guarded.txt")
        .await?;
    harness.scenario.last_response()?.assert_status(204)?;
    assert!(harness.scenario.locks.token_for("admin", "guarded.txt").is_err());
    dav.put(
        &admin,
        &DavTarget::Old,
        "guarded.txt",
        Bytes::from_static(b"v3"),
        &PutOptions::default(),
    )
    .await?
    .assert_status(204)?;
    Ok(())
}

#[tokio::test]
async fn test_unlock_with_wrong_token_fails() -> Result<()> {
    // Arrange
    let mut harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let dav = harness.dav();
    dav.put(
        &admin,
        &DavTarget::Old,
        "locked.txt",
        Bytes::from_static(b"x"),
        &PutOptions::default(),
    )
    .await?
    .assert_status(201)?;
    harness
        .lock_and_record("admin", &DavTarget::Old, "locked.txt", &LockArgs::default())
        .await?;

    // Act
    let resp = dav
        .unlock(
            &admin,
            &DavTarget::Old,
            "locked.txt",
            "opaquelocktoken:not-the-token",
        )
        .await?;

    // Assert: refused, and the real token is still usable
    resp.assert_status(409)?;
    harness
        .unlock_and_forget("admin", &DavTarget::Old, "locked.txt")
        .await?;
    harness.scenario.last_response()?.assert_status(204)?;
    Ok(())
}

#[tokio::test]
async fn test_lock_missing_path_creates_lock_null() -> Result<()> {
    // Arrange
    let mut harness = spawn_harness().await;

    // Act
    harness
        .lock_and_record("admin", &DavTarget::Old, "not-yet.txt", &LockArgs::default())
        .await?;

    // Assert
    harness.scenario.last_response()?.assert_status(201)?;
    assert!(
        harness
            .scenario
            .locks
            .token_for("admin", "not-yet.txt")
            .is_ok()
    );
    Ok(())
}

#[tokio::test]
async fn test_delete_locked_file_needs_token() -> Result<()> {
    // Arrange
    let mut harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let dav = harness.dav();
    dav.put(
        &admin,
        &DavTarget::Old,
        "undeletable.txt",
        Bytes::from_static(b"x"),
        &PutOptions::default(),
    )
    .await?
    .assert_status(201)?;
    harness
        .lock_and_record(
            "admin",
            &DavTarget::Old,
            "undeletable.txt",
            &LockArgs::default(),
        )
        .await?;
    let token = harness
        .scenario
        .locks
        .token_for("admin", "undeletable.txt")?
        .to_owned();

    // Act & Assert
    dav.delete(&admin, &DavTarget::Old, "undeletable.txt", None)
        .await?
        .assert_status(423)?;
    dav.delete(&admin, &DavTarget::Old, "undeletable.txt", Some(&token))
        .await?
        .assert_status(204)?;
    Ok(())
}

#[tokio::test]
async fn test_move_of_locked_source_needs_token() -> Result<()> {
    // Arrange
    let mut harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let dav = harness.dav();
    dav.put(
        &admin,
        &DavTarget::Old,
        "pinned.txt",
        Bytes::from_static(b"x"),
        &PutOptions::default(),
    )
    .await?
    .assert_status(201)?;
    harness
        .lock_and_record("admin", &DavTarget::Old, "pinned.txt", &LockArgs::default())
        .await?;
    let token = harness
        .scenario
        .locks
        .token_for("admin", "pinned.txt")?
        .to_owned();

    // Act & Assert
    dav.r#move(
        &admin,
        &DavTarget::Old,
        "pinned.txt",
        &DavTarget::Old,
        "moved.txt",
        None,
        None,
    )
    .await?
    .assert_status(423)?;

    dav.r#move(
        &admin,
        &DavTarget::Old,
        "pinned.txt",
        &DavTarget::Old,
        "moved.txt",
        None,
        Some(&token),
    )
    .await?
    .assert_status(201)?;
    Ok(())
}
