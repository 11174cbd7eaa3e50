use crate::helpers::spawn_harness;
use anyhow::Result;
use bytes::Bytes;
use davit::dav::{DavTarget, PutOptions, headers::Depth, sha256_checksum};

#[tokio::test]
async fn test_put_get_delete_roundtrip() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let dav = harness.dav();

    // Act & Assert
    let resp = dav
        .put(
            &admin,
            &DavTarget::Old,
            "hello.txt",
            Bytes::from_static(b"lorem ipsum"),
            &PutOptions::default(),
        )
        .await?;
    resp.assert_status(201)?;

    let resp = dav.get(&admin, &DavTarget::Old, "hello.txt").await?;
    resp.assert_status(200)?;
    assert_eq!(resp.body_string(), "lorem ipsum");

    // overwriting an existing file answers 204, not 201
    let resp = dav
        .put(
            &admin,
            &DavTarget::Old,
            "hello.txt",
            Bytes::from_static(b"changed"),
            &PutOptions::default(),
        )
        .await?;
    resp.assert_status(204)?;

    let resp = dav.delete(&admin, &DavTarget::Old, "hello.txt", None).await?;
    resp.assert_status(204)?;

    let resp = dav.get(&admin, &DavTarget::Old, "hello.txt").await?;
    resp.assert_status(404)?;
    resp.assert_body_contains("could not be located")?;
    Ok(())
}

#[tokio::test]
async fn test_mkcol_and_propfind_listing() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let dav = harness.dav();
    dav.mkcol(&admin, &DavTarget::Old, "folder").await?.assert_status(201)?;
    dav.put(
        &admin,
        &DavTarget::Old,
        "folder/a.txt",
        Bytes::from_static(b"a"),
        &PutOptions::default(),
    )
    .await?
    .assert_status(201)?;
    dav.put(
        &admin,
        &DavTarget::Old,
        "folder/b.txt",
        Bytes::from_static(b"bb"),
        &PutOptions::default(),
    )
    .await?
    .assert_status(201)?;

    // Act
    let listing = dav
        .propfind(&admin, &DavTarget::Old, "folder", Depth::One, &[])
        .await?;

    // Assert
    listing.assert_status(207)?;
    listing.assert_href_present("folder/a.txt")?;
    listing.assert_href_present("folder/b.txt")?;
    listing.assert_prop_value("folder/b.txt", "getcontentlength", "2")?;
    let blocks = listing.multistatus()?;
    let folder = blocks
        .iter()
        .find(|b| b.href.ends_with("/folder"))
        .expect("folder itself should be listed");
    assert!(folder.is_collection());

    // depth 0 hides the children
    let self_only = dav
        .propfind(&admin, &DavTarget::Old, "folder", Depth::Zero, &[])
        .await?;
    self_only.assert_status(207)?;
    self_only.assert_href_absent("folder/a.txt")?;
    Ok(())
}

#[tokio::test]
async fn test_put_into_missing_folder_conflicts() -> Result<()> {
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let resp = harness
        .dav()
        .put(
            &admin,
            &DavTarget::Old,
            "missing/file.txt",
            Bytes::from_static(b"x"),
            &PutOptions::default(),
        )
        .await?;
    resp.assert_status(409)?;
    Ok(())
}

#[tokio::test]
async fn test_copy_and_move_with_overwrite() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let dav = harness.dav();
    dav.put(
        &admin,
        &DavTarget::Old,
        "src.txt",
        Bytes::from_static(b"payload"),
        &PutOptions::default(),
    )
    .await?
    .assert_status(201)?;

    // Act & Assert: COPY leaves the source in place
    dav.copy(&admin, &DavTarget::Old, "src.txt", &DavTarget::Old, "copy.txt", None)
        .await?
        .assert_status(201)?;
    dav.get(&admin, &DavTarget::Old, "src.txt").await?.assert_status(200)?;
    dav.get(&admin, &DavTarget::Old, "copy.txt").await?.assert_status(200)?;

    // MOVE onto an existing target respects Overwrite
    let resp = dav
        .r#move(
            &admin,
            &DavTarget::Old,
            "src.txt",
            &DavTarget::Old,
            "copy.txt",
            Some(false),
            None,
        )
        .await?;
    resp.assert_status(412)?;

    let resp = dav
        .r#move(
            &admin,
            &DavTarget::Old,
            "src.txt",
            &DavTarget::Old,
            "copy.txt",
            Some(true),
            None,
        )
        .await?;
    resp.assert_status(204)?;
    dav.get(&admin, &DavTarget::Old, "src.txt").await?.assert_status(404)?;
    Ok(())
}

#[tokio::test]
async fn test_put_streams_body_from_local_file() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let dav = harness.dav();
    let dir = tempfile::tempdir()?;
    let filepath = dir.path().join("payload.bin");
    tokio::fs::write(&filepath, b"streamed from disk").await?;

    // Act
    let resp = dav
        .put_file(
            &admin,
            &DavTarget::Old,
            "streamed.bin",
            &filepath,
            &PutOptions::default(),
        )
        .await?;

    // Assert
    resp.assert_status(201)?;
    let resp = dav.get(&admin, &DavTarget::Old, "streamed.bin").await?;
    resp.assert_status(200)?;
    assert_eq!(resp.body_string(), "streamed from disk");
    Ok(())
}

#[tokio::test]
async fn test_old_and_new_trees_are_the_same_space() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let dav = harness.dav();

    // Act
    dav.put(
        &admin,
        &DavTarget::Old,
        "either.txt",
        Bytes::from_static(b"same bytes"),
        &PutOptions::default(),
    )
    .await?
    .assert_status(201)?;

    // Assert
    let resp = dav
        .get(&admin, &DavTarget::new_for("admin"), "either.txt")
        .await?;
    resp.assert_status(200)?;
    assert_eq!(resp.body_string(), "same bytes");
    Ok(())
}

#[tokio::test]
async fn test_checksum_mismatch_is_rejected() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let dav = harness.dav();
    let payload = Bytes::from_static(b"checked content");

    // Act & Assert
    let options = PutOptions {
        checksum: Some("SHA256:deadbeef".to_owned()),
        ..Default::default()
    };
    dav.put(&admin, &DavTarget::Old, "sum.txt", payload.clone(), &options)
        .await?
        .assert_status(400)?;

    let options = PutOptions {
        checksum: Some(sha256_checksum(&payload)),
        ..Default::default()
    };
    dav.put(&admin, &DavTarget::Old, "sum.txt", payload, &options)
        .await?
        .assert_status(201)?;
    Ok(())
}

#[tokio::test]
async fn test_favorite_proppatch_and_report() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let dav = harness.dav();
    let target = DavTarget::new_for("admin");
    dav.put(
        &admin,
        &target,
        "starred.txt",
        Bytes::from_static(b"keep me"),
        &PutOptions::default(),
    )
    .await?
    .assert_status(201)?;

    // Act
    dav.proppatch(&admin, &target, "starred.txt", &[("favorite", "1")])
        .await?
        .assert_status(207)?;

    // Assert
    let listing = dav
        .propfind(&admin, &target, "starred.txt", Depth::Zero, &[])
        .await?;
    listing.assert_prop_value("starred.txt", "favorite", "1")?;

    let report = dav.report_favorites(&admin, "admin").await?;
    report.assert_status(207)?;
    report.assert_href_present("starred.txt")?;
    Ok(())
}

#[tokio::test]
async fn test_unauthenticated_requests_are_rejected() -> Result<()> {
    let harness = spawn_harness().await;
    let resp = harness
        .dav()
        .get(&davit::http::Auth::None, &DavTarget::Old, "anything.txt")
        .await?;
    resp.assert_status(401)?;
    assert!(
        resp.header("www-authenticate")
            .is_some_and(|v| v.starts_with("Basic"))
    );
    Ok(())
}

#[tokio::test]
async fn test_options_advertises_dav_compliance() -> Result<()> {
    let harness = spawn_harness().await;
    let resp = harness.dav().options(&harness.admin_auth()).await?;
    resp.assert_status(200)?;
    resp.assert_header("DAV", "1, 2")?;
    Ok(())
}
