use crate::helpers::{provision, spawn_harness};
use anyhow::Result;
use bytes::Bytes;
use davit::{
    dav::{DavTarget, PutOptions, public::PublicEndpoint},
    ocs::{OcsFormat, OcsVersion, ShareArgs, ShareType, extract_created_share, parse_meta},
};

#[tokio::test]
async fn test_user_share_lifecycle() -> Result<()> {
    // Arrange
    let mut harness = spawn_harness().await;
    provision(&mut harness, "Brian").await;
    let admin = harness.admin_auth();
    harness
        .dav()
        .put(
            &admin,
            &DavTarget::Old,
            "shared.txt",
            Bytes::from_static(b"for brian"),
            &PutOptions::default(),
        )
        .await?
        .assert_status(201)?;
    let ocs = harness.ocs();

    // Act: create over the v1 endpoint, XML envelope
    let args = ShareArgs {
        path: "/shared.txt".to_owned(),
        share_with: Some("Brian".to_owned()),
        permissions: Some(19),
        ..Default::default()
    };
    let resp = ocs
        .create_share(&admin, OcsVersion::V1, OcsFormat::Xml, ShareType::User, &args)
        .await?;

    // Assert
    resp.assert_status(200)?;
    let meta = parse_meta(&resp)?;
    assert_eq!(meta.statuscode, 100);
    let share = extract_created_share(&resp)?;

    let resp = ocs
        .get_share(&admin, OcsVersion::V1, OcsFormat::Json, &share.id)
        .await?;
    resp.assert_json_path_eq("ocs.data.share_with", "Brian")?;

    ocs.update_share(
        &admin,
        OcsVersion::V1,
        OcsFormat::Json,
        &share.id,
        &[("permissions", "31")],
    )
    .await?
    .assert_json_path_eq("ocs.data.permissions", "31")?;

    // Tidy
    let resp = ocs
        .delete_share(&admin, OcsVersion::V1, OcsFormat::Xml, &share.id)
        .await?;
    assert_eq!(parse_meta(&resp)?.statuscode, 100);
    let resp = ocs
        .get_share(&admin, OcsVersion::V1, OcsFormat::Xml, &share.id)
        .await?;
    assert_eq!(parse_meta(&resp)?.statuscode, 404);
    Ok(())
}

#[tokio::test]
async fn test_v2_json_envelope_statuscodes() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();

    // Act & Assert: v2 reports 200 in meta and the real HTTP status
    let resp = harness
        .ocs()
        .capabilities(&admin, OcsVersion::V2, OcsFormat::Json)
        .await?;
    resp.assert_status(200)?;
    resp.assert_json_path_eq("ocs.meta.statuscode", "200")?;
    resp.assert_json_path_eq(
        "ocs.data.capabilities.files.bigfilechunking",
        "true",
    )?;

    // a failure on v2 surfaces as a failing HTTP status too
    let resp = harness
        .ocs()
        .get_share(&admin, OcsVersion::V2, OcsFormat::Json, "99999")
        .await?;
    resp.assert_status(404)?;
    resp.assert_json_path_eq("ocs.meta.status", "failure")?;
    Ok(())
}

#[tokio::test]
async fn test_v1_wraps_failures_in_http_200() -> Result<()> {
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let args = ShareArgs {
        path: "/no-such-file.txt".to_owned(),
        ..Default::default()
    };
    let resp = harness
        .ocs()
        .create_share(&admin, OcsVersion::V1, OcsFormat::Xml, ShareType::Link, &args)
        .await?;
    resp.assert_status(200)?;
    let meta = parse_meta(&resp)?;
    assert_eq!(meta.statuscode, 404);
    assert!(meta.message.is_some_and(|m| m.contains("does not exist")));
    Ok(())
}

#[tokio::test]
async fn test_link_share_public_webdav() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let dav = harness.dav();
    dav.mkcol(&admin, &DavTarget::Old, "public-folder").await?.assert_status(201)?;
    dav.put(
        &admin,
        &DavTarget::Old,
        "public-folder/read-me.txt",
        Bytes::from_static(b"hello visitors"),
        &PutOptions::default(),
    )
    .await?
    .assert_status(201)?;

    // Act
    let args = ShareArgs {
        path: "/public-folder".to_owned(),
        name: Some("my link".to_owned()),
        permissions: Some(15),
        ..Default::default()
    };
    let resp = harness
        .ocs()
        .create_share(&admin, OcsVersion::V2, OcsFormat::Json, ShareType::Link, &args)
        .await?;
    resp.assert_status(200)?;
    let share = extract_created_share(&resp)?;
    let token = share.token.expect("link shares carry a token");

    // Assert: both public endpoints resolve inside the shared folder
    let public = harness.public();
    let resp = public
        .get(PublicEndpoint::Legacy, &token, None, "read-me.txt")
        .await?;
    resp.assert_status(200)?;
    assert_eq!(resp.body_string(), "hello visitors");

    let resp = public
        .get(PublicEndpoint::New, &token, None, "read-me.txt")
        .await?;
    resp.assert_status(200)?;

    // an anonymous upload lands in the owner's tree
    public
        .put(
            PublicEndpoint::New,
            &token,
            None,
            "dropped.txt",
            Bytes::from_static(b"from outside"),
        )
        .await?
        .assert_status(201)?;
    let resp = dav
        .get(&admin, &DavTarget::Old, "public-folder/dropped.txt")
        .await?;
    resp.assert_status(200)?;
    assert_eq!(resp.body_string(), "from outside");
    Ok(())
}

#[tokio::test]
async fn test_password_protected_link() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    harness
        .dav()
        .put(
            &admin,
            &DavTarget::Old,
            "secret.txt",
            Bytes::from_static(b"classified"),
            &PutOptions::default(),
        )
        .await?
        .assert_status(201)?;
    let args = ShareArgs {
        path: "/secret.txt".to_owned(),
        password: Some("open sesame".to_owned()),
        ..Default::default()
    };
    let resp = harness
        .ocs()
        .create_share(&admin, OcsVersion::V2, OcsFormat::Json, ShareType::Link, &args)
        .await?;
    let token = extract_created_share(&resp)?.token.expect("token");

    // Act & Assert
    let public = harness.public();
    public
        .get(PublicEndpoint::New, &token, None, "")
        .await?
        .assert_status(401)?;
    public
        .get(PublicEndpoint::New, &token, Some("open sesame"), "")
        .await?
        .assert_status(200)?;
    public
        .get(PublicEndpoint::Legacy, &token, Some("open sesame"), "")
        .await?
        .assert_status(200)?;
    Ok(())
}

#[tokio::test]
async fn test_share_notifications() -> Result<()> {
    // Arrange
    let mut harness = spawn_harness().await;
    provision(&mut harness, "Brian").await;
    let admin = harness.admin_auth();
    harness
        .dav()
        .put(
            &admin,
            &DavTarget::Old,
            "note.txt",
            Bytes::from_static(b"x"),
            &PutOptions::default(),
        )
        .await?
        .assert_status(201)?;
    let ocs = harness.ocs();
    let args = ShareArgs {
        path: "/note.txt".to_owned(),
        share_with: Some("Brian".to_owned()),
        ..Default::default()
    };
    ocs.create_share(&admin, OcsVersion::V2, OcsFormat::Json, ShareType::User, &args)
        .await?
        .assert_status(200)?;

    // Act & Assert
    let resp = ocs
        .list_notifications(&admin, OcsVersion::V2, OcsFormat::Json)
        .await?;
    resp.assert_status(200)?;
    resp.assert_body_contains("notification_id")?;

    ocs.delete_all_notifications(&admin, OcsVersion::V2, OcsFormat::Json)
        .await?
        .assert_status(200)?;
    let resp = ocs
        .list_notifications(&admin, OcsVersion::V2, OcsFormat::Json)
        .await?;
    assert!(resp.json_path("ocs.data.0").is_err());
    Ok(())
}

#[tokio::test]
async fn test_pending_share_accept_and_decline() -> Result<()> {
    // Arrange
    let mut harness = spawn_harness().await;
    provision(&mut harness, "Brian").await;
    let admin = harness.admin_auth();
    harness
        .dav()
        .put(
            &admin,
            &DavTarget::Old,
            "pending.txt",
            Bytes::from_static(b"x"),
            &PutOptions::default(),
        )
        .await?
        .assert_status(201)?;
    let ocs = harness.ocs();
    let args = ShareArgs {
        path: "/pending.txt".to_owned(),
        share_with: Some("Brian".to_owned()),
        ..Default::default()
    };
    let resp = ocs
        .create_share(&admin, OcsVersion::V2, OcsFormat::Json, ShareType::User, &args)
        .await?;
    let share = extract_created_share(&resp)?;
    let brian = harness.auth_for("Brian")?;

    // Act & Assert
    ocs.accept_pending_share(&brian, OcsVersion::V2, OcsFormat::Json, &share.id)
        .await?
        .assert_status(200)?;
    ocs.decline_pending_share(&brian, OcsVersion::V2, OcsFormat::Json, &share.id)
        .await?
        .assert_status(200)?;
    let resp = ocs
        .accept_pending_share(&brian, OcsVersion::V2, OcsFormat::Json, "424242")
        .await?;
    resp.assert_status(404)?;
    Ok(())
}
