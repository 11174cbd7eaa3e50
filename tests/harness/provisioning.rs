use crate::helpers::spawn_harness;
use anyhow::Result;
use bytes::Bytes;
use davit::{
    dav::{DavTarget, PutOptions, headers::Depth},
    http::Auth,
    ocs::{OcsFormat, OcsVersion, parse_meta},
};

#[tokio::test]
async fn test_created_user_can_log_in() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let ocs = harness.ocs();

    // Act
    let resp = ocs
        .create_user(
            &admin,
            OcsVersion::V1,
            OcsFormat::Xml,
            "Carol",
            "secret",
            None,
            Some("Carol King"),
        )
        .await?;

    // Assert
    resp.assert_status(200)?;
    assert_eq!(parse_meta(&resp)?.statuscode, 100);

    let carol = Auth::basic("Carol", "secret");
    let resp = harness
        .dav()
        .propfind(&carol, &DavTarget::new_for("Carol"), "", Depth::Zero, &[])
        .await?;
    resp.assert_status(207)?;

    // the wrong password is still refused
    let resp = harness
        .dav()
        .propfind(
            &Auth::basic("Carol", "wrong"),
            &DavTarget::new_for("Carol"),
            "",
            Depth::Zero,
            &[],
        )
        .await?;
    resp.assert_status(401)?;
    Ok(())
}

#[tokio::test]
async fn test_duplicate_user_is_rejected() -> Result<()> {
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let ocs = harness.ocs();
    ocs.create_user(&admin, OcsVersion::V1, OcsFormat::Xml, "Dup", "pw", None, None)
        .await?
        .assert_status(200)?;

    let resp = ocs
        .create_user(&admin, OcsVersion::V1, OcsFormat::Xml, "Dup", "pw", None, None)
        .await?;
    // v1 still answers HTTP 200, the failure lives in the envelope
    resp.assert_status(200)?;
    let meta = parse_meta(&resp)?;
    assert_eq!(meta.statuscode, 102);
    Ok(())
}

#[tokio::test]
async fn test_password_change_invalidates_old_one() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let ocs = harness.ocs();
    ocs.create_user(&admin, OcsVersion::V2, OcsFormat::Json, "Erin", "before", None, None)
        .await?
        .assert_status(200)?;

    // Act
    ocs.edit_user(&admin, OcsVersion::V2, OcsFormat::Json, "Erin", "password", "after")
        .await?
        .assert_status(200)?;

    // Assert
    let dav = harness.dav();
    let target = DavTarget::new_for("Erin");
    dav.propfind(&Auth::basic("Erin", "before"), &target, "", Depth::Zero, &[])
        .await?
        .assert_status(401)?;
    dav.propfind(&Auth::basic("Erin", "after"), &target, "", Depth::Zero, &[])
        .await?
        .assert_status(207)?;
    Ok(())
}

#[tokio::test]
async fn test_get_and_edit_displayname() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let ocs = harness.ocs();
    ocs.create_user(
        &admin,
        OcsVersion::V2,
        OcsFormat::Json,
        "Frank",
        "pw",
        Some("frank@example.org"),
        Some("Frank Zappa"),
    )
    .await?
    .assert_status(200)?;

    // Act & Assert
    let resp = ocs
        .get_user(&admin, OcsVersion::V2, OcsFormat::Json, "Frank")
        .await?;
    resp.assert_json_path_eq("ocs.data.displayname", "Frank Zappa")?;
    resp.assert_json_path_eq("ocs.data.email", "frank@example.org")?;

    ocs.edit_user(&admin, OcsVersion::V2, OcsFormat::Json, "Frank", "displayname", "F. Zappa")
        .await?
        .assert_status(200)?;
    let resp = ocs
        .get_user(&admin, OcsVersion::V2, OcsFormat::Json, "Frank")
        .await?;
    resp.assert_json_path_eq("ocs.data.displayname", "F. Zappa")?;
    Ok(())
}

#[tokio::test]
async fn test_group_membership_roundtrip() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let ocs = harness.ocs();
    ocs.create_user(&admin, OcsVersion::V2, OcsFormat::Json, "Grace", "pw", None, None)
        .await?
        .assert_status(200)?;
    ocs.create_group(&admin, OcsVersion::V2, OcsFormat::Json, "physics")
        .await?
        .assert_status(200)?;

    // Act
    ocs.add_user_to_group(&admin, OcsVersion::V2, OcsFormat::Json, "Grace", "physics")
        .await?
        .assert_status(200)?;

    // Assert
    let resp = ocs
        .user_groups(&admin, OcsVersion::V2, OcsFormat::Json, "Grace")
        .await?;
    resp.assert_body_contains("physics")?;

    ocs.remove_user_from_group(&admin, OcsVersion::V2, OcsFormat::Json, "Grace", "physics")
        .await?
        .assert_status(200)?;
    let resp = ocs
        .user_groups(&admin, OcsVersion::V2, OcsFormat::Json, "Grace")
        .await?;
    assert!(!resp.body_string().contains("physics"));

    // Tidy
    ocs.delete_group(&admin, OcsVersion::V2, OcsFormat::Json, "physics")
        .await?
        .assert_status(200)?;
    let resp = ocs
        .delete_group(&admin, OcsVersion::V2, OcsFormat::Json, "physics")
        .await?;
    resp.assert_status(404)?;
    Ok(())
}

#[tokio::test]
async fn test_deleted_user_loses_access_and_files() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let ocs = harness.ocs();
    ocs.create_user(&admin, OcsVersion::V2, OcsFormat::Json, "Henry", "pw", None, None)
        .await?
        .assert_status(200)?;
    let henry = Auth::basic("Henry", "pw");
    harness
        .dav()
        .put(
            &henry,
            &DavTarget::new_for("Henry"),
            "doc.txt",
            Bytes::from_static(b"mine"),
            &PutOptions::default(),
        )
        .await?
        .assert_status(201)?;

    // Act
    ocs.delete_user(&admin, OcsVersion::V2, OcsFormat::Json, "Henry")
        .await?
        .assert_status(200)?;

    // Assert
    harness
        .dav()
        .get(&henry, &DavTarget::new_for("Henry"), "doc.txt")
        .await?
        .assert_status(401)?;
    let resp = ocs
        .get_user(&admin, OcsVersion::V2, OcsFormat::Json, "Henry")
        .await?;
    resp.assert_status(404)?;
    Ok(())
}
