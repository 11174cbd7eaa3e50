use crate::helpers::spawn_harness;
use anyhow::Result;
use bytes::Bytes;
use davit::{
    dav::{DavTarget, PutOptions, headers::Depth},
    graph::{extract_drive_webdav_url, extract_id},
};
use serde_json::json;

#[tokio::test]
async fn test_graph_user_lifecycle() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let graph = harness.graph();

    // Act
    let resp = graph
        .create_user(&admin, "Ingrid", "pw", Some("Ingrid Newkirk"), None)
        .await?;

    // Assert
    resp.assert_status(201)?;
    let user_id = extract_id(&resp)?;

    // lookups work by name and by id
    graph
        .get_user(&admin, "Ingrid")
        .await?
        .assert_json_path_eq("displayName", "Ingrid Newkirk")?;
    graph
        .get_user(&admin, &user_id)
        .await?
        .assert_json_path_eq("onPremisesSamAccountName", "Ingrid")?;

    graph
        .patch_user(&admin, "Ingrid", &json!({ "displayName": "I. Newkirk" }))
        .await?
        .assert_json_path_eq("displayName", "I. Newkirk")?;

    let resp = graph.list_users(&admin, Some("Ingrid")).await?;
    resp.assert_body_contains("Ingrid")?;
    let resp = graph.list_users(&admin, Some("nobody-matches-this")).await?;
    assert!(resp.json_path("value.0").is_err());

    // duplicate name is refused with the Graph error shape
    let resp = graph.create_user(&admin, "Ingrid", "pw", None, None).await?;
    resp.assert_status(409)?;
    resp.assert_body_contains("nameAlreadyExists")?;

    // Tidy
    graph.delete_user(&admin, "Ingrid").await?.assert_status(204)?;
    graph.get_user(&admin, "Ingrid").await?.assert_status(404)?;
    Ok(())
}

#[tokio::test]
async fn test_graph_group_membership() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let graph = harness.graph();
    let resp = graph.create_user(&admin, "Judy", "pw", None, None).await?;
    let user_id = extract_id(&resp)?;
    let resp = graph.create_group(&admin, "chemists").await?;
    resp.assert_status(201)?;
    let group_id = extract_id(&resp)?;

    // Act
    graph
        .add_group_member(&admin, &group_id, &user_id)
        .await?
        .assert_status(204)?;

    // Assert
    let resp = graph.get_group(&admin, &group_id).await?;
    resp.assert_json_path_eq("members.0.onPremisesSamAccountName", "Judy")?;

    graph
        .remove_group_member(&admin, &group_id, &user_id)
        .await?
        .assert_status(204)?;
    let resp = graph.get_group(&admin, &group_id).await?;
    assert!(resp.json_path("members.0").is_err());

    // Tidy
    graph.delete_group(&admin, &group_id).await?.assert_status(204)?;
    graph.get_group(&admin, &group_id).await?.assert_status(404)?;
    Ok(())
}

#[tokio::test]
async fn test_drive_lifecycle() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let graph = harness.graph();
    let dav = harness.dav();

    // Act
    let resp = graph
        .create_drive(&admin, "Marketing", Some(10_000_000))
        .await?;

    // Assert
    resp.assert_status(201)?;
    resp.assert_json_path_eq("quota.total", "10000000")?;
    let drive_id = extract_id(&resp)?;
    let webdav_url = extract_drive_webdav_url(&resp)?;
    assert!(webdav_url.ends_with(&format!("remote.php/dav/spaces/{drive_id}")));

    // files live under the space tree
    let target = DavTarget::spaces(&drive_id);
    dav.put(
        &admin,
        &target,
        "plan.txt",
        Bytes::from_static(b"q3 roadmap"),
        &PutOptions::default(),
    )
    .await?
    .assert_status(201)?;
    let resp = dav.get(&admin, &target, "plan.txt").await?;
    assert_eq!(resp.body_string(), "q3 roadmap");

    let resp = graph.my_drives(&admin).await?;
    resp.assert_body_contains("Marketing")?;

    graph
        .patch_drive(&admin, &drive_id, &json!({ "name": "Sales" }))
        .await?
        .assert_json_path_eq("name", "Sales")?;

    // purge before disable is refused
    let resp = graph.purge_drive(&admin, &drive_id).await?;
    resp.assert_status(400)?;
    resp.assert_body_contains("only disabled drives can be purged")?;

    // disabled drives disappear from the listing but still resolve by id
    graph.disable_drive(&admin, &drive_id).await?.assert_status(204)?;
    let resp = graph.my_drives(&admin).await?;
    assert!(!resp.body_string().contains("Sales"));
    graph.get_drive(&admin, &drive_id).await?.assert_status(200)?;

    // Tidy
    graph.purge_drive(&admin, &drive_id).await?.assert_status(204)?;
    graph.get_drive(&admin, &drive_id).await?.assert_status(404)?;
    Ok(())
}

#[tokio::test]
async fn test_tag_assignment() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let graph = harness.graph();
    let dav = harness.dav();
    let target = DavTarget::new_for("admin");
    dav.put(
        &admin,
        &target,
        "tagged.txt",
        Bytes::from_static(b"x"),
        &PutOptions::default(),
    )
    .await?
    .assert_status(201)?;
    let listing = dav
        .propfind(&admin, &target, "tagged.txt", Depth::Zero, &[])
        .await?;
    let blocks = listing.multistatus()?;
    let file_id = blocks
        .first()
        .and_then(|b| b.prop("fileid"))
        .expect("propfind should report oc:fileid")
        .to_owned();

    // Act
    graph
        .assign_tags(&admin, &file_id, &["quarterly", "draft"])
        .await?
        .assert_status(200)?;

    // Assert
    let resp = graph.list_tags(&admin).await?;
    resp.assert_body_contains("quarterly")?;
    resp.assert_body_contains("draft")?;

    graph
        .unassign_tags(&admin, &file_id, &["draft"])
        .await?
        .assert_status(200)?;

    // unknown resource ids are refused
    let resp = graph
        .assign_tags(&admin, "not-a-real-fileid", &["x"])
        .await?;
    resp.assert_status(404)?;
    Ok(())
}

#[tokio::test]
async fn test_item_permissions() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let graph = harness.graph();
    let resp = graph.create_user(&admin, "Karen", "pw", None, None).await?;
    let user_id = extract_id(&resp)?;
    let resp = graph.create_drive(&admin, "Shared space", None).await?;
    let drive_id = extract_id(&resp)?;

    // Act
    let resp = graph
        .invite_to_item(&admin, &drive_id, "root", &[&user_id], &["viewer"])
        .await?;

    // Assert
    resp.assert_status(200)?;
    let permission_id = resp.json_path_string("value.0.id")?;
    let resp = graph.list_permissions(&admin, &drive_id, "root").await?;
    resp.assert_body_contains(&permission_id)?;

    graph
        .delete_permission(&admin, &drive_id, "root", &permission_id)
        .await?
        .assert_status(204)?;
    let resp = graph.list_permissions(&admin, &drive_id, "root").await?;
    assert!(!resp.body_string().contains(&permission_id));
    Ok(())
}
