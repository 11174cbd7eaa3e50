use crate::helpers::spawn_harness;
use anyhow::Result;
use davit::{graph::extract_id, settings::role_id_by_name};

#[tokio::test]
async fn test_roles_list_carries_known_roles() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();

    // Act
    let resp = harness.settings().roles_list(&admin).await?;

    // Assert: the settings service answers 201 even for reads
    resp.assert_status(201)?;
    assert_eq!(
        role_id_by_name(&resp, "Space Admin")?,
        "d7beeea8-8ff4-406b-8fb6-ab2dd81e6b11"
    );
    assert_eq!(
        role_id_by_name(&resp, "Admin")?,
        "71881883-1768-46bd-a24d-a356a2afdf7f"
    );
    assert!(role_id_by_name(&resp, "Overlord").is_err());
    Ok(())
}

#[tokio::test]
async fn test_role_assignment_roundtrip() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let settings = harness.settings();
    let resp = harness
        .graph()
        .create_user(&admin, "Lisa", "pw", None, None)
        .await?;
    let account = extract_id(&resp)?;
    let roles = settings.roles_list(&admin).await?;
    let role_id = role_id_by_name(&roles, "Space Admin")?;

    // Act
    let resp = settings.assignments_add(&admin, &account, &role_id).await?;

    // Assert
    resp.assert_status(201)?;
    let assignment_id = resp.json_path_string("assignment.id")?;
    let resp = settings.assignments_list(&admin, &account).await?;
    resp.assert_json_path_eq("assignments.0.roleId", &role_id)?;

    // assigning another role replaces the first, one role per account
    let user_role = role_id_by_name(&roles, "User")?;
    settings
        .assignments_add(&admin, &account, &user_role)
        .await?
        .assert_status(201)?;
    let resp = settings.assignments_list(&admin, &account).await?;
    resp.assert_json_path_eq("assignments.0.roleId", &user_role)?;
    assert!(resp.json_path("assignments.1").is_err());

    // Tidy
    let resp = settings.assignments_list(&admin, &account).await?;
    let current = resp.json_path_string("assignments.0.id")?;
    settings
        .assignments_remove(&admin, &current)
        .await?
        .assert_status(201)?;
    let resp = settings.assignments_list(&admin, &account).await?;
    assert!(resp.json_path("assignments.0").is_err());
    // the first assignment id is long gone as well
    settings
        .assignments_remove(&admin, &assignment_id)
        .await?
        .assert_status(201)?;
    Ok(())
}

#[tokio::test]
async fn test_unknown_role_is_rejected() -> Result<()> {
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let resp = harness
        .settings()
        .assignments_add(&admin, "some-account", "not-a-role-uuid")
        .await?;
    resp.assert_status(400)?;
    resp.assert_body_contains("unknown role id")?;
    Ok(())
}
