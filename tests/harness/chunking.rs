use crate::helpers::spawn_harness;
use anyhow::Result;
use bytes::Bytes;
use davit::dav::{DavTarget, PutOptions, chunking::split_into_chunks};

#[tokio::test]
async fn test_v1_chunked_upload_assembles() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let dav = harness.dav();
    let payload = b"the quick brown fox jumps over the lazy dog".to_vec();
    let chunks = split_into_chunks(&payload, 3);

    // Act
    let resp = dav
        .upload_chunked_v1(&admin, "big.dat", &chunks, 42)
        .await?;

    // Assert
    resp.assert_status(201)?;
    let resp = dav.get(&admin, &DavTarget::Old, "big.dat").await?;
    resp.assert_status(200)?;
    assert_eq!(resp.body.as_ref(), payload.as_slice());
    Ok(())
}

#[tokio::test]
async fn test_v1_upload_with_no_chunks_is_an_error() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();

    // Act & Assert: nothing to send is reported, not panicked on
    let result = harness
        .dav()
        .upload_chunked_v1(&admin, "void.dat", &[], 42)
        .await;
    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_v1_chunks_out_of_order() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let dav = harness.dav();
    let options = PutOptions {
        chunked: true,
        total_length: Some(6),
        ..Default::default()
    };

    // Act: last chunk first, assembly happens once all pieces are in
    dav.put(
        &admin,
        &DavTarget::Old,
        "ooo.dat-chunking-7-2-1",
        Bytes::from_static(b"def"),
        &options,
    )
    .await?
    .assert_status(201)?;
    dav.get(&admin, &DavTarget::Old, "ooo.dat").await?.assert_status(404)?;
    dav.put(
        &admin,
        &DavTarget::Old,
        "ooo.dat-chunking-7-2-0",
        Bytes::from_static(b"abc"),
        &options,
    )
    .await?
    .assert_status(201)?;

    // Assert
    let resp = dav.get(&admin, &DavTarget::Old, "ooo.dat").await?;
    resp.assert_status(200)?;
    assert_eq!(resp.body_string(), "abcdef");
    Ok(())
}

#[tokio::test]
async fn test_v2_chunked_upload() -> Result<()> {
    // Arrange
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let dav = harness.dav();
    let chunks = vec![
        ("0001".to_owned(), Bytes::from_static(b"first half ")),
        ("0002".to_owned(), Bytes::from_static(b"second half")),
    ];

    // Act
    let resp = dav
        .upload_chunked_v2(&admin, "admin", "assembled.dat", &chunks, "upload-1", None)
        .await?;

    // Assert
    resp.assert_status(201)?;
    let resp = dav
        .get(&admin, &DavTarget::new_for("admin"), "assembled.dat")
        .await?;
    resp.assert_status(200)?;
    assert_eq!(resp.body_string(), "first half second half");
    Ok(())
}

#[tokio::test]
async fn test_v2_chunk_names_sort_numerically() -> Result<()> {
    // Arrange: names that would be mis-sorted lexically
    let harness = spawn_harness().await;
    let admin = harness.admin_auth();
    let dav = harness.dav();
    let chunks = vec![
        ("10".to_owned(), Bytes::from_static(b"C")),
        ("2".to_owned(), Bytes::from_static(b"B")),
        ("1".to_owned(), Bytes::from_static(b"A")),
    ];

    // Act
    let resp = dav
        .upload_chunked_v2(&admin, "admin", "ordered.dat", &chunks, "upload-2", None)
        .await?;

    // Assert
    resp.assert_status(201)?;
    let resp = dav
        .get(&admin, &DavTarget::new_for("admin"), "ordered.dat")
        .await?;
    assert_eq!(resp.body_string(), "ABC");
    Ok(())
}
