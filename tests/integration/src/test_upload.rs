//! Upload engine integration tests.

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use objstream_core::BlobWriter;
    use objstream_core::config::{MIN_SEGMENT_BYTES, TransferConfig};
    use objstream_model::Locator;

    use crate::{cleanup_bucket, create_test_bucket, remote_store, s3_client};

    const MIB: usize = 1024 * 1024;

    fn config(bucket: &str, key: &str, content_md5: bool) -> TransferConfig {
        TransferConfig::builder()
            .locator(Locator::new(bucket, key))
            .threshold_bytes(MIN_SEGMENT_BYTES)
            .content_integrity_check(content_md5)
            .build()
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_round_trip_multipart_upload() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "up").await;

        let mut original = Vec::new();
        let mut writer =
            BlobWriter::new(remote_store(), &config(&bucket, "stream.bin", false)).expect("writer");

        // 13 MiB in uneven chunks: two full segments plus a short trailer.
        for (fill, size) in [(0xAAu8, 6 * MIB), (0xBBu8, 4 * MIB), (0xCCu8, 3 * MIB)] {
            let chunk = vec![fill; size];
            original.extend_from_slice(&chunk);
            writer.write(chunk).expect("write");
        }
        let receipt = writer.finish(None).await.expect("finish");
        assert!(receipt.etag.is_some(), "completed upload should have etag");

        let resp = client
            .get_object()
            .bucket(&bucket)
            .key("stream.bin")
            .send()
            .await
            .expect("get object");
        let data = resp.body.collect().await.expect("collect").into_bytes();
        assert_eq!(data.len(), original.len());
        assert_eq!(&data[..], &original[..]);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_upload_with_content_checksums() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "md5").await;

        let mut writer =
            BlobWriter::new(remote_store(), &config(&bucket, "checked.bin", true)).expect("writer");
        writer.write(vec![0x42u8; 5 * MIB]).expect("write");
        writer
            .finish(Some(Bytes::from_static(b"tail")))
            .await
            .expect("finish");

        let resp = client
            .get_object()
            .bucket(&bucket)
            .key("checked.bin")
            .send()
            .await
            .expect("get object");
        let data = resp.body.collect().await.expect("collect").into_bytes();
        assert_eq!(data.len(), 5 * MIB + 4);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_leave_no_object_after_abort() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "abort").await;

        let mut writer =
            BlobWriter::new(remote_store(), &config(&bucket, "gone.bin", false)).expect("writer");
        writer.write(vec![0u8; 5 * MIB]).expect("write");
        writer.abort().await.expect("abort");

        let missing = client
            .get_object()
            .bucket(&bucket)
            .key("gone.bin")
            .send()
            .await;
        assert!(missing.is_err(), "aborted upload must not materialize");

        cleanup_bucket(&client, &bucket).await;
    }
}
