//! Download engine integration tests.

#[cfg(test)]
mod tests {
    use aws_sdk_s3::primitives::ByteStream;
    use futures::StreamExt;

    use objstream_core::error::TransferError;
    use objstream_core::{ObjectReader, TransferConfig};
    use objstream_model::Locator;

    use crate::{cleanup_bucket, create_test_bucket, remote_store, s3_client};

    fn config(bucket: &str, key: &str) -> TransferConfig {
        TransferConfig::builder()
            .locator(Locator::new(bucket, key))
            .build()
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_stream_object_with_metadata() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "down").await;

        let body = vec![0x5Au8; 300 * 1024];
        client
            .put_object()
            .bucket(&bucket)
            .key("blob.bin")
            .content_type("application/octet-stream")
            .body(ByteStream::from(body.clone()))
            .send()
            .await
            .expect("put object");

        let (mut reader, metadata) =
            ObjectReader::new(remote_store(), &config(&bucket, "blob.bin")).expect("reader");

        reader.request(64 * 1024);
        let mut collected = Vec::new();
        while let Some(chunk) = reader.next().await {
            let chunk = chunk.expect("chunk");
            collected.extend_from_slice(&chunk);
            reader.request(chunk.len() as u64);
        }
        assert_eq!(collected, body);

        let meta = metadata.await.expect("metadata");
        assert_eq!(meta.content_length, Some(body.len() as u64));
        assert_eq!(meta.content_type.as_deref(), Some("application/octet-stream"));

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_fail_on_missing_key() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "miss").await;

        let (mut reader, metadata) =
            ObjectReader::new(remote_store(), &config(&bucket, "no-such-key")).expect("reader");

        reader.request(1024);
        let item = reader.next().await.expect("one terminal item");
        let err = item.expect_err("missing key must error");
        assert!(matches!(err, TransferError::Transport { .. }));
        assert!(metadata.await.is_none());

        cleanup_bucket(&client, &bucket).await;
    }
}
