//! S3 remote store backend.
//!
//! Implements [`RemoteStore`] over the AWS S3 multipart API: one transfer
//! session maps to one multipart upload, segments map to parts, and the
//! read channel wraps a `GetObject` response. Endpoint, region, and
//! credentials resolve through the standard AWS environment
//! (`AWS_ENDPOINT_URL`, `AWS_REGION`, profile and instance providers), so
//! the backend works unchanged against S3-compatible stores.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use futures::StreamExt;
use futures::stream;
use tracing::debug;

use objstream_core::error::{TransferError, TransferResult};
use objstream_core::store::{ReadEventStream, ReadOptions, RemoteStore, SegmentUpload};
use objstream_model::{FinalizeManifest, FinalizeReceipt, Locator, ReadEvent, ResponseHeaders};

/// [`RemoteStore`] over the AWS S3 multipart API.
///
/// Holds two clients: a signed one for everything, and an unsigned one used
/// when a read channel is opened with `unauthenticated` set.
#[derive(Debug, Clone)]
pub struct S3RemoteStore {
    client: Client,
    unsigned: Client,
}

impl S3RemoteStore {
    /// Connect using the standard AWS environment.
    pub async fn connect() -> Self {
        let signed_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        let unsigned_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .no_credentials()
            .load()
            .await;
        Self {
            client: Client::new(&signed_config),
            unsigned: Client::new(&unsigned_config),
        }
    }

    /// Build a store from preconfigured clients.
    #[must_use]
    pub fn from_clients(client: Client, unsigned: Client) -> Self {
        Self { client, unsigned }
    }
}

/// Map an SDK error, keeping the HTTP status code when one was observed.
fn sdk_error<E>(err: &SdkError<E>) -> TransferError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let status = match err {
        SdkError::ServiceError(context) => Some(context.raw().status().as_u16()),
        SdkError::ResponseError(context) => Some(context.raw().status().as_u16()),
        _ => None,
    };
    TransferError::Transport {
        status,
        message: DisplayErrorContext(err).to_string(),
    }
}

#[async_trait]
impl RemoteStore for S3RemoteStore {
    async fn create_session(&self, locator: &Locator) -> TransferResult<String> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&locator.bucket)
            .key(&locator.key)
            .send()
            .await
            .map_err(|err| sdk_error(&err))?;

        let upload_id = output
            .upload_id()
            .ok_or_else(|| TransferError::protocol("create response carried no upload id"))?;
        debug!(locator = %locator, upload_id, "multipart upload created");
        Ok(upload_id.to_owned())
    }

    async fn upload_segment(&self, upload: SegmentUpload) -> TransferResult<String> {
        let part_number = i32::try_from(upload.sequence_number).map_err(|_| {
            TransferError::configuration(format!(
                "sequence number {} exceeds the part number range",
                upload.sequence_number
            ))
        })?;

        let mut request = self
            .client
            .upload_part()
            .bucket(&upload.locator.bucket)
            .key(&upload.locator.key)
            .upload_id(&upload.session_id)
            .part_number(part_number)
            .body(ByteStream::from(upload.payload));
        if let Some(content_md5) = upload.content_md5 {
            request = request.content_md5(content_md5);
        }

        let output = request.send().await.map_err(|err| sdk_error(&err))?;
        let etag = output
            .e_tag()
            .ok_or_else(|| TransferError::protocol("part response carried no entity tag"))?;
        debug!(locator = %upload.locator, part_number, "part uploaded");
        Ok(etag.to_owned())
    }

    async fn abort_session(&self, locator: &Locator, session_id: &str) -> TransferResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&locator.bucket)
            .key(&locator.key)
            .upload_id(session_id)
            .send()
            .await
            .map_err(|err| sdk_error(&err))?;
        debug!(locator = %locator, upload_id = session_id, "multipart upload aborted");
        Ok(())
    }

    async fn finalize_session(
        &self,
        locator: &Locator,
        session_id: &str,
        manifest: FinalizeManifest,
    ) -> TransferResult<FinalizeReceipt> {
        // S3 verifies integrity per part (Content-MD5); the complete call
        // has no field for the manifest's overall digest.
        if let Some(digest) = manifest.digest.as_deref() {
            debug!(locator = %locator, digest, "overall digest computed");
        }

        // Part numbers stay within the i32 range; create/upload enforce it.
        #[allow(clippy::cast_possible_wrap)]
        let parts: Vec<CompletedPart> = manifest
            .segments
            .iter()
            .map(|receipt| {
                CompletedPart::builder()
                    .part_number(receipt.sequence_number as i32)
                    .e_tag(&receipt.remote_ack)
                    .build()
            })
            .collect();

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        let output = self
            .client
            .complete_multipart_upload()
            .bucket(&locator.bucket)
            .key(&locator.key)
            .upload_id(session_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|err| sdk_error(&err))?;

        debug!(
            locator = %locator,
            upload_id = session_id,
            parts = manifest.segment_count(),
            "multipart upload completed"
        );
        Ok(FinalizeReceipt {
            etag: output.e_tag().map(ToOwned::to_owned),
            location: output.location().map(ToOwned::to_owned),
        })
    }

    fn read_object(&self, locator: &Locator, options: ReadOptions) -> ReadEventStream {
        let client = if options.unauthenticated {
            self.unsigned.clone()
        } else {
            self.client.clone()
        };
        let locator = locator.clone();

        let events = async move {
            match client
                .get_object()
                .bucket(&locator.bucket)
                .key(&locator.key)
                .send()
                .await
            {
                Ok(output) => {
                    let headers = ResponseHeaders {
                        status: 200,
                        content_length: output
                            .content_length()
                            .and_then(|length| u64::try_from(length).ok()),
                        content_type: output.content_type().map(ToOwned::to_owned),
                    };
                    let body = stream::unfold(output.body, |mut body| async move {
                        match body.next().await {
                            Some(Ok(chunk)) => Some((Ok(ReadEvent::Data(chunk)), body)),
                            Some(Err(err)) => Some((
                                Err(TransferError::transport(format!(
                                    "reading object body failed: {err}"
                                ))),
                                body,
                            )),
                            None => None,
                        }
                    });
                    stream::iter([Ok(ReadEvent::Headers(headers))])
                        .chain(body)
                        .boxed()
                }
                Err(err) => stream::iter([Err(sdk_error(&err))]).boxed(),
            }
        };
        stream::once(events).flatten().boxed()
    }
}
