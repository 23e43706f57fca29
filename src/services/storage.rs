use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;

use crate::services::adapters::ServiceError;

/// Object store addressed by opaque storage path.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Vec<u8>, ServiceError>;
    async fn put(&self, path: &str, data: Vec<u8>, content_type: &str) -> Result<(), ServiceError>;
    async fn exists(&self, path: &str) -> Result<bool, ServiceError>;
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

/// Storage paths may be given with a leading slash; S3 keys never have one.
pub fn object_key(path: &str) -> &str {
    path.trim_start_matches('/')
}

fn classify_sdk_error<E>(err: SdkError<E, HttpResponse>) -> ServiceError
where
    E: std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::TimeoutError(_) => ServiceError::Timeout(format!("object store: {:?}", err)),
        SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ServiceError::Transport(format!("object store: {:?}", err))
        }
        SdkError::ServiceError(service) => {
            let message = format!("object store: {}", service.err());
            if service.raw().status().as_u16() >= 500 {
                ServiceError::Transport(message)
            } else {
                ServiceError::Protocol(message)
            }
        }
        _ => ServiceError::Protocol(format!("object store: {:?}", err)),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, path: &str) -> Result<Vec<u8>, ServiceError> {
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_key(path))
            .send()
            .await
            .map_err(classify_sdk_error)?;

        let data = res
            .body
            .collect()
            .await
            .map_err(|e| ServiceError::Transport(format!("object store body: {}", e)))?
            .to_vec();
        Ok(data)
    }

    async fn put(&self, path: &str, data: Vec<u8>, content_type: &str) -> Result<(), ServiceError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(object_key(path))
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(classify_sdk_error)?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, ServiceError> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(object_key(path))
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(service)) if service.err().is_not_found() => Ok(false),
            Err(e) => Err(classify_sdk_error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_strips_leading_slash() {
        assert_eq!(object_key("/s/a.jpg"), "s/a.jpg");
        assert_eq!(object_key("s/a.jpg"), "s/a.jpg");
    }
}
