//! Binary fetch and public upload endpoints.

use crate::context::HandlerContext;
use crate::error::{ServerError, ServerResult};
use axum::body::Body;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Redirect, Response};
use bytes::Bytes;
use contentsync_protocol::BinaryFetchParams;
use contentsync_storage::{validate_path, BinaryStore};
use futures::Stream;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tempfile::NamedTempFile;
use tokio_util::io::ReaderStream;

/// Streams a temp file and deletes it when the body is dropped.
struct TempFileStream {
    inner: ReaderStream<tokio::fs::File>,
    _temp: NamedTempFile,
}

impl Stream for TempFileStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

async fn temp_file_response(temp: NamedTempFile) -> ServerResult<Response> {
    let file = tokio::fs::File::open(temp.path()).await?;
    let stream = TempFileStream {
        inner: ReaderStream::new(file),
        _temp: temp,
    };
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(stream),
    )
        .into_response())
}

async fn blocking<T, F>(f: F) -> ServerResult<T>
where
    F: FnOnce() -> ServerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
}

/// Copies a disabled object out by briefly enabling it.
///
/// The object is disabled again whether or not the copy succeeded.
fn copy_out_disabled(
    binaries: &dyn BinaryStore,
    path: &str,
    temp: &NamedTempFile,
) -> ServerResult<()> {
    binaries.enable(path)?;
    let copied = binaries.copy_out(path, temp.path());
    let disabled = binaries.disable(path);
    copied?;
    disabled?;
    Ok(())
}

/// `GET /uploadfs?path&disabled`
///
/// Enabled objects are answered with a temporary redirect to their public
/// URL; disabled ones are proxied through a temp file.
pub async fn uploadfs_handler(
    State(ctx): State<Arc<HandlerContext>>,
    headers: HeaderMap,
    params: Result<Query<BinaryFetchParams>, QueryRejection>,
) -> ServerResult<Response> {
    ctx.authorize(&headers)?;
    let Query(params) = params.map_err(|e| ServerError::InvalidRequest(e.body_text()))?;
    validate_path(&params.path)?;

    if !params.disabled {
        let url = ctx.binaries.public_url(&params.path);
        return Ok(Redirect::temporary(&url).into_response());
    }

    let binaries = Arc::clone(&ctx.binaries);
    let path = params.path;
    let temp = blocking(move || {
        let temp = NamedTempFile::new()?;
        copy_out_disabled(binaries.as_ref(), &path, &temp)?;
        Ok(temp)
    })
    .await?;
    temp_file_response(temp).await
}

/// `GET /uploads/{*path}`: the public URL space of the binary store.
pub async fn uploads_handler(
    State(ctx): State<Arc<HandlerContext>>,
    Path(path): Path<String>,
) -> ServerResult<Response> {
    let path = format!("/{path}");
    validate_path(&path)?;

    let binaries = Arc::clone(&ctx.binaries);
    let temp = blocking(move || {
        let temp = NamedTempFile::new()?;
        binaries.copy_out(&path, temp.path())?;
        Ok(temp)
    })
    .await?;
    temp_file_response(temp).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentsync_storage::InMemoryBinaryStore;

    #[test]
    fn disabled_copy_restores_state() {
        let store = InMemoryBinaryStore::new("/uploads");
        store.put("/attachments/a-x.jpg", b"bytes".to_vec()).unwrap();
        store.disable("/attachments/a-x.jpg").unwrap();

        let temp = NamedTempFile::new().unwrap();
        copy_out_disabled(&store, "/attachments/a-x.jpg", &temp).unwrap();
        assert_eq!(std::fs::read(temp.path()).unwrap(), b"bytes");
        assert!(store.is_disabled("/attachments/a-x.jpg").unwrap());
    }

    #[test]
    fn enabled_object_cannot_be_fetched_as_disabled() {
        let store = InMemoryBinaryStore::new("/uploads");
        store.put("/attachments/a-x.jpg", b"bytes".to_vec()).unwrap();

        let temp = NamedTempFile::new().unwrap();
        assert!(copy_out_disabled(&store, "/attachments/a-x.jpg", &temp).is_err());
        assert!(!store.is_disabled("/attachments/a-x.jpg").unwrap());
    }

    #[tokio::test]
    async fn temp_file_removed_when_body_dropped() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), b"data").unwrap();
        let path = temp.path().to_path_buf();

        let response = temp_file_response(temp).await.unwrap();
        assert!(path.exists());
        drop(response);
        assert!(!path.exists());
    }
}
