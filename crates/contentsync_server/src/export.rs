//! Streaming export producer.
//!
//! A run writes a version marker, then every selected record as its own
//! frame, then an end marker. Frames go through a [`FrameSink`] whose
//! `send` only returns once the transport has room, so at most one frame
//! waits between the producer and the socket.
//!
//! Selection:
//!
//! - Full run: every replicated collection, with protected document types
//!   filtered out of the primary collection.
//! - Type-scoped run: only the primary collection, restricted to the type
//!   and optionally to a locale and to the ids the query capability
//!   resolves. With `related`, forward joins of each emitted document are
//!   followed one level (pages and protected types excluded). Attachments
//!   referenced by anything emitted follow after the primary pass.

use crate::context::HandlerContext;
use crate::error::{ServerError, ServerResult};
use async_trait::async_trait;
use axum::body::Body;
use bytes::Bytes;
use contentsync_core::{
    find_attachment_ids, find_joins, referenced_ids, Document, DocumentStore, Filter, PageCursor,
    ATTACHMENTS_COLLECTION, DOCS_COLLECTION, WORKFLOW_LOCALE_FIELD,
};
use contentsync_protocol::{Envelope, ExportParams};
use std::collections::{BTreeSet, HashSet};
use std::io;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Destination of encoded frames.
///
/// # Invariants
///
/// `send` must not return until the frame has been accepted downstream.
#[async_trait]
pub trait FrameSink: Send {
    /// Sends one frame, waiting for the transport to accept it.
    async fn send(&mut self, frame: Bytes) -> ServerResult<()>;
}

/// A sink feeding a bounded channel that backs a response body.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl ChannelSink {
    /// Wraps a channel sender.
    pub fn new(tx: mpsc::Sender<io::Result<Bytes>>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send(&mut self, frame: Bytes) -> ServerResult<()> {
        self.tx
            .send(Ok(frame))
            .await
            .map_err(|_| ServerError::Disconnected)
    }
}

/// Creates a sink and the streaming body it feeds, buffering at most
/// `capacity` frames.
pub fn channel_body(capacity: usize) -> (ChannelSink, Body) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });
    (ChannelSink::new(tx), Body::from_stream(stream))
}

/// Counters of one export run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExportStats {
    /// Records emitted from the selected collections.
    pub records: u64,
    /// Documents emitted through join expansion.
    pub related: u64,
    /// Attachment records emitted after a type-scoped pass.
    pub attachments: u64,
}

/// A validated export request.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    collections: Vec<String>,
    doc_filter: Filter,
    related: bool,
    type_scoped: bool,
}

impl ExportPlan {
    /// Validates parameters and resolves the selection. Runs before any
    /// byte of the response is written, so failures here still produce a
    /// clean error status.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if `related` or `query` come without a
    /// type, or a store error if the query cannot be resolved.
    pub fn prepare(ctx: &HandlerContext, params: &ExportParams) -> ServerResult<Self> {
        let content = &ctx.config.content;
        if !params.is_type_scoped() && (params.related || params.query.is_some()) {
            return Err(ServerError::InvalidRequest(
                "related and query require a type".into(),
            ));
        }

        let collections = match &params.doc_type {
            Some(_) => vec![DOCS_COLLECTION.to_string()],
            None => ctx
                .store
                .collections()?
                .into_iter()
                .filter(|c| content.is_replicated_collection(c))
                .collect(),
        };

        // Protected types stay excluded even when requested by name.
        let mut doc_filter = Filter::all().excluding_types(content.protected_types.iter().cloned());
        if let Some(doc_type) = &params.doc_type {
            doc_filter = doc_filter.with_type(doc_type.clone());
        }
        if let Some(locale) = &params.locale {
            doc_filter = doc_filter.with_field(WORKFLOW_LOCALE_FIELD, locale.clone());
        }
        if let (Some(doc_type), Some(query)) = (&params.doc_type, &params.query) {
            let ids = ctx.query.find_ids(ctx.store.as_ref(), doc_type, query)?;
            debug!(doc_type, matched = ids.len(), "resolved export query");
            doc_filter = doc_filter.with_ids(ids);
        }

        Ok(Self {
            collections,
            doc_filter,
            related: params.related,
            type_scoped: params.is_type_scoped(),
        })
    }

    /// Collections this plan enumerates, in order.
    pub fn collections(&self) -> &[String] {
        &self.collections
    }

    /// Streams the export into `sink`.
    ///
    /// # Errors
    ///
    /// Returns `Disconnected` if the client went away, or a store or codec
    /// error. The end marker is only written on success.
    pub async fn run<S>(&self, ctx: &HandlerContext, sink: &mut S) -> ServerResult<ExportStats>
    where
        S: FrameSink + ?Sized,
    {
        let mut emitter = Emitter {
            sink,
            seen: HashSet::new(),
            attachments: BTreeSet::new(),
            track_attachments: self.type_scoped,
            stats: ExportStats::default(),
        };
        emitter.send(&Envelope::marker()).await?;

        for collection in &self.collections {
            if collection == DOCS_COLLECTION {
                self.export_docs(ctx, &mut emitter).await?;
            } else {
                self.export_collection(ctx, &mut emitter, collection).await?;
            }
        }

        if self.type_scoped && !emitter.attachments.is_empty() {
            let ids: Vec<String> = emitter.attachments.iter().cloned().collect();
            let filter = Filter::all().with_ids(ids);
            for page in pages(ctx, ATTACHMENTS_COLLECTION, &filter) {
                for doc in page? {
                    emitter.emit(ATTACHMENTS_COLLECTION, doc).await?;
                    emitter.stats.attachments += 1;
                }
            }
        }

        emitter.send(&Envelope::End).await?;
        Ok(emitter.stats)
    }

    async fn export_collection<S>(
        &self,
        ctx: &HandlerContext,
        emitter: &mut Emitter<'_, S>,
        collection: &str,
    ) -> ServerResult<()>
    where
        S: FrameSink + ?Sized,
    {
        let filter = Filter::all();
        let mut count = 0u64;
        for page in pages(ctx, collection, &filter) {
            for doc in page? {
                emitter.emit(collection, doc).await?;
                emitter.stats.records += 1;
                count += 1;
            }
        }
        debug!(collection, records = count, "exported collection");
        Ok(())
    }

    async fn export_docs<S>(&self, ctx: &HandlerContext, emitter: &mut Emitter<'_, S>) -> ServerResult<()>
    where
        S: FrameSink + ?Sized,
    {
        for page in pages(ctx, DOCS_COLLECTION, &self.doc_filter) {
            let mut joined = Vec::new();
            for doc in page? {
                if !emitter.seen.insert(doc.id().to_string()) {
                    continue;
                }
                if self.related {
                    joined.extend(referenced_ids(&find_joins(&doc, &ctx.registry)));
                }
                emitter.track(&doc);
                emitter.emit(DOCS_COLLECTION, doc).await?;
                emitter.stats.records += 1;
            }

            if !joined.is_empty() {
                Self::export_related(ctx, emitter, joined).await?;
            }
        }
        debug!(
            records = emitter.stats.records,
            related = emitter.stats.related,
            "exported documents"
        );
        Ok(())
    }

    async fn export_related<S>(
        ctx: &HandlerContext,
        emitter: &mut Emitter<'_, S>,
        ids: Vec<String>,
    ) -> ServerResult<()>
    where
        S: FrameSink + ?Sized,
    {
        let pending: Vec<String> = ids
            .into_iter()
            .filter(|id| !emitter.seen.contains(id))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let filter = Filter::all()
            .with_ids(pending)
            .excluding_types(ctx.config.content.protected_types.iter().cloned())
            .excluding_pages();
        for page in pages(ctx, DOCS_COLLECTION, &filter) {
            for doc in page? {
                if !emitter.seen.insert(doc.id().to_string()) {
                    continue;
                }
                emitter.track(&doc);
                emitter.emit(DOCS_COLLECTION, doc).await?;
                emitter.stats.related += 1;
            }
        }
        Ok(())
    }
}

fn pages<'a>(
    ctx: &'a HandlerContext,
    collection: &'a str,
    filter: &'a Filter,
) -> PageCursor<'a, dyn DocumentStore> {
    PageCursor::new(ctx.store.as_ref(), collection, filter, ctx.config.content.page_size)
}

struct Emitter<'a, S: ?Sized> {
    sink: &'a mut S,
    seen: HashSet<String>,
    attachments: BTreeSet<String>,
    track_attachments: bool,
    stats: ExportStats,
}

impl<S: FrameSink + ?Sized> Emitter<'_, S> {
    fn track(&mut self, doc: &Document) {
        if self.track_attachments {
            self.attachments.extend(find_attachment_ids(doc));
        }
    }

    async fn emit(&mut self, collection: &str, doc: Document) -> ServerResult<()> {
        self.send(&Envelope::record(collection, doc)).await
    }

    async fn send(&mut self, envelope: &Envelope) -> ServerResult<()> {
        let frame = envelope.to_frame()?;
        self.sink.send(frame).await
    }
}

/// Logs the outcome of a spawned export run.
pub(crate) fn log_outcome(result: &ServerResult<ExportStats>) {
    match result {
        Ok(stats) => info!(
            records = stats.records,
            related = stats.related,
            attachments = stats.attachments,
            "export complete"
        ),
        Err(ServerError::Disconnected) => info!("export client disconnected"),
        Err(e) => tracing::error!(error = %e, "export aborted, stream truncated"),
    }
}
