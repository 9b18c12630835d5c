use crate::config::CameraDirectory;
use crate::db::models::CameraEvent;
use crate::db::Database;
use crate::event_record::EventRecord;
use crate::services::dispatcher::{DispatchReport, Dispatcher};
use crate::services::normalizer;
use crate::services::snapshot_store::SnapshotStore;
use crate::utils::frame::{self, Envelope, Frame};
use anyhow::Result;
use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::Arc;

/// A stored and dispatched event
#[derive(Debug, Clone)]
pub struct Ingested {
    pub record: EventRecord,
    pub dispatch: DispatchReport,
}

/// bytes -> frames -> record -> raw log -> handlers
pub struct EventPipeline {
    db: Arc<dyn Database>,
    directory: Arc<CameraDirectory>,
    dispatcher: Arc<Dispatcher>,
    snapshots: SnapshotStore,
}

impl EventPipeline {
    pub fn new(
        db: Arc<dyn Database>,
        directory: Arc<CameraDirectory>,
        dispatcher: Arc<Dispatcher>,
        snapshots: SnapshotStore,
    ) -> Self {
        Self {
            db,
            directory,
            dispatcher,
            snapshots,
        }
    }

    pub fn directory(&self) -> &CameraDirectory {
        &self.directory
    }

    /// One webhook body, declared by its content type
    pub async fn ingest_body(
        &self,
        body: &[u8],
        content_type: Option<&str>,
        source_address: &str,
    ) -> Result<Ingested> {
        let envelope = content_type
            .map(Envelope::from_content_type)
            .unwrap_or(Envelope::None);
        let extracted = frame::extract(body, &envelope)?;
        for warning in &extracted.warnings {
            warn!("Event from {}: {}", source_address, warning);
        }

        let mut record = normalizer::normalize(
            &extracted.document.bytes,
            Some(extracted.document.media),
            source_address,
            &self.directory,
        )?;

        let received = Utc::now();
        for (index, attachment) in extracted.attachments.iter().enumerate() {
            match self
                .snapshots
                .save(
                    &record.camera_id,
                    received,
                    index,
                    &attachment.extension(),
                    &attachment.bytes,
                )
                .await
            {
                Ok(path) => {
                    if record.snapshot_path.is_none() {
                        record.snapshot_path = Some(path.display().to_string());
                    }
                }
                Err(e) => error!(
                    "[{}] Failed to store snapshot attachment: {:#}",
                    record.camera_id, e
                ),
            }
        }

        self.process(record).await
    }

    /// One document cut from an alert stream
    pub async fn ingest_frame(&self, frame: &Frame, source_address: &str) -> Result<Ingested> {
        let record = normalizer::normalize(
            &frame.bytes,
            Some(frame.media),
            source_address,
            &self.directory,
        )?;
        self.process(record).await
    }

    async fn process(&self, record: EventRecord) -> Result<Ingested> {
        info!(
            "[{}] Parsed: type={} state={} target={} zone={} plate={} snap={}",
            record.camera_id,
            record.kind,
            record.state.as_deref().unwrap_or("-"),
            record.target_str().unwrap_or("-"),
            record.region_id.as_deref().unwrap_or("-"),
            record.plate_number().unwrap_or("-"),
            record.snapshot_path.as_deref().unwrap_or("-"),
        );

        {
            let mut session = self.db.session().await?;
            session
                .insert_camera_event(&CameraEvent::from(&record))
                .await?;
            session.commit().await?;
        }

        let dispatch = self.dispatcher.dispatch(&record).await;
        debug!(
            "[{}] Dispatched {} event to {:?}",
            record.camera_id, record.kind, dispatch.routes
        );

        Ok(Ingested { record, dispatch })
    }
}
