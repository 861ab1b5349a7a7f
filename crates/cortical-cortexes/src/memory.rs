//! `memory`: archives JPEG frames to disk as training data.
//!
//! Frames land in `<path>/<session_id>/<n>.jpg`, numbered from 0 per session.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cortical_core::{Cortex, CortexFactory, Message, Session, cortex};
use cortical_settings::MemorySettings;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::frame::FramePayload;

/// Registry name.
pub const NAME: &str = "memory";

const CONTENT_TYPE: &str = "image/jpeg";

/// Build the memory factory.
pub fn factory(settings: &MemorySettings) -> CortexFactory {
    let settings = settings.clone();
    cortex::factory(move |session| {
        let dir = Arc::new(session_dir(&settings, session));
        let next = Arc::new(AtomicU64::new(0));
        Cortex::new().with_consumer(move |session, msg| {
            let dir = dir.clone();
            let next = next.clone();
            async move {
                match store(&dir, &next, &msg).await {
                    Ok(Some(path)) => debug!(session_id = %session.id(), path = %path.display(), "frame stored"),
                    Ok(None) => {}
                    Err(e) => warn!(session_id = %session.id(), error = %e, "failed to store frame"),
                }
            }
        })
    })
}

/// Write one frame. `Ok(None)` when the message carries no JPEG.
async fn store(dir: &Path, next: &AtomicU64, msg: &Message) -> Result<Option<PathBuf>> {
    let Ok(frame) = FramePayload::decode(msg) else {
        return Ok(None);
    };
    let Some(content) = frame.content_of(CONTENT_TYPE) else {
        return Ok(None);
    };

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}.jpg", next.fetch_add(1, Ordering::Relaxed)));
    tokio::fs::write(&path, content).await?;
    Ok(Some(path))
}

/// Directory holding a session's frames.
pub fn session_dir(settings: &MemorySettings, session: &Session) -> PathBuf {
    Path::new(&settings.path).join(session.id().as_str())
}
