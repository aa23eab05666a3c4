//! Track a mask through an image sequence.

use std::path::PathBuf;
use std::sync::Arc;

use gphyx_backend::{HttpBackend, TrackingBackend};
use gphyx_common::clock::{Direction, FrameKey};
use gphyx_common::config::AppConfig;
use gphyx_mask_model::{MaskDocument, PathSnapshot};
use gphyx_tracking::{FrameSource, TrackingCache, TrackingSession, TrackingState};

use super::frames::FrameSequence;

pub async fn run(
    config: &AppConfig,
    frames: PathBuf,
    mask: PathBuf,
    reference: i64,
    direction: Direction,
    both: bool,
    output: PathBuf,
) -> anyhow::Result<()> {
    let sequence = FrameSequence::open(&frames)?;
    let document = MaskDocument::load(&mask)?;
    let reference = FrameKey(reference);
    if sequence.path(reference).is_none() {
        anyhow::bail!(
            "Reference frame {reference} is outside the sequence (0..{})",
            sequence.len()
        );
    }

    let snapshot = PathSnapshot::new(1, document.control_points());
    let polygon = snapshot.flatten(config.render.flatness, config.render.max_subdivision_depth);

    let backend: Arc<dyn TrackingBackend> = Arc::new(HttpBackend::new(&config.backend)?);
    let cache = Arc::new(TrackingCache::new());
    let session = TrackingSession::new(backend, cache.clone(), config.tracking.clone());

    if both {
        println!("Tracking {} frames both ways from frame {reference}", sequence.len());
    } else {
        println!("Tracking {} frames {:?} from frame {reference}", sequence.len(), direction);
    }
    println!("     Mask: {} nodes, {} polygon points", snapshot.nodes().len(), polygon.len());

    let reference_frame = sequence.frame(reference).await?;
    let state = session
        .start(direction, reference, reference_frame, polygon)
        .await?;
    if !state.is_tracking() {
        anyhow::bail!("Tracker initialization failed ({state:?})");
    }

    let state = tokio::select! {
        result = async {
            if both {
                session.run_both(&sequence, sequence.range()).await
            } else {
                session.run(&sequence, sequence.range()).await
            }
        } => result?,
        _ = tokio::signal::ctrl_c() => {
            println!("[WARN] Interrupted, keeping frames tracked so far");
            session.cancel();
            session.state()
        }
    };

    cache.export(&output)?;

    println!();
    match state {
        TrackingState::Completed => println!("[OK] Tracking completed"),
        other => println!("[WARN] Tracking stopped: {other:?}"),
    }
    println!("     Frames tracked: {}", cache.valid_count());
    println!("     Frames failed:  {}", cache.len() - cache.valid_count());
    println!("     Alignment:      {}", output.display());

    Ok(())
}
