//! Image loading: one panorama texture per frame, strictly in order.
//!
//! The pipeline itself is a small state machine (`start` / `on_image_ready`)
//! with no I/O; [`ImageLoadPipeline::load_images`] is the async driver that
//! feeds it from an [`ImageryService`]. Only one request is ever in flight.
//!
//! ```text
//!   start() ──► fetch[0] ──► on_image_ready ──► Next(1) ──► fetch[1] ──► ...
//!                                    │
//!                                    ├──► Canceled(i)   (cancel requested)
//!                                    └──► Complete      (last frame stored)
//! ```

use crate::cancel::CancelFlag;
use crate::error::HyperlapseError;
use crate::events::{EventChannel, LoadEvent};
use crate::sequence::Sequence;
use hyperlapse_env::ImageryService;
use tracing::{debug, info, warn};

/// Pixel size of the composed texture at `zoom`.
pub fn texture_size(zoom: u8) -> (u32, u32) {
    let width = 416 * 2u32.pow(zoom as u32);
    let height = if zoom == 0 { 208 } else { 416 * 2u32.pow(zoom as u32 - 1) };
    (width, height)
}

/// Number of provider tiles (columns, rows) making up one panorama at `zoom`.
pub fn tile_grid(zoom: u8) -> (u32, u32) {
    let columns = if zoom == 3 { 7 } else { 2u32.pow(zoom as u32) };
    let rows = if zoom == 0 { 1 } else { 2u32.pow(zoom as u32 - 1) };
    (columns, rows)
}

/// What the driver should do after an image was stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStep {
    /// Request imagery for this index next
    Next(usize),

    /// The last frame is loaded
    Complete,

    /// Cancellation took effect after the frame at this index
    Canceled(usize),
}

/// How a load pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Complete { frames: usize },
    Canceled { position: usize },
}

/// Sequential loader state: loading flag, cancel flag, current index.
#[derive(Debug, Default)]
pub struct ImageLoadPipeline {
    control: CancelFlag,
    current_index: usize,
    len: usize,
}

impl ImageLoadPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.control.is_active()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.control.is_requested()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Shared handle used to cancel from outside the driver.
    pub fn control(&self) -> CancelFlag {
        self.control.clone()
    }

    /// Begins a pass over `len` frames and returns the first index to fetch.
    ///
    /// Returns `None` if a pass is already running or there is nothing to load.
    pub fn start(&mut self, len: usize) -> Option<usize> {
        if self.is_loading() || len == 0 {
            return None;
        }
        self.control.activate();
        self.current_index = 0;
        self.len = len;
        Some(0)
    }

    /// Requests cancellation; honored at the next `on_image_ready`.
    pub fn cancel(&self) -> bool {
        self.control.request()
    }

    /// Advances after the image for `current_index` has been stored.
    pub fn on_image_ready(&mut self) -> LoadStep {
        if self.current_index + 1 < self.len {
            if self.control.is_requested() {
                let position = self.current_index;
                self.control.finish();
                return LoadStep::Canceled(position);
            }
            self.current_index += 1;
            LoadStep::Next(self.current_index)
        } else {
            self.control.finish();
            self.current_index = 0;
            LoadStep::Complete
        }
    }

    /// Drops the running pass after a failed fetch.
    pub fn abort(&mut self) {
        self.control.finish();
        self.current_index = 0;
    }

    /// Fetches a texture for every frame of `sequence`, in order.
    ///
    /// A failed fetch halts the pass: a missing frame would break playback
    /// continuity, so nothing is skipped.
    pub async fn load_images<I>(
        &mut self,
        sequence: &mut Sequence,
        imagery: &I,
        zoom: u8,
        events: &mut EventChannel<LoadEvent>,
    ) -> Result<LoadOutcome, HyperlapseError>
    where
        I: ImageryService + ?Sized,
    {
        let total = sequence.len();
        let mut index = match self.start(total) {
            Some(index) => index,
            None if total == 0 => return Err(HyperlapseError::EmptySequence),
            None => return Err(HyperlapseError::Busy),
        };

        loop {
            let panorama_id = match sequence.get(index) {
                Some(point) => point.panorama_id.clone(),
                None => {
                    self.abort();
                    return Err(HyperlapseError::EmptySequence);
                }
            };

            let image = match imagery.fetch_panorama_image(&panorama_id, zoom).await {
                Ok(image) => image,
                Err(source) => {
                    warn!("Imagery for frame {} ({}) failed: {}", index, panorama_id, source);
                    self.abort();
                    return Err(HyperlapseError::ImageFetch { index, source });
                }
            };
            sequence.set_image(index, image);

            match self.on_image_ready() {
                LoadStep::Next(next) => {
                    debug!("Loaded frame {}/{}", index + 1, total);
                    events.emit(&LoadEvent::Progress { position: next, total });
                    index = next;
                }
                LoadStep::Complete => {
                    info!("Loaded {} frames", total);
                    events.emit(&LoadEvent::Complete { frames: total });
                    return Ok(LoadOutcome::Complete { frames: total });
                }
                LoadStep::Canceled(position) => {
                    info!("Load canceled at frame {}/{}", position + 1, total);
                    events.emit(&LoadEvent::Canceled { position });
                    return Ok(LoadOutcome::Canceled { position });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::HyperlapsePoint;
    use async_trait::async_trait;
    use hyperlapse_env::{EnvError, GeoPoint, PanoramaImage, PanoramaLocation};
    use std::sync::{Arc, Mutex};

    struct FakeImagery {
        requests: Mutex<Vec<String>>,
        cancel_on: Option<(usize, CancelFlag)>,
        fail_on: Option<usize>,
    }

    impl FakeImagery {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                cancel_on: None,
                fail_on: None,
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageryService for FakeImagery {
        async fn fetch_panorama_image(
            &self,
            panorama_id: &str,
            zoom: u8,
        ) -> Result<PanoramaImage, EnvError> {
            let n = {
                let mut requests = self.requests.lock().unwrap();
                requests.push(panorama_id.to_string());
                requests.len() - 1
            };
            if let Some((at, flag)) = &self.cancel_on {
                if n == *at {
                    flag.request();
                }
            }
            if self.fail_on == Some(n) {
                return Err(EnvError::image_fetch(panorama_id, "tile 0/0 timed out"));
            }
            let (width, height) = texture_size(zoom);
            Ok(PanoramaImage::new(panorama_id, width, height, Arc::from(vec![0u8; 4])))
        }
    }

    fn sequence(n: usize) -> Sequence {
        let mut seq = Sequence::new();
        for i in 0..n {
            seq.push_unique(HyperlapsePoint::from(PanoramaLocation {
                location: GeoPoint::new(0.0, i as f64 * 0.0002),
                panorama_id: format!("p{i}"),
                heading_deg: 0.0,
                pitch_deg: 0.0,
                copyright: String::new(),
                capture_date: None,
            }));
        }
        seq
    }

    fn recorder(channel: &mut EventChannel<LoadEvent>) -> Arc<Mutex<Vec<LoadEvent>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        channel.subscribe(move |e: &LoadEvent| sink.lock().unwrap().push(e.clone()));
        log
    }

    #[test]
    fn test_texture_and_tile_sizes() {
        assert_eq!(texture_size(1), (832, 416));
        assert_eq!(texture_size(3), (3328, 1664));
        assert_eq!(tile_grid(1), (2, 1));
        assert_eq!(tile_grid(2), (4, 2));
        assert_eq!(tile_grid(3), (7, 4));
    }

    #[test]
    fn test_state_machine_walk() {
        let mut pipeline = ImageLoadPipeline::new();
        assert_eq!(pipeline.start(3), Some(0));
        assert!(pipeline.is_loading());
        assert_eq!(pipeline.start(3), None);

        assert_eq!(pipeline.on_image_ready(), LoadStep::Next(1));
        assert_eq!(pipeline.on_image_ready(), LoadStep::Next(2));
        assert_eq!(pipeline.on_image_ready(), LoadStep::Complete);
        assert!(!pipeline.is_loading());
        assert_eq!(pipeline.current_index(), 0);
    }

    #[test]
    fn test_cancel_only_while_loading() {
        let mut pipeline = ImageLoadPipeline::new();
        assert!(!pipeline.cancel());
        assert!(!pipeline.is_cancel_requested());

        pipeline.start(4);
        assert!(pipeline.cancel());
        assert_eq!(pipeline.on_image_ready(), LoadStep::Canceled(0));
        assert!(!pipeline.is_loading());
        assert!(!pipeline.is_cancel_requested());
    }

    #[test]
    fn test_cancel_on_last_frame_completes() {
        let mut pipeline = ImageLoadPipeline::new();
        pipeline.start(1);
        pipeline.cancel();
        assert_eq!(pipeline.on_image_ready(), LoadStep::Complete);
        assert!(!pipeline.is_cancel_requested());
    }

    #[tokio::test]
    async fn test_loads_every_frame_in_order() {
        let mut seq = sequence(4);
        let imagery = FakeImagery::new();
        let mut pipeline = ImageLoadPipeline::new();
        let mut events = EventChannel::new();
        let log = recorder(&mut events);

        let outcome = pipeline.load_images(&mut seq, &imagery, 1, &mut events).await.unwrap();

        assert_eq!(outcome, LoadOutcome::Complete { frames: 4 });
        assert_eq!(imagery.requests(), ["p0", "p1", "p2", "p3"]);
        assert_eq!(seq.loaded_count(), 4);
        assert_eq!(seq.get(2).unwrap().image.as_ref().unwrap().panorama_id, "p2");
        assert_eq!(
            *log.lock().unwrap(),
            [
                LoadEvent::Progress { position: 1, total: 4 },
                LoadEvent::Progress { position: 2, total: 4 },
                LoadEvent::Progress { position: 3, total: 4 },
                LoadEvent::Complete { frames: 4 },
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_mid_load() {
        let mut seq = sequence(6);
        let mut pipeline = ImageLoadPipeline::new();
        let mut imagery = FakeImagery::new();
        imagery.cancel_on = Some((2, pipeline.control()));
        let mut events = EventChannel::new();
        let log = recorder(&mut events);

        let outcome = pipeline.load_images(&mut seq, &imagery, 1, &mut events).await.unwrap();

        // The request in flight when cancel arrived is the last one issued
        assert_eq!(outcome, LoadOutcome::Canceled { position: 2 });
        assert_eq!(imagery.requests().len(), 3);
        let canceled = log
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, LoadEvent::Canceled { .. }))
            .count();
        assert_eq!(canceled, 1);
        assert!(!pipeline.is_loading());
    }

    #[tokio::test]
    async fn test_fetch_failure_halts() {
        let mut seq = sequence(5);
        let mut imagery = FakeImagery::new();
        imagery.fail_on = Some(1);
        let mut pipeline = ImageLoadPipeline::new();
        let mut events = EventChannel::new();

        let result = pipeline.load_images(&mut seq, &imagery, 1, &mut events).await;

        assert!(matches!(result, Err(HyperlapseError::ImageFetch { index: 1, .. })));
        assert_eq!(imagery.requests().len(), 2);
        assert!(!pipeline.is_loading());

        // A fresh pass can start afterwards
        imagery.fail_on = None;
        assert!(pipeline.load_images(&mut seq, &imagery, 1, &mut events).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_sequence() {
        let mut pipeline = ImageLoadPipeline::new();
        let mut events = EventChannel::new();
        let result = pipeline
            .load_images(&mut Sequence::new(), &FakeImagery::new(), 1, &mut events)
            .await;
        assert!(matches!(result, Err(HyperlapseError::EmptySequence)));
    }
}
