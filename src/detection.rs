//! Landmark detector interface and a worker thread that runs one.

use crate::{landmarks::LandmarkSet, Error, Result};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};

/// Anything that finds facial landmarks in a frame
pub trait LandmarkDetector<F>: Send + 'static {
    /// Detect landmarks in a frame
    ///
    /// `Ok(None)` means no face was found and the frame should be skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the detector itself fails
    fn detect(&mut self, frame: &F) -> Result<Option<LandmarkSet>>;
}

/// A detector running on its own thread
///
/// Frames go in over a bounded queue and one result comes back per frame,
/// in submission order. Dropping the worker closes the queue and joins the
/// thread.
pub struct DetectorWorker<F> {
    frames: Option<SyncSender<F>>,
    results: Receiver<Option<LandmarkSet>>,
    handle: Option<JoinHandle<()>>,
}

impl<F: Send + 'static> DetectorWorker<F> {
    /// Move `detector` onto a new thread with a frame queue of `capacity`
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned
    pub fn spawn<D: LandmarkDetector<F>>(mut detector: D, capacity: usize) -> Result<Self> {
        let (frame_tx, frame_rx) = mpsc::sync_channel::<F>(capacity);
        let (result_tx, result_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("landmark-detector".to_string())
            .spawn(move || {
                log::debug!("Detector worker started");
                for frame in frame_rx {
                    let landmarks = detector.detect(&frame).unwrap_or_else(|e| {
                        log::warn!("Landmark detection failed: {e}");
                        None
                    });
                    if result_tx.send(landmarks).is_err() {
                        break;
                    }
                }
                log::debug!("Detector worker stopped");
            })?;

        Ok(Self {
            frames: Some(frame_tx),
            results: result_rx,
            handle: Some(handle),
        })
    }

    /// Queue a frame, blocking while the queue is full
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread has exited
    pub fn submit(&self, frame: F) -> Result<()> {
        self.sender()?
            .send(frame)
            .map_err(|_| Error::DetectorError("Detector worker has stopped".to_string()))
    }

    /// Queue a frame without blocking
    ///
    /// Returns `Ok(false)` and drops the frame if the queue is full.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread has exited
    pub fn try_submit(&self, frame: F) -> Result<bool> {
        match self.sender()?.try_send(frame) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => {
                Err(Error::DetectorError("Detector worker has stopped".to_string()))
            }
        }
    }

    /// Wait for the result of the oldest outstanding frame
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread has exited
    pub fn recv(&self) -> Result<Option<LandmarkSet>> {
        self.results
            .recv()
            .map_err(|_| Error::DetectorError("Detector worker has stopped".to_string()))
    }

    fn sender(&self) -> Result<&SyncSender<F>> {
        self.frames
            .as_ref()
            .ok_or_else(|| Error::DetectorError("Detector worker is shut down".to_string()))
    }
}

impl<F> Drop for DetectorWorker<F> {
    fn drop(&mut self) {
        // Closing the queue ends the worker loop
        self.frames.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Detector worker panicked");
            }
        }
    }
}
