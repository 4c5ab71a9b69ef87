use std::sync::mpsc::{sync_channel, SyncSender};
use std::thread::JoinHandle;

use tracing::debug;

use crate::error::{FlowError, Result};
use crate::image::ColorImage;

/// Consumer of annotated frames, fed one frame at a time.
pub trait FrameSink {
    fn write(&mut self, frame: ColorImage) -> Result<()>;

    /// Flush and close the output. Called once after the last frame.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Keeps every frame in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub frames: Vec<ColorImage>,
    pub finished: bool,
}

impl FrameSink for MemorySink {
    fn write(&mut self, frame: ColorImage) -> Result<()> {
        self.frames.push(frame);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

/// Runs another sink on a writer thread behind a bounded queue, so the
/// tracker blocks once `depth` frames are waiting to be encoded.
pub struct ChannelSink<S: FrameSink + Send + 'static> {
    sender: Option<SyncSender<ColorImage>>,
    worker: Option<JoinHandle<(S, Result<()>)>>,
    inner: Option<S>,
}

impl<S: FrameSink + Send + 'static> ChannelSink<S> {
    pub fn spawn(mut inner: S, depth: usize) -> Self {
        let (sender, receiver) = sync_channel::<ColorImage>(depth);
        let worker = std::thread::spawn(move || {
            let mut written = 0;
            for frame in receiver.iter() {
                if let Err(e) = inner.write(frame) {
                    return (inner, Err(e));
                }
                written += 1;
            }
            debug!("writer thread done after {written} frames");
            let result = inner.finish();
            (inner, result)
        });
        Self {
            sender: Some(sender),
            worker: Some(worker),
            inner: None,
        }
    }

    fn join(&mut self) -> Result<()> {
        // closing the channel lets the worker drain and finish
        self.sender.take();
        let worker = match self.worker.take() {
            Some(worker) => worker,
            None => return Ok(()),
        };
        let (inner, result) = worker
            .join()
            .map_err(|_| FlowError::Encode("writer thread panicked".into()))?;
        self.inner = Some(inner);
        result
    }

    /// The wrapped sink, available once `finish` returned
    pub fn into_inner(self) -> Option<S> {
        let mut this = self;
        this.inner.take()
    }
}

impl<S: FrameSink + Send + 'static> FrameSink for ChannelSink<S> {
    fn write(&mut self, frame: ColorImage) -> Result<()> {
        let sent = match &self.sender {
            Some(sender) => sender.send(frame).is_ok(),
            None => return Err(FlowError::Encode("sink already finished".into())),
        };
        if !sent {
            // the worker hung up early, surface its error
            self.join()?;
            return Err(FlowError::Encode("writer thread stopped".into()));
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.join()
    }
}

impl<S: FrameSink + Send + 'static> Drop for ChannelSink<S> {
    fn drop(&mut self) {
        let _ = self.join();
    }
}
