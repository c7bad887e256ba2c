//! Frames pushed by another thread
//!
//! The producer holds a [`FrameSender`]; the simulation polls without
//! blocking. An empty channel stalls the step, a dropped sender ends input.
//! Frames whose shape differs from the declared grid are dropped.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use super::{Frame, FramePoll, FrameSource};

/// Producer half handed to the frame publisher
#[derive(Clone, Debug)]
pub struct FrameSender {
    tx: Sender<Frame>,
}

impl FrameSender {
    /// Publish one frame; false once the simulation side is gone
    pub fn send(&self, frame: Frame) -> bool {
        self.tx.send(frame).is_ok()
    }
}

#[derive(Debug)]
pub struct StreamingInput {
    rows: usize,
    cols: usize,
    rx: Receiver<Frame>,
    tx: Option<Sender<Frame>>,
    current: Frame,
    received: usize,
}

impl StreamingInput {
    pub fn new(rows: usize, cols: usize) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            rows,
            cols,
            rx,
            tx: Some(tx),
            current: Frame::uniform(rows, cols, 0.0),
            received: 0,
        }
    }

    /// Producer handle. After the first call the input keeps no sender of its
    /// own, so dropping every handle ends the stream.
    pub fn sender(&mut self) -> Option<FrameSender> {
        self.tx.take().map(|tx| FrameSender { tx })
    }

    pub fn frames_received(&self) -> usize {
        self.received
    }
}

impl FrameSource for StreamingInput {
    fn frame_at(&mut self, _t: f64) -> FramePoll<'_> {
        match self.rx.try_recv() {
            Ok(frame) => {
                if frame.rows() != self.rows || frame.cols() != self.cols {
                    log::warn!(
                        "streamed frame is {}x{}, expected {}x{}; dropped",
                        frame.rows(),
                        frame.cols(),
                        self.rows,
                        self.cols
                    );
                    return FramePoll::Stall;
                }
                self.current = frame;
                self.received += 1;
                FramePoll::Ready(&self.current)
            }
            Err(TryRecvError::Empty) => FramePoll::Stall,
            Err(TryRecvError::Disconnected) => FramePoll::End,
        }
    }

    fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}
