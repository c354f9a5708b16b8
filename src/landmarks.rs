//! Landmark data model and the external tracker boundary.
//!
//! The tracking model itself is an external collaborator; this module only
//! defines the shape of its per-frame output and a [`LandmarkSource`]
//! boundary the frame driver polls. [`ChannelLandmarkSource`] adapts a
//! tracker running on its own inference thread, keeping the most recent
//! result the way the ML inference engine keeps its latest frame result.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Named landmark roles an anchor calculator may read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LandmarkRole {
    LeftEye,
    RightEye,
    LeftShoulder,
    RightShoulder,
    IndexTip,
    PinkyTip,
    Heel,
    Toe,
}

/// A single tracked point in detector (unmirrored) space.
///
/// `x` is in `[0, canvas width]`, `y` in `[0, canvas height]`. Produced
/// fresh every frame by the tracker; never mutated, only read.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// One frame's worth of named landmarks.
#[derive(Clone, Debug, Default)]
pub struct LandmarkSet {
    points: HashMap<LandmarkRole, Landmark>,
}

impl LandmarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, role: LandmarkRole, landmark: Landmark) {
        self.points.insert(role, landmark);
    }

    pub fn get(&self, role: LandmarkRole) -> Option<Landmark> {
        self.points.get(&role).copied()
    }

    /// Landmark for `role` if present and at or above the confidence floor.
    pub fn confident(&self, role: LandmarkRole, floor: f32) -> Option<Landmark> {
        self.get(role).filter(|lm| lm.confidence >= floor)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Source of per-frame landmark sets.
///
/// `poll` must not block past the frame budget: returning `None` makes the
/// driver skip that tick rather than draw from stale or garbage data.
pub trait LandmarkSource {
    fn poll(&mut self) -> Option<LandmarkSet>;
}

/// Sending half handed to the tracker thread.
///
/// Sends are non-blocking; if the driver has fallen behind, the oldest
/// undelivered set is simply superseded.
#[derive(Clone)]
pub struct LandmarkSender {
    sender: Sender<LandmarkSet>,
}

impl LandmarkSender {
    pub fn send(&self, set: LandmarkSet) {
        if self.sender.try_send(set).is_err() {
            log::debug!("landmark channel full, dropping set");
        }
    }
}

/// Channel-backed [`LandmarkSource`] for trackers on their own thread.
///
/// Keeps the most recent result and its arrival time; when the tracker
/// misses a frame, the last set is reused as long as it is younger than
/// the reuse window, after which polls return `None`.
pub struct ChannelLandmarkSource {
    receiver: Receiver<LandmarkSet>,
    last: Option<(LandmarkSet, Instant)>,
    reuse_window: Duration,
}

impl ChannelLandmarkSource {
    /// Create the source and its paired sender.
    pub fn new(reuse_window: Duration) -> (LandmarkSender, Self) {
        let (sender, receiver) = crossbeam_channel::bounded(2);
        (
            LandmarkSender { sender },
            Self {
                receiver,
                last: None,
                reuse_window,
            },
        )
    }
}

impl LandmarkSource for ChannelLandmarkSource {
    fn poll(&mut self) -> Option<LandmarkSet> {
        // Drain to the newest pending set.
        let mut fresh = None;
        while let Ok(set) = self.receiver.try_recv() {
            fresh = Some(set);
        }

        if let Some(set) = fresh {
            self.last = Some((set.clone(), Instant::now()));
            return Some(set);
        }

        match &self.last {
            Some((set, at)) if at.elapsed() <= self.reuse_window => Some(set.clone()),
            _ => None,
        }
    }
}
