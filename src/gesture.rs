//! Double-shake gesture detection and the timed menu overlay it reveals.
//!
//! This module provides:
//! - `MotionSample`, one tagged magnitude from the accelerometer or gyroscope
//! - `GestureDetector`, the debounced double-trigger state machine shared by
//!   both channels
//! - `OverlayController`, which owns the overlay visibility flag and its
//!   one-shot expiry timer
//!
//! Both channels feed one counter: two distinct movements inside the reset
//! window reveal the overlay, whichever sensor saw them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::redraw::RedrawSignal;

pub const GRAVITY_EARTH: f32 = 9.80665;
pub const GESTURE_THRESHOLD: f32 = 1.2;
pub const GESTURE_SLOP_TIME_MS: u64 = 500;
pub const GESTURE_COUNT_RESET_TIME_MS: u64 = 3000;
pub const OVERLAY_DURATION_MS: u64 = 10_000;

// Movements needed to reveal
const REVEAL_COUNT: u8 = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MotionChannel {
    // Linear acceleration magnitude in g
    Accelerometer,
    // Angular rate magnitude in rad/s
    Gyroscope,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MotionSample {
    pub channel: MotionChannel,
    pub magnitude: f32,
}

impl MotionSample {
    // Acceleration vector in m/s^2
    pub fn accelerometer(x: f32, y: f32, z: f32) -> Self {
        Self {
            channel: MotionChannel::Accelerometer,
            magnitude: magnitude([x, y, z]) / GRAVITY_EARTH,
        }
    }

    // Rotation rate vector in rad/s
    pub fn gyroscope(x: f32, y: f32, z: f32) -> Self {
        Self {
            channel: MotionChannel::Gyroscope,
            magnitude: magnitude([x, y, z]),
        }
    }
}

pub(crate) fn magnitude(v: [f32; 3]) -> f32 {
    libm::sqrtf(v.iter().map(|c| c * c).sum())
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GestureConfig {
    pub threshold: f32,
    pub debounce_ms: u64,
    pub reset_ms: u64,
    pub overlay_ms: u64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            threshold: GESTURE_THRESHOLD,
            debounce_ms: GESTURE_SLOP_TIME_MS,
            reset_ms: GESTURE_COUNT_RESET_TIME_MS,
            overlay_ms: OVERLAY_DURATION_MS,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GestureState {
    pub last_event_ms: Option<u64>,
    pub consecutive_count: u8,
    pub overlay_expiry_ms: Option<u64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GestureEvent {
    Reveal { expires_at_ms: u64 },
}

#[derive(Debug, Default)]
pub struct GestureDetector {
    config: GestureConfig,
    state: GestureState,
}

impl GestureDetector {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            state: GestureState::default(),
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn config(&self) -> GestureConfig {
        self.config
    }

    // Feed one sample; returns a reveal when the second movement lands.
    pub fn on_sample(&mut self, now_ms: u64, sample: MotionSample) -> Option<GestureEvent> {
        if sample.magnitude <= self.config.threshold {
            return None;
        }

        let elapsed = self.state.last_event_ms.map(|last| now_ms.saturating_sub(last));
        // Same physical movement
        if elapsed.is_some_and(|dt| dt < self.config.debounce_ms) {
            return None;
        }
        if elapsed.is_none_or(|dt| dt > self.config.reset_ms) {
            self.state.consecutive_count = 0;
        }

        self.state.last_event_ms = Some(now_ms);
        self.state.consecutive_count += 1;
        debug!(channel = ?sample.channel, count = self.state.consecutive_count, "gesture movement");

        if self.state.consecutive_count < REVEAL_COUNT {
            return None;
        }
        self.state.consecutive_count = 0;
        let expires_at_ms = now_ms + self.config.overlay_ms;
        self.state.overlay_expiry_ms = Some(expires_at_ms);
        Some(GestureEvent::Reveal { expires_at_ms })
    }

    // Clear an expired overlay; returns true if it was cleared now.
    pub fn expire(&mut self, now_ms: u64) -> bool {
        match self.state.overlay_expiry_ms {
            Some(expiry) if now_ms >= expiry => {
                self.state.overlay_expiry_ms = None;
                true
            }
            _ => false,
        }
    }

    pub fn dismiss(&mut self) {
        self.state.overlay_expiry_ms = None;
    }
}

// Read side of the overlay flag
#[derive(Clone, Debug, Default)]
pub struct OverlayFlag(Arc<AtomicBool>);

impl OverlayFlag {
    pub fn is_visible(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, visible: bool) {
        self.0.store(visible, Ordering::Release);
    }
}

/// Sole writer of overlay visibility. A reveal while the overlay is already
/// showing replaces the pending expiry timer, extending the overlay.
///
/// The flag is only written with the detector locked, and a timer hides the
/// overlay only if the detector's expiry has actually passed. A stale timer
/// that outlives its abort therefore cannot hide a newer reveal.
pub struct OverlayController {
    detector: Arc<Mutex<GestureDetector>>,
    flag: OverlayFlag,
    redraw: RedrawSignal,
    runtime: Handle,
    epoch: Instant,
    expiry: Option<JoinHandle<()>>,
}

impl OverlayController {
    pub fn new(config: GestureConfig, redraw: RedrawSignal, runtime: Handle) -> Self {
        Self {
            detector: Arc::new(Mutex::new(GestureDetector::new(config))),
            flag: OverlayFlag::default(),
            redraw,
            runtime,
            epoch: Instant::now(),
            expiry: None,
        }
    }

    pub fn flag(&self) -> OverlayFlag {
        self.flag.clone()
    }

    pub fn state(&self) -> GestureState {
        self.detector.lock().state()
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    pub fn on_sample(&mut self, sample: MotionSample) -> bool {
        let now_ms = self.now_ms();
        let expires_at_ms = {
            let mut detector = self.detector.lock();
            let Some(GestureEvent::Reveal { expires_at_ms }) = detector.on_sample(now_ms, sample) else {
                return false;
            };
            self.flag.set(true);
            expires_at_ms
        };

        debug!(expires_at_ms, "revealing menu overlay");
        self.redraw.request();

        if let Some(pending) = self.expiry.take() {
            pending.abort();
        }
        let detector = self.detector.clone();
        let flag = self.flag.clone();
        let redraw = self.redraw.clone();
        let epoch = self.epoch;
        self.expiry = Some(self.runtime.spawn(async move {
            tokio::time::sleep_until(epoch + Duration::from_millis(expires_at_ms)).await;
            let now_ms = epoch.elapsed().as_millis() as u64;
            clear_if_expired(&detector, &flag, &redraw, now_ms);
        }));
        true
    }

    // Cancel a pending expiry and hide the overlay.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.expiry.take() {
            pending.abort();
        }
        let mut detector = self.detector.lock();
        detector.dismiss();
        self.flag.set(false);
    }
}

// Hide the overlay if its expiry has passed; returns true if it was hidden now.
fn clear_if_expired(detector: &Mutex<GestureDetector>, flag: &OverlayFlag, redraw: &RedrawSignal, now_ms: u64) -> bool {
    let mut detector = detector.lock();
    if !detector.expire(now_ms) {
        return false;
    }
    flag.set(false);
    redraw.request();
    debug!(now_ms, "menu overlay expired");
    true
}

impl Drop for OverlayController {
    fn drop(&mut self) {
        if let Some(pending) = self.expiry.take() {
            pending.abort();
        }
    }
}
