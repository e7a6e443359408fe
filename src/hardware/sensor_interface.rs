//! Defines the interface for the chassis tilt sensor

use std::sync::{Arc, Mutex};

use crate::Error;

/// Stores how far the chassis leans away from level.
///
/// Both angles are in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TiltEstimate {
    /// The lean towards the front of the robot. Positive when the front is lower than the rear.
    pub pitch: f64,

    /// The lean towards the left of the robot. Positive when the left side is lower than the
    /// right side.
    pub roll: f64,
}

impl TiltEstimate {
    /// Returns the total lean angle.
    pub fn magnitude(&self) -> f64 {
        self.pitch.hypot(self.roll)
    }

    /// Creates a new [TiltEstimate].
    pub fn new(pitch: f64, roll: f64) -> Self {
        Self { pitch, roll }
    }

    /// Returns a level estimate.
    pub fn level() -> Self {
        Self::default()
    }
}

/// Defines the interface for hardware that senses the tilt of the chassis.
pub trait TiltSensor: Send {
    /// Returns the most recent tilt estimate.
    ///
    /// ## Errors
    ///
    /// * [Error::SensorUnavailable] - Returned when no estimate is available.
    fn tilt(&self) -> Result<TiltEstimate, Error>;
}

/// A [TiltSensor] that reports whatever tilt it was last given.
///
/// Clones share the same reading.
#[derive(Clone, Debug)]
pub struct SimulatedTiltSensor {
    reading: Arc<Mutex<Option<TiltEstimate>>>,
}

impl SimulatedTiltSensor {
    /// Creates a new [SimulatedTiltSensor] that reports a level chassis.
    pub fn new() -> Self {
        Self {
            reading: Arc::new(Mutex::new(Some(TiltEstimate::level()))),
        }
    }

    /// Sets the reported tilt. None makes the sensor unavailable.
    pub fn set_tilt(&self, tilt: Option<TiltEstimate>) {
        let mut guard = self.reading.lock().unwrap_or_else(|err| err.into_inner());
        *guard = tilt;
    }
}

impl Default for SimulatedTiltSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl TiltSensor for SimulatedTiltSensor {
    fn tilt(&self) -> Result<TiltEstimate, Error> {
        let guard = self.reading.lock().unwrap_or_else(|err| err.into_inner());
        guard.ok_or(Error::SensorUnavailable)
    }
}
