use nalgebra::Vector3;

/// 重力加速度 (m/s²)，设备以 g 为单位上报加速度
pub const G: f64 = 9.8;

/// A reading exactly as the wearable reported it, before any projection.
///
/// Acceleration is in g, angular velocity in deg/s, `time` in ms since the
/// device booted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawReading {
    pub time: u32,
    pub acceleration: Vector3<f64>,
    pub angular_velocity: Vector3<f64>,
}

impl RawReading {
    pub fn new(time: u32, acceleration: Vector3<f64>, angular_velocity: Vector3<f64>) -> Self {
        Self {
            time,
            acceleration,
            angular_velocity,
        }
    }

    /// Build from the flat field order used on the wire and in CSV rows.
    pub fn from_fields(time: u32, ax: f64, ay: f64, az: f64, gx: f64, gy: f64, gz: f64) -> Self {
        Self::new(time, Vector3::new(ax, ay, az), Vector3::new(gx, gy, gz))
    }

    /// Acceleration in m/s²
    pub fn acceleration_ms2(&self) -> Vector3<f64> {
        self.acceleration * G
    }

    /// No NaN or infinite field
    pub fn is_finite(&self) -> bool {
        self.acceleration.iter().chain(self.angular_velocity.iter()).all(|v| v.is_finite())
    }

    /// Attach the principal-component projection, producing the final reading.
    pub fn with_projection(self, principal_components: Vector3<f64>) -> Reading {
        Reading {
            raw: self,
            principal_components,
        }
    }
}

/// A reading that went through the PCA engine.
///
/// Only constructed via [`RawReading::with_projection`] or [`Reading::blank`],
/// so the projection is always present and never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    raw: RawReading,
    principal_components: Vector3<f64>,
}

impl Reading {
    /// 窗口填充用的空读数：零加速度、零投影
    pub fn blank(time: u32) -> Self {
        RawReading::new(time, Vector3::zeros(), Vector3::zeros()).with_projection(Vector3::zeros())
    }

    pub fn time(&self) -> u32 {
        self.raw.time
    }

    pub fn raw(&self) -> &RawReading {
        &self.raw
    }

    /// Acceleration in g, as received
    pub fn acceleration(&self) -> Vector3<f64> {
        self.raw.acceleration
    }

    pub fn acceleration_ms2(&self) -> Vector3<f64> {
        self.raw.acceleration_ms2()
    }

    pub fn angular_velocity(&self) -> Vector3<f64> {
        self.raw.angular_velocity
    }

    pub fn principal_components(&self) -> Vector3<f64> {
        self.principal_components
    }

    /// First principal component of acceleration (m/s²)
    pub fn pc0(&self) -> f64 {
        self.principal_components.x
    }
}
