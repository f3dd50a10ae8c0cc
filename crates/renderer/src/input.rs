//! Shared interaction state and the mapping from user input to skew.
//!
//! `Controls` is written by the event loop and the orientation feed thread and
//! read by the render thread once per frame. Every field is an atomic, so a
//! reader sees either the old or the new value of each field, never a torn one.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Live render parameters shared across threads.
#[derive(Debug, Default)]
pub struct Controls {
    /// Both skew components packed as f32 bits so they update together.
    skew: AtomicU64,
    blur: AtomicBool,
    show_depth: AtomicBool,
    orientation_tracking: AtomicBool,
}

fn pack(skew: [f32; 2]) -> u64 {
    (u64::from(skew[0].to_bits()) << 32) | u64::from(skew[1].to_bits())
}

fn unpack(bits: u64) -> [f32; 2] {
    [f32::from_bits((bits >> 32) as u32), f32::from_bits(bits as u32)]
}

impl Controls {
    pub fn new(blur: bool, show_depth: bool) -> Self {
        Self {
            skew: AtomicU64::new(pack([0.0, 0.0])),
            blur: AtomicBool::new(blur),
            show_depth: AtomicBool::new(show_depth),
            orientation_tracking: AtomicBool::new(false),
        }
    }

    pub fn set_skew(&self, x: f32, y: f32) {
        self.skew.store(pack([x, y]), Ordering::Relaxed);
    }

    pub fn skew(&self) -> [f32; 2] {
        unpack(self.skew.load(Ordering::Relaxed))
    }

    /// Flips the blur flag and returns the new value.
    pub fn toggle_blur(&self) -> bool {
        !self.blur.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn blur(&self) -> bool {
        self.blur.load(Ordering::Relaxed)
    }

    /// Flips the depth-map display flag and returns the new value.
    pub fn toggle_show_depth(&self) -> bool {
        !self.show_depth.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn show_depth(&self) -> bool {
        self.show_depth.load(Ordering::Relaxed)
    }

    pub fn orientation_tracking(&self) -> bool {
        self.orientation_tracking.load(Ordering::Relaxed)
    }

    fn set_orientation_tracking(&self, enabled: bool) {
        self.orientation_tracking.store(enabled, Ordering::Relaxed);
    }
}

/// Maps a pointer position on a `width` x `height` surface to skew in -1..1.
pub fn touch_to_skew(x: f32, y: f32, width: f32, height: f32) -> [f32; 2] {
    let width = if width > 0.0 { width } else { 1.0 };
    let height = if height > 0.0 { height } else { 1.0 };
    [2.0 * x / width - 1.0, 2.0 * y / height - 1.0]
}

/// Maps a device rotation vector (radians per axis) to skew.
pub fn orientation_to_skew(rotation: [f32; 3]) -> [f32; 2] {
    [4.0 * rotation[1], -4.0 * rotation[0]]
}

/// Routes pointer and orientation samples into [`Controls`].
#[derive(Clone, Debug)]
pub struct SkewMapper {
    controls: Arc<Controls>,
    sensor_present: bool,
}

impl SkewMapper {
    pub fn new(controls: Arc<Controls>, sensor_present: bool) -> Self {
        Self {
            controls,
            sensor_present,
        }
    }

    pub fn controls(&self) -> &Arc<Controls> {
        &self.controls
    }

    pub fn sensor_present(&self) -> bool {
        self.sensor_present
    }

    pub fn touch(&self, x: f32, y: f32, width: f32, height: f32) {
        let [skew_x, skew_y] = touch_to_skew(x, y, width, height);
        self.controls.set_skew(skew_x, skew_y);
    }

    /// Applies an orientation sample. Returns whether it changed the skew.
    pub fn orientation(&self, rotation: [f32; 3]) -> bool {
        if !self.sensor_present || !self.controls.orientation_tracking() {
            return false;
        }
        let [skew_x, skew_y] = orientation_to_skew(rotation);
        self.controls.set_skew(skew_x, skew_y);
        true
    }

    /// Turns orientation tracking on or off. Stays off without a sensor.
    pub fn toggle_orientation(&self) -> bool {
        if !self.sensor_present {
            tracing::warn!("no orientation feed configured; tracking stays off");
            return false;
        }
        let enabled = !self.controls.orientation_tracking();
        self.controls.set_orientation_tracking(enabled);
        enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn touch_maps_corners_and_centre() {
        assert_eq!(touch_to_skew(0.0, 0.0, 800.0, 600.0), [-1.0, -1.0]);
        assert_eq!(touch_to_skew(400.0, 300.0, 800.0, 600.0), [0.0, 0.0]);
        assert_eq!(touch_to_skew(800.0, 600.0, 800.0, 600.0), [1.0, 1.0]);
    }

    #[test]
    fn touch_on_empty_surface_stays_finite() {
        let skew = touch_to_skew(3.0, 4.0, 0.0, 0.0);
        assert!(skew.iter().all(|value| value.is_finite()));
    }

    #[test]
    fn orientation_swaps_and_negates_axes() {
        assert_eq!(orientation_to_skew([0.1, 0.2, 0.9]), [0.8, -0.4]);
    }

    #[test]
    fn toggles_return_new_value_and_round_trip() {
        let controls = Controls::new(false, false);
        assert!(controls.toggle_blur());
        assert!(controls.blur());
        assert!(!controls.toggle_blur());
        assert!(!controls.blur());

        assert!(controls.toggle_show_depth());
        assert!(!controls.toggle_show_depth());
        assert!(!controls.show_depth());
    }

    #[test]
    fn skew_components_update_together() {
        let controls = Arc::new(Controls::default());
        let writer = {
            let controls = Arc::clone(&controls);
            thread::spawn(move || {
                for step in 0..1000 {
                    let value = step as f32;
                    controls.set_skew(value, -value);
                }
            })
        };
        for _ in 0..1000 {
            let [x, y] = controls.skew();
            assert_eq!(x, -y);
        }
        writer.join().unwrap();
    }

    #[test]
    fn orientation_requires_sensor_and_tracking() {
        let controls = Arc::new(Controls::default());
        let without_sensor = SkewMapper::new(Arc::clone(&controls), false);
        assert!(!without_sensor.toggle_orientation());
        assert!(!without_sensor.orientation([0.1, 0.1, 0.0]));

        let mapper = SkewMapper::new(Arc::clone(&controls), true);
        assert!(!mapper.orientation([0.1, 0.1, 0.0]));
        assert!(mapper.toggle_orientation());
        assert!(mapper.orientation([0.25, 0.125, 0.0]));
        assert_eq!(controls.skew(), [0.5, -1.0]);
        assert!(!mapper.toggle_orientation());
    }

    #[test]
    fn pointer_sets_skew() {
        let controls = Arc::new(Controls::default());
        let mapper = SkewMapper::new(Arc::clone(&controls), false);
        mapper.touch(200.0, 150.0, 400.0, 600.0);
        assert_eq!(controls.skew(), [0.0, -0.5]);
    }
}
