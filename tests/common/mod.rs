//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use webpforge::config::Config;
use webpforge::{ConversionEvent, EventSender, ImageBuffer};

pub const LOGO_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="120" height="80" viewBox="0 0 120 80">
    <rect width="120" height="80" fill="#ffffff"/>
    <circle cx="40" cy="40" r="30" fill="#1e88e5"/>
    <path d="M70 10 L110 70 L70 70 Z" fill="#e53935"/>
</svg>"##;

/// Smooth two-axis gradient.
pub fn gradient(width: u32, height: u32) -> ImageBuffer {
    let mut px = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            let r = (x * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            px.extend_from_slice(&[r, g, r / 2 + g / 2, 255]);
        }
    }
    ImageBuffer::new(width, height, px).expect("valid gradient")
}

/// Config with the benchmark disabled so performance class is `Unknown`.
pub fn quiet_config() -> Config {
    let mut config = Config::default();
    config.benchmark.iterations = 0;
    config
}

/// Event sender that records every event.
pub fn recorder() -> (EventSender, Arc<Mutex<Vec<ConversionEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    (EventSender::new(move |e| sink.lock().push(e.clone())), events)
}
