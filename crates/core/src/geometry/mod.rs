//! Pure conversions between screen coordinates and timeline positions used by
//! the gesture layer.

/// Axis-aligned rectangle in client coordinates, as reported for an element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Renders seconds as `MM:SS.cc`. Zero, negative and non-finite input render
/// as `00:00`, since no timeline position lies before the start.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "00:00".to_string();
    }

    let mins = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    let centis = ((seconds % 1.0) * 100.0).floor() as u64;
    format!("{mins:02}:{secs:02}.{centis:02}")
}

/// Maps a client position to fractions of `rect`. A degenerate rect yields 0.
pub fn normalize_position(client_x: f64, client_y: f64, rect: Rect) -> (f64, f64) {
    let fraction = |offset: f64, extent: f64| {
        if extent > 0.0 {
            offset / extent
        } else {
            0.0
        }
    };
    (
        fraction(client_x - rect.left, rect.width),
        fraction(client_y - rect.top, rect.height),
    )
}

pub fn denormalize_position(x: f64, y: f64, width: f64, height: f64) -> (f64, f64) {
    (x * width, y * height)
}

/// Timeline instant at `fraction` of a video `duration`, clamped to the video.
pub fn time_at_fraction(fraction: f64, duration: f64) -> f64 {
    if !fraction.is_finite() || !duration.is_finite() || duration <= 0.0 {
        return 0.0;
    }
    (fraction * duration).clamp(0.0, duration)
}

/// Converts the two horizontal endpoints of a drag across a timeline of
/// `width` pixels into an ordered `(start, end)` time range.
pub fn range_from_drag(a: f64, b: f64, width: f64, duration: f64) -> (f64, f64) {
    let to_time = |x: f64| {
        let fraction = if width > 0.0 { x / width } else { 0.0 };
        time_at_fraction(fraction, duration)
    };
    let (ta, tb) = (to_time(a), to_time(b));
    if ta <= tb {
        (ta, tb)
    } else {
        (tb, ta)
    }
}
