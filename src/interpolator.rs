//! Pure, deterministic color interpolation along an eased timeline.
use crate::color::Rgbio;
use crate::easing::Easing;

/// The color at `elapsed_ms` into a `duration_ms`-long transition from
/// `start` to `end` under `easing`. `duration_ms == 0` snaps immediately to
/// `end`, per the duration-zero special case.
pub fn interpolate(start: Rgbio, end: Rgbio, elapsed_ms: u64, duration_ms: u64, easing: Easing) -> Rgbio {
    if duration_ms == 0 {
        return end;
    }
    let tau = (elapsed_ms as f64 / duration_ms as f64).clamp(0.0, 1.0);
    let eased = easing.apply(tau);

    Rgbio {
        red: lerp_u8(start.red, end.red, eased),
        green: lerp_u8(start.green, end.green, eased),
        blue: lerp_u8(start.blue, end.blue, eased),
        intensity: lerp_u8(start.intensity, end.intensity, eased),
        opacity: lerp_f64(start.opacity, end.opacity, eased),
        blend: end.blend,
        pan: lerp_option_u8(start.pan, end.pan, eased),
        tilt: lerp_option_u8(start.tilt, end.tilt, eased),
    }
}

fn lerp_u8(a: u8, b: u8, eased: f64) -> u8 {
    (a as f64 + eased * (b as f64 - a as f64))
        .round()
        .clamp(0.0, 255.0) as u8
}

fn lerp_f64(a: f64, b: f64, eased: f64) -> f64 {
    (a + eased * (b - a)).clamp(0.0, 1.0)
}

/// Interpolate an optional axis. When both ends define it, lerp normally;
/// when only one does, hold that one's value rather than losing it.
fn lerp_option_u8(a: Option<u8>, b: Option<u8>, eased: f64) -> Option<u8> {
    match (a, b) {
        (Some(a), Some(b)) => Some(lerp_u8(a, b, eased)),
        (None, Some(b)) => Some(b),
        (Some(a), None) => Some(a),
        (None, None) => None,
    }
}
