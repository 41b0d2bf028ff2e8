//! The RGBIO color model: the unit of state the sequencer interpolates,
//! composes, and renders.
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// How a layer's color combines with the composed value from layers beneath it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    /// The layer's color replaces the running composed value outright.
    #[default]
    Replace,
    /// The layer's R/G/B/intensity are clamped-added to the running value;
    /// opacity becomes `min(current_opacity, layer_opacity)`.
    Add,
}

/// A pan/tilt position, in DMX units (0..255 on each axis).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanTilt {
    pub pan: u8,
    pub tilt: u8,
}

/// A fixture color: red/green/blue/intensity channels, an opacity used by
/// layer composition, a blend mode, and an optional moving-head position.
///
/// Every field is always defined once a color reaches the output assembler
/// (the data-model invariant from the specification); `pan`/`tilt` are the
/// only fields that may be absent on a *target* color, in which case they
/// are filled in from the fixture's configured home position before the
/// color is used to drive a transition.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rgbio {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub intensity: u8,
    pub opacity: f64,
    pub blend: BlendMode,
    pub pan: Option<u8>,
    pub tilt: Option<u8>,
}

impl Rgbio {
    /// Pure black, fully opaque, replace mode, no pan/tilt opinion.
    pub const BLACK: Rgbio = Rgbio {
        red: 0,
        green: 0,
        blue: 0,
        intensity: 0,
        opacity: 1.0,
        blend: BlendMode::Replace,
        pan: None,
        tilt: None,
    };

    pub fn new(red: u8, green: u8, blue: u8, intensity: u8, opacity: f64, blend: BlendMode) -> Self {
        Self {
            red,
            green,
            blue,
            intensity,
            opacity: opacity.clamp(0.0, 1.0),
            blend,
            pan: None,
            tilt: None,
        }
    }

    pub fn with_pan_tilt(mut self, pan: u8, tilt: u8) -> Self {
        self.pan = Some(pan);
        self.tilt = Some(tilt);
        self
    }

    /// Fill in pan/tilt from the provided home position if either is unset.
    pub fn fill_pan_tilt_default(&mut self, home: PanTilt) {
        if self.pan.is_none() {
            self.pan = Some(home.pan);
        }
        if self.tilt.is_none() {
            self.tilt = Some(home.tilt);
        }
    }

    /// Combine `self` (the running composed value from lower layers) with
    /// `layer`, an additional color sitting above it, per `layer`'s blend mode.
    pub fn compose_over(&self, layer: &Rgbio) -> Rgbio {
        match layer.blend {
            BlendMode::Replace => {
                let mut out = *layer;
                // Pan/tilt follow "highest layer that defines them", which the
                // caller resolves by walking layers bottom-up and letting a
                // later `Some` value win; replace mode otherwise takes the
                // layer's color verbatim.
                if out.pan.is_none() {
                    out.pan = self.pan;
                }
                if out.tilt.is_none() {
                    out.tilt = self.tilt;
                }
                out
            }
            BlendMode::Add => Rgbio {
                red: self.red.saturating_add(layer.red),
                green: self.green.saturating_add(layer.green),
                blue: self.blue.saturating_add(layer.blue),
                intensity: self.intensity.saturating_add(layer.intensity),
                opacity: self.opacity.min(layer.opacity),
                blend: BlendMode::Add,
                pan: layer.pan.or(self.pan),
                tilt: layer.tilt.or(self.tilt),
            },
        }
    }
}

impl Default for Rgbio {
    fn default() -> Self {
        Self::BLACK
    }
}
