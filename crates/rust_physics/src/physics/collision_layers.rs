//! Collision layer matrix
//!
//! Every collider sits on one of [`MAX_LAYERS`] layers. The world keeps a
//! symmetric matrix saying which layer pairs may interact; the broad phase
//! drops any pair whose entry is disabled.

use serde::{Deserialize, Serialize};

/// Number of collision layers
pub const MAX_LAYERS: usize = 64;

/// Layer index in `0..MAX_LAYERS`
pub type Layer = u8;

/// Symmetric layer-vs-layer enable matrix
///
/// Serialized as the list of disabled pairs, since the matrix starts fully
/// enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "MatrixRepr", from = "MatrixRepr")]
pub struct LayerCollisionMatrix {
    rows: Vec<u64>,
}

#[derive(Serialize, Deserialize)]
struct MatrixRepr {
    #[serde(default)]
    disabled: Vec<(Layer, Layer)>,
}

impl From<LayerCollisionMatrix> for MatrixRepr {
    fn from(matrix: LayerCollisionMatrix) -> Self {
        Self { disabled: matrix.disabled_pairs() }
    }
}

impl From<MatrixRepr> for LayerCollisionMatrix {
    fn from(repr: MatrixRepr) -> Self {
        let mut matrix = Self::default();
        for (a, b) in repr.disabled {
            matrix.set(a, b, false);
        }
        matrix
    }
}

impl Default for LayerCollisionMatrix {
    fn default() -> Self {
        Self { rows: vec![u64::MAX; MAX_LAYERS] }
    }
}

/// Clamp an arbitrary layer number into range
pub fn clamp_layer(layer: u32) -> Layer {
    if layer as usize >= MAX_LAYERS {
        log::warn!("Layer {} out of range, using {}", layer, MAX_LAYERS - 1);
        (MAX_LAYERS - 1) as Layer
    } else {
        layer as Layer
    }
}

/// Bit index of `layer`, with out-of-range layers clamped to the last one
pub(crate) fn layer_index(layer: Layer) -> usize {
    usize::from(clamp_layer(u32::from(layer)))
}

impl LayerCollisionMatrix {
    /// Matrix with every pair enabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the pair; `(a, b)` and `(b, a)` always agree
    pub fn set(&mut self, a: Layer, b: Layer, enabled: bool) {
        let (a, b) = (layer_index(a), layer_index(b));
        if enabled {
            self.rows[a] |= 1 << b;
            self.rows[b] |= 1 << a;
        } else {
            self.rows[a] &= !(1 << b);
            self.rows[b] &= !(1 << a);
        }
    }

    /// Whether colliders on the two layers may interact
    pub fn can_collide(&self, a: Layer, b: Layer) -> bool {
        let (a, b) = (layer_index(a), layer_index(b));
        self.rows[a] & (1 << b) != 0
    }

    /// Disable every pair involving `layer`
    pub fn isolate(&mut self, layer: Layer) {
        for other in 0..MAX_LAYERS as Layer {
            self.set(layer, other, false);
        }
    }

    /// Disabled pairs with `a <= b`
    pub fn disabled_pairs(&self) -> Vec<(Layer, Layer)> {
        let mut pairs = Vec::new();
        for a in 0..MAX_LAYERS as Layer {
            for b in a..MAX_LAYERS as Layer {
                if !self.can_collide(a, b) {
                    pairs.push((a, b));
                }
            }
        }
        pairs
    }
}
