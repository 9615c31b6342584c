//! The feature-transformer accumulator and its maintenance engine.
//!
//! Each position carries a 256-wide i16 vector per perspective, equal to the
//! transformer biases plus the sum of the weight columns of every active
//! feature. The engine keeps that equality by applying dirty-piece deltas
//! from up to two computed ancestors, falling back to a from-scratch refresh
//! when the chain is broken. A king move invalidates a whole perspective's
//! feature space and forces that half to be rebuilt even on the delta path.

use crate::{
    feature::{self, IndexList},
    network::{HALF_DIMENSIONS, NnueNetwork},
    types::{Align64, Colour, DirtyPiece, PositionView, piece},
};

/// First-layer output for one position, one 256-vector per perspective.
/// `computed` is true iff `accumulation` is consistent with the position.
#[derive(Debug, Clone, Copy)]
pub struct Accumulator {
    pub accumulation: Align64<[[i16; HALF_DIMENSIONS]; 2]>,
    pub computed: bool,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            accumulation: Align64([[0; HALF_DIMENSIONS]; 2]),
            computed: false,
        }
    }
}

/// Make the current frame's accumulator consistent with the position,
/// incrementally if an ancestor allows it, by refresh otherwise.
///
/// Afterwards `accumulation[c] == ft_biases + Σ ft_weights[i]` over the
/// active features `i` of perspective `c`, whichever path produced it.
pub fn ensure_current(net: &NnueNetwork, pos: &mut PositionView<'_>) {
    if pos.current.accumulator.computed {
        return;
    }
    if !update_incrementally(net, pos) {
        refresh(net, pos);
    }
}

/// Rebuild both perspectives from biases and the full active-feature sets.
fn refresh(net: &NnueNetwork, pos: &mut PositionView<'_>) {
    for c in [Colour::WHITE, Colour::BLACK] {
        let mut active = IndexList::new();
        feature::append_active_indices(pos, c, &mut active);

        let acc = &mut pos.current.accumulator.accumulation.0[c.index()];
        *acc = net.ft_biases.0;
        for &index in &active {
            add_column(acc, net, index);
        }
    }
    pos.current.accumulator.computed = true;
}

/// Difference calculation from the nearest computed ancestor. Returns false
/// when no ancestor is usable and a refresh is required.
fn update_incrementally(net: &NnueNetwork, pos: &mut PositionView<'_>) -> bool {
    let Some(prev0) = pos.previous[0] else {
        return false;
    };

    // One delta from the direct ancestor, or two when only the older
    // ancestor has a computed accumulator.
    let mut deltas: [&DirtyPiece; 2] = [&prev0.dirty; 2];
    let (prev, deltas) = if prev0.accumulator.computed {
        (prev0, &deltas[..1])
    } else {
        match pos.previous[1] {
            Some(prev1) if prev1.accumulator.computed => {
                deltas[1] = &prev1.dirty;
                (prev1, &deltas[..])
            }
            _ => return false,
        }
    };

    let mut removed = [IndexList::new(), IndexList::new()];
    let mut added = [IndexList::new(), IndexList::new()];
    let mut reset = [false; 2];

    for c in [Colour::WHITE, Colour::BLACK] {
        let ci = c.index();
        // A king move of colour c re-keys that perspective's whole feature
        // space; the delta lists cannot express it.
        reset[ci] = deltas
            .iter()
            .any(|dp| dp.count > 0 && dp.piece[0] == piece::king_of(c));

        if reset[ci] {
            feature::append_active_indices(pos, c, &mut added[ci]);
        } else {
            for dp in deltas {
                feature::append_changed_indices(pos, c, dp, &mut removed[ci], &mut added[ci]);
            }
        }
    }

    for c in [Colour::WHITE, Colour::BLACK] {
        let ci = c.index();
        let acc = &mut pos.current.accumulator.accumulation.0[ci];
        if reset[ci] {
            *acc = net.ft_biases.0;
        } else {
            *acc = prev.accumulator.accumulation.0[ci];
            for &index in &removed[ci] {
                sub_column(acc, net, index);
            }
        }
        for &index in &added[ci] {
            add_column(acc, net, index);
        }
    }

    pos.current.accumulator.computed = true;
    true
}

// Trained weights are scaled so legal positions never overflow i16; wrapping
// keeps debug builds on the trained model's two's-complement behaviour.

fn add_column(acc: &mut [i16; HALF_DIMENSIONS], net: &NnueNetwork, index: u32) {
    let offset = HALF_DIMENSIONS * index as usize;
    for (a, w) in acc.iter_mut().zip(&net.ft_weights[offset..offset + HALF_DIMENSIONS]) {
        *a = a.wrapping_add(*w);
    }
}

fn sub_column(acc: &mut [i16; HALF_DIMENSIONS], net: &NnueNetwork, index: u32) {
    let offset = HALF_DIMENSIONS * index as usize;
    for (a, w) in acc.iter_mut().zip(&net.ft_weights[offset..offset + HALF_DIMENSIONS]) {
        *a = a.wrapping_sub(*w);
    }
}
