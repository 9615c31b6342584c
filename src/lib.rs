//! An efficiently-updatable neural network (NNUE) evaluator for chess
//! engines, built around the HalfKP feature set.
//!
//! The crate runs a fixed four-layer quantised network: a 41024→256 feature
//! transformer per perspective, maintained incrementally across the search
//! tree, followed by two sparse 32-wide affine layers with clipped-ReLU
//! activations and a scalar output. Weights come from a single versioned
//! binary format, verified bit-exactly at load time.
//!
//! The engine side supplies a [`PositionView`]: parallel piece/square lists
//! (kings first, zero-terminated) plus up to two ancestor frames whose
//! dirty-piece deltas let the accumulator be updated instead of rebuilt.
//! Evaluation is total once a network is installed, and safe to run from
//! many threads as long as each thread owns its frames.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use std::path::Path;

use once_cell::sync::OnceCell;

pub mod accumulator;
pub mod errors;
pub mod feature;
pub mod layers;
pub mod network;
#[cfg(target_feature = "avx2")]
pub mod simd;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use accumulator::Accumulator;
pub use errors::NnueError;
pub use network::NnueNetwork;
pub use types::{Colour, DirtyPiece, EvalFrame, PositionView};

/// Returned by the evaluation entry points when no network is installed.
pub const UNREADY_EVAL: i32 = 0;

static NNUE: OnceCell<Box<NnueNetwork>> = OnceCell::new();

/// Load the network file at `path` and install it as the process-wide
/// weight block. Returns whether a network is installed afterwards.
///
/// The gate is one-shot: the first successful load wins, and later calls
/// return `true` without reloading, so evaluators on other threads never
/// observe a weight swap. Failures are logged and leave the evaluator
/// unready.
pub fn init(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    if NNUE.get().is_some() {
        log::debug!("network already installed, refusing to replace it");
        return true;
    }
    match NnueNetwork::load(path) {
        Ok(net) => {
            // A racing init may have beaten us to the cell; either way a
            // network is installed now.
            let _ = NNUE.set(net);
            true
        }
        Err(err) => {
            log::warn!("could not load network from {}: {err}", path.display());
            false
        }
    }
}

/// The installed network, or [`NnueError::Unready`] before a successful
/// [`init`].
pub fn try_network() -> Result<&'static NnueNetwork, NnueError> {
    NNUE.get().map(|net| &**net).ok_or(NnueError::Unready)
}

/// Standalone probe: evaluate a bare piece list with no ancestor chain.
///
/// Every call pays for a full accumulator refresh, which makes this the
/// costly entry point; a search should maintain frames and use
/// [`evaluate_with_chain`]. Returns [`UNREADY_EVAL`] before [`init`].
pub fn evaluate(side_to_move: Colour, pieces: &[u8], squares: &[u8]) -> i32 {
    let Ok(net) = try_network() else {
        return UNREADY_EVAL;
    };
    let mut frame = EvalFrame::default();
    let mut pos = PositionView {
        side_to_move,
        pieces,
        squares,
        current: &mut frame,
        previous: [None, None],
    };
    net.evaluate_position(&mut pos)
}

/// Evaluate a position whose caller maintains the accumulator chain.
/// Returns [`UNREADY_EVAL`] before [`init`].
pub fn evaluate_with_chain(pos: &mut PositionView<'_>) -> i32 {
    let Ok(net) = try_network() else {
        return UNREADY_EVAL;
    };
    net.evaluate_position(pos)
}
