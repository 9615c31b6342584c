//! HalfKP feature indexing.
//!
//! A feature is one (piece, square) pair seen from one perspective, keyed on
//! that perspective's own king square. Kings are never features themselves;
//! they parameterise the feature space through `641 * oriented_king_square`.

use arrayvec::ArrayVec;

use crate::types::{Colour, DirtyPiece, PositionView, SQ_NONE, piece};

/// Base offsets into the per-king feature block, one per piece-colour class.
/// Offset 0 is reserved (and doubles as the king/none mapping).
const PS_W_PAWN: u32 = 1;
const PS_B_PAWN: u32 = 64 + 1;
const PS_W_KNIGHT: u32 = 2 * 64 + 1;
const PS_B_KNIGHT: u32 = 3 * 64 + 1;
const PS_W_BISHOP: u32 = 4 * 64 + 1;
const PS_B_BISHOP: u32 = 5 * 64 + 1;
const PS_W_ROOK: u32 = 6 * 64 + 1;
const PS_B_ROOK: u32 = 7 * 64 + 1;
const PS_W_QUEEN: u32 = 8 * 64 + 1;
const PS_B_QUEEN: u32 = 9 * 64 + 1;

/// Size of one king-square block: ten piece-colour classes plus the reserved
/// slot at offset 0.
pub const PS_END: u32 = 10 * 64 + 1;

/// Total feature space per perspective.
pub const FT_IN_DIMS: usize = 64 * PS_END as usize;

/// Piece-code → base-offset table, indexed `[perspective][piece_code]`.
/// From BLACK's perspective the piece colours are swapped.
#[rustfmt::skip]
const PIECE_TO_INDEX: [[u32; 14]; 2] = [
    [
        0, 0, PS_W_QUEEN, PS_W_ROOK, PS_W_BISHOP, PS_W_KNIGHT, PS_W_PAWN,
        0, PS_B_QUEEN, PS_B_ROOK, PS_B_BISHOP, PS_B_KNIGHT, PS_B_PAWN, 0,
    ],
    [
        0, 0, PS_B_QUEEN, PS_B_ROOK, PS_B_BISHOP, PS_B_KNIGHT, PS_B_PAWN,
        0, PS_W_QUEEN, PS_W_ROOK, PS_W_BISHOP, PS_W_KNIGHT, PS_W_PAWN, 0,
    ],
];

/// A bounded list of feature indices. Thirty entries covers the largest
/// active set of a legal position as well as any merged dirty-piece delta.
pub type IndexList = ArrayVec<u32, 30>;

/// Map a square into `c`'s frame of reference (BLACK sees a mirrored board).
pub const fn orient(c: Colour, sq: u8) -> u8 {
    match c {
        Colour::WHITE => sq,
        _ => sq ^ 0x3f,
    }
}

/// Feature index of piece `pc` on `sq`, seen by perspective `c` whose king
/// sits on the (already oriented) square `oriented_ksq`.
///
/// Invariant: the result is below [`FT_IN_DIMS`] for every legal input, so
/// it can index a column of the feature-transformer matrix.
pub fn make_index(c: Colour, sq: u8, pc: u8, oriented_ksq: u8) -> u32 {
    u32::from(orient(c, sq)) + PIECE_TO_INDEX[c.index()][pc as usize] + PS_END * u32::from(oriented_ksq)
}

/// Append the indices of every active feature of perspective `c`: all
/// non-king pieces, keyed on `c`'s king square.
pub fn append_active_indices(pos: &PositionView<'_>, c: Colour, active: &mut IndexList) {
    let ksq = orient(c, pos.king_square(c));
    for i in 2..pos.pieces.len() {
        let pc = pos.pieces[i];
        if pc == piece::NONE {
            break;
        }
        active.push(make_index(c, pos.squares[i], pc, ksq));
    }
}

/// Translate one dirty-piece delta into removed/added index lists for
/// perspective `c`. King entries are skipped here; a king move is handled by
/// the caller as a full reset of that perspective.
pub fn append_changed_indices(
    pos: &PositionView<'_>,
    c: Colour,
    dp: &DirtyPiece,
    removed: &mut IndexList,
    added: &mut IndexList,
) {
    let ksq = orient(c, pos.king_square(c));
    for i in 0..dp.count {
        let pc = dp.piece[i];
        if piece::is_king(pc) {
            continue;
        }
        if dp.from[i] != SQ_NONE {
            removed.push(make_index(c, dp.from[i], pc, ksq));
        }
        if dp.to[i] != SQ_NONE {
            added.push(make_index(c, dp.to[i], pc, ksq));
        }
    }
}
