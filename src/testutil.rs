//! Shared helpers for the module tests: a deterministic synthetic network
//! and small position builders in the external piece-list convention.

use once_cell::sync::OnceCell;

use crate::{
    network::{
        ARCH_HASH, DESC_LEN, FILE_SIZE, HALF_DIMENSIONS, NETWORK_TAG, NNUE_VERSION, NnueNetwork,
        TRANSFORMER_TAG,
    },
    feature::FT_IN_DIMS,
    types::{Colour, EvalFrame, PositionView, piece},
};

/// Splitmix-style generator so every test sees the same network.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }
}

/// A well-formed network image with weights small enough that no legal
/// position can overflow the i16 accumulator. Built once per test binary.
pub fn network_bytes() -> Vec<u8> {
    static BYTES: OnceCell<Vec<u8>> = OnceCell::new();
    BYTES.get_or_init(build_network_bytes).clone()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn build_network_bytes() -> Vec<u8> {
    let mut rng = Rng(0x9e37_79b9_7f4a_7c15);
    let mut data = Vec::with_capacity(FILE_SIZE);

    data.extend_from_slice(&NNUE_VERSION.to_le_bytes());
    data.extend_from_slice(&ARCH_HASH.to_le_bytes());
    data.extend_from_slice(&(DESC_LEN as u32).to_le_bytes());
    data.extend_from_slice(b"synthetic HalfKP 41024x256x2-32-32-1 test network");
    data.resize(12 + DESC_LEN, b' ');

    data.extend_from_slice(&TRANSFORMER_TAG.to_le_bytes());
    for _ in 0..HALF_DIMENSIONS {
        data.extend_from_slice(&((rng.next() % 1024) as i16 - 512).to_le_bytes());
    }
    for _ in 0..HALF_DIMENSIONS * FT_IN_DIMS {
        data.extend_from_slice(&((rng.next() % 128) as i16 - 64).to_le_bytes());
    }

    data.extend_from_slice(&NETWORK_TAG.to_le_bytes());
    for _ in 0..32 {
        data.extend_from_slice(&((rng.next() % 4096) as i32 - 2048).to_le_bytes());
    }
    for _ in 0..32 * 512 {
        data.push(rng.next() as u8);
    }
    for _ in 0..32 {
        data.extend_from_slice(&((rng.next() % 4096) as i32 - 2048).to_le_bytes());
    }
    for _ in 0..32 * 32 {
        data.push(rng.next() as u8);
    }
    data.extend_from_slice(&((rng.next() % 4096) as i32 - 2048).to_le_bytes());
    for _ in 0..32 {
        data.push(rng.next() as u8);
    }

    assert_eq!(data.len(), FILE_SIZE);
    data
}

/// The synthetic network, parsed once per test binary.
pub fn network() -> &'static NnueNetwork {
    static NET: OnceCell<Box<NnueNetwork>> = OnceCell::new();
    NET.get_or_init(|| NnueNetwork::from_bytes(&network_bytes()).unwrap())
}

/// A view with no ancestors: evaluation must refresh.
pub fn view<'a>(
    side_to_move: Colour,
    pieces: &'a [u8],
    squares: &'a [u8],
    frame: &'a mut EvalFrame,
) -> PositionView<'a> {
    PositionView {
        side_to_move,
        pieces,
        squares,
        current: frame,
        previous: [None, None],
    }
}

/// White king e1, black king e8, nothing else.
pub fn bare_kings() -> (Vec<u8>, Vec<u8>) {
    (vec![piece::W_KING, piece::B_KING, 0], vec![4, 60, 0])
}

/// The standard starting position, kings first, then the remaining pieces.
pub fn start_position() -> (Vec<u8>, Vec<u8>) {
    let mut pieces = vec![piece::W_KING, piece::B_KING];
    let mut squares = vec![4u8, 60];

    for (pc, sq) in [
        (piece::W_QUEEN, 3),
        (piece::W_ROOK, 0),
        (piece::W_ROOK, 7),
        (piece::W_BISHOP, 2),
        (piece::W_BISHOP, 5),
        (piece::W_KNIGHT, 1),
        (piece::W_KNIGHT, 6),
        (piece::B_QUEEN, 59),
        (piece::B_ROOK, 56),
        (piece::B_ROOK, 63),
        (piece::B_BISHOP, 58),
        (piece::B_BISHOP, 61),
        (piece::B_KNIGHT, 57),
        (piece::B_KNIGHT, 62),
    ] {
        pieces.push(pc);
        squares.push(sq);
    }
    for sq in 8..16 {
        pieces.push(piece::W_PAWN);
        squares.push(sq);
    }
    for sq in 48..56 {
        pieces.push(piece::B_PAWN);
        squares.push(sq);
    }

    pieces.push(piece::NONE);
    squares.push(0);
    (pieces, squares)
}

/// Relocate the piece standing on `from` to `to`.
pub fn apply_move(pieces: &[u8], squares: &[u8], from: u8, to: u8) -> (Vec<u8>, Vec<u8>) {
    let mut squares = squares.to_vec();
    let mut moved = false;
    for (i, &pc) in pieces.iter().enumerate() {
        if pc == piece::NONE {
            break;
        }
        if squares[i] == from {
            squares[i] = to;
            moved = true;
            break;
        }
    }
    assert!(moved, "no piece on square {from}");
    (pieces.to_vec(), squares)
}

/// Swap every piece's colour and mirror every square across the board.
pub fn mirror(pieces: &[u8], squares: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut out_pieces = vec![piece::W_KING, piece::B_KING];
    let mut out_squares = vec![squares[1] ^ 0x3f, squares[0] ^ 0x3f];

    for (i, &pc) in pieces.iter().enumerate().skip(2) {
        if pc == piece::NONE {
            break;
        }
        let flipped = if pc <= piece::W_PAWN { pc + 6 } else { pc - 6 };
        out_pieces.push(flipped);
        out_squares.push(squares[i] ^ 0x3f);
    }

    out_pieces.push(piece::NONE);
    out_squares.push(0);
    (out_pieces, out_squares)
}
