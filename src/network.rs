//! Network weight storage and the bit-exact file loader.
//!
//! The on-disk format is a single versioned layout: a 12-byte header, a
//! 177-byte human-readable architecture descriptor, then the tagged
//! feature-transformer and network sections. Everything is verified before
//! any weight is parsed; a rejected file leaves the evaluator unready.
//!
//! Hidden weights are stored on disk in logical `[row][column]` order and
//! rewritten at load time into the layout the affine kernel indexes by
//! input column. On AVX2 that layout additionally swaps bits 3 and 4 of the
//! 512-layer column index (matching the order in which the activation
//! transform packs accumulator halves) and interleaves the hidden biases by
//! 128-bit lane; the generic backend uses the identity permutation.

use std::{fs::File, path::Path};

use memmap2::Mmap;

use crate::{
    accumulator,
    errors::NnueError,
    feature::FT_IN_DIMS,
    layers,
    types::{Align64, PositionView},
};

/// Width of one perspective's accumulator half.
pub const HALF_DIMENSIONS: usize = 256;
/// Width of the activation transform's output, both perspectives packed.
pub const FT_OUT_DIMS: usize = HALF_DIMENSIONS * 2;
/// Final divisor converting the raw network output to centipawn-like units.
pub const FV_SCALE: i32 = 16;

pub(crate) const NNUE_VERSION: u32 = 0x7AF3_2F16;
pub(crate) const ARCH_HASH: u32 = 0x3E5A_A6EE;
pub(crate) const DESC_LEN: usize = 177;
pub(crate) const TRANSFORMER_TAG: u32 = 0x5D69_D7B8;
pub(crate) const NETWORK_TAG: u32 = 0x6333_7156;

pub(crate) const TRANSFORMER_START: usize = 3 * 4 + DESC_LEN;
pub(crate) const NETWORK_START: usize =
    TRANSFORMER_START + 4 + 2 * HALF_DIMENSIONS + 2 * HALF_DIMENSIONS * FT_IN_DIMS;

/// Exact size of a valid network file, in bytes.
pub const FILE_SIZE: usize =
    NETWORK_START + 4 + 4 * 32 + 32 * FT_OUT_DIMS + 4 * 32 + 32 * 32 + 4 + 32;

const _SIZE_ASSERT: () = assert!(FILE_SIZE == 21_022_697);

#[inline]
fn u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

#[inline]
fn u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Position of logical weight `(row, column)` in the inference layout:
/// column-contiguous so the kernel can load all 32 rows of an input column
/// at once, with the AVX2 column shuffle for the wide layer folded in.
const fn wt_idx(row: usize, column: usize, dims: usize) -> usize {
    let column = if cfg!(target_feature = "avx2") && dims > 32 {
        (column & !0x18) | ((((column & 0x18) << 1) | ((column & 0x18) >> 1)) & 0x18)
    } else {
        column
    };
    column * 32 + row
}

/// The AVX2 affine kernel accumulates rows in lane-interleaved order; the
/// biases are pre-shuffled by 128-bit chunk so each accumulator starts from
/// the biases of the rows it will actually hold.
#[cfg(target_feature = "avx2")]
fn permute_biases(biases: &mut [i32; 32]) {
    const ORDER: [usize; 8] = [0, 4, 1, 5, 2, 6, 3, 7];
    let original = *biases;
    for (chunk, &source) in ORDER.iter().enumerate() {
        biases[chunk * 4..chunk * 4 + 4].copy_from_slice(&original[source * 4..source * 4 + 4]);
    }
}

/// The full weight block, immutable once loaded. About 21 MiB, so it only
/// exists boxed.
pub struct NnueNetwork {
    pub ft_biases: Align64<[i16; HALF_DIMENSIONS]>,
    pub ft_weights: Align64<[i16; HALF_DIMENSIONS * FT_IN_DIMS]>,
    pub hidden1_biases: Align64<[i32; 32]>,
    pub hidden1_weights: Align64<[i8; 32 * FT_OUT_DIMS]>,
    pub hidden2_biases: Align64<[i32; 32]>,
    pub hidden2_weights: Align64<[i8; 32 * 32]>,
    pub output_bias: i32,
    pub output_weights: Align64<[i8; 32]>,
}

impl NnueNetwork {
    fn zeroed() -> Box<Self> {
        // In debug mode `Box::new(...)` would materialise the 21 MiB block
        // on the stack first, so the allocation is done by hand.

        // SAFETY: every field is a plain integer array, for which the
        // all-zeroes bit pattern is a valid value.
        unsafe {
            let layout = std::alloc::Layout::new::<Self>();
            let ptr = std::alloc::alloc_zeroed(layout);
            if ptr.is_null() {
                std::alloc::handle_alloc_error(layout);
            }
            Box::from_raw(ptr.cast())
        }
    }

    /// Verify and parse an in-memory network image.
    pub fn from_bytes(data: &[u8]) -> Result<Box<Self>, NnueError> {
        verify(data)?;

        let description = String::from_utf8_lossy(&data[12..12 + DESC_LEN]);
        log::info!("network accepted: {}", description.trim_end_matches(['\0', ' ']));

        let mut net = Self::zeroed();
        net.parse(data);
        Ok(net)
    }

    /// Open and memory-map a network file, then parse it. The mapping and
    /// the file handle are both released before this returns.
    pub fn load(path: &Path) -> Result<Box<Self>, NnueError> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and dropped at the end of this
        // scope; no reference into it outlives the parse.
        let mapping = unsafe { Mmap::map(&file)? };
        Self::from_bytes(&mapping)
    }

    /// Fill the weight block from a verified image. Infallible: `verify`
    /// has already pinned the exact size.
    #[allow(clippy::cast_possible_wrap)]
    fn parse(&mut self, data: &[u8]) {
        let mut d = TRANSFORMER_START + 4;
        for bias in &mut self.ft_biases.0 {
            *bias = u16_le(data, d) as i16;
            d += 2;
        }
        for weight in &mut self.ft_weights.0 {
            *weight = u16_le(data, d) as i16;
            d += 2;
        }
        d += 4; // network section tag

        d = read_biases(&mut self.hidden1_biases.0, data, d);
        d = read_hidden_weights(&mut self.hidden1_weights.0, FT_OUT_DIMS, data, d);
        d = read_biases(&mut self.hidden2_biases.0, data, d);
        d = read_hidden_weights(&mut self.hidden2_weights.0, 32, data, d);
        self.output_bias = u32_le(data, d) as i32;
        d += 4;
        for (weight, &byte) in self.output_weights.0.iter_mut().zip(&data[d..d + 32]) {
            *weight = byte as i8;
        }

        #[cfg(target_feature = "avx2")]
        {
            permute_biases(&mut self.hidden1_biases.0);
            permute_biases(&mut self.hidden2_biases.0);
        }
    }

    /// Run the full network on a position: make the accumulator current,
    /// then transform → hidden1 → hidden2 → output, scaled to centipawn-like
    /// units. Signed from the side to move's point of view.
    pub fn evaluate_position(&self, pos: &mut PositionView<'_>) -> i32 {
        accumulator::ensure_current(self, pos);

        let mut input = Align64([0i8; FT_OUT_DIMS]);
        let mut input_mask = [0u64; layers::INPUT_MASK_WORDS];
        let mut hidden1_out = Align64([0i8; 32]);
        let mut hidden1_mask = 0u64;
        let mut hidden2_out = Align64([0i8; 32]);

        layers::activate_ft(
            &pos.current.accumulator,
            pos.side_to_move,
            &mut input,
            &mut input_mask,
        );
        layers::propagate_hidden1(
            &input,
            &input_mask,
            &self.hidden1_biases,
            &self.hidden1_weights,
            &mut hidden1_out,
            &mut hidden1_mask,
        );
        layers::propagate_hidden2(
            &hidden1_out,
            hidden1_mask,
            &self.hidden2_biases,
            &self.hidden2_weights,
            &mut hidden2_out,
        );
        let raw = layers::propagate_output(&hidden2_out, self.output_bias, &self.output_weights);

        raw / FV_SCALE
    }
}

fn verify(data: &[u8]) -> Result<(), NnueError> {
    if data.len() != FILE_SIZE {
        return Err(NnueError::Format("wrong file size"));
    }
    if u32_le(data, 0) != NNUE_VERSION {
        return Err(NnueError::Format("unsupported version magic"));
    }
    if u32_le(data, 4) != ARCH_HASH {
        return Err(NnueError::Format("architecture hash mismatch"));
    }
    if u32_le(data, 8) != DESC_LEN as u32 {
        return Err(NnueError::Format("unexpected descriptor length"));
    }
    if u32_le(data, TRANSFORMER_START) != TRANSFORMER_TAG {
        return Err(NnueError::Format("transformer section tag mismatch"));
    }
    if u32_le(data, NETWORK_START) != NETWORK_TAG {
        return Err(NnueError::Format("network section tag mismatch"));
    }
    Ok(())
}

#[allow(clippy::cast_possible_wrap)]
fn read_biases(biases: &mut [i32; 32], data: &[u8], mut d: usize) -> usize {
    for bias in biases {
        *bias = u32_le(data, d) as i32;
        d += 4;
    }
    d
}

#[allow(clippy::cast_possible_wrap)]
fn read_hidden_weights(weights: &mut [i8], dims: usize, data: &[u8], mut d: usize) -> usize {
    for row in 0..32 {
        for column in 0..dims {
            weights[wt_idx(row, column, dims)] = data[d] as i8;
            d += 1;
        }
    }
    d
}
