use crate::common::{EncodedTile, TilePixels, TILE_BYTES};

/// Packs an 8x8 block of 2bpp color indices into the 16-byte planar format:
/// each row becomes a low bit-plane byte followed by a high bit-plane byte,
/// with the leftmost pixel in bit 7.
pub fn encode_tile(pixels: &TilePixels) -> EncodedTile {
    let mut out: EncodedTile = [0; TILE_BYTES];
    for (y, row) in pixels.iter().enumerate() {
        let mut low = 0u8;
        let mut high = 0u8;
        for (x, &c) in row.iter().enumerate() {
            debug_assert!(c < 4, "color index {} out of range", c);
            low |= (c & 1) << (7 - x);
            high |= ((c >> 1) & 1) << (7 - x);
        }
        out[y * 2] = low;
        out[y * 2 + 1] = high;
    }
    out
}

#[cfg(test)]
pub fn decode_tile(data: &EncodedTile) -> TilePixels {
    use crate::common::TILE_SIZE;

    let mut tile: TilePixels = [[0; TILE_SIZE]; TILE_SIZE];
    for y in 0..TILE_SIZE {
        for x in 0..TILE_SIZE {
            let c0 = (data[y * 2] >> (7 - x)) & 1;
            let c1 = (data[y * 2 + 1] >> (7 - x)) & 1;
            tile[y][x] = c0 | (c1 << 1);
        }
    }
    tile
}
