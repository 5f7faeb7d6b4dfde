use hashbrown::{hash_map::Entry, HashMap};
use itertools::Itertools;
use log::{info, warn};

use crate::{
    common::{
        EncodedTile, TilePixels, MAX_UNIQUE_TILES, TILES_PER_SCREEN, TILES_X, TILES_Y, TILE_BYTES,
        TILE_SIZE,
    },
    error::ConvertError,
    quantize::QuantizedImage,
    tile::encode_tile,
};

/// Unique encoded tiles in first-seen order.
#[derive(Default, Clone, Debug)]
pub struct TileTable {
    tiles: Vec<EncodedTile>,
    lookup: HashMap<EncodedTile, usize>,
}

impl TileTable {
    /// Returns the index of `tile`, appending it if it hasn't been seen yet.
    pub fn insert(&mut self, tile: EncodedTile) -> usize {
        match self.lookup.entry(tile) {
            Entry::Occupied(occupied_entry) => *occupied_entry.get(),
            Entry::Vacant(vacant_entry) => {
                let idx = self.tiles.len();
                self.tiles.push(tile);
                vacant_entry.insert(idx);
                idx
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.tiles.concat()
    }
}

/// Deduplicates a tile stream, returning the unique tiles and the index of
/// each input tile within them.
pub fn dedup_tiles(tiles: &[EncodedTile]) -> (TileTable, Vec<usize>) {
    let mut table = TileTable::default();
    let map = tiles.iter().map(|&t| table.insert(t)).collect_vec();
    (table, map)
}

/// One image's graphics, ready to be laid out in ROM.
#[derive(Clone, Debug)]
pub struct ConvertedImage {
    // Unique tiles when `tilemap` is present, otherwise every tile in order.
    pub tiles: Vec<u8>,
    pub tilemap: Option<Vec<u8>>,
    pub unique_tiles: usize,
}

impl ConvertedImage {
    pub fn is_optimized(&self) -> bool {
        self.tilemap.is_some()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len() / TILE_BYTES
    }

    /// Bytes this image occupies in the graphics area: map first, then tiles.
    pub fn payload_len(&self) -> usize {
        self.tilemap.as_ref().map_or(0, |m| m.len()) + self.tiles.len()
    }
}

fn extract_tile(image: &QuantizedImage, tx: usize, ty: usize) -> TilePixels {
    let mut tile: TilePixels = [[0; TILE_SIZE]; TILE_SIZE];
    for (y, row) in tile.iter_mut().enumerate() {
        for (x, c) in row.iter_mut().enumerate() {
            *c = image.get(tx * TILE_SIZE + x, ty * TILE_SIZE + y);
        }
    }
    tile
}

/// Cuts the image into 8x8 tiles, left to right then top to bottom.
pub fn slice_tiles(image: &QuantizedImage) -> Vec<TilePixels> {
    (0..TILES_Y)
        .cartesian_product(0..TILES_X)
        .map(|(ty, tx)| extract_tile(image, tx, ty))
        .collect_vec()
}

pub fn assemble(image: &QuantizedImage) -> ConvertedImage {
    let encoded = slice_tiles(image).iter().map(encode_tile).collect_vec();
    debug_assert_eq!(encoded.len(), TILES_PER_SCREEN);
    let (table, map) = dedup_tiles(&encoded);

    if table.len() > MAX_UNIQUE_TILES {
        warn!(
            "{}",
            ConvertError::TileOverflow {
                unique_tiles: table.len()
            }
        );
        return ConvertedImage {
            tiles: encoded.concat(),
            tilemap: None,
            unique_tiles: table.len(),
        };
    }

    info!("Optimized image to {} tiles.", table.len());
    ConvertedImage {
        tiles: table.to_bytes(),
        tilemap: Some(map.into_iter().map(|i| i as u8).collect_vec()),
        unique_tiles: table.len(),
    }
}
