pub type ColorValue = u8; // Color channel value (0-255)
pub type ColorIdx = u8; // Index into 2bpp palette (0-3)
pub type ColorRGB = (ColorValue, ColorValue, ColorValue);

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;
pub const TILE_SIZE: usize = 8;
pub const TILES_X: usize = SCREEN_WIDTH / TILE_SIZE; // 20
pub const TILES_Y: usize = SCREEN_HEIGHT / TILE_SIZE; // 18
pub const TILES_PER_SCREEN: usize = TILES_X * TILES_Y; // 360

// Bytes per encoded tile: two bit-planes per row.
pub const TILE_BYTES: usize = 16;

// Tile map entries are single bytes.
pub const MAX_UNIQUE_TILES: usize = 256;

pub const MAX_IMAGES: usize = 256;

pub type TilePixels = [[ColorIdx; TILE_SIZE]; TILE_SIZE];
pub type EncodedTile = [u8; TILE_BYTES];
