use std::{fmt::Display, ops::Add};

use anyhow::{bail, ensure, Context, Result};
use log::{debug, info};

use crate::{assemble::ConvertedImage, common::MAX_IMAGES, error::ConvertError};

// Everything in the template before this point is kept verbatim (bank 0).
pub const BASE_ROM_SIZE: usize = 0x4000;
pub const BANK_SIZE: u32 = 0x4000;
pub const MIN_ROM_SIZE: usize = 0x8000;

pub const IMAGE_TABLE_TAG: &[u8; 3] = b"IMG";
const IMAGE_ENTRY_SIZE: usize = 4;

const ROM_SIZE_ADDR: usize = 0x148;
const HEADER_CHECKSUM_ADDR: usize = 0x14D;
const GLOBAL_CHECKSUM_ADDR: usize = 0x14E;
const HEADER_CHECKSUM_START: usize = 0x134;
const HEADER_END: usize = 0x150;

// Byte offset from the start of the image table, which sits right after the
// base ROM. Keeping it distinct from bank-relative addresses makes the two
// harder to mix up.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct TableOffset(u32);

impl Add<usize> for TableOffset {
    type Output = TableOffset;

    fn add(self, other: usize) -> Self {
        debug_assert!(
            other <= (u32::MAX - self.0) as usize,
            "table offset {} + {} overflows",
            self,
            other
        );
        TableOffset(self.0 + other as u32)
    }
}

impl Display for TableOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// Where an image's data lives, as seen through the switchable bank window
/// at 0x4000-0x7FFF.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct BankAddr {
    pub bank: u8,
    pub addr: u16,
}

impl TryFrom<TableOffset> for BankAddr {
    type Error = anyhow::Error;

    fn try_from(offset: TableOffset) -> Result<Self> {
        let bank = (offset.0 >> 14) + 1;
        let bank =
            u8::try_from(bank).with_context(|| format!("offset {} past last bank", offset))?;
        Ok(BankAddr {
            bank,
            addr: (offset.0 % BANK_SIZE + BANK_SIZE) as u16,
        })
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ImageEntry {
    pub location: BankAddr,
    // 0 means the image is stored as a raw tile stream without a map.
    pub tile_count: u8,
}

impl ImageEntry {
    fn to_bytes(self) -> [u8; IMAGE_ENTRY_SIZE] {
        let [lo, hi] = self.location.addr.to_le_bytes();
        [self.location.bank, lo, hi, self.tile_count]
    }
}

pub fn image_table_size(image_count: usize) -> usize {
    IMAGE_TABLE_TAG.len() + IMAGE_ENTRY_SIZE * image_count + 1
}

fn tile_count_byte(image: &ConvertedImage) -> u8 {
    if image.tilemap.is_none() {
        return 0;
    }
    // The loader expects one less than the number of tiles, but never 0.
    image.tile_count().saturating_sub(1).max(1) as u8
}

/// Lays out `base ++ image table ++ graphics`. The returned buffer is not yet
/// padded or checksummed.
pub fn build_rom(base: &[u8], images: &[ConvertedImage]) -> Result<(Vec<u8>, Vec<ImageEntry>)> {
    if images.len() > MAX_IMAGES {
        bail!(ConvertError::TooManyImages {
            count: images.len()
        });
    }
    if base.len() < BASE_ROM_SIZE {
        bail!(ConvertError::BaseRomTooSmall {
            len: base.len(),
            required: BASE_ROM_SIZE,
        });
    }

    let table_size = image_table_size(images.len());
    let mut table: Vec<u8> = IMAGE_TABLE_TAG.to_vec();
    let mut gfx: Vec<u8> = vec![];
    let mut entries = vec![];

    for image in images {
        let offset = TableOffset(table_size as u32) + gfx.len();
        let entry = ImageEntry {
            location: offset.try_into()?,
            tile_count: tile_count_byte(image),
        };
        debug!(
            "Image at {} -> bank {} ${:04X}, tile count {}",
            offset, entry.location.bank, entry.location.addr, entry.tile_count
        );
        if let Some(tilemap) = &image.tilemap {
            gfx.extend(tilemap);
        }
        gfx.extend(&image.tiles);
        table.extend(entry.to_bytes());
        entries.push(entry);
    }
    table.push(0x00);
    debug_assert_eq!(table.len(), table_size);

    let mut rom = Vec::with_capacity(BASE_ROM_SIZE + table.len() + gfx.len());
    rom.extend_from_slice(&base[..BASE_ROM_SIZE]);
    rom.extend(table);
    rom.extend(gfx);
    Ok((rom, entries))
}

/// Smallest cartridge size code whose size (32KB << code) holds `len` bytes.
pub fn rom_size_code(len: usize) -> u8 {
    let mut code = 0;
    while MIN_ROM_SIZE << code < len {
        code += 1;
    }
    code
}

pub fn header_checksum(rom: &[u8]) -> u8 {
    rom[HEADER_CHECKSUM_START..HEADER_CHECKSUM_ADDR]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(!b))
}

pub fn global_checksum(rom: &[u8]) -> u16 {
    rom.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

/// Pads to a valid cartridge size with 0xFF and fills in the size code and
/// both checksums. Returns the size code.
pub fn finalize_rom(rom: &mut Vec<u8>) -> Result<u8> {
    ensure!(
        rom.len() >= HEADER_END,
        "ROM too small to hold a cartridge header ({} bytes)",
        rom.len()
    );
    let size_code = rom_size_code(rom.len());
    let target_size = MIN_ROM_SIZE << size_code;
    rom.resize(target_size, 0xFF);

    rom[ROM_SIZE_ADDR] = size_code;
    let header = header_checksum(rom);
    rom[HEADER_CHECKSUM_ADDR] = header;
    // Summed with the global checksum bytes still holding their template
    // values.
    let global = global_checksum(rom);
    rom[GLOBAL_CHECKSUM_ADDR..HEADER_END].copy_from_slice(&global.to_be_bytes());

    info!(
        "ROM size {} KB (code {}), {} banks",
        target_size / 1024,
        size_code,
        target_size / BANK_SIZE as usize
    );
    Ok(size_code)
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ChecksumStatus {
    pub header_ok: bool,
    pub global_ok: bool,
}

/// Checks a finished ROM the way an emulator would: the global checksum
/// covers every byte except its own two.
pub fn verify_checksums(rom: &[u8]) -> Result<ChecksumStatus> {
    ensure!(rom.len() >= HEADER_END, "ROM too small to hold a cartridge header");
    let stored_global =
        u16::from_be_bytes([rom[GLOBAL_CHECKSUM_ADDR], rom[GLOBAL_CHECKSUM_ADDR + 1]]);
    let global = global_checksum(rom)
        .wrapping_sub(rom[GLOBAL_CHECKSUM_ADDR] as u16)
        .wrapping_sub(rom[GLOBAL_CHECKSUM_ADDR + 1] as u16);
    Ok(ChecksumStatus {
        header_ok: header_checksum(rom) == rom[HEADER_CHECKSUM_ADDR],
        global_ok: global == stored_global,
    })
}

/// Reads the image table back out of a built ROM.
pub fn read_image_table(rom: &[u8]) -> Result<Vec<ImageEntry>> {
    let tag_end = BASE_ROM_SIZE + IMAGE_TABLE_TAG.len();
    ensure!(rom.len() >= tag_end, "ROM too small to hold an image table");
    ensure!(
        &rom[BASE_ROM_SIZE..tag_end] == IMAGE_TABLE_TAG,
        "missing image table tag"
    );

    let mut entries = vec![];
    let mut pos = tag_end;
    loop {
        let bank = *rom.get(pos).context("image table is not terminated")?;
        if bank == 0 {
            return Ok(entries);
        }
        let record = rom
            .get(pos..pos + IMAGE_ENTRY_SIZE)
            .context("truncated image table entry")?;
        entries.push(ImageEntry {
            location: BankAddr {
                bank,
                addr: u16::from_le_bytes([record[1], record[2]]),
            },
            tile_count: record[3],
        });
        pos += IMAGE_ENTRY_SIZE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{TILES_PER_SCREEN, TILE_BYTES};

    fn base_rom() -> Vec<u8> {
        let mut base = vec![0u8; BASE_ROM_SIZE];
        for (i, b) in base[HEADER_CHECKSUM_START..0x144].iter_mut().enumerate() {
            *b = b"IMAGEROM TEST..."[i];
        }
        base
    }

    fn optimized(unique_tiles: usize) -> ConvertedImage {
        ConvertedImage {
            tiles: vec![0x55; unique_tiles * TILE_BYTES],
            tilemap: Some(vec![0; TILES_PER_SCREEN]),
            unique_tiles,
        }
    }

    fn raw() -> ConvertedImage {
        ConvertedImage {
            tiles: vec![0xAA; TILES_PER_SCREEN * TILE_BYTES],
            tilemap: None,
            unique_tiles: 300,
        }
    }

    #[test]
    fn table_layout() {
        let images = [optimized(10), raw()];
        let (rom, entries) = build_rom(&base_rom(), &images).unwrap();
        let table_size = image_table_size(2);
        assert_eq!(table_size, 12);
        assert_eq!(&rom[0x4000..0x4003], b"IMG");

        // First image starts right after the table.
        assert_eq!(&rom[0x4003..0x4007], &[1, 0x0C, 0x40, 9]);
        let second = table_size + TILES_PER_SCREEN + 10 * TILE_BYTES;
        let addr = (second % 0x4000 + 0x4000) as u16;
        assert_eq!(
            &rom[0x4007..0x400B],
            &[1, addr as u8, (addr >> 8) as u8, 0]
        );
        assert_eq!(rom[0x400B], 0);

        // Map precedes tiles.
        assert_eq!(rom[0x400C], 0);
        assert_eq!(rom[0x400C + TILES_PER_SCREEN], 0x55);
        assert_eq!(
            rom.len(),
            BASE_ROM_SIZE + table_size + images.iter().map(|i| i.payload_len()).sum::<usize>()
        );
        assert_eq!(read_image_table(&rom).unwrap(), entries);
    }

    #[test]
    fn tile_count_quirk() {
        assert_eq!(tile_count_byte(&optimized(1)), 1);
        assert_eq!(tile_count_byte(&optimized(2)), 1);
        assert_eq!(tile_count_byte(&optimized(3)), 2);
        assert_eq!(tile_count_byte(&optimized(256)), 255);
        assert_eq!(tile_count_byte(&raw()), 0);
    }

    #[test]
    fn consecutive_identical_images_cross_banks() {
        let images = vec![raw(); 5];
        let (_, entries) = build_rom(&base_rom(), &images).unwrap();
        let table_size = image_table_size(images.len());
        let payload = TILES_PER_SCREEN * TILE_BYTES;
        for (i, entry) in entries.iter().enumerate() {
            let accum = table_size + i * payload;
            assert_eq!(entry.location.bank as usize, 1 + accum / 0x4000);
            assert_eq!(entry.location.addr as usize, accum % 0x4000 + 0x4000);
        }
        assert_eq!(
            entries[1].location.bank as usize,
            1 + (table_size + payload) / 0x4000
        );
        assert_eq!(entries[3].location.bank, 2);
    }

    #[test]
    fn rejects_short_base_rom() {
        let err = build_rom(&[0; 0x100], &[raw()]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConvertError>(),
            Some(&ConvertError::BaseRomTooSmall {
                len: 0x100,
                required: BASE_ROM_SIZE
            })
        );
    }

    #[test]
    fn rejects_too_many_images() {
        let images = vec![optimized(1); MAX_IMAGES + 1];
        let err = build_rom(&base_rom(), &images).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConvertError>(),
            Some(ConvertError::TooManyImages { count: 257 })
        ));
    }

    #[test]
    fn size_code_is_minimal() {
        assert_eq!(rom_size_code(0x150), 0);
        assert_eq!(rom_size_code(0x8000), 0);
        assert_eq!(rom_size_code(0x8001), 1);
        assert_eq!(rom_size_code(0x10000), 1);
        assert_eq!(rom_size_code(0x10001), 2);
        assert_eq!(rom_size_code(1 << 20), 5);
        for len in [0x4010, 0x7FFF, 0x8000, 0x9000, 0x20000, 0x20001, 0x17_0000] {
            let code = rom_size_code(len);
            assert!(MIN_ROM_SIZE << code >= len);
            if code > 0 {
                assert!(MIN_ROM_SIZE << (code - 1) < len);
            }
        }
    }

    #[test]
    fn header_checksum_matches_boot_rom_formula() {
        let mut rom = base_rom();
        rom[0x147] = 0x01;
        rom[0x14C] = 0x7F;
        let mut x: u8 = 0;
        for &b in &rom[0x134..0x14D] {
            x = x.wrapping_sub(b).wrapping_sub(1);
        }
        assert_eq!(header_checksum(&rom), x);
        let sum: u32 = rom[0x134..0x14D].iter().map(|&b| b as u32).sum();
        assert_eq!(
            header_checksum(&rom) as u32,
            (256 - (sum + 25) % 256) % 256
        );
    }

    #[test]
    fn finalize_pads_and_checksums() {
        let (mut rom, _) = build_rom(&base_rom(), &[optimized(4)]).unwrap();
        let unpadded = rom.len();
        let code = finalize_rom(&mut rom).unwrap();
        assert_eq!(code, 0);
        assert_eq!(rom.len(), 0x8000);
        assert!(rom[unpadded..].iter().all(|&b| b == 0xFF));
        assert_eq!(rom[0x148], 0);
        assert_eq!(rom[0x14D], header_checksum(&rom));

        let mut expected = rom.clone();
        expected[0x14E] = 0;
        expected[0x14F] = 0;
        let sum = global_checksum(&expected);
        assert_eq!(&rom[0x14E..0x150], &sum.to_be_bytes());

        let status = verify_checksums(&rom).unwrap();
        assert!(status.header_ok);
        assert!(status.global_ok);
    }

    #[test]
    fn finalize_grows_to_next_power_of_two() {
        let images = vec![raw(); 6];
        let (mut rom, _) = build_rom(&base_rom(), &images).unwrap();
        assert!(rom.len() > 0x8000);
        let code = finalize_rom(&mut rom).unwrap();
        assert_eq!(code, 1);
        assert_eq!(rom.len(), 0x10000);
        assert_eq!(rom[0x148], 1);
        assert!(verify_checksums(&rom).unwrap().global_ok);
    }

    #[test]
    fn corrupted_rom_fails_verification() {
        let (mut rom, _) = build_rom(&base_rom(), &[optimized(4)]).unwrap();
        finalize_rom(&mut rom).unwrap();
        rom[0x6000] ^= 0x01;
        let status = verify_checksums(&rom).unwrap();
        assert!(status.header_ok);
        assert!(!status.global_ok);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "overflows")]
    fn table_offset_add_checks_range() {
        let _ = TableOffset(u32::MAX - 4) + 5;
    }

    #[test]
    fn bank_addr_from_offset() {
        let at = |o: u32| BankAddr::try_from(TableOffset(o)).unwrap();
        assert_eq!(at(0), BankAddr { bank: 1, addr: 0x4000 });
        assert_eq!(at(0x3FFF), BankAddr { bank: 1, addr: 0x7FFF });
        assert_eq!(at(0x4000), BankAddr { bank: 2, addr: 0x4000 });
        assert!(BankAddr::try_from(TableOffset(0x4000 * 255)).is_err());
        assert_eq!(TableOffset(0x3FFC) + 4, TableOffset(0x4000));
    }
}
