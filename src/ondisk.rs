// This file contains the FFFF on-flash format.  A boot ROM reads these
// structures straight off the flash part, so change them only in coordination
// with the bridge firmware team.

use byteorder::LittleEndian;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;
use strum_macros::Display;
use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned, U32};

type LU32 = U32<LittleEndian>;

/// Given *BUF (a collection of multiple items), retrieves the first of the
/// items and returns it.  If the item cannot be parsed, returns None.
pub fn header_from_collection<T: Sized + FromBytes>(buf: &[u8]) -> Option<&T> {
    match LayoutVerified::<_, T>::new_from_prefix(buf) {
        Some((item, _xbuf)) => Some(item.into_ref()),
        None => None,
    }
}

/// Marks the start of each header copy and, mirrored, the last 16 bytes of
/// the header block.
pub const FFFF_SENTINEL: [u8; 16] = *b"FlashFormatForFW";

pub const FFFF_NAME_LENGTH: usize = 48;

pub const HEADER_SIZE_MIN: u32 = 512;
pub const HEADER_SIZE_MAX: u32 = 32768;
pub const HEADER_SIZE_DEFAULT: u32 = 4096;

/// Element table slots per header; the last slot is reserved for the
/// end-of-table entry.
pub const MAX_ELEMENTS: usize = 19;

/// Plausible erase-block granularities: powers of two in this range.
pub const ERASE_BLOCK_SIZE_MIN: u32 = 512;
pub const ERASE_BLOCK_SIZE_MAX: u32 = 1 << 20;

#[repr(u8)]
#[derive(Debug, PartialEq, Eq, FromPrimitive, Clone, Copy, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ElementKind {
    Stage2Firmware = 0x01,
    Stage3Firmware = 0x02,
    ImsCertificate = 0x03,
    CmsCertificate = 0x04,
    GenericData = 0x05,
    TableEnd = 0xfe,
}

/// One 20-byte slot of the on-flash element table.  Unused trailing slots
/// stay all-zero.
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct FfffElementRaw {
    pub type_class: LU32, // kind in bits 7:0, element class in bits 31:8
    pub id: LU32,
    pub length: LU32,
    pub location: LU32,
    pub generation: LU32,
}

impl Default for FfffElementRaw {
    fn default() -> Self {
        Self {
            type_class: 0.into(),
            id: 0.into(),
            length: 0.into(),
            location: 0.into(),
            generation: 0.into(),
        }
    }
}

impl FfffElementRaw {
    /// CLASS is a 24-bit field; higher bits are masked off.
    pub fn new(
        kind: ElementKind,
        class: u32,
        id: u32,
        length: u32,
        location: u32,
        generation: u32,
    ) -> Self {
        Self {
            type_class: (((class & 0x00ff_ffff) << 8) | kind as u32).into(),
            id: id.into(),
            length: length.into(),
            location: location.into(),
            generation: generation.into(),
        }
    }

    /// None if the slot holds an unknown type byte (or is an unused all-zero
    /// slot; 0x00 is not a valid kind).
    pub fn kind(&self) -> Option<ElementKind> {
        ElementKind::from_u8((self.type_class.get() & 0xff) as u8)
    }

    pub fn class(&self) -> u32 {
        self.type_class.get() >> 8
    }
}

/// The fixed leading part of one header block.  The block is `header_size`
/// bytes overall: this struct, zero padding, then the tail sentinel in the
/// last 16 bytes.
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy)]
#[repr(C, packed)]
pub struct FfffHeaderRaw {
    pub sentinel: [u8; 16],
    pub flash_image_name: [u8; FFFF_NAME_LENGTH],
    pub flash_capacity: LU32,
    pub erase_block_size: LU32,
    pub header_size: LU32,
    pub flash_image_length: LU32,
    pub header_generation: LU32,
    pub header_checksum: LU32, // Fletcher-32; read as zero while checksumming
    _reserved: [LU32; 4],
    pub elements: [FfffElementRaw; MAX_ELEMENTS],
}

impl Default for FfffHeaderRaw {
    fn default() -> Self {
        Self {
            sentinel: FFFF_SENTINEL,
            flash_image_name: [0; FFFF_NAME_LENGTH],
            flash_capacity: 0.into(),
            erase_block_size: 0.into(),
            header_size: 0.into(),
            flash_image_length: 0.into(),
            header_generation: 0.into(),
            header_checksum: 0.into(),
            _reserved: [0xffff_ffff.into(); 4],
            elements: [FfffElementRaw::default(); MAX_ELEMENTS],
        }
    }
}

impl FfffHeaderRaw {
    pub fn name(&self) -> &[u8] {
        let end = self
            .flash_image_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(FFFF_NAME_LENGTH);
        &self.flash_image_name[..end]
    }

    pub fn set_name(&mut self, name: &[u8]) {
        assert!(name.len() <= FFFF_NAME_LENGTH);
        self.flash_image_name = [0; FFFF_NAME_LENGTH];
        self.flash_image_name[..name.len()].copy_from_slice(name);
    }
}
