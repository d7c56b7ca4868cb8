use std::path::Path;

use crate::fletcher32;
use crate::ondisk::{
    ElementKind, FfffElementRaw, FfffHeaderRaw, ERASE_BLOCK_SIZE_MAX, ERASE_BLOCK_SIZE_MIN,
    FFFF_NAME_LENGTH, FFFF_SENTINEL, HEADER_SIZE_MAX, HEADER_SIZE_MIN, MAX_ELEMENTS,
};
use crate::types::{Error, Result};
use zerocopy::AsBytes;

/// Description of the target flash medium.  All sizes in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashGeometry {
    pub capacity: u32,
    pub erase_block_size: u32,
    pub image_length: u32,
}

impl FlashGeometry {
    pub fn new(capacity: u32, erase_block_size: u32, image_length: u32) -> Result<Self> {
        if !erase_block_size.is_power_of_two()
            || erase_block_size < ERASE_BLOCK_SIZE_MIN
            || erase_block_size > ERASE_BLOCK_SIZE_MAX
        {
            return Err(Error::Config {
                field: "erase_block_size",
                value: erase_block_size.into(),
            });
        }
        if capacity < erase_block_size {
            return Err(Error::Config {
                field: "flash_capacity",
                value: capacity.into(),
            });
        }
        if image_length == 0
            || image_length % erase_block_size != 0
            || image_length > capacity
        {
            return Err(Error::Config {
                field: "flash_image_length",
                value: image_length.into(),
            });
        }
        Ok(Self {
            capacity,
            erase_block_size,
            image_length,
        })
    }

    /// HEADER_SIZE rounded up to a multiple of the erase-block size; each of
    /// the two header copies occupies one such block.
    pub fn header_block_size(&self, header_size: u32) -> u32 {
        header_size.div_ceil(self.erase_block_size) * self.erase_block_size
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderConfig {
    pub name: Option<String>,
    pub header_size: u32,
    pub generation: u32,
}

impl HeaderConfig {
    pub fn new(name: Option<&str>, header_size: u32, generation: u32) -> Result<Self> {
        if !(HEADER_SIZE_MIN..=HEADER_SIZE_MAX).contains(&header_size) || header_size % 4 != 0 {
            return Err(Error::Config {
                field: "header_size",
                value: header_size.into(),
            });
        }
        if generation == 0 {
            return Err(Error::Config {
                field: "header_generation",
                value: 0,
            });
        }
        if let Some(name) = name {
            if name.len() > FFFF_NAME_LENGTH {
                return Err(Error::Config {
                    field: "flash_image_name",
                    value: name.len() as u64,
                });
            }
        }
        Ok(Self {
            name: name.map(str::to_owned),
            header_size,
            generation,
        })
    }
}

/// One accepted element: placement metadata plus the payload bytes, held
/// until serialization.
#[derive(Debug, Clone)]
pub struct ElementEntry {
    pub kind: ElementKind,
    pub class: u32,
    pub id: u32,
    pub generation: u32,
    pub location: u32,
    pub length: u32,
    content: Vec<u8>,
}

impl ElementEntry {
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    fn table_end() -> Self {
        Self {
            kind: ElementKind::TableEnd,
            class: 0,
            id: 0,
            generation: 0,
            location: 0,
            length: 0,
            content: Vec::new(),
        }
    }

    fn to_raw(&self) -> FfffElementRaw {
        FfffElementRaw::new(
            self.kind,
            self.class,
            self.id,
            self.length,
            self.location,
            self.generation,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    Configured,
    Populated,
    Finalized,
}

/// An FFFF image under construction.  Build order is fixed: configure,
/// append elements, finalize, then write or inspect.
#[derive(Debug, Clone)]
pub struct FfffImage {
    geometry: FlashGeometry,
    header: HeaderConfig,
    elements: Vec<ElementEntry>,
    state: ImageState,
    checksum: u32,
}

impl FfffImage {
    pub fn new(geometry: FlashGeometry, header: HeaderConfig) -> Result<Self> {
        let header_block_size = geometry.header_block_size(header.header_size);
        // Both header copies must fit in front of any element.
        if u64::from(header_block_size) * 2 > u64::from(geometry.image_length) {
            return Err(Error::Config {
                field: "flash_image_length",
                value: geometry.image_length.into(),
            });
        }
        Ok(Self {
            geometry,
            header,
            elements: Vec::new(),
            state: ImageState::Configured,
            checksum: 0,
        })
    }

    pub fn geometry(&self) -> &FlashGeometry {
        &self.geometry
    }

    pub fn header(&self) -> &HeaderConfig {
        &self.header
    }

    /// All accepted entries in insertion order; after finalization the last
    /// entry is the end-of-table sentinel.
    pub fn elements(&self) -> &[ElementEntry] {
        &self.elements
    }

    pub fn state(&self) -> ImageState {
        self.state
    }

    /// Zero until the image is finalized.
    pub fn header_checksum(&self) -> u32 {
        self.checksum
    }

    pub fn header_block_size(&self) -> u32 {
        self.geometry.header_block_size(self.header.header_size)
    }

    /// Validates and appends one element.  Either the entry is accepted in
    /// full or the table is left untouched.  LENGTH of None is derived from
    /// the payload's size; an explicit LENGTH may reserve room beyond it.
    #[allow(clippy::too_many_arguments)]
    pub fn add_element(
        &mut self,
        kind: ElementKind,
        class: u32,
        id: u32,
        generation: u32,
        location: u32,
        length: Option<u32>,
        content: Vec<u8>,
    ) -> Result<&ElementEntry> {
        match self.state {
            ImageState::Configured | ImageState::Populated => {}
            ImageState::Finalized => {
                return Err(Error::Sequence {
                    operation: "add_element",
                    state: self.state,
                })
            }
        }
        if kind == ElementKind::TableEnd {
            return Err(Error::Element {
                field: "element_type",
                value: kind as u64,
            });
        }
        if class > 0x00ff_ffff {
            return Err(Error::Element {
                field: "element_class",
                value: class.into(),
            });
        }
        // One slot always stays reserved for the end-of-table entry.
        if self.elements.len() >= MAX_ELEMENTS - 1 {
            return Err(Error::Element {
                field: "element_count",
                value: self.elements.len() as u64,
            });
        }
        let length = match length {
            Some(length) => {
                if (length as usize) < content.len() {
                    return Err(Error::Element {
                        field: "element_length",
                        value: length.into(),
                    });
                }
                length
            }
            None => u32::try_from(content.len()).map_err(|_| Error::Element {
                field: "element_length",
                value: content.len() as u64,
            })?,
        };
        let header_block_size = self.header_block_size();
        if location % self.geometry.erase_block_size != 0
            || location < 2 * header_block_size
            || location >= self.geometry.image_length
        {
            return Err(Error::Element {
                field: "element_location",
                value: location.into(),
            });
        }
        let end = u64::from(location) + u64::from(length);
        if end > u64::from(self.geometry.image_length) {
            return Err(Error::Element {
                field: "element_length",
                value: length.into(),
            });
        }
        for other in &self.elements {
            let other_end = u64::from(other.location) + u64::from(other.length);
            if u64::from(location) < other_end && u64::from(other.location) < end {
                return Err(Error::Element {
                    field: "element_location",
                    value: location.into(),
                });
            }
        }
        log::debug!(
            "accepted {} element id {:#x} at {:#x}+{:#x}",
            kind,
            id,
            location,
            length
        );
        self.elements.push(ElementEntry {
            kind,
            class,
            id,
            generation,
            location,
            length,
            content,
        });
        self.state = ImageState::Populated;
        Ok(&self.elements[self.elements.len() - 1])
    }

    /// Convenience for callers that hold a path rather than bytes.
    #[allow(clippy::too_many_arguments)]
    pub fn add_element_from_file(
        &mut self,
        kind: ElementKind,
        class: u32,
        id: u32,
        generation: u32,
        location: u32,
        length: Option<u32>,
        path: &Path,
    ) -> Result<&ElementEntry> {
        let content = std::fs::read(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.add_element(kind, class, id, generation, location, length, content)
    }

    /// Appends the end-of-table entry and computes the header checksum.
    /// Legal from Populated; on an already-finalized image this is a no-op,
    /// so the header bytes stay bit-identical however often it is called.
    pub fn finalize(&mut self) -> Result<()> {
        match self.state {
            ImageState::Populated => {}
            ImageState::Finalized => return Ok(()),
            ImageState::Configured => {
                return Err(Error::Sequence {
                    operation: "finalize",
                    state: self.state,
                })
            }
        }
        self.elements.push(ElementEntry::table_end());
        // The checksum field is still zero here, which is exactly how the
        // covered bytes are defined.
        self.checksum = fletcher32::checksum(&self.header_block());
        self.state = ImageState::Finalized;
        log::debug!(
            "finalized image, {} elements, header checksum {:#010x}",
            self.elements.len() - 1,
            self.checksum
        );
        Ok(())
    }

    /// Renders one full header block: the fixed structure, zero padding, and
    /// the tail sentinel in the last 16 bytes.
    pub fn header_block(&self) -> Vec<u8> {
        let mut raw = FfffHeaderRaw::default();
        if let Some(name) = &self.header.name {
            raw.set_name(name.as_bytes());
        }
        raw.flash_capacity = self.geometry.capacity.into();
        raw.erase_block_size = self.geometry.erase_block_size.into();
        raw.header_size = self.header.header_size.into();
        raw.flash_image_length = self.geometry.image_length.into();
        raw.header_generation = self.header.generation.into();
        raw.header_checksum = self.checksum.into();
        for (slot, entry) in raw.elements.iter_mut().zip(self.elements.iter()) {
            *slot = entry.to_raw();
        }

        let header_size = self.header.header_size as usize;
        let mut block = vec![0u8; header_size];
        block[..raw.as_bytes().len()].copy_from_slice(raw.as_bytes());
        block[header_size - FFFF_SENTINEL.len()..].copy_from_slice(&FFFF_SENTINEL);
        block
    }
}
