// Renders a finalized image into an output file.  Layout: header copy A at
// offset 0, copy B at one header block, every element's payload at its
// declared location, all other bytes zero.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use crate::image::{FfffImage, ImageState};
use crate::ondisk::ElementKind;
use crate::types::{Error, Result};

impl FfffImage {
    /// Writes the image to PATH.  On failure the partially written file is
    /// not rolled back and must be treated as invalid.
    pub fn write(&self, path: &Path) -> Result<()> {
        if self.state() != ImageState::Finalized {
            return Err(Error::Sequence {
                operation: "write",
                state: self.state(),
            });
        }
        let fail = |source| Error::Write {
            path: path.display().to_string(),
            source,
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(fail)?;
        // Sizing the file up front makes every unwritten range read back as
        // zeros, which covers the inter-element gaps and the tail.
        file.set_len(self.geometry().image_length.into()).map_err(fail)?;

        let header = self.header_block();
        file.write_all(&header).map_err(fail)?;
        file.seek(SeekFrom::Start(self.header_block_size().into()))
            .map_err(fail)?;
        file.write_all(&header).map_err(fail)?;

        for element in self.elements() {
            if element.kind == ElementKind::TableEnd {
                continue;
            }
            file.seek(SeekFrom::Start(element.location.into()))
                .map_err(fail)?;
            file.write_all(element.content()).map_err(fail)?;
        }
        file.flush().map_err(fail)?;
        log::info!(
            "wrote {} byte image to {}",
            self.geometry().image_length,
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{FlashGeometry, HeaderConfig};
    use crate::ondisk::{header_from_collection, FfffHeaderRaw, FFFF_SENTINEL};

    fn built_image() -> FfffImage {
        let geometry = FlashGeometry::new(1048576, 2048, 65536).unwrap();
        let header = HeaderConfig::new(Some("bootimage"), 4096, 3).unwrap();
        let mut image = FfffImage::new(geometry, header).unwrap();
        image
            .add_element(
                ElementKind::Stage2Firmware,
                0x10,
                1,
                2,
                8192,
                Some(4096),
                b"second stage".to_vec(),
            )
            .unwrap();
        image
            .add_element(
                ElementKind::GenericData,
                0,
                2,
                1,
                16384,
                None,
                vec![0x5a; 100],
            )
            .unwrap();
        image
    }

    #[test]
    fn test_write_requires_finalized() {
        let image = built_image();
        let out = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            image.write(out.path()),
            Err(Error::Sequence {
                operation: "write",
                ..
            })
        ));
    }

    #[test]
    fn test_write_fails_on_bad_path() {
        let mut image = built_image();
        image.finalize().unwrap();
        let result = image.write(Path::new("/nonexistent-dir/image.bin"));
        assert!(matches!(result, Err(Error::Write { .. })));
    }

    #[test]
    fn test_round_trip() {
        let mut image = built_image();
        image.finalize().unwrap();

        let out = tempfile::NamedTempFile::new().unwrap();
        image.write(out.path()).unwrap();
        let data = std::fs::read(out.path()).unwrap();
        assert_eq!(data.len(), 65536);

        let header_block_size = image.header_block_size() as usize;
        let header_size = image.header().header_size as usize;
        for copy_start in [0, header_block_size] {
            let copy = &data[copy_start..];
            let header: &FfffHeaderRaw = header_from_collection(copy).unwrap();
            assert_eq!(header.sentinel, FFFF_SENTINEL);
            assert_eq!(header.name(), b"bootimage");
            assert_eq!(header.flash_capacity.get(), 1048576);
            assert_eq!(header.erase_block_size.get(), 2048);
            assert_eq!(header.header_size.get(), 4096);
            assert_eq!(header.flash_image_length.get(), 65536);
            assert_eq!(header.header_generation.get(), 3);
            assert_eq!(header.header_checksum.get(), image.header_checksum());
            assert_eq!(
                &copy[header_size - 16..header_size],
                &FFFF_SENTINEL
            );

            let expected = image.elements();
            for (slot, entry) in header.elements.iter().zip(expected.iter()) {
                assert_eq!(slot.kind(), Some(entry.kind));
                assert_eq!(slot.class(), entry.class);
                assert_eq!(slot.id.get(), entry.id);
                assert_eq!(slot.length.get(), entry.length);
                assert_eq!(slot.location.get(), entry.location);
                assert_eq!(slot.generation.get(), entry.generation);
            }
            // Slots past the end-of-table entry stay erased.
            for slot in &header.elements[expected.len()..] {
                assert_eq!(slot.kind(), None);
                assert_eq!(slot.location.get(), 0);
            }
        }
    }

    #[test]
    fn test_payloads_and_gaps() {
        let mut image = built_image();
        image.finalize().unwrap();

        let out = tempfile::NamedTempFile::new().unwrap();
        image.write(out.path()).unwrap();
        let data = std::fs::read(out.path()).unwrap();

        assert_eq!(&data[8192..8192 + 12], b"second stage");
        // The reserved window past the payload is zero filled.
        assert!(data[8192 + 12..8192 + 4096].iter().all(|&b| b == 0));
        // The gap between the reserved window and the next element too.
        assert!(data[8192 + 4096..16384].iter().all(|&b| b == 0));
        assert!(data[16384..16484].iter().all(|&b| b == 0x5a));
        // And everything after the last element.
        assert!(data[16484..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_written_checksum_validates() {
        let mut image = built_image();
        image.finalize().unwrap();

        let out = tempfile::NamedTempFile::new().unwrap();
        image.write(out.path()).unwrap();
        let data = std::fs::read(out.path()).unwrap();

        let header_size = image.header().header_size as usize;
        let mut block = data[..header_size].to_vec();
        block[0x54..0x58].copy_from_slice(&[0; 4]);
        assert_eq!(
            crate::fletcher32::checksum(&block),
            image.header_checksum()
        );
    }
}
