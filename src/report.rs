// Read-only views of an image: a textual synopsis for diagnostics and a
// structured offset map for downstream tooling (the hardware test-suite
// generator locates payloads through the map instead of re-parsing the
// binary).

use core::fmt;
use core::fmt::Write as _;

use serde::Serialize;

use crate::image::{FfffImage, ImageState};
use crate::ondisk::ElementKind;
use crate::types::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapRegion {
    pub name: String,
    pub offset: u32,
    pub size: u32,
}

/// Offsets and sizes of everything the serializer emits, in file order of
/// the header copies followed by the elements in table order.
#[derive(Debug, Clone, Serialize)]
pub struct FlashMap {
    pub regions: Vec<MapRegion>,
}

impl fmt::Display for FlashMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for region in &self.regions {
            writeln!(
                f,
                "{} {:08x} {:08x}",
                region.name, region.offset, region.size
            )?;
        }
        Ok(())
    }
}

impl FfffImage {
    /// Deterministic multi-line synopsis of the header and element table.
    /// Usable in any state, rejected tables included, to aid debugging.
    pub fn describe(&self) -> String {
        let state = match self.state() {
            ImageState::Configured => "configured",
            ImageState::Populated => "populated",
            ImageState::Finalized => "finalized",
        };
        let mut out = String::new();
        let _ = writeln!(out, "FFFF Header ({state}):");
        let _ = writeln!(
            out,
            "    Name:              {}",
            self.header().name.as_deref().unwrap_or("")
        );
        let _ = writeln!(
            out,
            "    Flash capacity:    {:08x}",
            self.geometry().capacity
        );
        let _ = writeln!(
            out,
            "    Erase block size:  {:08x}",
            self.geometry().erase_block_size
        );
        let _ = writeln!(
            out,
            "    Header size:       {:08x}",
            self.header().header_size
        );
        let _ = writeln!(
            out,
            "    Image length:      {:08x}",
            self.geometry().image_length
        );
        let _ = writeln!(
            out,
            "    Generation:        {:08x}",
            self.header().generation
        );
        let _ = writeln!(out, "    Checksum:          {:08x}", self.header_checksum());
        let _ = writeln!(out, "Elements:");
        for (index, element) in self.elements().iter().enumerate() {
            if element.kind == ElementKind::TableEnd {
                let _ = writeln!(out, "    [{index}] end of element table");
            } else {
                let _ = writeln!(
                    out,
                    "    [{index}] {} class {:06x} id {:08x} generation {:08x} \
                     location {:08x} length {:08x}",
                    element.kind,
                    element.class,
                    element.id,
                    element.generation,
                    element.location,
                    element.length
                );
            }
        }
        out
    }

    /// Offset map of both header copies and every element.  Only meaningful
    /// once the layout is frozen, so this requires a finalized image.
    pub fn map(&self) -> Result<FlashMap> {
        if self.state() != ImageState::Finalized {
            return Err(Error::Sequence {
                operation: "map",
                state: self.state(),
            });
        }
        let header_size = self.header().header_size;
        let mut regions = vec![
            MapRegion {
                name: "ffff.header.copy_a".to_string(),
                offset: 0,
                size: header_size,
            },
            MapRegion {
                name: "ffff.header.copy_b".to_string(),
                offset: self.header_block_size(),
                size: header_size,
            },
        ];
        for (index, element) in self.elements().iter().enumerate() {
            if element.kind == ElementKind::TableEnd {
                continue;
            }
            regions.push(MapRegion {
                name: format!("ffff.element[{index}].{}", element.kind),
                offset: element.location,
                size: element.length,
            });
        }
        Ok(FlashMap { regions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{FlashGeometry, HeaderConfig};

    fn built_image() -> FfffImage {
        let geometry = FlashGeometry::new(1048576, 2048, 65536).unwrap();
        let header = HeaderConfig::new(Some("bootimage"), 4096, 1).unwrap();
        let mut image = FfffImage::new(geometry, header).unwrap();
        image
            .add_element(
                ElementKind::Stage2Firmware,
                0x10,
                1,
                2,
                8192,
                Some(4096),
                vec![0; 32],
            )
            .unwrap();
        image
    }

    #[test]
    fn test_describe_before_finalize() {
        let image = built_image();
        let text = image.describe();
        assert!(text.contains("FFFF Header (populated):"));
        assert!(text.contains("Name:              bootimage"));
        assert!(text.contains("Header size:       00001000"));
        assert!(!text.contains("end of element table"));
    }

    #[test]
    fn test_describe_is_deterministic() {
        let mut image = built_image();
        image.finalize().unwrap();
        let text = image.describe();
        assert_eq!(text, image.describe());
        assert!(text.contains("FFFF Header (finalized):"));
        assert!(text.contains("location 00002000 length 00001000"));
        assert!(text.contains("end of element table"));
    }

    #[test]
    fn test_map_requires_finalized() {
        let image = built_image();
        assert!(matches!(
            image.map(),
            Err(Error::Sequence {
                operation: "map",
                ..
            })
        ));
    }

    #[test]
    fn test_map_regions() {
        let mut image = built_image();
        image.finalize().unwrap();
        let map = image.map().unwrap();
        assert_eq!(map.regions.len(), 3);
        assert_eq!(map.regions[0].name, "ffff.header.copy_a");
        assert_eq!(map.regions[0].offset, 0);
        assert_eq!(map.regions[0].size, 4096);
        assert_eq!(map.regions[1].name, "ffff.header.copy_b");
        assert_eq!(map.regions[1].offset, 4096);
        assert_eq!(map.regions[2].offset, 8192);
        assert_eq!(map.regions[2].size, 4096);
        assert!(map.regions[2].name.contains("element[0]"));
    }

    #[test]
    fn test_map_serializes() {
        let mut image = built_image();
        image.finalize().unwrap();
        let map = image.map().unwrap();
        let value = serde_json::to_value(&map).unwrap();
        assert_eq!(value["regions"][0]["name"], "ffff.header.copy_a");
        assert_eq!(value["regions"][2]["offset"], 8192);
    }

    #[test]
    fn test_map_display_format() {
        let mut image = built_image();
        image.finalize().unwrap();
        let text = image.map().unwrap().to_string();
        assert!(text.contains("ffff.header.copy_b 00001000 00001000"));
    }
}
