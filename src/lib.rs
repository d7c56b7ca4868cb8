//! Builder and validator for FFFF ("Flash Format For Firmware") boot images:
//! two redundant header copies plus a table of typed payload elements placed
//! at explicit, erase-block-aligned offsets.  Placement legality (alignment,
//! range, overlap, table capacity) is enforced here, independent of any
//! front end, so a rejected image can never be serialized.

mod fletcher32;
mod image;
mod ondisk;
mod report;
mod types;
mod writer;

pub use types::Error;
pub use types::Result;
pub use crate::image::ElementEntry;
pub use crate::image::FfffImage;
pub use crate::image::FlashGeometry;
pub use crate::image::HeaderConfig;
pub use crate::image::ImageState;
pub use crate::report::FlashMap;
pub use crate::report::MapRegion;
pub use ondisk::*;
