//! streamer — capture the desktop, convert it to I420 and encode it to an
//! H.264 elementary stream; plus the reverse path from a stream to PGM stills.

pub mod convert;
pub mod decode;
pub mod encode;
pub mod raster;

pub use convert::{BitmapView, FrameConverter};
pub use decode::{decode_file, decode_to_images, run_decode, OutputPattern};
pub use encode::{encode_file, encode_to_file, run_encode, EncodeSummary, OUTPUT_FILE};
