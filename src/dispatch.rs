use crate::assembler::BlockAssembler;
use crate::block::ImageBlockDescriptor;
use crate::config::ReaderConfig;
use crate::enums::{ComponentType, Components, PixelType};
use crate::error::Result;
use crate::frame_source::FrameSource;
use crate::tag_cache::TagCache;
use crate::volume::Volume;

/// Assemble `block` with the pixel type its format maps to.
///
/// # Errors
///
/// [`crate::Error::UnsupportedPixelType`] if the format has no matching
/// type, otherwise whatever [`BlockAssembler::assemble`] reports.
pub fn assemble_volume(
    block: &ImageBlockDescriptor,
    cache: &TagCache,
    source: &dyn FrameSource,
    config: &ReaderConfig,
) -> Result<Volume> {
    let pixel_type = block.pixel_format.pixel_type()?;
    assemble_as(pixel_type, &BlockAssembler::new(block, cache, source, config))
}

fn assemble_as(pixel_type: PixelType, assembler: &BlockAssembler<'_>) -> Result<Volume> {
    use ComponentType as T;
    use Components::{Rgb, Scalar};

    match (pixel_type.component, pixel_type.components) {
        (T::U8, Scalar) => assembler.assemble::<u8, 1>(),
        (T::U8, Rgb) => assembler.assemble::<u8, 3>(),
        (T::I8, Scalar) => assembler.assemble::<i8, 1>(),
        (T::I8, Rgb) => assembler.assemble::<i8, 3>(),
        (T::U16, Scalar) => assembler.assemble::<u16, 1>(),
        (T::U16, Rgb) => assembler.assemble::<u16, 3>(),
        (T::I16, Scalar) => assembler.assemble::<i16, 1>(),
        (T::I16, Rgb) => assembler.assemble::<i16, 3>(),
        (T::U32, Scalar) => assembler.assemble::<u32, 1>(),
        (T::U32, Rgb) => assembler.assemble::<u32, 3>(),
        (T::I32, Scalar) => assembler.assemble::<i32, 1>(),
        (T::I32, Rgb) => assembler.assemble::<i32, 3>(),
        (T::F32, Scalar) => assembler.assemble::<f32, 1>(),
        (T::F32, Rgb) => assembler.assemble::<f32, 3>(),
        (T::F64, Scalar) => assembler.assemble::<f64, 1>(),
        (T::F64, Rgb) => assembler.assemble::<f64, 3>(),
    }
}
