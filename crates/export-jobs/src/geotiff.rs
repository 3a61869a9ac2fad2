//! Single-band 8-bit GeoTIFF encoding for raster extracts.
//!
//! Writes the pixel grid as Gray8 with the GeoTIFF georeferencing tags
//! (ModelPixelScale, ModelTiepoint, GeoKeyDirectory) and the GDAL nodata
//! tag, using the pure-Rust `tiff` encoder.

use std::io::Cursor;

use tiff::encoder::colortype::Gray8;
use tiff::encoder::{Compression, TiffEncoder};
use tiff::tags::Tag;

use landcover_common::{CrsCode, LandcoverError, LandcoverResult};

use crate::extract::RasterExtract;

// GeoTIFF Tag IDs (not in standard tiff crate)
const GEOTIFF_MODELPIXELSCALE: u16 = 33550;
const GEOTIFF_MODELTIEPOINT: u16 = 33922;
const GEOTIFF_GEOKEYDIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

// GeoKey IDs
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const USER_DEFINED: u16 = 32767;

/// Encode an extract as an in-memory GeoTIFF.
pub fn encode_geotiff(extract: &RasterExtract) -> LandcoverResult<Vec<u8>> {
    if extract.width == 0 || extract.height == 0 {
        return Err(LandcoverError::Io("extract has zero dimensions".to_string()));
    }
    if extract.codes.len() != extract.width * extract.height {
        return Err(LandcoverError::Io(format!(
            "extract has {} pixels, expected {}x{}",
            extract.codes.len(),
            extract.width,
            extract.height
        )));
    }

    let mut buffer = Vec::new();
    {
        let mut encoder = TiffEncoder::new(Cursor::new(&mut buffer))
            .map_err(tiff_error)?
            .with_compression(Compression::Lzw);
        let mut image = encoder
            .new_image::<Gray8>(extract.width as u32, extract.height as u32)
            .map_err(tiff_error)?;

        let dir = image.encoder();

        // ModelPixelScale: [ScaleX, ScaleY, ScaleZ]
        let pixel_scale = [
            extract.transform.pixel_width,
            extract.transform.pixel_height,
            0.0,
        ];
        dir.write_tag(Tag::Unknown(GEOTIFF_MODELPIXELSCALE), pixel_scale.as_slice())
            .map_err(tiff_error)?;

        // Ties pixel (0, 0) to the north-west corner
        let tiepoint = [
            0.0,
            0.0,
            0.0,
            extract.transform.origin_lon,
            extract.transform.origin_lat,
            0.0,
        ];
        dir.write_tag(Tag::Unknown(GEOTIFF_MODELTIEPOINT), tiepoint.as_slice())
            .map_err(tiff_error)?;

        let geokeys = geokey_directory(extract.crs);
        dir.write_tag(Tag::Unknown(GEOTIFF_GEOKEYDIRECTORY), geokeys.as_slice())
            .map_err(tiff_error)?;

        let nodata = extract.nodata.to_string();
        dir.write_tag(Tag::Unknown(GDAL_NODATA), nodata.as_str())
            .map_err(tiff_error)?;

        image.write_data(&extract.codes).map_err(tiff_error)?;
    }

    Ok(buffer)
}

fn tiff_error(e: tiff::TiffError) -> LandcoverError {
    LandcoverError::Io(format!("GeoTIFF encoding failed: {}", e))
}

/// GeoKeyDirectory: header `[1, 1, 0, NumberOfKeys]` followed by
/// `[KeyID, TIFFTagLocation, Count, Value]` entries.
fn geokey_directory(crs: CrsCode) -> Vec<u16> {
    let code = u16::try_from(crs.numeric_code()).unwrap_or(USER_DEFINED);
    let (model_type, crs_key) = if crs.is_geographic() {
        (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE_GEO_KEY)
    } else {
        (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE_GEO_KEY)
    };

    #[rustfmt::skip]
    let keys = vec![
        1, 1, 0, 3,
        GT_MODEL_TYPE_GEO_KEY, 0, 1, model_type,
        GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA,
        crs_key, 0, 1, code,
    ];
    keys
}
