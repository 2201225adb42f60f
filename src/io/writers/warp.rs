use std::path::Path;
use std::process::Command;

use tracing::info;

use crate::io::gdal::GdalError;
use crate::types::Resampling;

/// Reproject a raster with `gdalwarp`, keeping its nodata value and band layout
pub fn warp_to_crs(
    input: &Path,
    output: &Path,
    target_crs: &str,
    resampling: Resampling,
) -> Result<(), GdalError> {
    info!("Warping {:?} to target CRS: {}", input, target_crs);
    let args = warp_args(input, output, target_crs, resampling);
    let status = Command::new("gdalwarp")
        .args(args.iter().map(|s| s.as_str()))
        .status()
        .map_err(|e| GdalError::Warp(format!("gdalwarp exec error: {}", e)))?;
    if !status.success() {
        let _ = std::fs::remove_file(output);
        return Err(GdalError::Warp(format!("exit status {}", status)));
    }
    Ok(())
}

fn warp_args(input: &Path, output: &Path, target_crs: &str, resampling: Resampling) -> Vec<String> {
    vec![
        "-of".into(),
        "GTiff".into(),
        "-overwrite".into(),
        "-r".into(),
        resampling.gdal_name().into(),
        "-t_srs".into(),
        target_crs.to_string(),
        input.to_string_lossy().into_owned(),
        output.to_string_lossy().into_owned(),
    ]
}
