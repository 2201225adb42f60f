use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Reference dataset the extraction pipeline reads events from
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
pub enum ReferenceDataset {
    /// Burnt-area records with `DH_Inicio` / `DH_Fim` dates, one shapefile per year
    Icnf,
    /// Vegetation-loss records with `data_0` / `data_1` dates, a single shapefile
    Nvg,
}

impl ReferenceDataset {
    /// Name used in output file names
    pub fn label(&self) -> &'static str {
        match self {
            ReferenceDataset::Icnf => "ICNF",
            ReferenceDataset::Nvg => "NVG",
        }
    }

    /// Whether the dataset is split in one shapefile per year
    pub fn is_yearly(&self) -> bool {
        matches!(self, ReferenceDataset::Icnf)
    }
}

impl std::fmt::Display for ReferenceDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Cloud masking applied to downloaded scenes
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
pub enum CloudFilter {
    /// s2cloudless probability + projected shadow mask
    S2Cloudless,
    NoFilter,
}

impl std::fmt::Display for CloudFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloudFilter::S2Cloudless => write!(f, "s2cloudless"),
            CloudFilter::NoFilter => write!(f, "NoFilter"),
        }
    }
}

/// Resampling used when warping rasters to another CRS
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default, Serialize, Deserialize,
)]
pub enum Resampling {
    #[default]
    Nearest,
    Bilinear,
    Cubic,
}

impl Resampling {
    /// Name understood by `gdalwarp -r`
    pub fn gdal_name(&self) -> &'static str {
        match self {
            Resampling::Nearest => "near",
            Resampling::Bilinear => "bilinear",
            Resampling::Cubic => "cubic",
        }
    }
}
