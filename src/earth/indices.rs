/// Index calculator
///
/// For one coordinate and month this computes:
/// - NDVI mean over the AOI, with water (NDWI > 0) masked out
/// - UHII as the 90th percentile minus the median of the SWIR band
/// - tile layers for NDVI, tropospheric NO2 and the SWIR thermal proxy
///
/// Backend failures are returned as-is, nothing is retried or defaulted.

use std::future::Future;

use super::client::{EarthEngineClient, EarthEngineError};
use super::expr::{Filter, Geometry, Image, ImageCollection, Reducer, RegionReduction};
use crate::map::layers::{NDVI_STYLE, NO2_STYLE, THERMAL_STYLE};
use crate::state::data::{AreaOfInterest, Coordinate, IndexResult, LayerTiles, TimePeriod};

const SENTINEL2: &str = "COPERNICUS/S2_HARMONIZED";
const SENTINEL5P_NO2: &str = "COPERNICUS/S5P/OFFL/L3_NO2";
const NO2_BAND: &str = "tropospheric_NO2_column_number_density";
const CLOUD_PROPERTY: &str = "CLOUDY_PIXEL_PERCENTAGE";
const MAX_CLOUD_PERCENT: f64 = 20.0;

const NIR: &str = "B8";
const RED: &str = "B4";
const GREEN: &str = "B3";
const SWIR: &str = "B11";

/// Anything that can compute the indices for a place and month
pub trait IndexSource: Send + Sync {
    fn compute(
        &self,
        coordinate: Coordinate,
        period: TimePeriod,
    ) -> impl Future<Output = Result<IndexResult, EarthEngineError>> + Send;
}

/// The expressions behind one search
#[derive(Debug, Clone)]
pub struct IndexQueries {
    pub aoi: Geometry,
    /// Water-masked NDVI
    pub ndvi: Image,
    pub no2: Image,
    /// SWIR band used as a surface temperature proxy
    pub swir: Image,
}

impl IndexQueries {
    pub fn build(coordinate: Coordinate, period: TimePeriod) -> Self {
        let aoi_area = AreaOfInterest::around(coordinate);
        let aoi = Geometry::polygon(&aoi_area);
        let range = period.date_range();

        let optical = ImageCollection::load(SENTINEL2)
            .filter_date(&range)
            .filter_bounds(&aoi)
            .filter(Filter::lt(CLOUD_PROPERTY, MAX_CLOUD_PERCENT))
            .median();

        let ndwi = optical.normalized_difference(GREEN, NIR).rename("NDWI");
        let water = ndwi.gt(0.0);
        let ndvi = optical
            .normalized_difference(NIR, RED)
            .rename("NDVI")
            .update_mask(water.not());

        let no2 = ImageCollection::load(SENTINEL5P_NO2)
            .filter_date(&range)
            .filter_bounds(&aoi)
            .median()
            .select(NO2_BAND);

        let swir = optical.select(SWIR);

        Self { aoi, ndvi, no2, swir }
    }
}

pub struct EarthEngineIndices {
    client: EarthEngineClient,
}

impl EarthEngineIndices {
    pub fn new(client: EarthEngineClient) -> Self {
        Self { client }
    }

    async fn ndvi_mean(&self, queries: &IndexQueries) -> Result<f64, EarthEngineError> {
        let stats = queries.ndvi.reduce_region(
            Reducer::mean(),
            &queries.aoi,
            &RegionReduction { scale: 10.0, max_pixels: Some(1e9), best_effort: false },
        );
        self.client.compute_number("NDVI", &stats.get("NDVI")).await
    }

    async fn uhii(&self, queries: &IndexQueries) -> Result<f64, EarthEngineError> {
        let params = RegionReduction { scale: 30.0, max_pixels: None, best_effort: true };
        let median = queries.swir.reduce_region(Reducer::median(), &queries.aoi, &params);
        let p90 = queries.swir.reduce_region(Reducer::percentile(&[90.0]), &queries.aoi, &params);

        let median = self.client.compute_number("SWIR median", &median.get(SWIR)).await?;
        let p90 = self.client.compute_number("SWIR p90", &p90.get(SWIR)).await?;
        Ok(p90 - median)
    }

    async fn tiles(&self, queries: &IndexQueries) -> Result<LayerTiles, EarthEngineError> {
        let ndvi = queries.ndvi.clip(&queries.aoi);
        let no2 = queries.no2.clip(&queries.aoi);
        let thermal = queries.swir.clip(&queries.aoi);
        Ok(LayerTiles {
            ndvi: self.client.create_map(&ndvi, &NDVI_STYLE).await?,
            no2: self.client.create_map(&no2, &NO2_STYLE).await?,
            thermal: self.client.create_map(&thermal, &THERMAL_STYLE).await?,
        })
    }
}

impl IndexSource for EarthEngineIndices {
    async fn compute(&self, coordinate: Coordinate, period: TimePeriod) -> Result<IndexResult, EarthEngineError> {
        let queries = IndexQueries::build(coordinate, period);

        let ndvi_mean = self.ndvi_mean(&queries).await?;
        let uhii = self.uhii(&queries).await?;
        log::info!("📊 NDVI mean {ndvi_mean:.4}, UHII {uhii:.2}");

        let tiles = self.tiles(&queries).await?;
        Ok(IndexResult { ndvi_mean, uhii, tiles })
    }
}
