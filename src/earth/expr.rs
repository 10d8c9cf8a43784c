/// Earth Engine expression graphs
///
/// Computations are described as a tree of server-side function calls and
/// sent in one request. This module provides a small typed builder over
/// that tree (`ImageCollection`, `Image`, `Filter`, `Reducer`, `Geometry`)
/// and serializes it to the REST `Expression` JSON form:
///
/// ```text
/// { "result": "0", "values": { "0": <ValueNode> } }
/// ```
///
/// See <https://developers.google.com/earth-engine/reference/rest/v1/Expression>

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::state::data::{AreaOfInterest, DateRange};

/// A node of the expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(Value),
    Call {
        function: &'static str,
        args: BTreeMap<&'static str, Expr>,
    },
}

impl Expr {
    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Constant(value.into())
    }

    pub fn call(function: &'static str) -> Self {
        Expr::Call { function, args: BTreeMap::new() }
    }

    /// Add a named argument to a call node. No-op on other nodes.
    pub fn arg(mut self, name: &'static str, value: impl Into<Expr>) -> Self {
        if let Expr::Call { args, .. } = &mut self {
            args.insert(name, value.into());
        }
        self
    }

    /// Serialize to a REST `ValueNode`
    pub fn to_value_node(&self) -> Value {
        match self {
            Expr::Constant(value) => json!({ "constantValue": value }),
            Expr::Call { function, args } => {
                let arguments: Map<String, Value> = args
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.to_value_node()))
                    .collect();
                json!({
                    "functionInvocationValue": {
                        "functionName": function,
                        "arguments": arguments,
                    }
                })
            }
        }
    }

    /// Serialize to a complete REST `Expression`
    pub fn to_expression(&self) -> Value {
        json!({
            "result": "0",
            "values": { "0": self.to_value_node() },
        })
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::constant(value)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::constant(value)
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::constant(value)
    }
}

fn string_list(items: &[&str]) -> Expr {
    Expr::constant(items.iter().map(|s| Value::from(*s)).collect::<Vec<_>>())
}

// ========== Geometry ==========

#[derive(Debug, Clone, PartialEq)]
pub struct Geometry(Expr);

impl Geometry {
    /// Closed polygon from the AOI ring
    pub fn polygon(aoi: &AreaOfInterest) -> Self {
        let ring: Vec<Value> = aoi.ring().iter().map(|p| json!([p[0], p[1]])).collect();
        Geometry(Expr::call("GeometryConstructors.Polygon").arg("coordinates", Expr::constant(vec![Value::from(ring)])))
    }
}

impl From<Geometry> for Expr {
    fn from(value: Geometry) -> Self {
        value.0
    }
}

// ========== Filter ==========

#[derive(Debug, Clone, PartialEq)]
pub struct Filter(Expr);

impl Filter {
    /// Images whose acquisition time falls in `[start, end)`
    pub fn date(range: &DateRange) -> Self {
        let (start, end) = range.iso_bounds();
        let date_range = Expr::call("DateRange").arg("start", start.as_str()).arg("end", end.as_str());
        Filter(
            Expr::call("Filter.dateRangeContains")
                .arg("leftValue", date_range)
                .arg("rightField", "system:time_start"),
        )
    }

    /// Images whose footprint intersects the geometry
    pub fn bounds(geometry: &Geometry) -> Self {
        Filter(
            Expr::call("Filter.intersects")
                .arg("leftField", ".all")
                .arg("rightValue", geometry.0.clone()),
        )
    }

    /// Property strictly less than a value
    pub fn lt(property: &str, value: f64) -> Self {
        Filter(Expr::call("Filter.lessThan").arg("leftField", property).arg("rightValue", value))
    }
}

// ========== Reducer ==========

#[derive(Debug, Clone, PartialEq)]
pub struct Reducer(Expr);

impl Reducer {
    pub fn mean() -> Self {
        Reducer(Expr::call("Reducer.mean"))
    }

    pub fn median() -> Self {
        Reducer(Expr::call("Reducer.median"))
    }

    pub fn percentile(percentiles: &[f64]) -> Self {
        Reducer(Expr::call("Reducer.percentile").arg("percentiles", Expr::constant(percentiles.to_vec())))
    }
}

/// Parameters of a region reduction
#[derive(Debug, Clone, PartialEq)]
pub struct RegionReduction {
    /// Nominal pixel size in meters
    pub scale: f64,
    pub max_pixels: Option<f64>,
    pub best_effort: bool,
}

// ========== ImageCollection ==========

#[derive(Debug, Clone, PartialEq)]
pub struct ImageCollection(Expr);

impl ImageCollection {
    pub fn load(id: &str) -> Self {
        ImageCollection(Expr::call("ImageCollection.load").arg("id", id))
    }

    pub fn filter(self, filter: Filter) -> Self {
        ImageCollection(Expr::call("Collection.filter").arg("collection", self.0).arg("filter", filter.0))
    }

    pub fn filter_date(self, range: &DateRange) -> Self {
        self.filter(Filter::date(range))
    }

    pub fn filter_bounds(self, geometry: &Geometry) -> Self {
        self.filter(Filter::bounds(geometry))
    }

    /// Per-pixel median composite. Band names are preserved.
    pub fn median(self) -> Image {
        Image(Expr::call("reduce.median").arg("collection", self.0))
    }
}

// ========== Image ==========

#[derive(Debug, Clone, PartialEq)]
pub struct Image(Expr);

impl Image {
    pub fn constant(value: f64) -> Self {
        Image(Expr::call("Image.constant").arg("value", value))
    }

    /// `(first - second) / (first + second)`
    pub fn normalized_difference(&self, first: &str, second: &str) -> Self {
        Image(
            Expr::call("Image.normalizedDifference")
                .arg("input", self.0.clone())
                .arg("bandNames", string_list(&[first, second])),
        )
    }

    pub fn rename(self, name: &str) -> Self {
        Image(Expr::call("Image.rename").arg("input", self.0).arg("names", string_list(&[name])))
    }

    pub fn select(&self, band: &str) -> Self {
        Image(
            Expr::call("Image.select")
                .arg("input", self.0.clone())
                .arg("bandSelectors", string_list(&[band])),
        )
    }

    pub fn gt(self, value: f64) -> Self {
        Image(Expr::call("Image.gt").arg("image1", self.0).arg("image2", Image::constant(value).0))
    }

    pub fn not(self) -> Self {
        Image(Expr::call("Image.not").arg("value", self.0))
    }

    pub fn update_mask(self, mask: Image) -> Self {
        Image(Expr::call("Image.updateMask").arg("image", self.0).arg("mask", mask.0))
    }

    pub fn clip(&self, geometry: &Geometry) -> Self {
        Image(Expr::call("Image.clip").arg("input", self.0.clone()).arg("geometry", geometry.0.clone()))
    }

    /// Reduce the image over a region to a dictionary of band values
    pub fn reduce_region(&self, reducer: Reducer, geometry: &Geometry, params: &RegionReduction) -> Dictionary {
        let mut call = Expr::call("Image.reduceRegion")
            .arg("image", self.0.clone())
            .arg("reducer", reducer.0)
            .arg("geometry", geometry.0.clone())
            .arg("scale", params.scale);
        if let Some(max_pixels) = params.max_pixels {
            call = call.arg("maxPixels", max_pixels);
        }
        if params.best_effort {
            call = call.arg("bestEffort", true);
        }
        Dictionary(call)
    }

    pub fn expr(&self) -> &Expr {
        &self.0
    }
}

// ========== Dictionary ==========

#[derive(Debug, Clone, PartialEq)]
pub struct Dictionary(Expr);

impl Dictionary {
    pub fn get(self, key: &str) -> Expr {
        Expr::call("Dictionary.get").arg("dictionary", self.0).arg("key", key)
    }
}
