//! Fixed product definitions for the built-in sources.
//!
//! Measurement tables are part of each source's contract; only the
//! product *names* are operator-configurable. The single-scene source
//! is the exception and derives its measurements from the first file
//! it sees.

use catalog::{BandDescriptor, ProductDefinition};
use serde_json::json;

/// Sentinel-2 surface reflectance bands in their fixed role order.
pub fn imagery_product(name: &str) -> ProductDefinition {
    let bands = [
        ("blue", "BAND_2"),
        ("green", "BAND_3"),
        ("red", "BAND_4"),
        ("vegetation_red_edge1", "BAND_5"),
        ("vegetation_red_edge2", "BAND_6"),
        ("vegetation_red_edge3", "BAND_7"),
        ("nir", "BAND_8"),
        ("narrow_nir", "BAND_8A"),
        ("swir1", "BAND_11"),
        ("swir2", "BAND_12"),
    ];
    let measurements = bands
        .iter()
        .enumerate()
        .map(|(i, (band, alias))| {
            BandDescriptor::new(*band, "uint16", 0.0)
                .with_aliases(&[alias])
                .with_units("1")
                .with_band_index(i as u32 + 1)
        })
        .collect();

    ProductDefinition::new(name, measurements).with_metadata(json!({
        "platform": "sentinel-2",
        "instrument": "MSI",
        "product_type": "surface_reflectance",
        "keywords": ["anthroprotect", "sentinel-2", "wilderness", "fennoscandia"],
        "links": ["https://rs.ipb.uni-bonn.de/data/anthroprotect/"],
    }))
}

pub fn scene_classification_product(name: &str) -> ProductDefinition {
    let measurements = vec![BandDescriptor::new("scl", "uint16", 0.0)
        .with_units("1")
        .with_band_index(1)];

    ProductDefinition::new(name, measurements).with_metadata(json!({
        "platform": "sentinel-2",
        "instrument": "MSI",
        "product_type": "scene_classification",
    }))
}

pub fn land_cover_product(name: &str) -> ProductDefinition {
    let measurements = ["corine", "modis_1", "cgls", "globcover"]
        .iter()
        .enumerate()
        .map(|(i, band)| {
            BandDescriptor::new(*band, "uint16", 0.0)
                .with_units("1")
                .with_band_index(i as u32 + 1)
        })
        .collect();

    ProductDefinition::new(name, measurements).with_metadata(json!({
        "product_type": "land_cover",
        "keywords": ["anthroprotect", "land-cover"],
    }))
}

/// Role-ordered definitions for the tiled imagery source.
pub fn anthroprotect_products(names: &[String]) -> Vec<ProductDefinition> {
    vec![
        imagery_product(&names[0]),
        scene_classification_product(&names[1]),
        land_cover_product(&names[2]),
    ]
}

/// Fixed measurement table for one forecast-grid source.
pub fn forecast_product(source_id: &str, name: &str) -> Option<ProductDefinition> {
    let product = match source_id {
        "cmems_currents" => ProductDefinition::new(
            name,
            vec![
                BandDescriptor::new("utotal", "float32", -999.0)
                    .with_aliases(&["surface_sea_water_x_velocity"])
                    .with_units("m s-1")
                    .with_layer("utotal"),
                BandDescriptor::new("vtotal", "float32", -999.0)
                    .with_aliases(&["surface_sea_water_y_velocity"])
                    .with_units("m s-1")
                    .with_layer("vtotal"),
            ],
        )
        .with_metadata(json!({
            "source": "CMEMS",
            "product_type": "ocean_forecast",
        })),
        "cmems_physics" => ProductDefinition::new(
            name,
            vec![
                BandDescriptor::new("thetao", "float32", -999.0)
                    .with_aliases(&["sea_water_potential_temperature"])
                    .with_units("degrees_C")
                    .with_layer("thetao"),
                BandDescriptor::new("zos", "float32", -999.0)
                    .with_aliases(&["sea_surface_height_above_geoid"])
                    .with_units("m")
                    .with_layer("zos"),
                BandDescriptor::new("so", "float32", -999.0)
                    .with_aliases(&["sea_water_salinity"])
                    .with_units("1e-3")
                    .with_layer("so"),
            ],
        )
        .with_metadata(json!({
            "source": "CMEMS",
            "product_type": "ocean_forecast",
        })),
        "cmems_waves" => ProductDefinition::new(
            name,
            vec![
                BandDescriptor::new("VHM0", "int16", -32767.0)
                    .with_aliases(&["sea_surface_wave_significant_height"])
                    .with_units("m")
                    .with_packing(0.01, 0.0)
                    .with_layer("VHM0"),
                BandDescriptor::new("VTPK", "int16", -32767.0)
                    .with_aliases(&["sea_surface_wave_period_at_variance_spectral_density_maximum"])
                    .with_units("s")
                    .with_packing(0.01, 0.0)
                    .with_layer("VTPK"),
                BandDescriptor::new("VMDR", "int16", -32767.0)
                    .with_aliases(&["sea_surface_wave_from_direction"])
                    .with_units("degree")
                    .with_packing(0.01, 180.0)
                    .with_layer("VMDR"),
            ],
        )
        .with_metadata(json!({
            "source": "CMEMS",
            "product_type": "ocean_forecast",
        })),
        "gfs" => ProductDefinition::new(
            name,
            vec![
                BandDescriptor::new("Temperature_surface", "float32", f64::NAN)
                    .with_aliases(&["TMP"])
                    .with_units("K")
                    .with_layer("Temperature_surface"),
                BandDescriptor::new("Pressure_reduced_to_MSL_msl", "float32", f64::NAN)
                    .with_aliases(&["PRMSL"])
                    .with_units("Pa")
                    .with_layer("Pressure_reduced_to_MSL_msl"),
                BandDescriptor::new("Wind_speed_gust_surface", "float32", f64::NAN)
                    .with_aliases(&["GUST"])
                    .with_units("m/s")
                    .with_layer("Wind_speed_gust_surface"),
                BandDescriptor::new("u_component_of_wind_height_above_ground", "float32", f64::NAN)
                    .with_aliases(&["UGRD"])
                    .with_units("m/s")
                    .with_layer("u-component_of_wind_height_above_ground"),
                BandDescriptor::new("v_component_of_wind_height_above_ground", "float32", f64::NAN)
                    .with_aliases(&["VGRD"])
                    .with_units("m/s")
                    .with_layer("v-component_of_wind_height_above_ground"),
            ],
        )
        .with_metadata(json!({
            "source": "NOAA NCEP",
            "product_type": "weather_forecast",
        })),
        _ => return None,
    };
    Some(product)
}

pub fn relief_product(name: &str) -> ProductDefinition {
    let measurements = vec![BandDescriptor::new("z", "float32", f64::NAN)
        .with_aliases(&[
            "global_relief",
            "depth",
            "water_depth",
            "height",
            "elevation",
            "topography",
            "bathymetry",
        ])
        .with_units("m")
        .with_layer("z")];

    ProductDefinition::new(name, measurements).with_metadata(json!({
        "source": "ETOPO 2022",
        "product_type": "relief",
    }))
}

/// Definition derived from a scene file's header: anonymous band names,
/// one per sample.
pub fn scene_product(name: &str, band_types: &[String], nodata: f64) -> ProductDefinition {
    let measurements = band_types
        .iter()
        .enumerate()
        .map(|(i, dtype)| {
            BandDescriptor::new(format!("band_{}", i + 1), dtype.clone(), nodata)
                .with_band_index(i as u32 + 1)
        })
        .collect();

    ProductDefinition::new(name, measurements).with_metadata(json!({
        "product_type": "scene",
    }))
}
