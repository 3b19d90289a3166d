//! End-to-end runs over a synthetic data directory (ITM coordinates around
//! Dublin). Every input is pre-cached, so nothing is fetched.

use std::path::Path;

use dublin_boundaries::{
    read_geojson, read_shapefile, write_geojson, Attributes, Epsg, Feature, InputLock, LinkSmallAreas, LinkSource, Pipeline, Vintage,
};
use geo::{polygon, MultiPolygon};
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, PolygonRing};

const X0: f64 = 700_000.0;
const Y0: f64 = 730_000.0;

const SMALL_AREAS_DIR: &str = "Small_Areas_Ungeneralised_-_OSi_National_Statistical_Boundaries_-_2015-shp";
const ROUTING_KEYS_DIR: &str = "ireland_postcode_boundaries_autoaddress";
const ITM_PRJ: &str = r#"PROJCS["IRENET95_Irish_Transverse_Mercator",GEOGCS["GCS_IRENET95",DATUM["D_IRENET95",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",600000.0],PARAMETER["False_Northing",750000.0],PARAMETER["Central_Meridian",-8.0],PARAMETER["Scale_Factor",0.99982],PARAMETER["Latitude_Of_Origin",53.5],UNIT["Meter",1.0]]"#;

/// Rectangle offset into ITM space.
fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    MultiPolygon(vec![polygon![
        (x: X0 + x0, y: Y0 + y0), (x: X0 + x1, y: Y0 + y0), (x: X0 + x1, y: Y0 + y1), (x: X0 + x0, y: Y0 + y1),
    ]])
}

fn attrs(pairs: &[(&str, &str)]) -> Attributes {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn feature(pairs: &[(&str, &str)], geometry: MultiPolygon<f64>) -> Feature {
    Feature { id: None, properties: attrs(pairs), geometry }
}

/// Write a polygon shapefile with character fields, an ITM `.prj`, and a stand-in archive next to it.
fn write_shapefile(data_dir: &Path, dir_name: &str, fields: &[&str], rows: &[(Vec<&str>, (f64, f64, f64, f64))]) {
    let dir = data_dir.join(dir_name);
    std::fs::create_dir_all(&dir).unwrap();
    let shp = dir.join("boundaries.shp");

    let table = fields.iter().fold(TableWriterBuilder::new(), |table, &name| {
        table.add_character_field(FieldName::try_from(name).unwrap(), 50)
    });
    let mut writer = shapefile::Writer::from_path(&shp, table).unwrap();

    for (values, (x0, y0, x1, y1)) in rows {
        let (x0, y0, x1, y1) = (X0 + x0, Y0 + y0, X0 + x1, Y0 + y1);
        let shape = shapefile::Polygon::with_rings(vec![PolygonRing::Outer(vec![
            Point { x: x0, y: y0 }, Point { x: x0, y: y1 }, Point { x: x1, y: y1 }, Point { x: x1, y: y0 }, Point { x: x0, y: y0 },
        ])]);
        let mut record = Record::default();
        for (name, value) in fields.iter().zip(values) {
            record.insert(name.to_string(), FieldValue::Character(Some(value.to_string())));
        }
        writer.write_shape_and_record(&shape, &record).unwrap();
    }
    drop(writer);

    std::fs::write(shp.with_extension("prj"), ITM_PRJ).unwrap();
    std::fs::write(data_dir.join(format!("{dir_name}.zip")), dir_name.as_bytes()).unwrap();
}

/// Dublin boundary 0..1000 square. Postcodes P1 (0..500) and P2 (540..1000) leave a
/// 40 m sliver. Small area 267120004 straddles the sliver with its interior point
/// inside it; 999999999 lies outside Dublin altogether.
fn seed_link_inputs(data_dir: &Path) {
    write_geojson(
        &data_dir.join("dublin_boundary.geojson"),
        &[feature(&[("name", "Dublin")], rect(0.0, 0.0, 1000.0, 1000.0))],
        Epsg::ITM,
        false,
    ).unwrap();

    write_geojson(
        &data_dir.join("dublin_postcode_boundaries_autoaddress.geojson"),
        &[
            feature(&[("postcodes", "Dublin 18"), ("local_authority", "Dún Laoghaire-Rathdown")], rect(0.0, 0.0, 500.0, 1000.0)),
            feature(&[("postcodes", "Co. Dublin"), ("local_authority", "Fingal"), ("RoutingKey", "K67")], rect(540.0, 0.0, 1000.0, 1000.0)),
        ],
        Epsg::ITM,
        false,
    ).unwrap();

    write_shapefile(data_dir, SMALL_AREAS_DIR, &["SMALL_AREA", "EDNAME", "COUNTY"], &[
        (vec!["267001001", "Foxrock", "DLR"], (100.0, 100.0, 400.0, 400.0)),
        (vec!["267120004", "Kilternan", "DLR"], (490.0, 100.0, 550.0, 400.0)),
        (vec!["267095019/267095021", "Swords", "FINGAL"], (700.0, 600.0, 900.0, 900.0)),
        (vec!["999999999", "Bray", "WICKLOW"], (2000.0, 2000.0, 2100.0, 2100.0)),
    ]);
}

fn write_overrides(data_dir: &Path, json: &str) {
    let dir = data_dir.join("overrides");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("small_areas_2016.json"), json).unwrap();
}

const SLIVER_OVERRIDE: &str = r#"{
    "version": 1,
    "overrides": {
        "267120004": { "postcodes": "Dublin 18", "local_authority": "Dún Laoghaire-Rathdown" }
    }
}"#;

#[test]
fn link_closes_sliver_with_override_and_writes_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path();
    seed_link_inputs(data);
    write_overrides(data, SLIVER_OVERRIDE);

    let mut pipeline = Pipeline::new(data, 0).unwrap();
    let result = pipeline.link_small_areas(&LinkSmallAreas::new(Vintage::Census2016)).unwrap();

    assert!(result.is_complete());
    let ids: Vec<&str> = result.links().iter().map(|link| link.id()).collect();
    assert_eq!(ids, vec!["267001001", "267120004", "267095019/267095021"]);

    let foxrock = result.get("267001001").unwrap();
    assert_eq!(foxrock.source(), LinkSource::Geometry);
    assert_eq!(foxrock.attribute("postcodes"), Some("Dublin 18"));

    let sliver = result.get("267120004").unwrap();
    assert_eq!(sliver.source(), LinkSource::Override);
    assert_eq!(sliver.attribute("local_authority"), Some("Dún Laoghaire-Rathdown"));
    assert_eq!(sliver.attribute("EDNAME"), Some("Kilternan"));

    // Columns outside the selection never reach the output.
    assert_eq!(result.get("267095019/267095021").unwrap().attribute("RoutingKey"), None);
    assert_eq!(foxrock.attribute("COUNTY"), None);

    let stem = "small_areas_boundaries_2016_linked_to_autoaddress_dublin_postcodes";
    let (features, epsg) = read_geojson(&data.join(format!("{stem}.geojson"))).unwrap();
    assert_eq!(epsg, Epsg::ITM);
    assert_eq!(features.len(), 3);
    // Linked geometry is the small area exactly as read from its shapefile.
    let (source, _) = read_shapefile(&data.join(SMALL_AREAS_DIR).join("boundaries.shp")).unwrap();
    assert_eq!(source[1].properties["SMALL_AREA"], "267120004");
    assert_eq!(&features[1].geometry, &source[1].geometry);
    assert_eq!(sliver.geometry(), &source[1].geometry);
    assert_eq!(features[1].properties["postcodes"], "Dublin 18");

    let csv = std::fs::read_to_string(data.join(format!("{stem}.csv"))).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("SMALL_AREA,EDNAME,local_authority,postcodes"));
    assert_eq!(lines.count(), 3);

    assert!(!data.join("small_areas_boundaries_2016_unresolved.csv").exists());
}

#[test]
fn unresolved_small_areas_are_reported_and_fail_under_strict() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path();
    seed_link_inputs(data);
    write_overrides(data, r#"{ "version": 1, "overrides": { "123456789": { "postcodes": "Dublin 24" } } }"#);

    let strict = LinkSmallAreas { strict: true, ..LinkSmallAreas::new(Vintage::Census2016) };
    let err = Pipeline::new(data, 0).unwrap().link_small_areas(&strict).unwrap_err();
    assert!(format!("{err:#}").contains("267120004"), "{err:#}");

    let report = std::fs::read_to_string(data.join("small_areas_boundaries_2016_unresolved.csv")).unwrap();
    let mut lines = report.lines();
    assert_eq!(lines.next(), Some("SMALL_AREA,EDNAME,x,y,lon,lat"));
    let row = lines.next().unwrap();
    let fields: Vec<&str> = row.split(',').collect();
    assert_eq!(&fields[..2], &["267120004", "Kilternan"]);
    let x: f64 = fields[2].parse().unwrap();
    let lat: f64 = fields[5].parse().unwrap();
    assert!((700_500.0..700_540.0).contains(&x), "{row}");
    assert!((53.0..54.0).contains(&lat), "{row}");
    assert_eq!(lines.next(), None);

    // Without --strict the linked outputs are still written, minus the straggler.
    let result = Pipeline::new(data, 0).unwrap()
        .link_small_areas(&LinkSmallAreas::new(Vintage::Census2016))
        .unwrap();
    assert!(!result.is_complete());
    assert_eq!(result.links().len(), 2);
    assert_eq!(result.stale_overrides(), &["123456789".to_string()]);
}

#[test]
fn existing_outputs_need_force() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path();
    seed_link_inputs(data);
    write_overrides(data, SLIVER_OVERRIDE);

    let options = LinkSmallAreas::new(Vintage::Census2016);
    Pipeline::new(data, 0).unwrap().link_small_areas(&options).unwrap();
    assert!(Pipeline::new(data, 0).unwrap().link_small_areas(&options).is_err());
    Pipeline::new(data, 0).unwrap().force(true).link_small_areas(&options).unwrap();
}

#[test]
fn refused_overwrite_leaves_no_unresolved_report() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path();
    seed_link_inputs(data);
    write_overrides(data, SLIVER_OVERRIDE);

    let options = LinkSmallAreas::new(Vintage::Census2016);
    Pipeline::new(data, 0).unwrap().link_small_areas(&options).unwrap();

    // Dropping the override leaves the sliver unlinked, but the complete outputs
    // from the first run stay in place, so no report may describe them.
    write_overrides(data, r#"{ "version": 1, "overrides": {} }"#);
    let err = Pipeline::new(data, 0).unwrap().link_small_areas(&options).unwrap_err();
    assert!(format!("{err:#}").contains(".geojson"), "{err:#}");
    assert!(!data.join("small_areas_boundaries_2016_unresolved.csv").exists());
}

#[test]
fn explicit_override_file_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path();
    seed_link_inputs(data);
    let table = data.join("my_overrides.json");
    std::fs::write(&table, SLIVER_OVERRIDE).unwrap();

    let options = LinkSmallAreas { overrides: Some(table), ..LinkSmallAreas::new(Vintage::Census2016) };
    let result = Pipeline::new(data, 0).unwrap().link_small_areas(&options).unwrap();
    assert_eq!(result.overridden(), 1);
}

#[test]
fn small_areas_are_subset_to_dublin_with_tableau_copy() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path();
    seed_link_inputs(data);

    let outputs = Pipeline::new(data, 0).unwrap().write_dublin_small_areas(Vintage::Census2016).unwrap();
    assert_eq!(outputs.count, 3);

    let (complete, epsg) = read_geojson(&outputs.complete).unwrap();
    assert_eq!(epsg, Epsg::ITM);
    assert!(complete.iter().all(|f| f.properties["SMALL_AREA"] != "999999999"));
    assert_eq!(complete[0].properties["EDNAME"], "Foxrock");

    let (tableau, epsg) = read_geojson(&outputs.tableau).unwrap();
    assert_eq!(epsg, Epsg::WGS84);
    let first = &tableau[0].properties;
    assert_eq!(first.keys().collect::<Vec<_>>(), vec!["SMALL_AREA", "area_km2"]);
    let area: f64 = first["area_km2"].parse().unwrap();
    assert!((area - 0.09).abs() < 1e-9, "{area}");
}

#[test]
fn locked_run_rejects_a_changed_input() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path();
    seed_link_inputs(data);
    write_overrides(data, SLIVER_OVERRIDE);

    Pipeline::new(data, 0).unwrap().write_dublin_small_areas(Vintage::Census2016).unwrap();
    let lock = InputLock::load(data).unwrap();
    assert!(lock.get("dublin_boundary.geojson").is_some());
    assert!(lock.get(&format!("{SMALL_AREAS_DIR}.zip")).is_some());

    write_geojson(
        &data.join("dublin_boundary.geojson"),
        &[feature(&[("name", "Greater Dublin")], rect(0.0, 0.0, 3000.0, 3000.0))],
        Epsg::ITM,
        true,
    ).unwrap();

    let err = Pipeline::new(data, 0).unwrap().locked(true).force(true)
        .write_dublin_small_areas(Vintage::Census2016)
        .unwrap_err();
    assert!(err.to_string().contains("dublin_boundary.geojson"), "{err}");
}

#[test]
fn postcodes_are_cut_to_dublin_and_labelled() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path();

    write_geojson(
        &data.join("dublin_admin_county_boundaries.geojson"),
        &[
            feature(&[("COUNTYNAME", "Dún Laoghaire-Rathdown"), ("AREA", "127")], rect(0.0, 0.0, 500.0, 1000.0)),
            feature(&[("COUNTYNAME", "Fingal"), ("AREA", "450")], rect(500.0, 0.0, 1000.0, 1000.0)),
        ],
        Epsg::ITM,
        false,
    ).unwrap();
    write_shapefile(data, ROUTING_KEYS_DIR, &["RoutingKey", "Descriptor"], &[
        (vec!["D18", "DUBLIN 18"], (0.0, 0.0, 480.0, 1000.0)),
        (vec!["K67", "SWORDS"], (600.0, 0.0, 1000.0, 1000.0)),
        (vec!["A98", "BRAY"], (3000.0, 0.0, 3400.0, 1000.0)),
    ]);

    let dublin = Pipeline::new(data, 0).unwrap().write_dublin_postcodes().unwrap();
    assert_eq!(dublin.len(), 2);

    let (features, _) = read_geojson(&data.join("dublin_postcode_boundaries_autoaddress.geojson")).unwrap();
    let summary: Vec<(&str, &str, &str)> = features.iter()
        .map(|f| (
            f.properties["RoutingKey"].as_str(),
            f.properties["postcodes"].as_str(),
            f.properties["local_authority"].as_str(),
        ))
        .collect();
    assert_eq!(summary, vec![
        ("D18", "Dublin 18", "Dún Laoghaire-Rathdown"),
        ("K67", "Co. Dublin", "Fingal"),
    ]);
    assert!(features.iter().all(|f| !f.properties.contains_key("AREA")));
}

#[test]
fn shipped_override_tables_parse() {
    for year in [2011, 2016] {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(format!("data/overrides/small_areas_{year}.json"));
        let table = dublin_boundaries::OverrideTable::load(&path).unwrap();
        assert!(table.len() >= 17, "{year}: {}", table.len());
        assert_eq!(table.get("267103003").unwrap()["local_authority"], "South Dublin");
        assert!(table.ids().all(|id| table.get(id).unwrap().contains_key("postcodes")));
    }
}
