use dense_prior::core::{Pt3, Vec3};
use dense_prior::io::{PlyEncoding, save_ply_atomic};
use dense_prior::prelude::*;
use serde_json::json;

#[test]
fn prelude_covers_the_ply_strategy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prior.ply");
    let cloud = PointCloud::new(vec![Pt3::new(0.0, 1.0, 2.0)])
        .with_colors(vec![Vec3::new(1.0, 0.5, 0.0)])
        .unwrap();
    save_ply_atomic(&path, &cloud, PlyEncoding::BinaryLittleEndian).unwrap();

    let registry = InitializerRegistry::with_defaults();
    let mut init = registry.create("ply", &json!({ "path": path }), None).unwrap();
    let dataset: Vec<SourceView> = Vec::new();
    let model = initialize_model(init.as_mut(), PointPrior::default(), &dataset, true).unwrap();

    let loaded = model.cloud.unwrap();
    assert_eq!(loaded.points, cloud.points);
    let color = loaded.colors.unwrap()[0];
    assert!((color - Vec3::new(1.0, 128.0 / 255.0, 0.0)).norm() < 1e-12);
}

#[test]
fn default_config_matches_documented_values() {
    let config = DensePriorConfig::default();
    assert_eq!(config.artifact_name, "fused.ply");
    assert_eq!(config.max_images, 20);
    assert_eq!(config.align.lr, 0.01);
    assert_eq!(Device::default(), Device::Cpu);
}
