use dense_prior_core::{PointCloud, Pt3, Vec3};
use dense_prior_io::{PlyEncoding, load_ply, save_ply_atomic};

fn colored_grid(n: usize) -> PointCloud {
    let points = (0..n * n)
        .map(|i| Pt3::new((i % n) as f64 * 0.1, (i / n) as f64 * 0.1, 1.0))
        .collect();
    let colors = (0..n * n)
        .map(|i| Vec3::new((i % 256) as f64 / 255.0, 0.5, 1.0))
        .collect();
    PointCloud::new(points).with_colors(colors).unwrap()
}

#[test]
fn binary_payload_has_fixed_stride() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fused.ply");
    let cloud = colored_grid(20);
    save_ply_atomic(&path, &cloud, PlyEncoding::BinaryLittleEndian).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let marker = b"end_header\n";
    let header_len = bytes
        .windows(marker.len())
        .position(|w| w == marker)
        .unwrap()
        + marker.len();
    // 3 doubles + 3 uchar per vertex
    assert_eq!(bytes.len() - header_len, cloud.len() * 27);

    let back = load_ply(&path).unwrap();
    assert_eq!(back.points, cloud.points);
    let colors = back.colors.unwrap();
    for (a, b) in colors.iter().zip(cloud.colors.as_ref().unwrap()) {
        assert!((a - b).norm() < 0.5 / 255.0 + 1e-12);
    }
}

#[test]
fn ascii_and_binary_agree() {
    let dir = tempfile::tempdir().unwrap();
    let cloud = colored_grid(4);
    let ascii = dir.path().join("a.ply");
    let binary = dir.path().join("b.ply");
    save_ply_atomic(&ascii, &cloud, PlyEncoding::Ascii).unwrap();
    save_ply_atomic(&binary, &cloud, PlyEncoding::BinaryLittleEndian).unwrap();
    assert_eq!(load_ply(&ascii).unwrap(), load_ply(&binary).unwrap());
}
