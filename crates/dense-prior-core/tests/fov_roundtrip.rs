use dense_prior_core::{ColorImage, FovIntrinsics, Iso3, SourceView};

fn view(width: usize, height: usize, fov_x: f64, fov_y: f64) -> SourceView {
    let image = ColorImage::from_fn(width, height, |x, y| {
        [x as f32 / width as f32, y as f32 / height as f32, 0.25]
    })
    .unwrap();
    SourceView::new(image, Iso3::identity(), fov_x, fov_y).unwrap()
}

#[test]
fn intrinsics_reproduce_fov_after_any_reshape() {
    let cases = [
        (800, 600, 1.1, 0.85, (512, 384)),
        (600, 800, 0.7, 0.9, (384, 512)),
        (1920, 1080, 1.4, 0.9, (512, 288)),
        (640, 640, 1.0, 1.0, (512, 384)),
    ];
    for (w0, h0, fov_x, fov_y, (w, h)) in cases {
        let v = view(w0, h0, fov_x, fov_y);
        let k0 = v.intrinsics();
        let k = k0.rescaled((w0, h0), (w, h));
        assert!(
            (k.fov_x(w) - fov_x).abs() < 1e-12,
            "fov_x mismatch for {w0}x{h0} -> {w}x{h}"
        );
        assert!(
            (k.fov_y(h) - fov_y).abs() < 1e-12,
            "fov_y mismatch for {w0}x{h0} -> {w}x{h}"
        );
    }
}

#[test]
fn source_view_rejects_invalid_fov() {
    let image = ColorImage::from_fn(4, 4, |_, _| [0.0; 3]).unwrap();
    assert!(SourceView::new(image.clone(), Iso3::identity(), 0.0, 1.0).is_err());
    assert!(SourceView::new(image, Iso3::identity(), 1.0, 4.0).is_err());
}

#[test]
fn original_intrinsics_center_on_integer_pixel() {
    let v = view(801, 601, 1.0, 0.8);
    let k: FovIntrinsics = v.intrinsics();
    assert_eq!(k.cx, 400.0);
    assert_eq!(k.cy, 300.0);
}
