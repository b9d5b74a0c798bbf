use criterion::{criterion_group, criterion_main, Criterion};
use face_overlay::{
    crop::rasterize_crop,
    viz::{redraw_overlay, Canvas, RenderedImage, Surfaces},
    CropRegion, Descriptor, FaceDescription, FaceRegion, Landmarks, Point, Rect, DESCRIPTOR_LEN,
    LANDMARK_COUNT,
};
use image::{DynamicImage, RgbImage};

fn faces(count: usize) -> Vec<FaceDescription> {
    (0..count)
        .map(|i| {
            let rect = Rect::at(40.0 + 120.0 * (i % 10) as f32, 40.0 + 120.0 * (i / 10) as f32)
                .with_size(100.0, 100.0);
            let landmarks = (0..LANDMARK_COUNT)
                .map(|j| Point::new(rect.x + j as f32, rect.y + j as f32))
                .collect();
            FaceDescription {
                detection: FaceRegion { rect, score: 0.9 },
                landmarks: Landmarks::new(landmarks).expect("68 landmarks"),
                descriptor: Descriptor::new(vec![0.0; DESCRIPTOR_LEN]).expect("128 values"),
            }
        })
        .collect()
}

fn criterion_benchmark(c: &mut Criterion) {
    let photo = DynamicImage::ImageRgb8(RgbImage::from_fn(1280, 960, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }));
    let view = RenderedImage::fit_width(photo, 640);

    for count in [1, 10, 50] {
        let faces = faces(count);
        let mut canvas = Canvas::new(1, 1);
        c.bench_function(&format!("redraw_overlay_{count}_faces"), |b| {
            b.iter(|| redraw_overlay(Surfaces::new(&view, &mut canvas), &faces))
        });
    }

    for dpr in [1.0, 2.0] {
        let region = CropRegion::pixels(100.0, 100.0, 300.0, 300.0);
        c.bench_function(&format!("rasterize_crop_dpr{dpr}"), |b| {
            b.iter(|| rasterize_crop(&view, &region, dpr))
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
