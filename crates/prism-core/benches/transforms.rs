//! Benchmarks for the Prism stage transforms.
//!
//! Run with: cargo bench -p prism-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use prism_core::config::{LimitsConfig, TransformConfig};
use prism_core::store::MemoryStore;
use prism_core::{CodecTransform, ImageTransform, ObjectStore, StageHandler, StageKind, StageRequest};
use std::io::Cursor;
use std::sync::Arc;

/// A 1920x1080 JPEG with enough detail to keep the codec honest.
fn fixture_jpeg() -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_fn(1920, 1080, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8])
    }));
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Jpeg)
        .expect("encode fixture");
    buffer.into_inner()
}

fn benchmark_transforms(c: &mut Criterion) {
    let bytes = fixture_jpeg();
    let config = TransformConfig::default();

    for kind in StageKind::ALL {
        let transform = CodecTransform::new(kind.transform(&config), LimitsConfig::default(), &config);
        c.bench_function(&format!("transform_{}_1080p", kind), |b| {
            b.iter(|| {
                let _ = transform.apply(black_box(&bytes));
            })
        });
    }
}

fn benchmark_stage_round_trip(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let store = Arc::new(MemoryStore::new());
    rt.block_on(store.put("bench", "input/frame.jpg", fixture_jpeg(), "image/jpeg"))
        .expect("seed store");
    let handler = StageHandler::for_kind(StageKind::Rotate, &Default::default(), store);

    c.bench_function("stage_rotate_memory_store", |b| {
        b.iter(|| {
            let _ = rt.block_on(handler.execute(StageRequest::event("bench", "input/frame.jpg")));
        })
    });
}

criterion_group!(benches, benchmark_transforms, benchmark_stage_round_trip);
criterion_main!(benches);
