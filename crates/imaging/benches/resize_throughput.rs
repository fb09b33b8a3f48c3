use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io::Cursor;

fn encode_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::new(width, height);
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png).unwrap();
    buf
}

fn resize_to(bytes: &[u8], width: u32) -> Vec<u8> {
    let decoded = image::load_from_memory(bytes).unwrap();
    let height = (decoded.height() as f64 * (width as f64 / decoded.width() as f64)) as u32;
    let resized = decoded.resize(width, height, image::imageops::FilterType::Lanczos3);
    let mut out = Vec::new();
    resized.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png).unwrap();
    out
}

fn bench_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("resize_single_image");

    for &width in &[400u32, 1600, 4000] {
        let source = encode_png(width, width);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &source, |b, source| {
            b.iter(|| resize_to(black_box(source), 200));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resize);
criterion_main!(benches);
