//! Upload benchmarks

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use devsync_uploadr::config::UploadConfig;
use devsync_uploadr::upload::sniff::detect_content_type;
use devsync_uploadr::upload::UploadHandler;
use http_body_util::Full;
use hyper::header::CONTENT_TYPE;
use hyper::Request;

const BOUNDARY: &str = "devsync-bench-boundary";

fn multipart_body(size: usize) -> Bytes {
    let mut body = Vec::with_capacity(size + 256);
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"bench-device\"; filename=\"payload.bin\"\r\n\r\n",
    );
    body.extend_from_slice(b"%PDF-1.4\n");
    body.resize(body.len() + size.saturating_sub(9), b'x');
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    Bytes::from(body)
}

fn request(body: Bytes) -> Request<Full<Bytes>> {
    Request::post("/upload")
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Full::new(body))
        .unwrap()
}

fn benchmark_upload_sizes(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let root = tempfile::tempdir().unwrap();
    let handler = UploadHandler::new(UploadConfig::new(root.path()));

    let mut group = c.benchmark_group("upload_sizes");

    for size in [1024, 10 * 1024, 100 * 1024, 1024 * 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(format!("{}_bytes", size), size, |b, &size| {
            let body = multipart_body(size);
            b.to_async(&runtime).iter(|| async {
                let stored = handler.store(request(body.clone())).await.unwrap();
                black_box(stored.bytes_written);
            });
        });
    }

    group.finish();
}

fn benchmark_sniffing(c: &mut Criterion) {
    let text = vec![b'a'; 512];
    let png: Vec<u8> = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]
        .into_iter()
        .chain(std::iter::repeat(0u8).take(504))
        .collect();

    c.bench_function("sniff_text", |b| {
        b.iter(|| detect_content_type(black_box(&text)))
    });
    c.bench_function("sniff_png", |b| {
        b.iter(|| detect_content_type(black_box(&png)))
    });
}

criterion_group!(benches, benchmark_upload_sizes, benchmark_sniffing);
criterion_main!(benches);
