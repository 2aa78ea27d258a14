use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use sendria::parser::mime::{self, DecodeOptions};

fn fixture(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(path).unwrap()
}

fn bench_decompose_nested(c: &mut Criterion) {
    let raw = fixture("nested.eml");
    let options = DecodeOptions::default();

    c.bench_function("decompose_nested_eml", |b| {
        b.iter(|| mime::decompose_bytes(&raw, &options).unwrap())
    });
}

fn bench_decompose_large_attachment(c: &mut Criterion) {
    use base64::Engine;

    // ~1 MiB attachment, wrapped at 76 columns like a real mailer would.
    let payload: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();
    let encoded = base64::engine::general_purpose::STANDARD.encode(&payload);
    let wrapped: Vec<&str> = encoded
        .as_bytes()
        .chunks(76)
        .map(|chunk| std::str::from_utf8(chunk).unwrap())
        .collect();
    let raw = format!(
        "Content-Type: multipart/mixed; boundary=\"b\"\r\n\r\n\
--b\r\nContent-Type: text/plain\r\n\r\nsee attachment\r\n\
--b\r\nContent-Type: application/octet-stream\r\n\
Content-Disposition: attachment; filename=\"blob.bin\"\r\n\
Content-Transfer-Encoding: base64\r\n\r\n{}\r\n--b--\r\n",
        wrapped.join("\r\n")
    );
    let options = DecodeOptions::default();

    c.bench_function("decompose_1mib_base64_attachment", |b| {
        b.iter(|| mime::decompose_with(&raw, &options).unwrap())
    });
}

criterion_group!(benches, bench_decompose_nested, bench_decompose_large_attachment);
criterion_main!(benches);
