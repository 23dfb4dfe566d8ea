use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use docweave::{
    ChunkingConfig, ExtractionConfig, ResultFormat, batch_extract_bytes_sync, detect_mime_type_from_bytes,
    extract_bytes_sync,
};
use std::hint::black_box;

fn sample_markdown(paragraphs: usize) -> String {
    let mut doc = String::from("# Benchmark Document\n\n");
    for i in 0..paragraphs {
        doc.push_str(&format!(
            "## Section {}\n\nLorem ipsum dolor sit amet, consectetur adipiscing elit. Sed do eiusmod tempor \
             incididunt ut labore et dolore magna aliqua.\n\n| key | value |\n|-----|-------|\n| row | {} |\n\n",
            i, i
        ));
    }
    doc
}

fn bench_single_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_markdown");
    let plain = ExtractionConfig::default();
    let assembled = ExtractionConfig {
        chunking: Some(ChunkingConfig::default()),
        result_format: ResultFormat::ElementBased,
        ..Default::default()
    };

    for paragraphs in [10usize, 100, 1000] {
        let doc = sample_markdown(paragraphs);
        group.throughput(Throughput::Bytes(doc.len() as u64));
        group.bench_with_input(BenchmarkId::new("plain", paragraphs), &doc, |b, doc| {
            b.iter(|| extract_bytes_sync(black_box(doc.as_bytes()), "text/markdown", &plain))
        });
        group.bench_with_input(BenchmarkId::new("assembled", paragraphs), &doc, |b, doc| {
            b.iter(|| extract_bytes_sync(black_box(doc.as_bytes()), "text/markdown", &assembled))
        });
    }
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let config = ExtractionConfig {
        max_concurrent_extractions: Some(8),
        ..Default::default()
    };
    let doc = sample_markdown(50).into_bytes();

    c.bench_function("batch_64_markdown", |b| {
        b.iter(|| {
            let contents = vec![doc.clone(); 64];
            let mimes = vec!["text/markdown".to_string(); 64];
            batch_extract_bytes_sync(black_box(contents), mimes, &config)
        })
    });
}

fn bench_mime_detection(c: &mut Criterion) {
    let samples: [(&str, &[u8]); 3] = [
        ("pdf", b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n"),
        ("json", br#"{"title": "bench", "items": [1, 2, 3]}"#),
        ("text", b"plain words without any structure at all"),
    ];

    let mut group = c.benchmark_group("detect_mime");
    for (name, bytes) in samples {
        group.bench_function(name, |b| b.iter(|| detect_mime_type_from_bytes(black_box(bytes))));
    }
    group.finish();
}

criterion_group!(benches, bench_single_extraction, bench_batch, bench_mime_detection);
criterion_main!(benches);
