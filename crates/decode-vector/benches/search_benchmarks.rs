//! Benchmarks for chunking, corpus ingestion and similarity search.
//!
//! The default corpus is 1,000 chunks. Set `BENCH_FULL_SCALE=1` to run with
//! 20,000 chunks, roughly a hundred hour-long interviews:
//!
//! ```bash
//! BENCH_FULL_SCALE=1 cargo bench -p decode-vector
//! ```

use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};

use decode_vector::chunker::Chunker;
use decode_vector::embedding::HashingEmbedding;
use decode_vector::index::CorpusIndex;
use decode_vector::pipeline::{ingest_corpus, IngestOptions};

const CI_CHUNK_COUNT: usize = 1_000;
const FULL_SCALE_CHUNK_COUNT: usize = 20_000;

/// A transcript turn of roughly 100 words, made unique by its index.
fn generate_turn(index: usize) -> String {
    format!(
        "Interviewer: Can you walk me through the last time you set up a new \
         project? Participant {}: Sure. I started from the onboarding checklist, \
         which was helpful at first, but the pricing page confused me because the \
         plans overlap. I ended up emailing support, and they answered within an \
         hour. The export feature saved me a lot of time once the data was in, \
         though the dashboard felt slow on large accounts and I had to refresh \
         several times before the charts loaded properly.\n\n",
        index
    )
}

fn chunk_count() -> usize {
    if std::env::var("BENCH_FULL_SCALE").is_ok() {
        FULL_SCALE_CHUNK_COUNT
    } else {
        CI_CHUNK_COUNT
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime")
}

fn build_populated_index(count: usize) -> (CorpusIndex, HashingEmbedding) {
    let embedder = HashingEmbedding::default();
    let chunker = Chunker::new(600, 60).expect("valid chunker");
    let transcripts: Vec<String> = (0..count).map(generate_turn).collect();

    let (index, _) = runtime()
        .block_on(ingest_corpus(
            &transcripts,
            &chunker,
            &embedder,
            &IngestOptions::default(),
        ))
        .expect("ingest failed");
    (index, embedder)
}

fn bench_chunking(c: &mut Criterion) {
    let text: String = (0..200).map(generate_turn).collect();
    let chunker = Chunker::default();

    c.bench_function("chunk_200_turns", |b| {
        b.iter(|| {
            let chunks = chunker.split(&text);
            assert!(!chunks.is_empty());
            chunks
        });
    });
}

fn bench_similarity_search(c: &mut Criterion) {
    let count = chunk_count();
    let (index, embedder) = build_populated_index(count);
    let query = embedder.vectorize("How did participants feel about pricing plans?");

    let mut group = c.benchmark_group("similarity_search");
    group.sample_size(100);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function(format!("top8_{}chunks", index.len()), |b| {
        b.iter(|| {
            let hits = index.search(&query, 8);
            assert!(!hits.is_empty(), "Search should return results");
            hits.len()
        });
    });

    group.finish();
}

fn bench_ingestion(c: &mut Criterion) {
    let transcripts: Vec<String> = (0..100).map(generate_turn).collect();
    let chunker = Chunker::default();
    let embedder = HashingEmbedding::default();
    let rt = runtime();

    let mut group = c.benchmark_group("ingestion");
    group.sample_size(20);

    group.bench_function("ingest_100_turns", |b| {
        b.iter(|| {
            rt.block_on(ingest_corpus(
                &transcripts,
                &chunker,
                &embedder,
                &IngestOptions::default(),
            ))
            .expect("ingest failed")
            .1
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_chunking,
    bench_similarity_search,
    bench_ingestion
);
criterion_main!(benches);
