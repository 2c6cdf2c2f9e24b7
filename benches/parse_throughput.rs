use std::fmt::Write;
use std::hint::black_box;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};

use gffctx::config::{ClipMode, ParserConfig};
use gffctx::gff::{self, GffVersion, Writer};
use gffctx::source::CachedLines;

const TRANSCRIPTS: usize = 5_000;

/// Synthetic GFF3 with mRNA/exon/CDS groups and gapped EST alignments.
fn synthetic_gff3() -> String {
    let mut text = String::from("##gff-version 3\n##sequence-region chr1 1 100000000\n");
    for i in 0..TRANSCRIPTS {
        let base = 1 + i as i32 * 2_000;
        let strand = if i % 2 == 0 { '+' } else { '-' };
        let _ = writeln!(
            text,
            "chr1\tcurated\tmRNA\t{base}\t{}\t.\t{strand}\t.\tID=tx{i};Name=TX{i}",
            base + 1_499
        );
        for exon in 0..3 {
            let s = base + exon * 600;
            let _ = writeln!(text, "chr1\tcurated\texon\t{s}\t{}\t.\t{strand}\t.\tParent=tx{i}", s + 299);
            let _ = writeln!(text, "chr1\tcurated\tCDS\t{}\t{}\t.\t{strand}\t0\tParent=tx{i}", s + 50, s + 299);
        }
        let _ = writeln!(
            text,
            "chr1\test\tEST_match\t{}\t{}\t90\t+\t.\tID=est{i};Target=EST{i} 1 21 +;Gap=M8 D3 M6 I1 M6",
            base + 100,
            base + 122
        );
    }
    text
}

fn bench_parse(c: &mut Criterion) {
    let text = synthetic_gff3();
    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Bytes(text.len() as u64));

    group.bench_function("whole region", |b| {
        b.iter(|| {
            let mut source = CachedLines::from_text("bench", &text);
            let (ctx, outcome) = gff::run(&mut source, ParserConfig::default()).unwrap();
            assert!(outcome.is_ok());
            black_box(ctx.feature_count())
        });
    });

    group.bench_function("clipped window", |b| {
        b.iter(|| {
            let mut config = ParserConfig::new("chr1", 1_000_000, 2_000_000);
            config.clip_mode = ClipMode::Overlap;
            let mut source = CachedLines::from_text("bench", &text);
            let (ctx, _) = gff::run(&mut source, config).unwrap();
            black_box(ctx.feature_count())
        });
    });

    group.bench_function("parse only", |b| {
        b.iter(|| {
            let config = ParserConfig {
                parse_only: true,
                ..ParserConfig::default()
            };
            let mut source = CachedLines::from_text("bench", &text);
            let (_, outcome) = gff::run(&mut source, config).unwrap();
            black_box(outcome.features_added)
        });
    });
    group.finish();
}

fn bench_write(c: &mut Criterion) {
    let text = synthetic_gff3();
    let mut source = CachedLines::from_text("bench", &text);
    let (ctx, _) = gff::run(&mut source, ParserConfig::default()).unwrap();

    c.bench_function("write v3", |b| {
        b.iter(|| {
            let mut writer = Writer::new(Vec::with_capacity(text.len()), GffVersion::V3);
            writer.write_context(&ctx).unwrap();
            black_box(writer.into_inner().len())
        });
    });
}

criterion_group!(benches, bench_parse, bench_write);
criterion_main!(benches);
