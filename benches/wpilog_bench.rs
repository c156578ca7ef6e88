use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pprof::criterion::Output;
use wpilog_decoder::datalog::RecordHeader;
use wpilog_decoder::{ControlPayload, StartRecordData, WpilogReader, WpilogReaderBuilder};

fn push_record(data: &mut Vec<u8>, entry_id: u32, timestamp: u64, payload: &[u8]) {
    RecordHeader::minimal(entry_id, payload.len() as u32, timestamp)
        .encode(entry_id, payload.len() as u32, timestamp, data)
        .unwrap();
    data.extend_from_slice(payload);
}

fn push_start(data: &mut Vec<u8>, entry_id: u32, name: &str, type_name: &str) {
    let payload = ControlPayload::Start(StartRecordData {
        entry_id,
        name: name.to_string(),
        type_name: type_name.to_string(),
        metadata: String::new(),
    })
    .encode();
    push_record(data, 0, 1, &payload);
}

/// Helper function to create a WPILog file with specified number of records
fn create_wpilog_with_records(num_records: usize) -> Vec<u8> {
    let mut data = Vec::new();

    // Header
    data.extend_from_slice(b"WPILOG");
    data.extend_from_slice(&[0x00, 0x01]); // Version 1.0
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // Extra header length = 0

    push_start(&mut data, 1, "speed", "double");
    push_start(&mut data, 2, "count", "int64");
    push_start(&mut data, 3, "active", "boolean");
    push_start(&mut data, 4, "/.schema/struct:Translation2d", "structschema");
    push_start(&mut data, 5, "pose", "struct:Translation2d");
    push_record(&mut data, 4, 1, b"double x; double y");

    for i in 0..num_records {
        let timestamp = (i * 20_000) as u64; // 20ms between records

        push_record(&mut data, 1, timestamp, &((i as f64) * 1.5).to_le_bytes());

        if i % 2 == 0 {
            push_record(&mut data, 2, timestamp, &(i as i64).to_le_bytes());
        }

        if i % 3 == 0 {
            push_record(&mut data, 3, timestamp, &[if i % 6 == 0 { 1 } else { 0 }]);
        }

        if i % 5 == 0 {
            let mut pose = Vec::with_capacity(16);
            pose.extend_from_slice(&(i as f64).to_le_bytes());
            pose.extend_from_slice(&(-(i as f64)).to_le_bytes());
            push_record(&mut data, 5, timestamp, &pose);
        }
    }

    data
}

fn count_records(data: Vec<u8>) -> usize {
    WpilogReader::from_bytes(data)
        .map(|record| record.unwrap())
        .count()
}

fn benchmark_read(c: &mut Criterion) {
    for (label, num_records) in [("100_records", 100), ("10k_records", 10_000)] {
        let data = create_wpilog_with_records(num_records);
        let size = data.len();

        let mut group = c.benchmark_group("read");
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_function(BenchmarkId::new(label, size), |b| {
            b.iter(|| black_box(count_records(black_box(data.clone()))));
        });

        group.finish();
    }
}

fn benchmark_read_large(c: &mut Criterion) {
    let data = create_wpilog_with_records(100_000);
    let size = data.len();

    let mut group = c.benchmark_group("read_large");
    group.throughput(Throughput::Bytes(size as u64));
    group.sample_size(10); // Reduce sample size for large benchmark

    group.bench_function(BenchmarkId::new("100k_records", size), |b| {
        b.iter(|| black_box(count_records(black_box(data.clone()))));
    });

    group.finish();
}

fn benchmark_chunk_size(c: &mut Criterion) {
    let data = create_wpilog_with_records(10_000);
    let mut group = c.benchmark_group("chunk_size");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for chunk_size in [256usize, 4096, 64 * 1024] {
        group.bench_function(BenchmarkId::from_parameter(chunk_size), |b| {
            b.iter(|| {
                let reader = WpilogReaderBuilder::new()
                    .chunk_size(chunk_size)
                    .from_bytes(black_box(data.clone()));
                black_box(reader.map(|record| record.unwrap()).count())
            });
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().with_profiler(pprof::criterion::PProfProfiler::new(100, Output::Flamegraph(None)));
    targets =
        benchmark_read,
        benchmark_read_large,
        benchmark_chunk_size
}
criterion_main!(benches);
