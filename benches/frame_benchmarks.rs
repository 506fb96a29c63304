// ABOUTME: Benchmark suite for the yamux frame codec
// ABOUTME: Measures header encode/decode throughput and DATA frame assembly

use bytes::{Bytes, BytesMut};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::io::Cursor;
use std::time::Duration;
use yamux::{Flags, Frame, FrameType, Header};

fn sample_header() -> Header {
    Header {
        frame_type: FrameType::WindowUpdate,
        flags: Flags::SYN | Flags::ACK,
        stream_id: 12345,
        length: 4,
    }
}

fn bench_header_encode(c: &mut Criterion) {
    let header = sample_header();
    let mut buf = BytesMut::with_capacity(Header::SIZE);

    c.bench_function("header_encode", |b| {
        b.iter(|| {
            buf.clear();
            black_box(&header).encode(&mut buf);
            black_box(&buf);
        })
    });
}

fn bench_header_decode(c: &mut Criterion) {
    let mut buf = BytesMut::new();
    sample_header().encode(&mut buf);
    let encoded = buf.freeze();

    c.bench_function("header_decode", |b| {
        b.iter(|| {
            let mut cursor = Cursor::new(black_box(encoded.as_ref()));
            black_box(Header::decode(&mut cursor).unwrap());
        })
    });
}

fn bench_data_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("data_frame_encode");

    for size in [64usize, 1024, 16 * 1024] {
        let body = Bytes::from(vec![0xabu8; size]);
        let frame = Frame::data(1, Flags::empty(), body);
        let mut buf = BytesMut::with_capacity(Header::SIZE + size);

        group.throughput(criterion::Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| {
                buf.clear();
                black_box(frame).encode(&mut buf);
                black_box(&buf);
            })
        });
    }
    group.finish();
}

fn bench_frame_parse(c: &mut Criterion) {
    let body = Bytes::from(vec![0xcdu8; 1024]);
    let frame = Frame::data(7, Flags::FIN, body);
    let mut buf = BytesMut::new();
    frame.encode(&mut buf);
    let encoded = buf.freeze();

    c.bench_function("data_frame_parse", |b| {
        b.iter(|| {
            let mut cursor = Cursor::new(encoded.as_ref());
            let header = Header::decode(&mut cursor).unwrap();
            let payload = encoded.slice(Header::SIZE..);
            black_box(Frame::parse(header, payload).unwrap());
        })
    });
}

fn configure() -> Criterion {
    Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .sample_size(200)
}

criterion_group! {
    name = benches;
    config = configure();
    targets = bench_header_encode, bench_header_decode, bench_data_frame_encode, bench_frame_parse
}
criterion_main!(benches);
