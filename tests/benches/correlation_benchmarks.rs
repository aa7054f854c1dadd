//! # Netwatch Hot-Path Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | Correlation | id allocation, register/complete round |
//! | ICMP | RFC 1071 checksum, echo encode/parse |
//! | SNMP | GETBULK message encode, response decode |
//! | DNS | response parse |

use bytes::{BufMut, BytesMut};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nw_03_correlation::{
    CorrelationId, CorrelationIdAllocator, CorrelationRegistry, IdSpace, PendingRequest, Respond,
};
use nw_05_icmp::{internet_checksum, EchoPacket};
use nw_06_dns::{DnsQuery, DnsResponse, RecordType};
use nw_07_snmp::{Message, Oid, Pdu, SnmpValue, VarBind};
use rand::Rng;
use shared_types::RequestError;

// ============================================================================
// Correlation Registry
// ============================================================================

fn ignore() -> Respond<u64> {
    Box::new(|result: Result<u64, RequestError>| {
        black_box(result.is_ok());
    })
}

fn bench_correlation(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation");

    group.bench_function("allocate_id", |b| {
        let ids = CorrelationIdAllocator::new(IdSpace::DNS);
        b.iter(|| black_box(ids.allocate()))
    });

    for pending in [10usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("register_complete", pending),
            &pending,
            |b, &pending| {
                let mut registry = CorrelationRegistry::<u64>::new();
                for id in 0..pending as u64 {
                    let pending = PendingRequest::new(CorrelationId::new(id), ignore());
                    let _ = registry.register(pending);
                }
                let mut next = pending as u64;
                b.iter(|| {
                    let id = CorrelationId::new(next);
                    next += 1;
                    let _ = registry.register(PendingRequest::new(id, ignore()));
                    black_box(registry.complete(id, Ok(next)))
                })
            },
        );
    }

    group.finish();
}

// ============================================================================
// ICMP
// ============================================================================

fn bench_icmp(c: &mut Criterion) {
    let mut group = c.benchmark_group("icmp");
    let mut rng = rand::thread_rng();

    for size in [16usize, 64, 1_500] {
        let data: Vec<u8> = (0..size).map(|_| rng.gen()).collect();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("checksum", size), &data, |b, d| {
            b.iter(|| black_box(internet_checksum(d)))
        });
    }

    let packet = EchoPacket::request(0x1234, 7, 1_000_000);
    group.bench_function("echo_encode", |b| b.iter(|| black_box(packet.encode())));
    let wire = packet.to_reply().encode();
    group.bench_function("echo_parse", |b| {
        b.iter(|| black_box(EchoPacket::parse(&wire)))
    });

    group.finish();
}

// ============================================================================
// SNMP
// ============================================================================

fn bench_snmp(c: &mut Criterion) {
    let mut group = c.benchmark_group("snmp");
    let root: Oid = "1.3.6.1.2.1.2.2.1.2".parse().unwrap();

    let request = Message::new("public", Pdu::get_bulk(42, root.clone(), 10));
    group.bench_function("get_bulk_encode", |b| b.iter(|| black_box(request.encode())));

    for rows in [10u32, 50] {
        let bindings = (1..=rows)
            .map(|row| VarBind::new(root.child(row), SnmpValue::Counter32(row * 1_000)))
            .collect();
        let wire = Message::new("public", Pdu::response(42, bindings)).encode();
        group.throughput(Throughput::Elements(u64::from(rows)));
        group.bench_with_input(BenchmarkId::new("response_decode", rows), &wire, |b, w| {
            b.iter(|| black_box(Message::decode(w)))
        });
    }

    group.finish();
}

// ============================================================================
// DNS
// ============================================================================

fn bench_dns(c: &mut Criterion) {
    let mut group = c.benchmark_group("dns");

    let query = DnsQuery::new("router.example.net", RecordType::A)
        .encode(0xBEEF)
        .unwrap();
    let mut response = BytesMut::from(&query[..]);
    response[2] |= 0x80;
    response[6..8].copy_from_slice(&4u16.to_be_bytes());
    for host in 1..=4u8 {
        response.put_u16(0xC00C);
        response.put_u16(1);
        response.put_u16(1);
        response.put_u32(300);
        response.put_u16(4);
        response.put_slice(&[192, 0, 2, host]);
    }
    let response = response.freeze();

    group.bench_function("query_encode", |b| {
        let question = DnsQuery::new("router.example.net", RecordType::A);
        b.iter(|| black_box(question.encode(0xBEEF)))
    });
    group.bench_function("response_parse", |b| {
        b.iter(|| black_box(DnsResponse::parse(&response)))
    });

    group.finish();
}

criterion_group!(benches, bench_correlation, bench_icmp, bench_snmp, bench_dns);

criterion_main!(benches);
