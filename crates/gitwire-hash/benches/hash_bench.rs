use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use gitwire_hash::hex::{decode_into, to_hex_string};
use gitwire_hash::{HashAlgorithm, Hasher, ObjectId};

fn hash_throughput(c: &mut Criterion) {
    let data = vec![0xABu8; 1024 * 1024];

    let mut group = c.benchmark_group("hash_throughput");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("sha1_1mib", |b| {
        b.iter(|| Hasher::digest(black_box(HashAlgorithm::Sha1), black_box(&data)))
    });
    group.bench_function("blob_object_1mib", |b| {
        b.iter(|| Hasher::hash_object(HashAlgorithm::Sha1, b"blob", black_box(&data)))
    });
    group.finish();
}

fn oid_hex(c: &mut Criterion) {
    let oid = ObjectId::from_hex("b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0").unwrap();
    let hex = oid.to_hex();

    let mut group = c.benchmark_group("oid_hex");
    group.bench_function("encode", |b| b.iter(|| to_hex_string(black_box(oid.as_bytes()))));
    group.bench_function("decode", |b| {
        b.iter(|| {
            let mut buf = [0u8; 20];
            decode_into(black_box(hex.as_bytes()), &mut buf).unwrap();
            buf
        })
    });
    group.finish();
}

criterion_group!(benches, hash_throughput, oid_hex);
criterion_main!(benches);
