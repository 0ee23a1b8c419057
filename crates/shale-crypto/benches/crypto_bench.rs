//! Benchmarks for the SHALE cipher seam.

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use shale_crypto::{ChaCha20Cipher, CipherKey, StreamCipher, derive_block_iv};

fn bench_keystream(c: &mut Criterion) {
    let key = CipherKey::new([0x42u8; 32]);
    let iv = derive_block_iv(&key, 0);

    let mut group = c.benchmark_group("keystream");
    group.throughput(Throughput::Bytes(1024 * 1024));

    group.bench_function("apply_1mib", |b| {
        let mut data = vec![0u8; 1024 * 1024];
        b.iter(|| {
            let mut cipher = ChaCha20Cipher::new();
            cipher.reinit(&key, &iv).unwrap();
            cipher.apply(&mut data);
        });
    });

    group.bench_function("per_byte_64kib", |b| {
        let mut data = vec![0u8; 64 * 1024];
        b.iter(|| {
            let mut cipher = ChaCha20Cipher::new();
            cipher.reinit(&key, &iv).unwrap();
            for byte in data.iter_mut() {
                *byte = cipher.crypt_byte(*byte);
            }
        });
    });

    group.finish();
}

fn bench_iv_derivation(c: &mut Criterion) {
    let key = CipherKey::new([0x42u8; 32]);

    c.bench_function("derive_block_iv", |b| {
        let mut index = 0u64;
        b.iter(|| {
            index = index.wrapping_add(1);
            derive_block_iv(&key, index)
        });
    });
}

criterion_group!(benches, bench_keystream, bench_iv_derivation);
criterion_main!(benches);
