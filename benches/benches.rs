use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use wxdecode::{
    primitives::{
        descramble, reed_solomon, ConvolutionalDecoder, ConvolutionalEncoder, Correlator,
        DefaultCorrelator, DefaultReedSolomon, ReedSolomonDecoder, Viterbi27,
    },
    profile::RsVariant,
    Registry,
};

fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    (0..len).map(|_| rng.gen()).collect()
}

fn bench_correlate(c: &mut Criterion) {
    let profile = Registry::default().get("lrpt").unwrap();
    let words = profile.correlation_words();
    let buf = random_bytes(profile.coded_frame_size);

    let mut group = c.benchmark_group("correlator");
    group.throughput(Throughput::Bytes(buf.len() as u64));
    group.bench_function("full_frame_8_words", |b| {
        let mut correlator = DefaultCorrelator;
        b.iter(|| correlator.correlate(&buf, buf.len(), &words, profile.sync_bits));
    });
    group.finish();
}

fn bench_viterbi(c: &mut Criterion) {
    let dat = random_bytes(1024);
    let mut symbols = Vec::new();
    ConvolutionalEncoder::new().encode(&dat, &mut symbols);

    let mut group = c.benchmark_group("viterbi");
    group.throughput(Throughput::Bytes(symbols.len() as u64));
    group.bench_function("decode_frame", |b| {
        let mut viterbi = Viterbi27::new();
        let mut out = vec![0u8; dat.len()];
        b.iter(|| viterbi.decode(&symbols, &mut out));
    });
    group.finish();
}

fn bench_rs(c: &mut Criterion) {
    let message = random_bytes(reed_solomon::K);
    let mut codeword = reed_solomon::encode(&message, RsVariant::Ccsds);
    for idx in (0..reed_solomon::N).step_by(32) {
        codeword[idx] ^= 0x5a;
    }

    let mut group = c.benchmark_group("rs");
    group.throughput(Throughput::Bytes(reed_solomon::N as u64));
    for variant in [RsVariant::Ccsds, RsVariant::Conventional] {
        group.bench_function(format!("correct_{variant:?}").to_lowercase(), |b| {
            let mut rs = DefaultReedSolomon;
            b.iter(|| {
                let mut block = codeword;
                rs.decode(&mut block, variant)
            });
        });
    }
    group.finish();
}

fn bench_descramble(c: &mut Criterion) {
    let buf = random_bytes(1020);

    let mut group = c.benchmark_group("pn");
    group.throughput(Throughput::Bytes(buf.len() as u64));
    group.bench_function("descramble", |b| {
        b.iter(|| {
            let mut dat = buf.clone();
            descramble(&mut dat, 1020);
            dat
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_correlate,
    bench_viterbi,
    bench_rs,
    bench_descramble
);
criterion_main!(benches);
