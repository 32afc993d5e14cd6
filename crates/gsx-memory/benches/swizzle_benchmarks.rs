//! Benchmarks for swizzled addressing, transfers and texture readback

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gsx_core::Config;
use gsx_memory::{BitBltBuf, LocalMemory, Psm, Rect, Texa, TransferCursor, TrxPos, TrxReg};

fn bench_pixel_address(c: &mut Criterion) {
    let mut group = c.benchmark_group("pixel_address");

    for psm in [Psm::Ct32, Psm::Ct16, Psm::T8, Psm::T4] {
        let info = psm.info();
        group.bench_function(BenchmarkId::new("page_table", format!("{psm:?}")), |b| {
            b.iter(|| {
                let mut sum = 0u32;
                for y in 0..64 {
                    for x in 0..64 {
                        sum = sum.wrapping_add(info.pa(black_box(x), y, 0, 4));
                    }
                }
                black_box(sum);
            });
        });
    }

    let mem = LocalMemory::new(&Config::default()).unwrap();
    let off = mem.get_offset(0, 4, Psm::Ct32.id());
    group.bench_function("offset_table", |b| {
        b.iter(|| {
            let mut sum = 0u32;
            for y in 0..64 {
                for x in 0..64 {
                    sum = sum.wrapping_add(off.pixel_address(black_box(x), y));
                }
            }
            black_box(sum);
        });
    });

    group.finish();
}

fn bench_write_image(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_image");

    for (psm, dsax) in [(Psm::Ct32, 0), (Psm::Ct32, 3), (Psm::Ct16, 0), (Psm::T8, 0), (Psm::Ct24, 0)] {
        let (w, h) = (256u32, 256u32);
        let bytes = (w * h * psm.info().trbpp / 8) as usize;
        let src = vec![0x5au8; bytes];
        let bitbltbuf = BitBltBuf {
            dbw: 8,
            dpsm: psm.id(),
            ..Default::default()
        };
        let trxpos = TrxPos {
            dsax,
            ..Default::default()
        };
        let trxreg = TrxReg { rrw: w, rrh: h };
        let mut mem = LocalMemory::new(&Config::default()).unwrap();

        group.throughput(Throughput::Bytes(bytes as u64));
        group.bench_function(BenchmarkId::new(format!("{psm:?}"), dsax), |b| {
            b.iter(|| {
                let mut cursor = TransferCursor::for_write(&trxpos);
                mem.write_image(&mut cursor, black_box(&src), &bitbltbuf, &trxpos, &trxreg);
                black_box(cursor);
            });
        });
    }

    group.finish();
}

fn bench_read_texture(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_texture");
    let mem = LocalMemory::new(&Config::default()).unwrap();

    for (psm, rect) in [
        (Psm::Ct32, Rect::new(0, 0, 256, 256)),
        (Psm::Ct32, Rect::new(3, 5, 250, 251)),
        (Psm::T8, Rect::new(0, 0, 256, 256)),
    ] {
        let off = mem.get_offset(0, 4, psm.id());
        let pitch = rect.width() as usize * 4;
        let mut dst = vec![0u8; pitch * rect.height() as usize];

        group.throughput(Throughput::Bytes(dst.len() as u64));
        group.bench_function(format!("{psm:?} {}x{}+{}+{}", rect.width(), rect.height(), rect.left, rect.top), |b| {
            b.iter(|| {
                mem.read_texture(&off, &rect, &mut dst, pitch, &Texa::default());
                black_box(&dst);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pixel_address, bench_write_image, bench_read_texture);
criterion_main!(benches);
