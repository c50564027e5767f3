use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use csvstream::{CsvConfig, CsvReader};

fn sample(rows: usize) -> String {
    let mut data = String::from("ID,Name,Comment\n");
    for i in 0..rows {
        data.push_str(&format!(
            "{},Name_{},\"quoted, with \"\"escapes\"\"\nand a line break\"\n",
            i, i
        ));
    }
    data
}

fn benchmark_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");

    for size in [1000, 10000, 100000].iter() {
        let data = sample(*size);
        group.throughput(Throughput::Bytes(data.len() as u64));

        group.bench_with_input(BenchmarkId::new("from_text", size), &data, |b, data| {
            b.iter(|| {
                let mut reader = CsvReader::from_text(data, CsvConfig::default());
                while let Some(record) = reader.next_record().unwrap() {
                    black_box(record);
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("from_reader", size), &data, |b, data| {
            b.iter(|| {
                let mut reader = CsvReader::from_reader(data.as_bytes(), CsvConfig::default());
                for record in reader.records() {
                    black_box(record.unwrap());
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_read);
criterion_main!(benches);
