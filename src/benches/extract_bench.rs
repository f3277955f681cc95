#[macro_use]
extern crate criterion;
extern crate olecarve;

use criterion::{Criterion, Throughput, black_box};
use olecarve::{FormExtractor, OfficeArtParser};

fn record(ver_inst: u16, record_type: u16, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + content.len());
    out.extend_from_slice(&ver_inst.to_le_bytes());
    out.extend_from_slice(&record_type.to_le_bytes());
    out.extend_from_slice(&(content.len() as u32).to_le_bytes());
    out.extend_from_slice(content);
    out
}

fn picture_element(records: &[u8]) -> Vec<u8> {
    let mut body = 0x44u16.to_le_bytes().to_vec();
    body.extend_from_slice(&0x64u16.to_le_bytes());
    body.extend_from_slice(&[0u8; 58]);
    body.extend_from_slice(&0u16.to_le_bytes());
    body.extend_from_slice(records);

    let mut out = ((body.len() + 4) as u32).to_le_bytes().to_vec();
    out.extend(body);
    out
}

/// 200 picture elements, each a shape container followed by a PNG entry of a few kilobytes.
fn graphics_stream() -> Vec<u8> {
    let mut stream = Vec::new();
    for i in 0..200u32 {
        let mut blip = vec![0x5A; 16];
        blip.push(0xFF);
        blip.extend((0..(2048 + i * 16)).map(|b| b as u8));
        let blip = record(0x6E0 << 4, 0xF01E, &blip);

        let mut fbse = vec![0u8; 36];
        fbse.extend(blip);

        let mut records = record(0x000F, 0xF004, &record(0x0012, 0xF00B, &[0u8; 12]));
        records.extend(record(0x0062, 0xF007, &fbse));
        stream.extend(picture_element(&records));
    }
    stream
}

fn site(name: &str, id: u32, cache_index: u16, size: u32) -> Vec<u8> {
    let mut body = (0x1u32 | 0x4 | 0x20 | 0x80).to_le_bytes().to_vec();
    body.extend_from_slice(&(0x8000_0000 | name.len() as u32).to_le_bytes());
    body.extend_from_slice(&id.to_le_bytes());
    body.extend_from_slice(&size.to_le_bytes());
    body.extend_from_slice(&cache_index.to_le_bytes());
    body.extend_from_slice(&[0, 0]);
    body.extend_from_slice(name.as_bytes());
    while (body.len() - 4) % 4 != 0 {
        body.push(0);
    }

    let mut out = 0u16.to_le_bytes().to_vec();
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend(body);
    out
}

fn wide(text: &str) -> Vec<u8> {
    text.bytes().flat_map(|b| [b, 0]).collect()
}

fn inkedit_data() -> Vec<u8> {
    let mut out = Vec::new();
    for v in [2i16, 0] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for v in [0i32, 505, 0, 0, 3900, 1040, i32::MIN + 5, 1, 1, 0, 2, 0, 2000] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for v in [0i16; 4] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&(-1i16).to_le_bytes());
    out.extend_from_slice(&0i16.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0i16.to_le_bytes());
    out.extend_from_slice(&[0u8; 6]);

    let factorid = wide("DEFAULT");
    out.extend_from_slice(&(factorid.len() as i32).to_le_bytes());
    out.extend(factorid);
    out.extend_from_slice(&0i32.to_le_bytes());

    let mut font = vec![0x01, 0x00, 0x00, 0x00, 0x90, 0x01, 0xF8, 0x24, 0x01, 0x00, 0x0D];
    font.extend_from_slice(b"MS Sans Serif");
    out.extend_from_slice(&(font.len() as i32).to_le_bytes());
    out.extend(font);

    let rtf = wide("{\\rtf1\\ansi\\deff0{\\fonttbl{\\f0\\fnil MS Sans Serif;}}\r\n\\pard\\f0\\fs16 InkEdit1\\par\r\n}\r\n");
    out.extend_from_slice(&(rtf.len() as i32).to_le_bytes());
    out.extend(rtf);
    out
}

/// A form with 50 InkEdit sites.
fn form_streams() -> (Vec<u8>, Vec<u8>) {
    let data = inkedit_data();
    let clsid = [
        0xF5, 0x59, 0xCA, 0xE5, 0xC4, 0x57, 0xD8, 0x4D, 0x9B, 0xD6, 0x1D, 0xEE, 0xED, 0xD2, 0x7A,
        0xF4,
    ];

    let mut f = vec![0x00, 0x04];
    f.extend_from_slice(&4u16.to_le_bytes());
    f.extend_from_slice(&0u32.to_le_bytes());

    f.extend_from_slice(&1u16.to_le_bytes());
    f.extend_from_slice(&0u16.to_le_bytes());
    f.extend_from_slice(&20u16.to_le_bytes());
    f.extend_from_slice(&1u32.to_le_bytes());
    f.extend_from_slice(&clsid);

    let count = 50u32;
    let mut site_data = Vec::new();
    for _ in 0..count {
        site_data.extend_from_slice(&[0, 1]);
    }
    while site_data.len() % 4 != 0 {
        site_data.push(0);
    }
    let mut o = Vec::new();
    for i in 0..count {
        site_data.extend(site(&format!("InkEdit{}", i + 1), i + 1, 0x8000, data.len() as u32));
        o.extend_from_slice(&data);
    }
    f.extend_from_slice(&count.to_le_bytes());
    f.extend_from_slice(&(site_data.len() as u32).to_le_bytes());
    f.extend(site_data);

    (f, o)
}

fn criterion_benchmark(c: &mut Criterion) {
    let stream = graphics_stream();
    let mut group = c.benchmark_group("officeart");
    group.throughput(Throughput::Bytes(stream.len() as u64));
    group.bench_function("walk 200 picture elements", |b| {
        b.iter(|| {
            let parser = OfficeArtParser::from_buffer(black_box(&stream));
            assert_eq!(parser.images().filter(Result::is_ok).count(), 200);
        })
    });
    group.finish();

    let (f, o) = form_streams();
    let mut group = c.benchmark_group("forms");
    group.throughput(Throughput::Bytes((f.len() + o.len()) as u64));
    group.bench_function("extract 50 InkEdit controls", |b| {
        let mut extractor = FormExtractor::new();
        b.iter(|| {
            let extraction = extractor
                .extract(black_box(&f), black_box(&o))
                .expect("form definition");
            assert!(extraction.warnings.is_empty());
        })
    });
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
