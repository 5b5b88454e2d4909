//! Benchmarks for adaptive_xml performance.

use std::hint::black_box;
use std::rc::Rc;
use std::sync::Arc;

use adaptive_xml::{
    escape_text, fn_converter, typed_converter, CompositeTag, ConvertedObjects, ConvertedTags,
    MappingNode, Marshaller, Object, QName, Result, SimpleTag, TextConverter, Unmarshaller,
    Value, WriterConfig, XmlEvent, XmlReader,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

struct Person {
    id: u64,
    name: String,
    email: String,
    phones: Vec<String>,
}

impl Object for Person {
    fn access(&self, accessor: &str) -> Result<Value> {
        match accessor {
            "phones" => Ok(Value::Collection(
                self.phones.iter().cloned().map(Value::object).collect(),
            )),
            _ => Ok(Value::Null),
        }
    }
}

fn person_mapping() -> MappingNode {
    let phone = MappingNode::object(Arc::new(TextConverter::<String>::new("phone")));
    MappingNode::object(typed_converter(|person: &Person, children: &mut ConvertedTags| {
        let tag = CompositeTag::new("person");
        tag.put_attribute(QName::local("id"), person.id.to_string());
        tag.add_tag(SimpleTag::with_value("name", person.name.as_str()).into())?;
        tag.add_tag(SimpleTag::with_value("email", person.email.as_str()).into())?;
        tag.add_tag(children.require("phones")?)?;
        Ok(tag.into())
    }))
    .with_mapping("phones", MappingNode::collection().with_container(phone).unwrap())
    .unwrap()
}

fn people(count: usize) -> Vec<Rc<Person>> {
    (0..count)
        .map(|i| {
            Rc::new(Person {
                id: i as u64,
                name: format!("Person {}", i),
                email: format!("person{}@example.com", i),
                phones: vec![format!("555-{:04}", i), format!("556-{:04}", i)],
            })
        })
        .collect()
}

fn marshaller() -> Marshaller {
    let mut marshaller = Marshaller::new().with_config(WriterConfig::new().with_declaration(false));
    marshaller
        .register_mapping(MappingNode::collection().with_container(person_mapping()).unwrap())
        .unwrap();
    marshaller
}

fn unmarshaller() -> Unmarshaller {
    let mut unmarshaller = Unmarshaller::new();
    unmarshaller.register_converter(
        "person",
        fn_converter(|tag: &CompositeTag, _: &ConvertedObjects| {
            Ok(tag.simple_tag_by_name(&QName::local("name"))?.map(|name| name.value()))
        }),
    );
    unmarshaller
}

fn bench_marshal(c: &mut Criterion) {
    let mut group = c.benchmark_group("Marshal");
    let marshaller = marshaller();

    for size in [1, 10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("people", size), size, |b, &size| {
            b.iter_batched(
                || people(size),
                |data| marshaller.marshal_to_string(black_box(data)).unwrap(),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_unmarshal(c: &mut Criterion) {
    let mut group = c.benchmark_group("Unmarshal");
    let marshaller = marshaller();

    for size in [1, 10, 100, 1000].iter() {
        let xml = marshaller.marshal_to_string(people(*size)).unwrap();
        group.throughput(Throughput::Bytes(xml.len() as u64));

        let mut pooled = unmarshaller();
        group.bench_with_input(BenchmarkId::new("pooled", size), &xml, |b, xml| {
            b.iter(|| pooled.unmarshal_str(black_box(xml)).unwrap())
        });

        let mut fresh = unmarshaller().with_config(adaptive_xml::UnmarshalConfig::new().with_tag_pool(false));
        group.bench_with_input(BenchmarkId::new("unpooled", size), &xml, |b, xml| {
            b.iter(|| fresh.unmarshal_str(black_box(xml)).unwrap())
        });
    }

    group.finish();
}

fn bench_tree_model(c: &mut Criterion) {
    let mut group = c.benchmark_group("TreeModel");
    let xml = marshaller().marshal_to_string(people(100)).unwrap();
    let document = Unmarshaller::new().tree_model_from_str(&xml).unwrap();
    let writer = Marshaller::new();

    group.throughput(Throughput::Bytes(xml.len() as u64));
    group.bench_function("read", |b| {
        b.iter(|| Unmarshaller::new().tree_model_from_str(black_box(&xml)).unwrap())
    });
    group.bench_function("write", |b| {
        b.iter(|| writer.tree_model_to_string(black_box(&document)).unwrap())
    });

    group.finish();
}

fn bench_escape(c: &mut Criterion) {
    let mut group = c.benchmark_group("Escape");

    let no_escape = "This is a simple string with no special characters at all.";
    let some_escape = "This string has <angle brackets> & ampersands.";
    let heavy_escape = "<<<<>>>> &&&&& \"\"\"\" ''''";

    group.bench_function("no_escape", |b| b.iter(|| escape_text(black_box(no_escape))));
    group.bench_function("some_escape", |b| b.iter(|| escape_text(black_box(some_escape))));
    group.bench_function("heavy_escape", |b| b.iter(|| escape_text(black_box(heavy_escape))));

    group.finish();
}

fn bench_xml_reader(c: &mut Criterion) {
    let mut group = c.benchmark_group("XmlReader");

    let xml = r#"<?xml version="1.0"?>
        <root xmlns:x="urn:x">
            <child1 attr="value">Text content</child1>
            <x:child2>
                <nested>Deep text</nested>
            </x:child2>
            <child3/>
        </root>
    "#;

    group.throughput(Throughput::Bytes(xml.len() as u64));
    group.bench_function("parse_events", |b| {
        b.iter(|| {
            let mut reader = XmlReader::from_str(black_box(xml));
            let mut count = 0;
            loop {
                match reader.next_event() {
                    Ok(XmlEvent::Eof) => break,
                    Ok(_) => count += 1,
                    Err(_) => break,
                }
            }
            count
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_marshal,
    bench_unmarshal,
    bench_tree_model,
    bench_escape,
    bench_xml_reader,
);

criterion_main!(benches);
