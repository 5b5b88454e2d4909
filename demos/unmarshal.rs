//! Unmarshalling example: convert only the elements you register.

use adaptive_xml::{fn_converter, CompositeTag, ConvertedObjects, Error, QName, Unmarshaller};

#[derive(Debug)]
struct Position {
    id: String,
}

#[derive(Debug)]
struct Employee {
    name: String,
    position: Option<String>,
}

fn main() {
    let xml_input = r#"<?xml version="1.0" encoding="UTF-8"?>
        <company>
            <address><city>Gdansk</city></address>
            <employee>
                <name>Alice</name>
                <position><id type="String">dev-1</id></position>
            </employee>
            <employee>
                <name>Bob</name>
                <position><id type="String">ops-2</id></position>
            </employee>
        </company>
    "#;

    let mut unmarshaller = Unmarshaller::new();
    unmarshaller.register_converter(
        "position",
        fn_converter(|tag: &CompositeTag, _: &ConvertedObjects| {
            let id = tag
                .simple_tag_by_name(&QName::local("id"))?
                .ok_or_else(|| Error::conversion("position without an id"))?;
            Ok(Position { id: id.value() })
        }),
    );
    unmarshaller.register_converter(
        "employee",
        fn_converter(|tag: &CompositeTag, children: &ConvertedObjects| {
            let name = tag
                .simple_tag_by_name(&QName::local("name"))?
                .map(|name| name.value())
                .unwrap_or_default();
            let position = children
                .get::<Position>(&QName::local("position"))
                .map(|position| position.id.clone());
            Ok(Employee { name, position })
        }),
    );

    let mut objects = unmarshaller.unmarshal_str(xml_input).expect("Failed to unmarshal");
    let employees: Vec<Employee> = objects
        .take(&QName::local("employee"))
        .expect("Unexpected value type");

    println!("Converted {} employees:", employees.len());
    for employee in &employees {
        println!("  {:?}", employee);
    }
}
