//! Tree model example: read a document into tags, edit it, write it back.

use adaptive_xml::{Marshaller, QName, SimpleTag, Unmarshaller, WriterConfig, IndentConfig};

fn main() {
    let xml_input = r#"<?xml version="1.0" encoding="UTF-8"?>
        <catalog xmlns:p="http://example.com/pricing" edition="2">
            <title>Spring catalog</title>
            <item sku="A-1">
                <name>Lamp</name>
                <p:price currency="EUR">19.90</p:price>
            </item>
            <item sku="B-7">
                <name>Chair</name>
                <p:price currency="EUR">49.00</p:price>
            </item>
        </catalog>
    "#;

    let document = Unmarshaller::new()
        .tree_model_from_str(xml_input)
        .expect("Failed to read tree model");
    let catalog = document.root().expect("Document has no root");

    println!("Root: {}", catalog.name());
    println!("Edition: {:?}", catalog.attribute(&QName::local("edition")));
    println!("Children in document order:");
    for child in catalog.children() {
        println!("  {} (simple: {})", child.name(), child.is_simple());
    }

    let price_name = QName::new("http://example.com/pricing", "price");
    for item in catalog
        .all_composite_tags_by_name(&QName::local("item"))
        .expect("Invalid name")
    {
        let price = item
            .simple_tag_by_name(&price_name)
            .expect("Invalid name")
            .expect("Item without a price");
        println!(
            "  {:?} costs {} {:?}",
            item.attribute(&QName::local("sku")),
            price.value(),
            price.attribute(&QName::local("currency"))
        );
    }

    // Edit the tree and write it back out, indented
    catalog
        .add_tag(SimpleTag::with_value("note", "Prices include VAT & shipping").into())
        .expect("Failed to add tag");

    let marshaller = Marshaller::new().with_config(WriterConfig::new().with_indent(IndentConfig::default()));
    let xml = marshaller
        .tree_model_to_string(&document)
        .expect("Failed to write tree model");
    println!();
    println!("Edited document:");
    println!("{}", xml);
}
