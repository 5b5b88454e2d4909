//! Marshalling example: an object graph with nested collections and maps.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use adaptive_xml::{
    typed_converter, CompositeTag, ConvertedTags, Dependents, Error, IntoValue, Mapped, Marshaller,
    MarshalConverter, Object, QName, Result, Shape, SimpleTag, Value, WriterConfig, IndentConfig,
};

struct Track {
    title: String,
    seconds: u32,
}

impl Object for Track {
    fn access(&self, accessor: &str) -> Result<Value> {
        Err(Error::conversion(format!("Track has no accessor {}", accessor)))
    }
}

impl Mapped for Track {
    fn converter() -> Arc<dyn MarshalConverter> {
        typed_converter(|track: &Track, _: &mut ConvertedTags| {
            let tag = SimpleTag::with_value("track", track.title.as_str());
            tag.put_attribute(QName::local("seconds"), track.seconds.to_string());
            Ok(tag.into())
        })
    }
}

struct Album {
    name: String,
    tracks: Vec<Rc<Track>>,
    bonus: BTreeMap<String, Rc<Track>>,
}

impl Object for Album {
    fn access(&self, accessor: &str) -> Result<Value> {
        match accessor {
            "tracks" => self.tracks.clone().into_value(),
            "bonus" => self.bonus.clone().into_value(),
            _ => Err(Error::conversion(format!("Album has no accessor {}", accessor))),
        }
    }
}

impl Mapped for Album {
    fn converter() -> Arc<dyn MarshalConverter> {
        typed_converter(|album: &Album, children: &mut ConvertedTags| {
            let tag = CompositeTag::new("album");
            tag.put_attribute(QName::local("name"), album.name.as_str());
            tag.add_tag(children.require("tracks")?)?;
            tag.add_tag(children.require("bonus")?)?;
            Ok(tag.into())
        })
    }

    fn dependents(dependents: &mut Dependents) {
        dependents
            .collection("tracks", Shape::of::<Track>())
            .map("bonus", Shape::of::<Track>());
    }
}

fn track(title: &str, seconds: u32) -> Rc<Track> {
    Rc::new(Track {
        title: title.to_string(),
        seconds,
    })
}

fn main() {
    let album = Album {
        name: "Rust & Roll".to_string(),
        tracks: vec![track("Borrowed Time", 214), track("Lifetime", 187)],
        bonus: BTreeMap::from([("live".to_string(), track("Borrowed Time (Live)", 240))]),
    };

    let mut marshaller = Marshaller::new().with_config(WriterConfig::new().with_indent(IndentConfig::default()));
    marshaller.register::<Album>().expect("Failed to build mapping");

    let xml = marshaller
        .marshal_to_string(Rc::new(album))
        .expect("Failed to marshal");
    println!("Marshalled XML:");
    println!("{}", xml);
}
