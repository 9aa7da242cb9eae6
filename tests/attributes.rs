use ndarray::arr1;
use stepio::prelude::*;

fn write_with_attributes(b: &MemoryBackend) {
    let mut f = File::open(b, "attrs.bp", Mode::Write).unwrap();

    {
        let mut attrs = f.attrs_mut();
        attrs.set("title", "test container").unwrap();
        attrs.set("version", 2u32).unwrap();
        attrs.set("version", 2u32).unwrap();
    }

    f.next_step(|s| s.write("temp", &arr1(&[271.5f32, 272.0])))
        .unwrap();

    {
        let mut attrs = f.variable_attrs_mut("temp");
        attrs.set("units", "K").unwrap();
        attrs.set("valid_range", [200.0f32, 350.0]).unwrap();
        attrs.set("flags", vec!["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(attrs.as_attrs().len(), 3);
    }

    // Not yet defined variable
    f.variable_attrs_mut("later").set("units", "m").unwrap();

    f.close().unwrap();
}

#[test]
fn container_attributes() {
    let b = MemoryBackend::new();
    write_with_attributes(&b);

    let f = File::open(&b, "attrs.bp", Mode::ReadRandomAccess).unwrap();
    let attrs = f.attrs();
    assert_eq!(attrs.variable(), None);
    assert_eq!(attrs.keys().collect::<Vec<_>>(), ["title", "version"]);
    assert_eq!(attrs.get("title").unwrap().as_str(), Some("test container"));
    assert_eq!(attrs.get("version").unwrap().value::<u32>(), Some(2));
    assert!(!attrs.contains("units"));
    assert!(matches!(attrs.get("units"), Err(Error::NotFound(_))));
}

#[test]
fn variable_attributes() {
    let b = MemoryBackend::new();
    write_with_attributes(&b);

    let f = File::open(&b, "attrs.bp", Mode::ReadRandomAccess).unwrap();
    let attrs = f.variable("temp").unwrap().attrs();
    assert_eq!(attrs.variable(), Some("temp"));
    assert_eq!(attrs.len(), 3);

    let all: Vec<(&str, Attribute)> = attrs.iter().collect::<Result<_>>().unwrap();
    for (k, v) in &all {
        println!("{k}: {v:?}");
    }
    assert_eq!(all[0], ("flags", Attribute::from(&["a", "b"][..])));
    assert_eq!(
        attrs.get("valid_range").unwrap().values::<f32>(),
        Some(&[200.0f32, 350.0][..])
    );
    assert_eq!(attrs.get("units").unwrap(), Attribute::from("K"));
    assert_eq!(attrs.get("units").unwrap().dtype(), None);
}

#[test]
fn attributes_are_read_only_when_reading() {
    let b = MemoryBackend::new();
    write_with_attributes(&b);

    let mut f = File::open(&b, "attrs.bp", Mode::Read).unwrap();
    assert!(matches!(
        f.attrs_mut().set("title", "other"),
        Err(Error::InvalidMode(_))
    ));
    assert_eq!(
        f.attrs_mut().get("title").unwrap().as_str(),
        Some("test container")
    );

    let n = f.next_step(|s| Ok(s.attrs().len())).unwrap();
    assert_eq!(n, 2);
}
