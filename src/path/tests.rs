use super::AssetPath;

#[test]
fn parses_full_form() {
    let p = AssetPath::new("engine//test/sub/A.obj");
    assert_eq!(p.domain(), "engine");
    assert_eq!(p.scope(), "test/sub");
    assert_eq!(p.scoped_name(), "test/sub/A.obj");
    assert_eq!(p.name(), "A.obj");
    assert_eq!(p.extension(), "obj");
}

#[test]
fn strips_leading_slash_and_normalises_backslashes() {
    let p = AssetPath::new("/engine\\\\test\\A.obj".replace("\\\\", "\\").as_str());
    assert_eq!(p.domain(), "engine");
    assert_eq!(p.name(), "A.obj");
}

#[test]
fn no_scope_segments() {
    let p = AssetPath::new("engine//A.obj");
    assert_eq!(p.domain(), "engine");
    assert_eq!(p.scope(), "");
    assert_eq!(p.name(), "A.obj");
}

#[test]
fn no_separator_at_all() {
    let p = AssetPath::new("just/a/name.obj");
    assert_eq!(p.domain(), "");
    assert_eq!(p.scope(), "just/a");
    assert_eq!(p.name(), "name.obj");
    assert_eq!(p.extension(), "obj");
}

#[test]
fn no_extension() {
    let p = AssetPath::new("engine//name");
    assert_eq!(p.extension(), "");
    assert_eq!(p.name(), "name");
}

#[test]
fn case_insensitive_equality_and_hash() {
    let a = AssetPath::new("Engine//Test/A.OBJ");
    let b = AssetPath::new("engine//test/a.obj");
    assert_eq!(a, b);

    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut ha = DefaultHasher::new();
    a.hash(&mut ha);
    let mut hb = DefaultHasher::new();
    b.hash(&mut hb);
    assert_eq!(ha.finish(), hb.finish());
}
