use xmir::xmir::hex::Data;
use xmir::xmir::names;
use xmir::xmir::CodecError;

#[test]
fn hex_vectors() {
    assert_eq!(Data::Long(10).to_hex(), "00 00 00 00 00 00 00 0A");
    assert_eq!(Data::Int(10).to_hex(), "00 00 00 00 00 00 00 0A");
    assert_eq!(Data::Bool(true).to_hex(), "01");
    assert_eq!(Data::Float(0.1).to_hex(), "3D CC CC CD");
    assert_eq!(Data::from_hex("string", "--").unwrap(), Data::String("".into()));

    for data in [
        Data::Int(-1),
        Data::Short(i16::MIN),
        Data::Char(0xFFFF),
        Data::Double(-0.0),
        Data::String("привет".into()),
        Data::Label("L3".into()),
    ] {
        assert_eq!(Data::from_hex(data.base(), &data.to_hex()).unwrap(), data);
    }
}

#[test]
fn hex_errors_name_the_value() {
    let err = Data::from_hex("bool", "01 02").unwrap_err();
    assert!(err.to_string().contains("01 02"), "{}", err);
    assert!(Data::from_hex("int", "0G").is_err());
    assert!(matches!(
        Data::from_hex("matrix", "00"),
        Err(CodecError::UnknownType(_))
    ));
}

#[test]
fn name_vectors() {
    assert_eq!(names::prefix("org.eolang").unwrap(), "j$org.j$eolang");
    assert_eq!(names::unprefix("j$org.j$eolang"), "org.eolang");
    assert_eq!(names::unprefix("someName"), "someName");
    assert_eq!(names::signature("foo", "()I"), "foo-%28%29I");
    assert_eq!(
        names::split_signature("foo-%28%29I").unwrap(),
        ("foo".to_owned(), "()I".to_owned())
    );
    assert_eq!(names::method_name("<init>"), "object@init@");
    assert_eq!(names::method_name("<clinit>"), "class@clinit@");
    assert_eq!(names::java_method_name("object@init@"), "<init>");
    assert_eq!(names::java_method_name("class@clinit@"), "<clinit>");
    assert_eq!(names::numbered("foo", 1).unwrap(), "foo");
    assert_eq!(names::numbered("foo", 2).unwrap(), "foo-2");
    assert_eq!(names::unnumbered("bar-3").unwrap(), ("bar", 3));
    assert!(names::unnumbered("bar-x").is_err());
    assert_eq!(
        names::numbered("foo", 0).unwrap_err().to_string(),
        "Number must be greater than 0, but was: 0"
    );
}
