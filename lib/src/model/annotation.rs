/// Annotation on a class, field, method, parameter, or record component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Field descriptor of the annotation type (eg. `Ljava/lang/Deprecated;`)
    pub descriptor: String,

    /// Is the annotation retained at runtime?
    pub visible: bool,

    /// Element-value pairs, in declaration order
    pub values: Vec<(String, AnnotationValue)>,
}

impl Annotation {
    pub fn new(descriptor: impl Into<String>, visible: bool) -> Annotation {
        Annotation {
            descriptor: descriptor.into(),
            visible,
            values: vec![],
        }
    }
}

/// Value of an annotation element
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.16.1
#[derive(Debug, Clone)]
pub enum AnnotationValue {
    Byte(i8),
    Char(u16),
    Double(f64),
    Float(f32),
    Int(i32),
    Long(i64),
    Short(i16),
    Boolean(bool),
    String(String),
    Enum { descriptor: String, value: String },

    /// Class literal, as a return descriptor (eg. `Ljava/lang/String;` or `V`)
    Class(String),
    Annotation(Annotation),
    Array(Vec<AnnotationValue>),
}

impl PartialEq for AnnotationValue {
    fn eq(&self, other: &AnnotationValue) -> bool {
        use AnnotationValue::*;
        match (self, other) {
            (Byte(x), Byte(y)) => x == y,
            (Char(x), Char(y)) => x == y,
            (Double(x), Double(y)) => x.to_bits() == y.to_bits(),
            (Float(x), Float(y)) => x.to_bits() == y.to_bits(),
            (Int(x), Int(y)) => x == y,
            (Long(x), Long(y)) => x == y,
            (Short(x), Short(y)) => x == y,
            (Boolean(x), Boolean(y)) => x == y,
            (String(x), String(y)) => x == y,
            (
                Enum {
                    descriptor: d1,
                    value: v1,
                },
                Enum {
                    descriptor: d2,
                    value: v2,
                },
            ) => d1 == d2 && v1 == v2,
            (Class(x), Class(y)) => x == y,
            (Annotation(x), Annotation(y)) => x == y,
            (Array(x), Array(y)) => x == y,
            _ => false,
        }
    }
}

impl Eq for AnnotationValue {}

/// Annotation on a use of a type
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.20
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAnnotation {
    /// Target type in the most significant byte, followed by the target info
    pub type_ref: u32,

    /// Path into the annotated type, written as a sequence of `[` (array element), `.` (nested
    /// type), `*` (wildcard bound), and `N;` (type argument `N`)
    pub type_path: String,
    pub annotation: Annotation,
}
