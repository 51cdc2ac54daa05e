use crate::jvm::class_file::{
    AnnotationInfo, ConstantsPool, ElementValue, ElementValuePair, TypeAnnotationInfo,
    TypePathEntry,
};
use crate::jvm::{Error, UNKNOWN_CLASS};
use crate::model::{Annotation, AnnotationValue, TypeAnnotation};

pub fn annotation(pool: &mut ConstantsPool, annotation: &Annotation) -> Result<AnnotationInfo, Error> {
    let type_index = pool.get_utf8(&annotation.descriptor)?;
    let mut element_value_pairs = Vec::with_capacity(annotation.values.len());
    for (name, value) in &annotation.values {
        element_value_pairs.push(ElementValuePair {
            name: pool.get_utf8(name)?,
            value: element_value(pool, value)?,
        });
    }
    Ok(AnnotationInfo {
        type_index,
        element_value_pairs,
    })
}

/// Split annotations into their visible and invisible attribute payloads
pub fn annotations<'a>(
    pool: &mut ConstantsPool,
    annotations: impl IntoIterator<Item = &'a Annotation>,
) -> Result<(Vec<AnnotationInfo>, Vec<AnnotationInfo>), Error> {
    let mut visible = vec![];
    let mut invisible = vec![];
    for annot in annotations {
        let info = annotation(pool, annot)?;
        if annot.visible {
            visible.push(info);
        } else {
            invisible.push(info);
        }
    }
    Ok((visible, invisible))
}

pub fn element_value(pool: &mut ConstantsPool, value: &AnnotationValue) -> Result<ElementValue, Error> {
    let value = match value {
        AnnotationValue::Byte(b) => ElementValue::Const {
            tag: b'B',
            value: pool.get_integer(*b as i32)?,
        },
        AnnotationValue::Char(c) => ElementValue::Const {
            tag: b'C',
            value: pool.get_integer(*c as i32)?,
        },
        AnnotationValue::Double(d) => ElementValue::Const {
            tag: b'D',
            value: pool.get_double(*d)?,
        },
        AnnotationValue::Float(f) => ElementValue::Const {
            tag: b'F',
            value: pool.get_float(*f)?,
        },
        AnnotationValue::Int(i) => ElementValue::Const {
            tag: b'I',
            value: pool.get_integer(*i)?,
        },
        AnnotationValue::Long(l) => ElementValue::Const {
            tag: b'J',
            value: pool.get_long(*l)?,
        },
        AnnotationValue::Short(s) => ElementValue::Const {
            tag: b'S',
            value: pool.get_integer(*s as i32)?,
        },
        AnnotationValue::Boolean(z) => ElementValue::Const {
            tag: b'Z',
            value: pool.get_integer(*z as i32)?,
        },
        AnnotationValue::String(s) => ElementValue::Const {
            tag: b's',
            value: pool.get_utf8(s)?.0,
        },
        AnnotationValue::Enum { descriptor, value } => ElementValue::Enum {
            type_name: pool.get_utf8(descriptor)?,
            const_name: pool.get_utf8(value)?,
        },
        AnnotationValue::Class(class) => ElementValue::Class(pool.get_utf8(class)?),
        AnnotationValue::Annotation(nested) => ElementValue::Annotation(annotation(pool, nested)?),
        AnnotationValue::Array(values) => ElementValue::Array(
            values
                .iter()
                .map(|value| element_value(pool, value))
                .collect::<Result<_, _>>()?,
        ),
    };
    Ok(value)
}

/// Split type annotations into their visible and invisible attribute payloads
pub fn type_annotations(
    pool: &mut ConstantsPool,
    annotations: &[TypeAnnotation],
) -> Result<(Vec<TypeAnnotationInfo>, Vec<TypeAnnotationInfo>), Error> {
    let mut visible = vec![];
    let mut invisible = vec![];
    for annot in annotations {
        let info = TypeAnnotationInfo {
            type_ref: annot.type_ref,
            type_path: parse_type_path(&annot.type_path)?,
            annotation: annotation(pool, &annot.annotation)?,
        };
        if annot.annotation.visible {
            visible.push(info);
        } else {
            invisible.push(info);
        }
    }
    Ok((visible, invisible))
}

/// Parse a type path rendered as `[`, `.`, `*`, and `N;` steps
pub fn parse_type_path(path: &str) -> Result<Vec<TypePathEntry>, Error> {
    let invalid = || Error::malformed(UNKNOWN_CLASS, format!("invalid type path '{}'", path));
    let mut entries = vec![];
    let mut chars = path.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        let (kind, argument_index) = match c {
            '[' => (0, 0),
            '.' => (1, 0),
            '*' => (2, 0),
            '0'..='9' => {
                let mut end = start + 1;
                loop {
                    match chars.next() {
                        Some((_, d)) if d.is_ascii_digit() => end += 1,
                        Some((_, ';')) => break,
                        _ => return Err(invalid()),
                    }
                }
                let index: u8 = path[start..end].parse().map_err(|_| invalid())?;
                (3, index)
            }
            _ => return Err(invalid()),
        };
        entries.push(TypePathEntry {
            kind,
            argument_index,
        });
    }
    if entries.len() > u8::MAX as usize {
        return Err(invalid());
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_paths() {
        let entries = parse_type_path("[12;*.").unwrap();
        let kinds: Vec<(u8, u8)> = entries
            .iter()
            .map(|entry| (entry.kind, entry.argument_index))
            .collect();
        assert_eq!(kinds, vec![(0, 0), (3, 12), (2, 0), (1, 0)]);
        assert!(parse_type_path("").unwrap().is_empty());
    }

    #[test]
    fn bad_type_paths() {
        assert!(parse_type_path("3").is_err());
        assert!(parse_type_path("300;").is_err());
        assert!(parse_type_path("x").is_err());
    }

    #[test]
    fn visibility_split() {
        let mut pool = ConstantsPool::new();
        let annots = vec![
            Annotation::new("LA;", false),
            Annotation::new("LB;", true),
            Annotation::new("LC;", false),
        ];
        let (visible, invisible) = annotations(&mut pool, &annots).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(invisible.len(), 2);
    }

    #[test]
    fn string_values_use_utf8() {
        let mut pool = ConstantsPool::new();
        let value = element_value(&mut pool, &AnnotationValue::String("hi".into())).unwrap();
        let utf8 = pool.get_utf8("hi").unwrap();
        assert_eq!(
            value,
            ElementValue::Const {
                tag: b's',
                value: utf8.0
            }
        );
    }
}
