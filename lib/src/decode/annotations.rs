use crate::decode::constants::Pool;
use crate::jvm::class_file::{
    AnnotationInfo, ConstantsReader, ElementValue, TypeAnnotationInfo, TypePathEntry,
};
use crate::jvm::{Error, UNKNOWN_CLASS};
use crate::model::{Annotation, AnnotationValue, TypeAnnotation};
use std::fmt::Write;

pub fn annotation(pool: &Pool, info: &AnnotationInfo, visible: bool) -> Result<Annotation, Error> {
    let values = info
        .element_value_pairs
        .iter()
        .map(|pair| {
            let name = pool.utf8(pair.name)?.to_owned();
            Ok((name, element_value(pool, &pair.value, visible)?))
        })
        .collect::<Result<_, Error>>()?;
    Ok(Annotation {
        descriptor: pool.utf8(info.type_index)?.to_owned(),
        visible,
        values,
    })
}

pub fn annotations(
    pool: &Pool,
    infos: &[AnnotationInfo],
    visible: bool,
) -> Result<Vec<Annotation>, Error> {
    infos
        .iter()
        .map(|info| annotation(pool, info, visible))
        .collect()
}

pub fn element_value(
    pool: &Pool,
    value: &ElementValue,
    visible: bool,
) -> Result<AnnotationValue, Error> {
    let value = match value {
        ElementValue::Const { tag, value } => match tag {
            b'B' => AnnotationValue::Byte(pool.integer(*value)? as i8),
            b'C' => AnnotationValue::Char(pool.integer(*value)? as u16),
            b'D' => AnnotationValue::Double(pool.double(*value)?),
            b'F' => AnnotationValue::Float(pool.float(*value)?),
            b'I' => AnnotationValue::Int(pool.integer(*value)?),
            b'J' => AnnotationValue::Long(pool.long(*value)?),
            b'S' => AnnotationValue::Short(pool.integer(*value)? as i16),
            b'Z' => AnnotationValue::Boolean(pool.integer(*value)? != 0),
            b's' => {
                let utf8 = crate::jvm::class_file::Utf8ConstantIndex(*value);
                AnnotationValue::String(pool.utf8(utf8)?.to_owned())
            }
            other => {
                let msg = format!("invalid element value tag {:?}", *other as char);
                return Err(Error::malformed(UNKNOWN_CLASS, msg));
            }
        },
        ElementValue::Enum {
            type_name,
            const_name,
        } => AnnotationValue::Enum {
            descriptor: pool.utf8(*type_name)?.to_owned(),
            value: pool.utf8(*const_name)?.to_owned(),
        },
        ElementValue::Class(class) => AnnotationValue::Class(pool.utf8(*class)?.to_owned()),
        ElementValue::Annotation(nested) => {
            AnnotationValue::Annotation(annotation(pool, nested, visible)?)
        }
        ElementValue::Array(values) => AnnotationValue::Array(
            values
                .iter()
                .map(|value| element_value(pool, value, visible))
                .collect::<Result<_, _>>()?,
        ),
    };
    Ok(value)
}

pub fn type_annotations(
    pool: &Pool,
    infos: &[TypeAnnotationInfo],
    visible: bool,
) -> Result<Vec<TypeAnnotation>, Error> {
    infos
        .iter()
        .map(|info| {
            Ok(TypeAnnotation {
                type_ref: info.type_ref,
                type_path: render_type_path(&info.type_path)?,
                annotation: annotation(pool, &info.annotation, visible)?,
            })
        })
        .collect()
}

/// Render a type path the way `java.lang.reflect`-style tools print it
pub fn render_type_path(entries: &[TypePathEntry]) -> Result<String, Error> {
    let mut path = String::new();
    for entry in entries {
        match entry.kind {
            0 => path.push('['),
            1 => path.push('.'),
            2 => path.push('*'),
            3 => {
                let _ = write!(path, "{};", entry.argument_index);
            }
            other => {
                let msg = format!("invalid type path kind {}", other);
                return Err(Error::malformed(UNKNOWN_CLASS, msg));
            }
        }
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_paths() {
        let entries = [
            TypePathEntry {
                kind: 0,
                argument_index: 0,
            },
            TypePathEntry {
                kind: 3,
                argument_index: 12,
            },
            TypePathEntry {
                kind: 2,
                argument_index: 0,
            },
            TypePathEntry {
                kind: 1,
                argument_index: 0,
            },
        ];
        assert_eq!(render_type_path(&entries).unwrap(), "[12;*.");
        let bad = [TypePathEntry {
            kind: 4,
            argument_index: 0,
        }];
        assert!(render_type_path(&bad).is_err());
    }
}
