use crate::jvm::class_file::HandleKind;

/// Loadable constant, as used by `ldc` and as bootstrap method arguments
#[derive(Debug, Clone)]
pub enum Constant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),

    /// Class literal: an internal name (`java/lang/String`) or an array descriptor (`[I`)
    Class(String),
    MethodType(String),
    MethodHandle(Handle),
    Dynamic(Box<DynamicConstant>),
}

impl Constant {
    /// Number of stack slots the constant takes up once loaded
    pub fn width(&self) -> u16 {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            Constant::Dynamic(dynamic) if dynamic.descriptor == "J" || dynamic.descriptor == "D" => {
                2
            }
            _ => 1,
        }
    }
}

impl PartialEq for Constant {
    fn eq(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Int(x), Constant::Int(y)) => x == y,
            (Constant::Long(x), Constant::Long(y)) => x == y,
            (Constant::Float(x), Constant::Float(y)) => x.to_bits() == y.to_bits(),
            (Constant::Double(x), Constant::Double(y)) => x.to_bits() == y.to_bits(),
            (Constant::String(x), Constant::String(y)) => x == y,
            (Constant::Class(x), Constant::Class(y)) => x == y,
            (Constant::MethodType(x), Constant::MethodType(y)) => x == y,
            (Constant::MethodHandle(x), Constant::MethodHandle(y)) => x == y,
            (Constant::Dynamic(x), Constant::Dynamic(y)) => x == y,
            _ => false,
        }
    }
}

impl Eq for Constant {}

/// Method handle constant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    pub kind: HandleKind,
    pub owner: String,
    pub name: String,
    pub descriptor: String,

    /// Is the owner an interface? (only meaningful for method handles)
    pub interface: bool,
}

/// Dynamically computed constant (`CONSTANT_Dynamic`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicConstant {
    pub name: String,
    pub descriptor: String,
    pub bootstrap: Handle,
    pub arguments: Vec<Constant>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_compare_by_bits() {
        assert_eq!(Constant::Float(f32::NAN), Constant::Float(f32::NAN));
        assert_ne!(Constant::Double(0.0), Constant::Double(-0.0));
        assert_ne!(Constant::Int(1), Constant::Long(1));
    }

    #[test]
    fn wide_constants() {
        assert_eq!(Constant::Long(1).width(), 2);
        assert_eq!(Constant::String("x".into()).width(), 1);
        let dynamic = DynamicConstant {
            name: "_".into(),
            descriptor: "D".into(),
            bootstrap: Handle {
                kind: HandleKind::InvokeStatic,
                owner: "Boot".into(),
                name: "bsm".into(),
                descriptor: "()D".into(),
                interface: false,
            },
            arguments: vec![],
        };
        assert_eq!(Constant::Dynamic(Box::new(dynamic)).width(), 2);
    }
}
