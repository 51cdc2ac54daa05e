use crate::jvm::opcodes;
use crate::model::{Constant, Handle, Label};

/// Bytecode instruction with a canonical opcode
///
/// Opcodes with a short form (`iload_0`, `ldc_w`, `ldc2_w`, `goto_w`, `jsr_w`, `wide`) never
/// appear here: they get folded into their generic opcode when reading code and are chosen again
/// when writing it. The label type is a parameter so that code readers can use raw offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction<L = Label> {
    /// Instruction without operands
    Simple(u8),

    /// `bipush`, `sipush`, or `newarray`
    Int { opcode: u8, operand: i32 },

    /// Loads, stores, and `ret`
    Var { opcode: u8, index: u16 },

    IInc { index: u16, increment: i16 },

    /// `new`, `anewarray`, `checkcast`, or `instanceof`
    Type { opcode: u8, class: String },

    Field {
        opcode: u8,
        owner: String,
        name: String,
        descriptor: String,
    },

    Method {
        opcode: u8,
        owner: String,
        name: String,
        descriptor: String,
        interface: bool,
    },

    InvokeDynamic {
        name: String,
        descriptor: String,
        bootstrap: Handle,
        arguments: Vec<Constant>,
    },

    /// Conditional and unconditional jumps (including `jsr`)
    Jump { opcode: u8, target: L },

    Ldc(Constant),

    TableSwitch {
        min: i32,
        max: i32,
        default: L,
        targets: Vec<L>,
    },

    LookupSwitch {
        default: L,
        keys: Vec<i32>,
        targets: Vec<L>,
    },

    MultiANewArray { descriptor: String, dimensions: u8 },
}

impl<L> Instruction<L> {
    pub fn opcode(&self) -> u8 {
        match self {
            Instruction::Simple(opcode)
            | Instruction::Int { opcode, .. }
            | Instruction::Var { opcode, .. }
            | Instruction::Type { opcode, .. }
            | Instruction::Field { opcode, .. }
            | Instruction::Method { opcode, .. }
            | Instruction::Jump { opcode, .. } => *opcode,
            Instruction::IInc { .. } => opcodes::IINC,
            Instruction::InvokeDynamic { .. } => opcodes::INVOKEDYNAMIC,
            Instruction::Ldc(_) => opcodes::LDC,
            Instruction::TableSwitch { .. } => opcodes::TABLESWITCH,
            Instruction::LookupSwitch { .. } => opcodes::LOOKUPSWITCH,
            Instruction::MultiANewArray { .. } => opcodes::MULTIANEWARRAY,
        }
    }

    /// Labels this instruction may jump to
    pub fn targets(&self) -> Vec<&L> {
        match self {
            Instruction::Jump { target, .. } => vec![target],
            Instruction::TableSwitch {
                default, targets, ..
            }
            | Instruction::LookupSwitch {
                default, targets, ..
            } => std::iter::once(default).chain(targets).collect(),
            _ => vec![],
        }
    }

    /// Replace every label in the instruction
    pub fn map_labels<M, E>(
        self,
        mut f: impl FnMut(L) -> Result<M, E>,
    ) -> Result<Instruction<M>, E> {
        let insn = match self {
            Instruction::Simple(opcode) => Instruction::Simple(opcode),
            Instruction::Int { opcode, operand } => Instruction::Int { opcode, operand },
            Instruction::Var { opcode, index } => Instruction::Var { opcode, index },
            Instruction::IInc { index, increment } => Instruction::IInc { index, increment },
            Instruction::Type { opcode, class } => Instruction::Type { opcode, class },
            Instruction::Field {
                opcode,
                owner,
                name,
                descriptor,
            } => Instruction::Field {
                opcode,
                owner,
                name,
                descriptor,
            },
            Instruction::Method {
                opcode,
                owner,
                name,
                descriptor,
                interface,
            } => Instruction::Method {
                opcode,
                owner,
                name,
                descriptor,
                interface,
            },
            Instruction::InvokeDynamic {
                name,
                descriptor,
                bootstrap,
                arguments,
            } => Instruction::InvokeDynamic {
                name,
                descriptor,
                bootstrap,
                arguments,
            },
            Instruction::Jump { opcode, target } => Instruction::Jump {
                opcode,
                target: f(target)?,
            },
            Instruction::Ldc(constant) => Instruction::Ldc(constant),
            Instruction::TableSwitch {
                min,
                max,
                default,
                targets,
            } => Instruction::TableSwitch {
                min,
                max,
                default: f(default)?,
                targets: targets.into_iter().map(&mut f).collect::<Result<_, _>>()?,
            },
            Instruction::LookupSwitch {
                default,
                keys,
                targets,
            } => Instruction::LookupSwitch {
                default: f(default)?,
                keys,
                targets: targets.into_iter().map(&mut f).collect::<Result<_, _>>()?,
            },
            Instruction::MultiANewArray {
                descriptor,
                dimensions,
            } => Instruction::MultiANewArray {
                descriptor,
                dimensions,
            },
        };
        Ok(insn)
    }
}

/// Stack map frame, in the compressed form used by the `StackMapTable` attribute
///
/// The frame applies to the instruction that follows it in the method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame<L = Label> {
    /// Same locals as the previous frame, empty stack
    Same,

    /// Same locals as the previous frame, one stack item
    SameLocals1StackItem(VerificationType<L>),

    /// Previous frame without the last `1..=3` locals, empty stack
    Chop(u8),

    /// Previous frame with `1..=3` extra locals, empty stack
    Append(Vec<VerificationType<L>>),

    Full {
        locals: Vec<VerificationType<L>>,
        stack: Vec<VerificationType<L>>,
    },
}

impl<L> Frame<L> {
    pub fn map_labels<M, E>(self, mut f: impl FnMut(L) -> Result<M, E>) -> Result<Frame<M>, E> {
        let mut map_all = |types: Vec<VerificationType<L>>| -> Result<Vec<VerificationType<M>>, E> {
            types.into_iter().map(|t| t.map_labels(&mut f)).collect()
        };
        let frame = match self {
            Frame::Same => Frame::Same,
            Frame::SameLocals1StackItem(typ) => {
                let mut mapped = map_all(vec![typ])?;
                match mapped.pop() {
                    Some(typ) => Frame::SameLocals1StackItem(typ),
                    None => Frame::Same,
                }
            }
            Frame::Chop(k) => Frame::Chop(k),
            Frame::Append(locals) => Frame::Append(map_all(locals)?),
            Frame::Full { locals, stack } => Frame::Full {
                locals: map_all(locals)?,
                stack: map_all(stack)?,
            },
        };
        Ok(frame)
    }

    pub fn types(&self) -> Vec<&VerificationType<L>> {
        match self {
            Frame::Same | Frame::Chop(_) => vec![],
            Frame::SameLocals1StackItem(typ) => vec![typ],
            Frame::Append(locals) => locals.iter().collect(),
            Frame::Full { locals, stack } => locals.iter().chain(stack).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationType<L = Label> {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,

    /// Internal name or array descriptor
    Object(String),

    /// Object created by the `new` instruction at the label
    Uninitialized(L),
}

impl<L> VerificationType<L> {
    pub fn map_labels<M, E>(
        self,
        mut f: impl FnMut(L) -> Result<M, E>,
    ) -> Result<VerificationType<M>, E> {
        let typ = match self {
            VerificationType::Top => VerificationType::Top,
            VerificationType::Integer => VerificationType::Integer,
            VerificationType::Float => VerificationType::Float,
            VerificationType::Double => VerificationType::Double,
            VerificationType::Long => VerificationType::Long,
            VerificationType::Null => VerificationType::Null,
            VerificationType::UninitializedThis => VerificationType::UninitializedThis,
            VerificationType::Object(class) => VerificationType::Object(class),
            VerificationType::Uninitialized(label) => VerificationType::Uninitialized(f(label)?),
        };
        Ok(typ)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[test]
    fn canonical_opcodes() {
        let ldc: Instruction = Instruction::Ldc(Constant::Long(3));
        assert_eq!(ldc.opcode(), opcodes::LDC);
        let iinc: Instruction = Instruction::IInc {
            index: 300,
            increment: -1,
        };
        assert_eq!(iinc.opcode(), opcodes::IINC);
    }

    #[test]
    fn relabel_switch() {
        let switch: Instruction<u32> = Instruction::LookupSwitch {
            default: 40,
            keys: vec![1, 5],
            targets: vec![20, 30],
        };
        assert_eq!(switch.targets(), vec![&40, &20, &30]);
        let relabeled = switch
            .map_labels(|offset| Ok::<_, Infallible>(Label(offset / 10)))
            .unwrap();
        assert_eq!(
            relabeled,
            Instruction::LookupSwitch {
                default: Label(4),
                keys: vec![1, 5],
                targets: vec![Label(2), Label(3)],
            }
        );
    }

    #[test]
    fn relabel_frame() {
        let frame: Frame<u32> = Frame::Full {
            locals: vec![VerificationType::Uninitialized(7), VerificationType::Integer],
            stack: vec![VerificationType::Object("java/lang/String".into())],
        };
        let relabeled = frame.map_labels(|offset| Ok::<_, ()>(Label(offset))).unwrap();
        assert_eq!(relabeled.types()[0], &VerificationType::Uninitialized(Label(7)));
    }
}
