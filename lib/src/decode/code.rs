use crate::decode::attributes::Attributes;
use crate::decode::constants::Pool;
use crate::decode::{MethodVisitor, Mode};
use crate::jvm::class_file::{
    Code, ConstantIndex, ConstantsReader, LineNumberTable, LocalVariableTable,
    LocalVariableTypeTable, StackMapFrame, StackMapTable, VerificationTypeInfo,
};
use crate::jvm::opcodes::{self, Family};
use crate::jvm::{Error, UNKNOWN_CLASS};
use crate::model::{Frame, Instruction, Labels, LocalVariable, VerificationType};
use byteorder::{BigEndian, ReadBytesExt};
use std::collections::{BTreeMap, BTreeSet};

const CODE_ATTRIBUTES: &[&str] = &[
    "LineNumberTable",
    "LocalVariableTable",
    "LocalVariableTypeTable",
    "StackMapTable",
];

fn malformed(message: String) -> Error {
    Error::malformed(UNKNOWN_CLASS, message)
}

/// Decode a code array into instructions, keyed by their offset
///
/// Jump targets are left as absolute offsets and are not checked yet.
pub fn read_instructions(
    code: &[u8],
    pool: &Pool,
) -> Result<Vec<(u32, Instruction<u32>)>, Error> {
    let mut instructions = vec![];
    let mut reader: &[u8] = code;
    while !reader.is_empty() {
        let pc = (code.len() - reader.len()) as u32;
        let insn = read_instruction(pc, &mut reader, pool).map_err(|err| match err {
            Error::IoError(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                malformed(format!("truncated instruction at offset {}", pc))
            }
            other => other,
        })?;
        instructions.push((pc, insn));
    }
    Ok(instructions)
}

fn jump_target(pc: u32, offset: i32) -> Result<u32, Error> {
    u32::try_from(pc as i64 + offset as i64)
        .map_err(|_| malformed(format!("jump at offset {} goes before the code start", pc)))
}

fn read_instruction(pc: u32, reader: &mut &[u8], pool: &Pool) -> Result<Instruction<u32>, Error> {
    let opcode = reader.read_u8()?;
    let insn = match opcode {
        opcodes::ILOAD_0..=opcodes::ALOAD_3 => {
            let n = opcode - opcodes::ILOAD_0;
            Instruction::Var {
                opcode: opcodes::ILOAD + n / 4,
                index: (n % 4) as u16,
            }
        }
        opcodes::ISTORE_0..=opcodes::ASTORE_3 => {
            let n = opcode - opcodes::ISTORE_0;
            Instruction::Var {
                opcode: opcodes::ISTORE + n / 4,
                index: (n % 4) as u16,
            }
        }
        opcodes::LDC_W | opcodes::LDC2_W => {
            Instruction::Ldc(pool.loadable(ConstantIndex(reader.read_u16::<BigEndian>()?))?)
        }
        opcodes::GOTO_W | opcodes::JSR_W => Instruction::Jump {
            opcode: if opcode == opcodes::GOTO_W {
                opcodes::GOTO
            } else {
                opcodes::JSR
            },
            target: jump_target(pc, reader.read_i32::<BigEndian>()?)?,
        },
        opcodes::WIDE => match reader.read_u8()? {
            opcodes::IINC => Instruction::IInc {
                index: reader.read_u16::<BigEndian>()?,
                increment: reader.read_i16::<BigEndian>()?,
            },
            wide @ (opcodes::ILOAD..=opcodes::ALOAD
            | opcodes::ISTORE..=opcodes::ASTORE
            | opcodes::RET) => Instruction::Var {
                opcode: wide,
                index: reader.read_u16::<BigEndian>()?,
            },
            other => {
                let msg = format!("opcode {} at offset {} cannot be wide", other, pc);
                return Err(malformed(msg));
            }
        },
        _ => {
            let family = opcodes::family(opcode).ok_or_else(|| {
                malformed(format!("invalid opcode {} at offset {}", opcode, pc))
            })?;
            read_family(pc, opcode, family, reader, pool)?
        }
    };
    Ok(insn)
}

fn read_family(
    pc: u32,
    opcode: u8,
    family: Family,
    reader: &mut &[u8],
    pool: &Pool,
) -> Result<Instruction<u32>, Error> {
    let insn = match family {
        Family::Simple => Instruction::Simple(opcode),
        Family::Int => {
            let operand = match opcode {
                opcodes::BIPUSH => reader.read_i8()? as i32,
                opcodes::SIPUSH => reader.read_i16::<BigEndian>()? as i32,
                _ => reader.read_u8()? as i32,
            };
            Instruction::Int { opcode, operand }
        }
        Family::Var => Instruction::Var {
            opcode,
            index: reader.read_u8()? as u16,
        },
        Family::IInc => Instruction::IInc {
            index: reader.read_u8()? as u16,
            increment: reader.read_i8()? as i16,
        },
        Family::Type => {
            let index = reader.read_u16::<BigEndian>()?;
            let class = pool.class_name(crate::jvm::class_file::ClassConstantIndex(
                ConstantIndex(index),
            ))?;
            Instruction::Type {
                opcode,
                class: class.to_owned(),
            }
        }
        Family::Field => {
            let (owner, name, descriptor) =
                pool.field_ref(ConstantIndex(reader.read_u16::<BigEndian>()?))?;
            Instruction::Field {
                opcode,
                owner: owner.to_owned(),
                name: name.to_owned(),
                descriptor: descriptor.to_owned(),
            }
        }
        Family::Method => {
            let (owner, name, descriptor, interface) =
                pool.method_ref(ConstantIndex(reader.read_u16::<BigEndian>()?))?;
            if opcode == opcodes::INVOKEINTERFACE {
                // count and a zero byte, both implied by the descriptor
                reader.read_u16::<BigEndian>()?;
            }
            Instruction::Method {
                opcode,
                owner: owner.to_owned(),
                name: name.to_owned(),
                descriptor: descriptor.to_owned(),
                interface,
            }
        }
        Family::InvokeDynamic => {
            let index = ConstantIndex(reader.read_u16::<BigEndian>()?);
            reader.read_u16::<BigEndian>()?;
            let (name, descriptor, bootstrap, arguments) = pool.invoke_dynamic(index)?;
            Instruction::InvokeDynamic {
                name,
                descriptor,
                bootstrap,
                arguments,
            }
        }
        Family::Jump => Instruction::Jump {
            opcode,
            target: jump_target(pc, reader.read_i16::<BigEndian>()? as i32)?,
        },
        Family::Ldc => Instruction::Ldc(pool.loadable(ConstantIndex(reader.read_u8()? as u16))?),
        Family::TableSwitch => {
            skip_padding(pc, reader)?;
            let default = jump_target(pc, reader.read_i32::<BigEndian>()?)?;
            let min = reader.read_i32::<BigEndian>()?;
            let max = reader.read_i32::<BigEndian>()?;
            if min > max {
                let msg = format!("tableswitch at offset {} has low {} > high {}", pc, min, max);
                return Err(malformed(msg));
            }
            let count = (max as i64 - min as i64 + 1) as usize;
            if count > reader.len() / 4 {
                return Err(malformed(format!("truncated tableswitch at offset {}", pc)));
            }
            let targets = (0..count)
                .map(|_| jump_target(pc, reader.read_i32::<BigEndian>()?))
                .collect::<Result<_, _>>()?;
            Instruction::TableSwitch {
                min,
                max,
                default,
                targets,
            }
        }
        Family::LookupSwitch => {
            skip_padding(pc, reader)?;
            let default = jump_target(pc, reader.read_i32::<BigEndian>()?)?;
            let pairs = reader.read_i32::<BigEndian>()?;
            if pairs < 0 || pairs as usize > reader.len() / 8 {
                let msg = format!("invalid lookupswitch pair count {} at offset {}", pairs, pc);
                return Err(malformed(msg));
            }
            let mut keys = Vec::with_capacity(pairs as usize);
            let mut targets = Vec::with_capacity(pairs as usize);
            for _ in 0..pairs {
                keys.push(reader.read_i32::<BigEndian>()?);
                targets.push(jump_target(pc, reader.read_i32::<BigEndian>()?)?);
            }
            Instruction::LookupSwitch {
                default,
                keys,
                targets,
            }
        }
        Family::MultiANewArray => {
            let index = reader.read_u16::<BigEndian>()?;
            let descriptor = pool.class_name(crate::jvm::class_file::ClassConstantIndex(
                ConstantIndex(index),
            ))?;
            Instruction::MultiANewArray {
                descriptor: descriptor.to_owned(),
                dimensions: reader.read_u8()?,
            }
        }
    };
    Ok(insn)
}

/// Switch operands start at the next multiple of four from the start of the code
fn skip_padding(pc: u32, reader: &mut &[u8]) -> Result<(), Error> {
    let padding = (3 - pc % 4) as usize;
    for _ in 0..padding {
        reader.read_u8()?;
    }
    Ok(())
}

/// Convert a stack map table into absolute offsets
fn read_frames(
    pool: &Pool,
    table: &StackMapTable,
) -> Result<Vec<(u32, Frame<u32>)>, Error> {
    let vtypes = |infos: &[VerificationTypeInfo]| -> Result<Vec<VerificationType<u32>>, Error> {
        infos.iter().map(|info| verification_type(pool, info)).collect()
    };

    let mut frames = vec![];
    let mut previous: Option<u32> = None;
    for frame in &table.0 {
        let delta = frame.offset_delta() as u32;
        let offset = match previous {
            None => delta,
            Some(prev) => prev + delta + 1,
        };
        previous = Some(offset);
        let frame = match frame {
            StackMapFrame::SameLocalsNoStack { .. } => Frame::Same,
            StackMapFrame::SameLocalsOneStack { stack, .. } => {
                Frame::SameLocals1StackItem(verification_type(pool, stack)?)
            }
            StackMapFrame::ChopLocalsNoStack { chopped_k, .. } => Frame::Chop(*chopped_k),
            StackMapFrame::AppendLocalsNoStack { locals, .. } => Frame::Append(vtypes(locals)?),
            StackMapFrame::Full { locals, stack, .. } => Frame::Full {
                locals: vtypes(locals)?,
                stack: vtypes(stack)?,
            },
        };
        frames.push((offset, frame));
    }
    Ok(frames)
}

fn verification_type(
    pool: &Pool,
    info: &VerificationTypeInfo,
) -> Result<VerificationType<u32>, Error> {
    let typ = match info {
        VerificationTypeInfo::Top => VerificationType::Top,
        VerificationTypeInfo::Integer => VerificationType::Integer,
        VerificationTypeInfo::Float => VerificationType::Float,
        VerificationTypeInfo::Double => VerificationType::Double,
        VerificationTypeInfo::Long => VerificationType::Long,
        VerificationTypeInfo::Null => VerificationType::Null,
        VerificationTypeInfo::UninitializedThis => VerificationType::UninitializedThis,
        VerificationTypeInfo::Object(class) => {
            VerificationType::Object(pool.class_name(*class)?.to_owned())
        }
        VerificationTypeInfo::Uninitialized(offset) => VerificationType::Uninitialized(*offset as u32),
    };
    Ok(typ)
}

/// Walk a `Code` attribute, firing body callbacks on the visitor
pub fn read_body<M: MethodVisitor>(
    pool: &Pool,
    code: &Code,
    mode: Mode,
    visitor: &mut M,
) -> Result<(), Error> {
    let code_len = code.code_array.0.len() as u32;
    let instructions = read_instructions(&code.code_array.0, pool)?;
    let is_boundary = |offset: u32| -> bool {
        offset == code_len
            || instructions
                .binary_search_by_key(&offset, |(pc, _)| *pc)
                .is_ok()
    };

    let attributes = Attributes::new(pool.constants, &code.attributes, CODE_ATTRIBUTES)?;
    for dropped in &attributes.unknown {
        log::warn!("dropping unsupported code attribute {}", dropped.name);
    }
    let frames: BTreeMap<u32, Frame<u32>> = match attributes.get::<StackMapTable>()? {
        None => BTreeMap::new(),
        Some(table) => read_frames(pool, &table)?.into_iter().collect(),
    };
    let mut lines: BTreeMap<u32, Vec<u16>> = BTreeMap::new();
    let mut locals = vec![];
    let mut local_types = vec![];
    if mode == Mode::Full {
        for table in attributes.get_all::<LineNumberTable>()? {
            for line in table.0 {
                if is_boundary(line.start_pc as u32) && (line.start_pc as u32) < code_len {
                    lines.entry(line.start_pc as u32).or_default().push(line.line_number);
                } else {
                    log::warn!("dropping line number at invalid offset {}", line.start_pc);
                }
            }
        }
        for table in attributes.get_all::<LocalVariableTable>()? {
            locals.extend(table.0);
        }
        for table in attributes.get_all::<LocalVariableTypeTable>()? {
            local_types.extend(table.0);
        }
    }

    // Every offset that needs a label
    let mut label_offsets: BTreeSet<u32> = BTreeSet::new();
    for (pc, insn) in &instructions {
        for target in insn.targets() {
            if !is_boundary(*target) || *target == code_len {
                let msg = format!("invalid branch target {} at offset {}", target, pc);
                return Err(malformed(msg));
            }
            label_offsets.insert(*target);
        }
    }
    for handler in &code.exception_table {
        for offset in [handler.start_pc, handler.end_pc, handler.handler_pc] {
            if !is_boundary(offset as u32) {
                let msg = format!("invalid exception handler offset {}", offset);
                return Err(malformed(msg));
            }
            label_offsets.insert(offset as u32);
        }
    }
    for (offset, frame) in &frames {
        if !is_boundary(*offset) || *offset == code_len {
            return Err(malformed(format!("invalid stack map frame offset {}", offset)));
        }
        for typ in frame.types() {
            if let VerificationType::Uninitialized(new_offset) = typ {
                if !is_boundary(*new_offset) {
                    let msg = format!("invalid uninitialized offset {}", new_offset);
                    return Err(malformed(msg));
                }
                label_offsets.insert(*new_offset);
            }
        }
    }
    for local in &locals {
        let start = local.start_pc as u32;
        let end = start + local.length as u32;
        if !is_boundary(start) || !is_boundary(end) {
            let msg = format!("invalid local variable range {}..{}", start, end);
            return Err(malformed(msg));
        }
        label_offsets.insert(start);
        label_offsets.insert(end);
    }

    let mut labels: Labels<u32> = Labels::new();
    let mut label = |offset: u32| -> Result<_, Error> { Ok(labels.label(offset)) };

    for handler in &code.exception_table {
        let catch_type = match handler.catch_type {
            None => None,
            Some(class) => Some(pool.class_name(class)?),
        };
        visitor.visit_try_catch(
            label(handler.start_pc as u32)?,
            label(handler.end_pc as u32)?,
            label(handler.handler_pc as u32)?,
            catch_type,
        );
    }

    let mut frames = frames;
    for (pc, insn) in instructions {
        if label_offsets.contains(&pc) {
            visitor.visit_label(label(pc)?);
        }
        if let Some(lines) = lines.get(&pc) {
            for line in lines {
                visitor.visit_line(*line);
            }
        }
        if let Some(frame) = frames.remove(&pc) {
            visitor.visit_frame(frame.map_labels(&mut label)?);
        }
        visitor.visit_instruction(insn.map_labels(&mut label)?);
    }
    if label_offsets.contains(&code_len) {
        visitor.visit_label(label(code_len)?);
    }

    for local in &locals {
        let signature = local_types
            .iter()
            .find(|typ| {
                typ.start_pc == local.start_pc
                    && typ.length == local.length
                    && typ.index == local.index
            })
            .map(|typ| pool.utf8(typ.descriptor_index))
            .transpose()?;
        let start = local.start_pc as u32;
        visitor.visit_local_variable(LocalVariable {
            index: local.index,
            name: pool.utf8(local.name_index)?.to_owned(),
            descriptor: pool.utf8(local.descriptor_index)?.to_owned(),
            signature: signature.map(String::from),
            start: label(start)?,
            end: label(start + local.length as u32)?,
        });
    }
    for orphan in local_types.iter().filter(|typ| {
        !locals.iter().any(|local| {
            typ.start_pc == local.start_pc && typ.length == local.length && typ.index == local.index
        })
    }) {
        log::warn!(
            "dropping local variable type for slot {} without a matching local variable",
            orphan.index
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::class_file::{BootstrapMethod, ConstantsPool};
    use crate::model::Constant;

    fn with_pool<T>(build: impl FnOnce(&mut ConstantsPool), test: impl FnOnce(&Pool) -> T) -> T {
        let mut constants = ConstantsPool::new();
        build(&mut constants);
        let constants = constants.into_offset_vec();
        let bootstrap_methods: Vec<BootstrapMethod> = vec![];
        let pool = Pool {
            constants: &constants,
            bootstrap_methods: &bootstrap_methods,
        };
        test(&pool)
    }

    #[test]
    fn short_forms_are_folded() {
        let code = [
            opcodes::ALOAD_0,
            opcodes::LLOAD_3,
            opcodes::WIDE,
            opcodes::ISTORE,
            1,
            0,
            opcodes::GOTO_W,
            0xFF,
            0xFF,
            0xFF,
            0xFA,
            opcodes::RETURN,
        ];
        let insns = with_pool(|_| (), |pool| read_instructions(&code, pool).unwrap());
        assert_eq!(
            insns,
            vec![
                (
                    0,
                    Instruction::Var {
                        opcode: opcodes::ALOAD,
                        index: 0
                    }
                ),
                (
                    1,
                    Instruction::Var {
                        opcode: opcodes::LLOAD,
                        index: 3
                    }
                ),
                (
                    2,
                    Instruction::Var {
                        opcode: opcodes::ISTORE,
                        index: 256
                    }
                ),
                (
                    6,
                    Instruction::Jump {
                        opcode: opcodes::GOTO,
                        target: 0
                    }
                ),
                (11, Instruction::Simple(opcodes::RETURN)),
            ]
        );
    }

    #[test]
    fn ldc_w_resolves_constant() {
        let insns = with_pool(
            |pool| {
                pool.get_string("hello").unwrap();
            },
            |pool| read_instructions(&[opcodes::LDC_W, 0, 2], pool).unwrap(),
        );
        assert_eq!(
            insns,
            vec![(0, Instruction::Ldc(Constant::String("hello".into())))]
        );
    }

    #[test]
    fn switch_padding() {
        // nop, then tableswitch at offset 1 (2 bytes of padding)
        let mut code = vec![opcodes::NOP, opcodes::TABLESWITCH, 0, 0];
        for word in [23i32, 1, 2, 23, 23] {
            code.extend_from_slice(&word.to_be_bytes());
        }
        code.push(opcodes::RETURN);
        let insns = with_pool(|_| (), |pool| read_instructions(&code, pool).unwrap());
        assert_eq!(
            insns[1],
            (
                1,
                Instruction::TableSwitch {
                    min: 1,
                    max: 2,
                    default: 24,
                    targets: vec![24, 24],
                }
            )
        );
        assert_eq!(insns[2].0, 24);
    }

    #[test]
    fn invalid_opcode() {
        let err = with_pool(|_| (), |pool| read_instructions(&[0xCB], pool).unwrap_err());
        assert!(err.to_string().contains("invalid opcode 203"), "{}", err);
    }

    #[test]
    fn truncated_instruction() {
        let err = with_pool(|_| (), |pool| read_instructions(&[opcodes::SIPUSH, 1], pool))
            .unwrap_err();
        assert!(err.to_string().contains("truncated instruction"), "{}", err);
    }
}
